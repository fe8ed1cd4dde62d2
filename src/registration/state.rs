use serde::{Deserialize, Serialize};
use std::fmt;

/// Position of a user in the registration flow.
///
/// Stored as a snake_case string in the `users.state` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum State {
    Start,
    #[default]
    WaitFullName,
    WaitLocation,
    WaitGrade,
    WaitPhone,
    WaitOtp,
    Registered,
}

impl State {
    pub const ORDER: [State; 7] = [
        State::Start,
        State::WaitFullName,
        State::WaitLocation,
        State::WaitGrade,
        State::WaitPhone,
        State::WaitOtp,
        State::Registered,
    ];

    /// The single state reachable from this one. `Registered` has none.
    pub fn next(self) -> Option<State> {
        match self {
            State::Start => Some(State::WaitFullName),
            State::WaitFullName => Some(State::WaitLocation),
            State::WaitLocation => Some(State::WaitGrade),
            State::WaitGrade => Some(State::WaitPhone),
            State::WaitPhone => Some(State::WaitOtp),
            State::WaitOtp => Some(State::Registered),
            State::Registered => None,
        }
    }

    pub fn can_transition_to(self, to: State) -> bool {
        self.next() == Some(to)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            State::Start => "start",
            State::WaitFullName => "wait_full_name",
            State::WaitLocation => "wait_location",
            State::WaitGrade => "wait_grade",
            State::WaitPhone => "wait_phone",
            State::WaitOtp => "wait_otp",
            State::Registered => "registered",
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_single_forward_steps_are_allowed() {
        for (i, from) in State::ORDER.iter().enumerate() {
            for (j, to) in State::ORDER.iter().enumerate() {
                assert_eq!(from.can_transition_to(*to), j == i + 1, "{} -> {}", from, to);
            }
        }
    }

    #[test]
    fn registered_is_terminal() {
        assert_eq!(State::Registered.next(), None);
    }

    #[test]
    fn serializes_as_snake_case() {
        assert_eq!(serde_json::to_string(&State::WaitOtp).unwrap(), "\"wait_otp\"");
        let state: State = serde_json::from_str("\"wait_full_name\"").unwrap();
        assert_eq!(state, State::WaitFullName);
        for state in State::ORDER {
            assert_eq!(serde_json::to_string(&state).unwrap(), format!("\"{}\"", state));
        }
    }
}
