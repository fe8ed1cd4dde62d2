use teloxide::utils::command::BotCommands;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sender {
    pub user_id: i64,
    pub username: Option<String>,
    pub language_code: Option<String>,
}

/// A single inbound update, already stripped of transport details.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundEvent {
    pub from: Sender,
    pub chat_id: i64,
    pub kind: EventKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    Command(Command),
    Text(String),
    Contact { phone: String },
    Callback(CallbackAction),
}

#[derive(BotCommands, Debug, Clone, PartialEq, Eq)]
#[command(rename_rule = "lowercase")]
pub enum Command {
    #[command(description = "start or continue registration")]
    Start,
    #[command(description = "send a new verification code")]
    Resend,
    #[command(description = "show your registration details")]
    Profile,
    #[command(description = "open the admin panel")]
    Admin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackAction {
    CheckSubscription,
    ResendOtp,
    AdminStats,
    AdminAddChannel,
    AdminRemoveChannel,
    AdminBroadcast,
    AdminBack,
    DeleteChannel(i64),
}

const DELETE_CHANNEL_PREFIX: &str = "del_ch_";

impl CallbackAction {
    pub fn parse(data: &str) -> Option<Self> {
        let action = match data {
            "check_sub" => CallbackAction::CheckSubscription,
            "resend_otp" => CallbackAction::ResendOtp,
            "admin_stats" => CallbackAction::AdminStats,
            "admin_add_channel" => CallbackAction::AdminAddChannel,
            "admin_remove_channel" => CallbackAction::AdminRemoveChannel,
            "admin_broadcast" => CallbackAction::AdminBroadcast,
            "admin_back" => CallbackAction::AdminBack,
            other => {
                let id = other.strip_prefix(DELETE_CHANNEL_PREFIX)?.parse().ok()?;
                CallbackAction::DeleteChannel(id)
            }
        };
        Some(action)
    }

    pub fn token(&self) -> String {
        match self {
            CallbackAction::CheckSubscription => "check_sub".to_string(),
            CallbackAction::ResendOtp => "resend_otp".to_string(),
            CallbackAction::AdminStats => "admin_stats".to_string(),
            CallbackAction::AdminAddChannel => "admin_add_channel".to_string(),
            CallbackAction::AdminRemoveChannel => "admin_remove_channel".to_string(),
            CallbackAction::AdminBroadcast => "admin_broadcast".to_string(),
            CallbackAction::AdminBack => "admin_back".to_string(),
            CallbackAction::DeleteChannel(id) => format!("{}{}", DELETE_CHANNEL_PREFIX, id),
        }
    }

    pub fn requires_admin(&self) -> bool {
        !matches!(
            self,
            CallbackAction::CheckSubscription | CallbackAction::ResendOtp
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn callback_tokens_parse_back() {
        for action in [
            CallbackAction::CheckSubscription,
            CallbackAction::ResendOtp,
            CallbackAction::AdminBroadcast,
            CallbackAction::DeleteChannel(17),
        ] {
            assert_eq!(CallbackAction::parse(&action.token()), Some(action));
        }
    }

    #[test]
    fn only_admin_actions_require_admin() {
        assert!(!CallbackAction::CheckSubscription.requires_admin());
        assert!(!CallbackAction::ResendOtp.requires_admin());
        assert!(CallbackAction::AdminStats.requires_admin());
        assert!(CallbackAction::DeleteChannel(3).requires_admin());
    }

    #[test]
    fn malformed_callbacks_are_ignored() {
        assert_eq!(CallbackAction::parse("del_ch_abc"), None);
        assert_eq!(CallbackAction::parse("login"), None);
    }

    #[test]
    fn commands_parse_with_bot_suffix() {
        assert_eq!(Command::parse("/start", "regbot").ok(), Some(Command::Start));
        assert_eq!(Command::parse("/resend@regbot", "regbot").ok(), Some(Command::Resend));
        assert!(Command::parse("/unknown", "regbot").is_err());
    }
}
