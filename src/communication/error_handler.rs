use crate::i18n::Messages;
use crate::registration::{
    EventKind, InboundEvent, OutboundMessage, RegistrationError, ValidationError,
};

pub fn validation_hint(error: &ValidationError, messages: &Messages) -> String {
    match error {
        ValidationError::FullName => messages.invalid_full_name(),
        ValidationError::Location => messages.invalid_location(),
        ValidationError::Grade => messages.invalid_grade(),
        ValidationError::Phone => messages.invalid_phone(),
    }
}

pub fn map_registration_error_to_user_message(
    error: &RegistrationError,
    messages: &Messages,
) -> String {
    match error {
        RegistrationError::Validation(e) => validation_hint(e, messages),
        RegistrationError::CodeSpent(_) => messages.otp_spent(),
        _ => messages.error(),
    }
}

pub fn user_message(error: &RegistrationError, messages: &Messages) -> OutboundMessage {
    let text = map_registration_error_to_user_message(error, messages);
    match error {
        RegistrationError::Validation(_) => OutboundMessage::html(text),
        _ => OutboundMessage::plain(text),
    }
}

// User input is not echoed; a pending OTP could be in it.
fn describe(kind: &EventKind) -> String {
    match kind {
        EventKind::Command(command) => format!("command {:?}", command),
        EventKind::Text(_) => "text message".to_string(),
        EventKind::Contact { .. } => "shared contact".to_string(),
        EventKind::Callback(action) => format!("callback {}", action.token()),
    }
}

pub fn alert_text(event: &InboundEvent, error: &RegistrationError) -> String {
    format!(
        "❌ Registration Failed\n\nUser: {}\nEvent: {}\nError: {}",
        event.from.user_id,
        describe(&event.kind),
        error
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::DatabaseError;
    use crate::i18n::Language;
    use crate::registration::{Command, Sender};

    #[test]
    fn system_errors_get_generic_text() {
        let messages = Language::Ru.messages();
        let error = RegistrationError::Persistence(DatabaseError::UserNotFound);
        assert_eq!(
            map_registration_error_to_user_message(&error, &messages),
            messages.error()
        );

        let error = RegistrationError::Validation(ValidationError::Grade);
        assert_eq!(user_message(&error, &messages).text, messages.invalid_grade());
    }

    #[test]
    fn spent_code_points_to_resend() {
        let messages = Language::En.messages();
        let error = RegistrationError::CodeSpent(DatabaseError::UserNotFound);
        let text = map_registration_error_to_user_message(&error, &messages);
        assert_eq!(text, messages.otp_spent());
        assert!(text.contains("/resend"));
    }

    #[test]
    fn alerts_do_not_leak_message_text() {
        let event = InboundEvent {
            from: Sender {
                user_id: 5,
                username: None,
                language_code: None,
            },
            chat_id: 5,
            kind: EventKind::Text("123456".to_string()),
        };
        let text = alert_text(&event, &RegistrationError::MissingPhone);
        assert!(!text.contains("123456"));
        assert!(text.contains("User: 5"));

        let event = InboundEvent {
            kind: EventKind::Command(Command::Start),
            ..event
        };
        assert!(alert_text(&event, &RegistrationError::MissingPhone).contains("Start"));
    }
}
