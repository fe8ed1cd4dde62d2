use super::outbound::ChatError;
use super::state::State;
use crate::database::DatabaseError;
use crate::otp::OtpError;
use thiserror::Error;

/// Input that does not satisfy the current step. Answered with a re-prompt.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    #[error("full name needs a given name and a family name")]
    FullName,
    #[error("location needs region, district and school")]
    Location,
    #[error("grade must be a number from 1 to 11")]
    Grade,
    #[error("phone number is not a valid local mobile number")]
    Phone,
}

#[derive(Debug, Error)]
pub enum RegistrationError {
    #[error("Invalid input: {0}")]
    Validation(#[from] ValidationError),
    #[error("OTP error: {0}")]
    Otp(#[from] OtpError),
    #[error("Storage error: {0}")]
    Persistence(#[from] DatabaseError),
    #[error("Illegal transition {from} -> {to}")]
    Transition { from: State, to: State },
    #[error("Code consumed but registration not saved: {0}")]
    CodeSpent(DatabaseError),
    #[error("User has no phone on record")]
    MissingPhone,
    #[error("Chat error: {0}")]
    Chat(#[from] ChatError),
}

impl RegistrationError {
    /// Whether the failure is worth an operator alert.
    pub fn is_system(&self) -> bool {
        !matches!(self, RegistrationError::Validation(_))
    }
}
