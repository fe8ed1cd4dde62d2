use async_trait::async_trait;
use thiserror::Error;

pub mod etc_uz;

pub use etc_uz::EtcSmsGateway;

#[derive(Debug, Error)]
pub enum SmsError {
    #[error("SMS request failed: {0}")]
    Transport(String),
    #[error("SMS gateway rejected the request format")]
    InvalidRequest,
    #[error("SMS auth failed: {0}")]
    Unauthorized(String),
    #[error("SMS service unavailable: {0}")]
    Unavailable(String),
    #[error("Unknown SMS error: code={code}, state={state}")]
    Unknown { code: i64, state: String },
    #[error("Malformed SMS response: {0}")]
    Decode(String),
}

/// Outbound text-message delivery.
#[async_trait]
pub trait SmsGateway: Send + Sync {
    /// Sends `text` to `phone` and returns the handle the gateway tracks the message by.
    async fn send(&self, phone: &str, text: &str) -> Result<String, SmsError>;
}
