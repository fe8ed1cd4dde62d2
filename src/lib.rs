pub mod communication;
pub mod configuration;
pub mod core;
pub mod database;
pub mod i18n;
pub mod otp;
pub mod registration;
pub mod sms;

#[cfg(test)]
mod testing;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Config Error:{0}")]
    ConfigError(String),

    #[error("Service error")]
    ServiceError,
}
