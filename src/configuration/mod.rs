use crate::database::{DatabaseService, MemoryStore, Stores};
use crate::i18n::{Language, LanguagePolicy};
use serde::Deserialize;
use std::env;
use std::fs;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("File read error")]
    FileError,

    #[error("Deserialization error:{0}")]
    DeserializationError(String),

    #[error("Invalid configuration:{0}")]
    Invalid(String),

    #[error("Missing environment variable:{0}")]
    MissingEnv(String),

    #[error("Storage init error:{0}")]
    Storage(String),
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub storage: StorageBackend,
    #[serde(default = "default_health_port")]
    pub health_port: u16,
    #[serde(default)]
    pub otp: OtpConfig,
    #[serde(default)]
    pub languages: LanguagesConfig,
    #[serde(default)]
    pub phone: PhoneConfig,
    #[serde(default)]
    pub sms: SmsConfig,
    #[serde(default)]
    pub telegram: TelegramConfig,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Postgrest,
    Memory,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct OtpConfig {
    pub code_length: usize,
    pub expires_mins: i64,
    /// `{code}` and `{minutes}` are substituted.
    pub message_template: String,
}

impl Default for OtpConfig {
    fn default() -> Self {
        Self {
            code_length: 6,
            expires_mins: 5,
            message_template:
                "Sizning tasdiqlash kodingiz: {code}\nKod {minutes} daqiqa ichida amal qiladi."
                    .to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LanguagesConfig {
    pub supported: Vec<Language>,
    pub default: Language,
}

impl Default for LanguagesConfig {
    fn default() -> Self {
        Self {
            supported: vec![Language::Uz, Language::Ru, Language::En],
            default: Language::Uz,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PhoneConfig {
    pub country_prefix: String,
}

impl Default for PhoneConfig {
    fn default() -> Self {
        Self {
            country_prefix: "998".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SmsConfig {
    pub base_url: String,
    /// Sender name shown to the recipient (`CgPN`).
    pub sender: String,
    pub timeout_secs: u64,
}

impl Default for SmsConfig {
    fn default() -> Self {
        Self {
            base_url: "http://sms.etc.uz:8084".to_string(),
            sender: "Amity".to_string(),
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct TelegramConfig {
    pub error_channel_id: Option<i64>,
    pub login_url: String,
    pub register_url: String,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            error_channel_id: None,
            login_url: "https://khiso.uz/login".to_string(),
            register_url: "https://khiso.uz/register".to_string(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_health_port() -> u16 {
    8080
}

#[derive(Clone)]
pub struct Context {
    pub config: Config,
    pub stores: Stores,
}

impl Context {
    pub fn new(config_file: &str) -> Result<Self, ConfigError> {
        let config = Config::new(config_file)?;
        let stores = match config.storage {
            StorageBackend::Postgrest => {
                let database =
                    DatabaseService::new().map_err(|e| ConfigError::Storage(e.to_string()))?;
                Stores::from_database(Arc::new(database))
            }
            StorageBackend::Memory => Stores::in_memory(Arc::new(MemoryStore::new())),
        };

        Ok(Self { config, stores })
    }

    pub fn with_stores(config: Config, stores: Stores) -> Self {
        Self { config, stores }
    }
}

impl Config {
    pub fn new(config_file: &str) -> Result<Self, ConfigError> {
        let config_str = fs::read_to_string(config_file).map_err(|_| ConfigError::FileError)?;
        Self::from_json(&config_str)
    }

    pub fn from_json(config_str: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_json::from_str(config_str)
            .map_err(|e| ConfigError::DeserializationError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(4..=10).contains(&self.otp.code_length) {
            return Err(ConfigError::Invalid(format!(
                "otp.code_length must be between 4 and 10, got {}",
                self.otp.code_length
            )));
        }
        if self.otp.expires_mins < 1 {
            return Err(ConfigError::Invalid(
                "otp.expires_mins must be at least 1".to_string(),
            ));
        }
        if !self.otp.message_template.contains("{code}") {
            return Err(ConfigError::Invalid(
                "otp.message_template must contain {code}".to_string(),
            ));
        }
        if !self.languages.supported.contains(&self.languages.default) {
            return Err(ConfigError::Invalid(format!(
                "default language {} is not in the supported set",
                self.languages.default
            )));
        }
        let prefix = &self.phone.country_prefix;
        if prefix.is_empty() || !prefix.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ConfigError::Invalid(format!(
                "phone.country_prefix must be digits, got {:?}",
                prefix
            )));
        }
        Ok(())
    }

    pub fn language_policy(&self) -> LanguagePolicy {
        LanguagePolicy::new(self.languages.supported.clone(), self.languages.default)
    }
}

/// Reads a required secret from the process environment.
pub fn env_secret(name: &str) -> Result<String, ConfigError> {
    env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ConfigError::MissingEnv(name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn empty_object_uses_defaults() {
        let config = Config::from_json("{}").unwrap();
        assert_eq!(config.log_level, "info");
        assert_eq!(config.storage, StorageBackend::Postgrest);
        assert_eq!(config.otp.code_length, 6);
        assert_eq!(config.otp.expires_mins, 5);
        assert_eq!(config.phone.country_prefix, "998");
        assert_eq!(config.sms.timeout_secs, 30);
        assert_eq!(config.languages.default, Language::Uz);
        assert!(config.telegram.error_channel_id.is_none());
    }

    #[test]
    fn sections_override_defaults() {
        let config = Config::from_json(
            r#"{
                "storage": "memory",
                "otp": { "code_length": 4, "expires_mins": 10 },
                "languages": { "supported": ["ru", "en"], "default": "ru" },
                "telegram": { "error_channel_id": -100123 }
            }"#,
        )
        .unwrap();
        assert_eq!(config.storage, StorageBackend::Memory);
        assert_eq!(config.otp.code_length, 4);
        assert!(config.otp.message_template.contains("{code}"));
        assert_eq!(config.language_policy().resolve(Some("uz")), Language::Ru);
        assert_eq!(config.telegram.error_channel_id, Some(-100123));
    }

    #[test]
    fn invalid_values_are_rejected() {
        for json in [
            r#"{ "otp": { "code_length": 2 } }"#,
            r#"{ "otp": { "expires_mins": 0 } }"#,
            r#"{ "otp": { "message_template": "no placeholder" } }"#,
            r#"{ "languages": { "supported": ["ru"], "default": "uz" } }"#,
            r#"{ "phone": { "country_prefix": "+998" } }"#,
        ] {
            assert!(
                matches!(Config::from_json(json), Err(ConfigError::Invalid(_))),
                "{}",
                json
            );
        }
    }

    #[test]
    fn missing_file_is_file_error() {
        assert!(matches!(
            Config::new("does-not-exist.json"),
            Err(ConfigError::FileError)
        ));
    }

    #[test]
    #[serial]
    fn env_secret_requires_non_empty_value() {
        env::set_var("REGISTRAR_TEST_SECRET", "  ");
        assert!(matches!(
            env_secret("REGISTRAR_TEST_SECRET"),
            Err(ConfigError::MissingEnv(_))
        ));
        env::set_var("REGISTRAR_TEST_SECRET", "value");
        assert_eq!(env_secret("REGISTRAR_TEST_SECRET").unwrap(), "value");
        env::remove_var("REGISTRAR_TEST_SECRET");
    }

    #[test]
    #[serial]
    fn postgrest_storage_needs_supabase_credentials() {
        let path = env::temp_dir().join("registrar-config-test.json");
        fs::write(&path, r#"{ "storage": "postgrest" }"#).unwrap();
        env::remove_var("SUPABASE_URL");

        let result = Context::new(path.to_str().unwrap());
        assert!(matches!(result, Err(ConfigError::Storage(_))));
        fs::remove_file(path).ok();
    }
}
