//! One-time code generation, delivery binding and single-use verification.

use crate::configuration::OtpConfig;
use crate::database::{DatabaseError, NewOtpCode, OtpStore};
use crate::sms::{SmsError, SmsGateway};
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum OtpError {
    #[error("Code delivery failed: {0}")]
    Delivery(#[from] SmsError),
    #[error("Code storage failed: {0}")]
    Persistence(#[from] DatabaseError),
}

#[derive(Debug, Clone)]
pub struct OtpSettings {
    pub code_length: usize,
    pub expires_in: Duration,
    pub message_template: String,
}

impl From<&OtpConfig> for OtpSettings {
    fn from(config: &OtpConfig) -> Self {
        Self {
            code_length: config.code_length,
            expires_in: Duration::minutes(config.expires_mins),
            message_template: config.message_template.clone(),
        }
    }
}

impl Default for OtpSettings {
    fn default() -> Self {
        Self::from(&OtpConfig::default())
    }
}

impl OtpSettings {
    pub fn render(&self, code: &str) -> String {
        self.message_template
            .replace("{code}", code)
            .replace("{minutes}", &self.expires_in.num_minutes().to_string())
    }
}

/// Uniform decimal digits from the thread-local CSPRNG.
pub fn generate_code(length: usize) -> String {
    let mut rng = rand::rng();
    (0..length)
        .map(|_| char::from(b'0' + rng.random_range(0..10u8)))
        .collect()
}

/// `998901234567` becomes `998901****67`. Short inputs are returned unchanged.
pub fn mask_phone(phone: &str) -> String {
    if phone.len() < 8 || !phone.is_ascii() {
        return phone.to_string();
    }
    format!("{}****{}", &phone[..6], &phone[phone.len() - 2..])
}

pub struct OtpService {
    store: Arc<dyn OtpStore>,
    gateway: Arc<dyn SmsGateway>,
    settings: OtpSettings,
}

impl OtpService {
    pub fn new(
        store: Arc<dyn OtpStore>,
        gateway: Arc<dyn SmsGateway>,
        settings: OtpSettings,
    ) -> Self {
        Self {
            store,
            gateway,
            settings,
        }
    }

    /// Sends a fresh code to `phone` and records it. Nothing is stored when delivery fails.
    pub async fn issue(&self, user_id: i64, phone: &str) -> Result<(), OtpError> {
        let code = generate_code(self.settings.code_length);
        let message_id = self
            .gateway
            .send(phone, &self.settings.render(&code))
            .await?;

        let now = Utc::now();
        self.store
            .insert(NewOtpCode {
                user_id,
                phone: phone.to_string(),
                code,
                message_id,
                is_used: false,
                expires_at: now + self.settings.expires_in,
                created_at: now,
            })
            .await?;

        info!(user_id, phone = %mask_phone(phone), "OTP issued");
        Ok(())
    }

    pub async fn verify(&self, phone: &str, code: &str) -> Result<bool, OtpError> {
        self.verify_at(phone, code, Utc::now()).await
    }

    /// Only the newest live code for the phone can match. A match is consumed atomically,
    /// so concurrent submissions of the same code succeed at most once.
    pub async fn verify_at(
        &self,
        phone: &str,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, OtpError> {
        let Some(active) = self.store.latest_active(phone, now).await? else {
            return Ok(false);
        };
        if active.code != code.trim() {
            return Ok(false);
        }

        let consumed = self.store.consume(active.id).await?;
        if !consumed {
            warn!(phone = %mask_phone(phone), otp_id = active.id, "OTP already consumed");
        }
        Ok(consumed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::MemoryStore;
    use crate::testing::FakeSms;

    fn service(store: Arc<MemoryStore>, sms: Arc<FakeSms>) -> OtpService {
        OtpService::new(store, sms, OtpSettings::default())
    }

    #[test]
    fn codes_are_fixed_length_digits() {
        for length in [4, 6, 10] {
            let code = generate_code(length);
            assert_eq!(code.len(), length);
            assert!(code.bytes().all(|b| b.is_ascii_digit()));
        }
    }

    #[test]
    fn every_digit_shows_up() {
        let digits: std::collections::HashSet<char> =
            (0..200).flat_map(|_| generate_code(6).chars().collect::<Vec<_>>()).collect();
        assert_eq!(digits.len(), 10);
    }

    #[test]
    fn masking() {
        assert_eq!(mask_phone("998901234567"), "998901****67");
        assert_eq!(mask_phone("12345"), "12345");
    }

    #[test]
    fn message_embeds_code_and_window() {
        let text = OtpSettings::default().render("123456");
        assert_eq!(
            text,
            "Sizning tasdiqlash kodingiz: 123456\nKod 5 daqiqa ichida amal qiladi."
        );
    }

    #[tokio::test]
    async fn issued_code_verifies_exactly_once() {
        let store = Arc::new(MemoryStore::new());
        let sms = Arc::new(FakeSms::default());
        let otp = service(store.clone(), sms.clone());

        otp.issue(1, "998901234567").await.unwrap();
        let code = sms.last_code().unwrap();

        assert!(otp.verify("998901234567", &code).await.unwrap());
        assert!(!otp.verify("998901234567", &code).await.unwrap());
    }

    #[tokio::test]
    async fn wrong_code_does_not_consume() {
        let store = Arc::new(MemoryStore::new());
        let sms = Arc::new(FakeSms::default());
        let otp = service(store.clone(), sms.clone());

        otp.issue(1, "998901234567").await.unwrap();
        let code = sms.last_code().unwrap();
        let wrong = if code == "000000" { "111111" } else { "000000" };

        assert!(!otp.verify("998901234567", wrong).await.unwrap());
        assert!(otp.verify("998901234567", &code).await.unwrap());
    }

    #[tokio::test]
    async fn expired_code_is_rejected() {
        let store = Arc::new(MemoryStore::new());
        let sms = Arc::new(FakeSms::default());
        let otp = service(store.clone(), sms.clone());

        otp.issue(1, "998901234567").await.unwrap();
        let code = sms.last_code().unwrap();
        let later = Utc::now() + Duration::minutes(5) + Duration::seconds(1);

        assert!(!otp.verify_at("998901234567", &code, later).await.unwrap());
    }

    #[tokio::test]
    async fn resend_supersedes_previous_code() {
        let store = Arc::new(MemoryStore::new());
        let sms = Arc::new(FakeSms::default());
        let otp = service(store.clone(), sms.clone());

        otp.issue(1, "998901234567").await.unwrap();
        let first = sms.last_code().unwrap();
        otp.issue(1, "998901234567").await.unwrap();
        let second = sms.last_code().unwrap();

        if first != second {
            assert!(!otp.verify("998901234567", &first).await.unwrap());
        }
        assert!(otp.verify("998901234567", &second).await.unwrap());
    }

    #[tokio::test]
    async fn delivery_failure_persists_nothing() {
        let store = Arc::new(MemoryStore::new());
        let sms = Arc::new(FakeSms::failing());
        let otp = service(store.clone(), sms);

        let result = otp.issue(1, "998901234567").await;
        assert!(matches!(result, Err(OtpError::Delivery(_))));
        assert!(store.otp_codes_for("998901234567").await.is_empty());
    }

    #[tokio::test]
    async fn concurrent_verification_succeeds_once() {
        let store = Arc::new(MemoryStore::new());
        let sms = Arc::new(FakeSms::default());
        let otp = Arc::new(service(store.clone(), sms.clone()));

        otp.issue(1, "998901234567").await.unwrap();
        let code = sms.last_code().unwrap();

        let mut tasks = tokio::task::JoinSet::new();
        for _ in 0..8 {
            let otp = otp.clone();
            let code = code.clone();
            tasks.spawn(async move { otp.verify("998901234567", &code).await.unwrap() });
        }

        let mut successes = 0;
        while let Some(result) = tasks.join_next().await {
            if result.unwrap() {
                successes += 1;
            }
        }
        assert_eq!(successes, 1);
    }
}
