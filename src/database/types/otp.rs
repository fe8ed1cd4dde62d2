use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct OtpCode {
    pub id: i64,
    pub user_id: i64,
    pub phone: String,
    pub code: String,
    pub message_id: Option<String>,
    pub is_used: bool,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl OtpCode {
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        !self.is_used && self.expires_at > now
    }
}

#[derive(Debug, Serialize, Clone)]
pub struct NewOtpCode {
    pub user_id: i64,
    pub phone: String,
    pub code: String,
    pub message_id: String,
    pub is_used: bool,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}
