use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Channel {
    pub id: i64,
    pub channel_id: Option<i64>,
    pub channel_username: String,
    pub title: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl Channel {
    pub fn join_url(&self) -> String {
        format!("https://t.me/{}", self.channel_username)
    }
}

#[derive(Debug, Serialize, Clone)]
pub struct NewChannel {
    pub channel_id: Option<i64>,
    pub channel_username: String,
    pub title: Option<String>,
    pub is_active: bool,
}

impl NewChannel {
    pub fn from_username(username: &str) -> Self {
        Self {
            channel_id: None,
            channel_username: username.to_string(),
            title: Some(username.to_string()),
            is_active: true,
        }
    }
}
