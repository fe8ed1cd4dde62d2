use crate::registration::state::State;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct User {
    pub id: i64,
    pub telegram_id: i64,
    pub username: Option<String>,
    pub language_code: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub region: Option<String>,
    pub district: Option<String>,
    pub school: Option<String>,
    pub grade: Option<i32>,
    pub phone: Option<String>,
    pub is_verified: bool,
    pub state: State,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn is_registered(&self) -> bool {
        self.is_verified && self.state == State::Registered
    }

    pub fn phone(&self) -> Option<&str> {
        self.phone.as_deref().filter(|p| !p.is_empty())
    }
}

#[derive(Debug, Serialize, Clone)]
pub struct NewUser {
    pub telegram_id: i64,
    pub username: Option<String>,
    pub language_code: String,
    pub state: State,
}

// A partial update; unset fields are left untouched by the store.
// Field values and the next state always travel in the same write.
#[derive(Debug, Serialize, Default, Clone, PartialEq)]
pub struct UserPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub district: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub school: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grade: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_verified: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<State>,
}

impl UserPatch {
    pub fn state(state: State) -> Self {
        Self {
            state: Some(state),
            ..Default::default()
        }
    }

    pub fn apply(&self, user: &mut User) {
        if let Some(v) = &self.first_name {
            user.first_name = Some(v.clone());
        }
        if let Some(v) = &self.last_name {
            user.last_name = Some(v.clone());
        }
        if let Some(v) = &self.region {
            user.region = Some(v.clone());
        }
        if let Some(v) = &self.district {
            user.district = Some(v.clone());
        }
        if let Some(v) = &self.school {
            user.school = Some(v.clone());
        }
        if let Some(v) = self.grade {
            user.grade = Some(v);
        }
        if let Some(v) = &self.phone {
            user.phone = Some(v.clone());
        }
        if let Some(v) = self.is_verified {
            user.is_verified = v;
        }
        if let Some(v) = self.state {
            user.state = v;
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UserStats {
    pub total: usize,
    pub verified: usize,
    pub today: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stats {
    pub total_users: usize,
    pub verified_users: usize,
    pub today_users: usize,
    pub active_channels: usize,
}
