use super::errors::DatabaseError;
use super::memory::MemoryStore;
use super::services::DatabaseService;
use super::types::{Channel, NewChannel, NewOtpCode, NewUser, OtpCode, User, UserPatch, UserStats};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_telegram_id(&self, telegram_id: i64) -> Result<Option<User>, DatabaseError>;
    async fn create(&self, user: NewUser) -> Result<User, DatabaseError>;
    /// Applies the patch in a single write. Fails with `UserNotFound` when no row matched.
    async fn update(&self, telegram_id: i64, patch: UserPatch) -> Result<User, DatabaseError>;
    async fn list_verified(&self) -> Result<Vec<User>, DatabaseError>;
    async fn stats(&self, since: DateTime<Utc>) -> Result<UserStats, DatabaseError>;
}

#[async_trait]
pub trait OtpStore: Send + Sync {
    async fn insert(&self, otp: NewOtpCode) -> Result<OtpCode, DatabaseError>;
    /// Newest unused code for `phone` that has not expired at `now`.
    async fn latest_active(
        &self,
        phone: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<OtpCode>, DatabaseError>;
    /// Flips `is_used` from false to true. Returns false if another caller got there first.
    async fn consume(&self, id: i64) -> Result<bool, DatabaseError>;
}

#[async_trait]
pub trait ChannelStore: Send + Sync {
    async fn create(&self, channel: NewChannel) -> Result<Channel, DatabaseError>;
    async fn list_all(&self) -> Result<Vec<Channel>, DatabaseError>;
    async fn list_active(&self) -> Result<Vec<Channel>, DatabaseError>;
    /// Returns false when nothing was deleted.
    async fn delete(&self, id: i64) -> Result<bool, DatabaseError>;
}

#[async_trait]
pub trait AdminStore: Send + Sync {
    async fn is_admin(&self, telegram_id: i64) -> Result<bool, DatabaseError>;
}

#[derive(Clone)]
pub struct Stores {
    pub users: Arc<dyn UserStore>,
    pub otp: Arc<dyn OtpStore>,
    pub channels: Arc<dyn ChannelStore>,
    pub admins: Arc<dyn AdminStore>,
}

impl Stores {
    pub fn from_database(database: Arc<DatabaseService>) -> Self {
        Self {
            users: database.clone(),
            otp: database.clone(),
            channels: database.clone(),
            admins: database,
        }
    }

    pub fn in_memory(store: Arc<MemoryStore>) -> Self {
        Self {
            users: store.clone(),
            otp: store.clone(),
            channels: store.clone(),
            admins: store,
        }
    }
}
