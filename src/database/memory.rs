use super::errors::DatabaseError;
use super::store::{AdminStore, ChannelStore, OtpStore, UserStore};
use super::types::{
    Channel, NewChannel, NewOtpCode, NewUser, OtpCode, User, UserPatch, UserStats,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;

#[derive(Default)]
struct Tables {
    next_id: i64,
    users: Vec<User>,
    otp_codes: Vec<OtpCode>,
    channels: Vec<Channel>,
    admins: HashSet<i64>,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// Process-local storage with the same contracts as the PostgREST tables.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_admins(admins: impl IntoIterator<Item = i64>) -> Self {
        Self {
            tables: Mutex::new(Tables {
                admins: admins.into_iter().collect(),
                ..Default::default()
            }),
            fail_writes: AtomicBool::new(false),
        }
    }

    /// Makes every subsequent write fail, for exercising persistence errors.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub async fn otp_codes_for(&self, phone: &str) -> Vec<OtpCode> {
        self.tables
            .lock()
            .await
            .otp_codes
            .iter()
            .filter(|otp| otp.phone == phone)
            .cloned()
            .collect()
    }

    fn check_writable(&self) -> Result<(), DatabaseError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(DatabaseError::QueryError("writes disabled".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn find_by_telegram_id(&self, telegram_id: i64) -> Result<Option<User>, DatabaseError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .users
            .iter()
            .find(|u| u.telegram_id == telegram_id)
            .cloned())
    }

    async fn create(&self, user: NewUser) -> Result<User, DatabaseError> {
        self.check_writable()?;
        let mut tables = self.tables.lock().await;
        if tables.users.iter().any(|u| u.telegram_id == user.telegram_id) {
            return Err(DatabaseError::Duplicate(format!(
                "users: telegram_id {}",
                user.telegram_id
            )));
        }

        let now = Utc::now();
        let created = User {
            id: tables.next_id(),
            telegram_id: user.telegram_id,
            username: user.username,
            language_code: user.language_code,
            first_name: None,
            last_name: None,
            region: None,
            district: None,
            school: None,
            grade: None,
            phone: None,
            is_verified: false,
            state: user.state,
            created_at: now,
            updated_at: now,
        };
        tables.users.push(created.clone());
        Ok(created)
    }

    async fn update(&self, telegram_id: i64, patch: UserPatch) -> Result<User, DatabaseError> {
        self.check_writable()?;
        let mut tables = self.tables.lock().await;
        let user = tables
            .users
            .iter_mut()
            .find(|u| u.telegram_id == telegram_id)
            .ok_or(DatabaseError::UserNotFound)?;

        patch.apply(user);
        user.updated_at = Utc::now();
        Ok(user.clone())
    }

    async fn list_verified(&self) -> Result<Vec<User>, DatabaseError> {
        let tables = self.tables.lock().await;
        let mut users: Vec<User> = tables
            .users
            .iter()
            .filter(|u| u.is_verified)
            .cloned()
            .collect();
        users.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(users)
    }

    async fn stats(&self, since: DateTime<Utc>) -> Result<UserStats, DatabaseError> {
        let tables = self.tables.lock().await;
        Ok(UserStats {
            total: tables.users.len(),
            verified: tables.users.iter().filter(|u| u.is_verified).count(),
            today: tables.users.iter().filter(|u| u.created_at >= since).count(),
        })
    }
}

#[async_trait]
impl OtpStore for MemoryStore {
    async fn insert(&self, otp: NewOtpCode) -> Result<OtpCode, DatabaseError> {
        self.check_writable()?;
        let mut tables = self.tables.lock().await;
        let row = OtpCode {
            id: tables.next_id(),
            user_id: otp.user_id,
            phone: otp.phone,
            code: otp.code,
            message_id: Some(otp.message_id),
            is_used: otp.is_used,
            expires_at: otp.expires_at,
            created_at: otp.created_at,
        };
        tables.otp_codes.push(row.clone());
        Ok(row)
    }

    async fn latest_active(
        &self,
        phone: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<OtpCode>, DatabaseError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .otp_codes
            .iter()
            .filter(|otp| otp.phone == phone && otp.is_live(now))
            .max_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)))
            .cloned())
    }

    async fn consume(&self, id: i64) -> Result<bool, DatabaseError> {
        self.check_writable()?;
        let mut tables = self.tables.lock().await;
        match tables
            .otp_codes
            .iter_mut()
            .find(|otp| otp.id == id && !otp.is_used)
        {
            Some(otp) => {
                otp.is_used = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[async_trait]
impl ChannelStore for MemoryStore {
    async fn create(&self, channel: NewChannel) -> Result<Channel, DatabaseError> {
        self.check_writable()?;
        let mut tables = self.tables.lock().await;
        if tables
            .channels
            .iter()
            .any(|c| c.channel_username.eq_ignore_ascii_case(&channel.channel_username))
        {
            return Err(DatabaseError::Duplicate(format!(
                "channels: @{}",
                channel.channel_username
            )));
        }

        let row = Channel {
            id: tables.next_id(),
            channel_id: channel.channel_id,
            channel_username: channel.channel_username,
            title: channel.title,
            is_active: channel.is_active,
            created_at: Utc::now(),
        };
        tables.channels.push(row.clone());
        Ok(row)
    }

    async fn list_all(&self) -> Result<Vec<Channel>, DatabaseError> {
        let tables = self.tables.lock().await;
        let mut channels = tables.channels.clone();
        channels.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(channels)
    }

    async fn list_active(&self) -> Result<Vec<Channel>, DatabaseError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .channels
            .iter()
            .filter(|c| c.is_active)
            .cloned()
            .collect())
    }

    async fn delete(&self, id: i64) -> Result<bool, DatabaseError> {
        self.check_writable()?;
        let mut tables = self.tables.lock().await;
        let before = tables.channels.len();
        tables.channels.retain(|c| c.id != id);
        Ok(tables.channels.len() != before)
    }
}

#[async_trait]
impl AdminStore for MemoryStore {
    async fn is_admin(&self, telegram_id: i64) -> Result<bool, DatabaseError> {
        Ok(self.tables.lock().await.admins.contains(&telegram_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registration::state::State;
    use chrono::Duration;

    fn new_otp(phone: &str, code: &str, created_at: DateTime<Utc>) -> NewOtpCode {
        NewOtpCode {
            user_id: 1,
            phone: phone.to_string(),
            code: code.to_string(),
            message_id: "OTP_test".to_string(),
            is_used: false,
            expires_at: created_at + Duration::minutes(5),
            created_at,
        }
    }

    #[tokio::test]
    async fn latest_active_prefers_newest_live_row() {
        let store = MemoryStore::new();
        let now = Utc::now();
        store.insert(new_otp("998901234567", "111111", now)).await.unwrap();
        store
            .insert(new_otp("998901234567", "222222", now + Duration::seconds(1)))
            .await
            .unwrap();

        let latest = store
            .latest_active("998901234567", now + Duration::seconds(2))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(latest.code, "222222");
    }

    #[tokio::test]
    async fn consume_is_single_use() {
        let store = MemoryStore::new();
        let row = store
            .insert(new_otp("998901234567", "123456", Utc::now()))
            .await
            .unwrap();

        assert!(store.consume(row.id).await.unwrap());
        assert!(!store.consume(row.id).await.unwrap());
    }

    #[tokio::test]
    async fn update_of_unknown_user_is_not_found() {
        let store = MemoryStore::new();
        let result = store.update(42, UserPatch::state(State::WaitLocation)).await;
        assert!(matches!(result, Err(DatabaseError::UserNotFound)));
    }

    #[tokio::test]
    async fn duplicate_channel_usernames_are_rejected() {
        let store = MemoryStore::new();
        ChannelStore::create(&store, NewChannel::from_username("news"))
            .await
            .unwrap();
        let result = ChannelStore::create(&store, NewChannel::from_username("News")).await;
        assert!(matches!(result, Err(DatabaseError::Duplicate(_))));
    }

    #[tokio::test]
    async fn failing_writes_leave_rows_untouched() {
        let store = MemoryStore::new();
        UserStore::create(
            &store,
            NewUser {
                telegram_id: 5,
                username: None,
                language_code: "uz".to_string(),
                state: State::WaitFullName,
            },
        )
        .await
        .unwrap();

        store.set_fail_writes(true);
        assert!(store.update(5, UserPatch::state(State::WaitLocation)).await.is_err());

        let user = store.find_by_telegram_id(5).await.unwrap().unwrap();
        assert_eq!(user.state, State::WaitFullName);
    }
}
