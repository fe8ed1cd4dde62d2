use super::super::store::UserStore;
use super::super::types::{NewUser, User, UserPatch, UserStats};
use super::{parse_rows, DatabaseError, DatabaseService};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::info;

enum UserFilter {
    All,
    Verified,
    CreatedSince(DateTime<Utc>),
}

#[async_trait]
impl UserStore for DatabaseService {
    async fn find_by_telegram_id(&self, telegram_id: i64) -> Result<Option<User>, DatabaseError> {
        let response = self
            .client
            .from("users")
            .select("*")
            .eq("telegram_id", telegram_id.to_string())
            .execute()
            .await
            .map_err(|e| DatabaseError::QueryError(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| DatabaseError::QueryError(e.to_string()))?;
        let users: Vec<User> = parse_rows(status, &body, "users")?;
        Ok(users.into_iter().next())
    }

    async fn create(&self, user: NewUser) -> Result<User, DatabaseError> {
        let now = Utc::now();
        let mut body = serde_json::to_value(&user)
            .map_err(|e| DatabaseError::QueryError(e.to_string()))?;
        body["created_at"] = serde_json::json!(now);
        body["updated_at"] = serde_json::json!(now);

        let response = self
            .client
            .from("users")
            .insert(body.to_string())
            .execute()
            .await
            .map_err(|e| DatabaseError::QueryError(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| DatabaseError::QueryError(e.to_string()))?;
        let created: Vec<User> = parse_rows(status, &body, "users")?;
        let created = created.into_iter().next().ok_or_else(|| {
            DatabaseError::QueryError("No user returned after insert".to_string())
        })?;

        info!(telegram_id = created.telegram_id, language = %created.language_code, "New user created");
        Ok(created)
    }

    async fn update(&self, telegram_id: i64, patch: UserPatch) -> Result<User, DatabaseError> {
        let mut body = serde_json::to_value(&patch)
            .map_err(|e| DatabaseError::QueryError(e.to_string()))?;
        body["updated_at"] = serde_json::json!(Utc::now());

        let response = self
            .client
            .from("users")
            .update(body.to_string())
            .eq("telegram_id", telegram_id.to_string())
            .execute()
            .await
            .map_err(|e| DatabaseError::QueryError(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| DatabaseError::QueryError(e.to_string()))?;
        let updated: Vec<User> = parse_rows(status, &body, "users")?;
        updated.into_iter().next().ok_or(DatabaseError::UserNotFound)
    }

    async fn list_verified(&self) -> Result<Vec<User>, DatabaseError> {
        let response = self
            .client
            .from("users")
            .select("*")
            .eq("is_verified", "true")
            .order("created_at.desc")
            .execute()
            .await
            .map_err(|e| DatabaseError::QueryError(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| DatabaseError::QueryError(e.to_string()))?;
        parse_rows(status, &body, "users")
    }

    async fn stats(&self, since: DateTime<Utc>) -> Result<UserStats, DatabaseError> {
        let total = self.count_users(UserFilter::All).await?;
        let verified = self.count_users(UserFilter::Verified).await?;
        let today = self.count_users(UserFilter::CreatedSince(since)).await?;

        Ok(UserStats {
            total,
            verified,
            today,
        })
    }
}

impl DatabaseService {
    async fn count_users(&self, filter: UserFilter) -> Result<usize, DatabaseError> {
        let query = self.client.from("users").select("id");
        let query = match filter {
            UserFilter::All => query,
            UserFilter::Verified => query.eq("is_verified", "true"),
            UserFilter::CreatedSince(since) => query.gte("created_at", since.to_rfc3339()),
        };

        let response = query
            .execute()
            .await
            .map_err(|e| DatabaseError::QueryError(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| DatabaseError::QueryError(e.to_string()))?;
        let rows: Vec<serde_json::Value> = parse_rows(status, &body, "users")?;
        Ok(rows.len())
    }
}
