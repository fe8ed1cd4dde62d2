use super::super::store::AdminStore;
use super::{parse_rows, DatabaseError, DatabaseService};
use async_trait::async_trait;

#[async_trait]
impl AdminStore for DatabaseService {
    async fn is_admin(&self, telegram_id: i64) -> Result<bool, DatabaseError> {
        let response = self
            .client
            .from("admins")
            .select("id")
            .eq("telegram_id", telegram_id.to_string())
            .execute()
            .await
            .map_err(|e| DatabaseError::QueryError(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| DatabaseError::QueryError(e.to_string()))?;
        let rows: Vec<serde_json::Value> = parse_rows(status, &body, "admins")?;
        Ok(!rows.is_empty())
    }
}
