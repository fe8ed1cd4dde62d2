use super::super::store::ChannelStore;
use super::super::types::{Channel, NewChannel};
use super::{parse_rows, DatabaseError, DatabaseService};
use async_trait::async_trait;

#[async_trait]
impl ChannelStore for DatabaseService {
    async fn create(&self, channel: NewChannel) -> Result<Channel, DatabaseError> {
        let body =
            serde_json::to_string(&channel).map_err(|e| DatabaseError::QueryError(e.to_string()))?;

        let response = self
            .client
            .from("channels")
            .insert(body)
            .execute()
            .await
            .map_err(|e| DatabaseError::QueryError(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| DatabaseError::QueryError(e.to_string()))?;
        let rows: Vec<Channel> = parse_rows(status, &body, "channels")?;
        rows.into_iter()
            .next()
            .ok_or_else(|| DatabaseError::QueryError("No channel returned after insert".to_string()))
    }

    async fn list_all(&self) -> Result<Vec<Channel>, DatabaseError> {
        let response = self
            .client
            .from("channels")
            .select("*")
            .order("created_at.desc")
            .execute()
            .await
            .map_err(|e| DatabaseError::QueryError(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| DatabaseError::QueryError(e.to_string()))?;
        parse_rows(status, &body, "channels")
    }

    async fn list_active(&self) -> Result<Vec<Channel>, DatabaseError> {
        let response = self
            .client
            .from("channels")
            .select("*")
            .eq("is_active", "true")
            .execute()
            .await
            .map_err(|e| DatabaseError::QueryError(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| DatabaseError::QueryError(e.to_string()))?;
        parse_rows(status, &body, "channels")
    }

    async fn delete(&self, id: i64) -> Result<bool, DatabaseError> {
        let response = self
            .client
            .from("channels")
            .delete()
            .eq("id", id.to_string())
            .execute()
            .await
            .map_err(|e| DatabaseError::QueryError(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| DatabaseError::QueryError(e.to_string()))?;
        let rows: Vec<Channel> = parse_rows(status, &body, "channels")?;
        Ok(!rows.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    #[tokio::test]
    async fn conflict_maps_to_duplicate() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/rest/v1/channels")
            .match_query(Matcher::Any)
            .with_status(409)
            .with_body(r#"{"code":"23505","message":"duplicate key value"}"#)
            .create_async()
            .await;

        let db = DatabaseService::with_credentials(&server.url(), "test-key");
        let result = db.create(NewChannel::from_username("olympiad_news")).await;
        assert!(matches!(result, Err(DatabaseError::Duplicate(_))));
    }
}
