use super::super::store::OtpStore;
use super::super::types::{NewOtpCode, OtpCode};
use super::{parse_rows, DatabaseError, DatabaseService};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

#[async_trait]
impl OtpStore for DatabaseService {
    async fn insert(&self, otp: NewOtpCode) -> Result<OtpCode, DatabaseError> {
        let body = serde_json::to_string(&otp).map_err(|e| DatabaseError::QueryError(e.to_string()))?;

        let response = self
            .client
            .from("otp_codes")
            .insert(body)
            .execute()
            .await
            .map_err(|e| DatabaseError::QueryError(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| DatabaseError::QueryError(e.to_string()))?;
        let rows: Vec<OtpCode> = parse_rows(status, &body, "otp_codes")?;
        rows.into_iter()
            .next()
            .ok_or_else(|| DatabaseError::QueryError("No otp code returned after insert".to_string()))
    }

    async fn latest_active(
        &self,
        phone: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<OtpCode>, DatabaseError> {
        let response = self
            .client
            .from("otp_codes")
            .select("*")
            .eq("phone", phone)
            .eq("is_used", "false")
            .gt("expires_at", now.to_rfc3339())
            .order("created_at.desc,id.desc")
            .limit(1)
            .execute()
            .await
            .map_err(|e| DatabaseError::QueryError(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| DatabaseError::QueryError(e.to_string()))?;
        let rows: Vec<OtpCode> = parse_rows(status, &body, "otp_codes")?;
        Ok(rows.into_iter().next())
    }

    async fn consume(&self, id: i64) -> Result<bool, DatabaseError> {
        // Conditional update: only a row still marked unused is returned,
        // so of two racing verifications exactly one sees a row.
        let response = self
            .client
            .from("otp_codes")
            .update(serde_json::json!({ "is_used": true }).to_string())
            .eq("id", id.to_string())
            .eq("is_used", "false")
            .execute()
            .await
            .map_err(|e| DatabaseError::QueryError(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| DatabaseError::QueryError(e.to_string()))?;
        let rows: Vec<OtpCode> = parse_rows(status, &body, "otp_codes")?;
        Ok(!rows.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn row_json(is_used: bool) -> String {
        serde_json::json!([{
            "id": 7,
            "user_id": 1,
            "phone": "998901234567",
            "code": "123456",
            "message_id": "OTP_1",
            "is_used": is_used,
            "expires_at": "2030-01-01T00:00:00Z",
            "created_at": "2029-12-31T23:55:00Z"
        }])
        .to_string()
    }

    #[tokio::test]
    async fn consume_reports_success_when_row_flipped() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("PATCH", "/rest/v1/otp_codes")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("id".into(), "eq.7".into()),
                Matcher::UrlEncoded("is_used".into(), "eq.false".into()),
            ]))
            .match_body(Matcher::Json(serde_json::json!({ "is_used": true })))
            .with_status(200)
            .with_body(row_json(true))
            .create_async()
            .await;

        let db = DatabaseService::with_credentials(&server.url(), "test-key");
        assert!(db.consume(7).await.unwrap());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn consume_reports_failure_when_already_used() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("PATCH", "/rest/v1/otp_codes")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body("[]")
            .create_async()
            .await;

        let db = DatabaseService::with_credentials(&server.url(), "test-key");
        assert!(!db.consume(7).await.unwrap());
    }

    #[tokio::test]
    async fn latest_active_filters_on_phone_and_freshness() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/rest/v1/otp_codes")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("phone".into(), "eq.998901234567".into()),
                Matcher::UrlEncoded("is_used".into(), "eq.false".into()),
                Matcher::UrlEncoded("order".into(), "created_at.desc,id.desc".into()),
            ]))
            .with_status(200)
            .with_body(row_json(false))
            .create_async()
            .await;

        let db = DatabaseService::with_credentials(&server.url(), "test-key");
        let otp = db
            .latest_active("998901234567", Utc::now())
            .await
            .unwrap()
            .expect("row expected");
        assert_eq!(otp.id, 7);
        assert_eq!(otp.code, "123456");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn server_errors_surface_as_query_errors() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/rest/v1/otp_codes")
            .match_query(Matcher::Any)
            .with_status(500)
            .with_body("boom")
            .create_async()
            .await;

        let db = DatabaseService::with_credentials(&server.url(), "test-key");
        let result = db.latest_active("998901234567", Utc::now()).await;
        assert!(matches!(result, Err(DatabaseError::QueryError(_))));
    }
}
