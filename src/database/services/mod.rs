use super::errors::DatabaseError;
use postgrest::Postgrest;
use serde::de::DeserializeOwned;
use std::env;

mod admin;
mod channel;
mod otp;
mod user;

pub struct DatabaseService {
    pub client: Postgrest,
}

impl DatabaseService {
    pub fn new() -> Result<Self, DatabaseError> {
        let url = env::var("SUPABASE_URL")
            .map_err(|_| DatabaseError::ConnectionError("SUPABASE_URL not found".to_string()))?;
        let service_key = env::var("SUPABASE_KEY")
            .map_err(|_| DatabaseError::ConnectionError("SUPABASE_KEY not found".to_string()))?;

        Ok(Self::with_credentials(&url, &service_key))
    }

    pub fn with_credentials(url: &str, service_key: &str) -> Self {
        let rest_url = format!("{}/rest/v1", url);
        let client = Postgrest::new(&rest_url)
            .insert_header("apikey", service_key)
            .insert_header("Authorization", &format!("Bearer {}", service_key));

        Self { client }
    }
}

// Interprets a PostgREST array response body, turning non-2xx statuses into errors.
pub(super) fn parse_rows<T: DeserializeOwned>(
    status: u16,
    body: &str,
    table: &str,
) -> Result<Vec<T>, DatabaseError> {
    if status == 409 {
        return Err(DatabaseError::Duplicate(format!("{}: {}", table, body)));
    }
    if !(200..300).contains(&status) {
        return Err(DatabaseError::QueryError(format!(
            "{} request failed with status {}: {}",
            table, status, body
        )));
    }
    if body.trim().is_empty() {
        return Ok(Vec::new());
    }

    serde_json::from_str(body).map_err(|e| DatabaseError::QueryError(e.to_string()))
}
