use super::service_manager::{Error as ServiceManagerError, Service};
use crate::configuration::Context;
use async_trait::async_trait;
use axum::{http::StatusCode, routing::get, Router};
use tokio::net::TcpListener;
use tracing::info;

/// Liveness endpoint for the process supervisor.
pub struct HealthServer {
    port: u16,
}

pub fn router() -> Router {
    Router::new().route("/health", get(health_check))
}

async fn health_check() -> (StatusCode, &'static str) {
    (StatusCode::OK, "OK")
}

#[async_trait]
impl Service for HealthServer {
    type Context = Context;

    async fn new(context: Context) -> Result<Self, ServiceManagerError> {
        Ok(Self {
            port: context.config.health_port,
        })
    }

    async fn run(self) -> Result<(), ServiceManagerError> {
        let listener = TcpListener::bind(format!("0.0.0.0:{}", self.port))
            .await
            .map_err(ServiceManagerError::from)?;
        info!(port = self.port, "Health server listening");

        axum::serve(listener, router())
            .await
            .map_err(ServiceManagerError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn health_returns_ok() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, router()).await });

        let response = reqwest::get(format!("http://{}/health", addr)).await.unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::OK);
        assert_eq!(response.text().await.unwrap(), "OK");
    }
}
