use super::{SmsError, SmsGateway};
use crate::configuration::SmsConfig;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{error, info};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct SmsCredentials {
    pub login: String,
    pub password: String,
}

/// Client for the sms.etc.uz HTTP API. Each send is a single attempt.
pub struct EtcSmsGateway {
    client: Client,
    base_url: String,
    sender: String,
    credentials: SmsCredentials,
}

#[derive(Serialize)]
struct SendRequest<'a> {
    header: RequestHeader<'a>,
    body: RequestBody<'a>,
}

#[derive(Serialize)]
struct RequestHeader<'a> {
    login: &'a str,
    pwd: &'a str,
    #[serde(rename = "CgPN")]
    sender: &'a str,
}

#[derive(Serialize)]
struct RequestBody<'a> {
    message_id_in: &'a str,
    #[serde(rename = "CdPN")]
    phone: &'a str,
    text: &'a str,
}

#[derive(Serialize)]
struct StatusRequest<'a> {
    login: &'a str,
    pwd: &'a str,
    message_id_in: &'a str,
}

#[derive(Debug, Deserialize)]
struct GatewayResponse {
    query_code: i64,
    #[serde(default)]
    query_state: String,
}

impl EtcSmsGateway {
    pub fn new(config: &SmsConfig, credentials: SmsCredentials) -> Result<Self, SmsError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| SmsError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            sender: config.sender.clone(),
            credentials,
        })
    }

    /// Delivery state the gateway reports for a previously sent message.
    pub async fn delivery_status(&self, message_id: &str) -> Result<String, SmsError> {
        let request = StatusRequest {
            login: &self.credentials.login,
            pwd: &self.credentials.password,
            message_id_in: message_id,
        };

        let response = self
            .client
            .get(format!("{}/get-my-status", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| SmsError::Transport(e.to_string()))?;

        let status: GatewayResponse = response
            .json()
            .await
            .map_err(|e| SmsError::Decode(e.to_string()))?;
        Ok(status.query_state)
    }
}

#[async_trait]
impl SmsGateway for EtcSmsGateway {
    async fn send(&self, phone: &str, text: &str) -> Result<String, SmsError> {
        let message_id = format!("OTP_{}", Uuid::new_v4().simple());
        let request = SendRequest {
            header: RequestHeader {
                login: &self.credentials.login,
                pwd: &self.credentials.password,
                sender: &self.sender,
            },
            body: RequestBody {
                message_id_in: &message_id,
                phone,
                text,
            },
        };

        info!(phone = %phone, message_id = %message_id, "Sending SMS");
        let response = self
            .client
            .post(format!("{}/single-sms", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| SmsError::Transport(e.to_string()))?;

        if response.status() == StatusCode::INTERNAL_SERVER_ERROR {
            error!(phone = %phone, "SMS gateway rejected request format");
            return Err(SmsError::InvalidRequest);
        }

        let reply: GatewayResponse = response
            .json()
            .await
            .map_err(|e| SmsError::Decode(e.to_string()))?;

        match reply.query_code {
            200 => {
                info!(phone = %phone, message_id = %message_id, "SMS sent");
                Ok(message_id)
            }
            401 => Err(SmsError::Unauthorized(reply.query_state)),
            503 => Err(SmsError::Unavailable(reply.query_state)),
            code => Err(SmsError::Unknown {
                code,
                state: reply.query_state,
            }),
        }
    }
}
