use crate::configuration::{env_secret, Context};
use crate::core::service_manager::{Error as ServiceManagerError, ServiceWithErrorReceiver};
use async_trait::async_trait;
use std::sync::Arc;
use teloxide::prelude::*;
use tokio::sync::{mpsc, Mutex};
use tracing::{error, warn};

/// Forwards system error reports to the operators' Telegram chat.
pub struct ErrorAlertService {
    bot: Bot,
    receiver: Arc<Mutex<mpsc::Receiver<String>>>,
    error_channel_id: Option<i64>,
}

#[async_trait]
impl ServiceWithErrorReceiver for ErrorAlertService {
    type Context = Context;

    async fn new(
        context: Context,
        receiver: Arc<Mutex<mpsc::Receiver<String>>>,
    ) -> Result<Self, ServiceManagerError> {
        let bot = Bot::new(env_secret("TELOXIDE_TOKEN").map_err(ServiceManagerError::from)?);
        Ok(Self {
            bot,
            receiver,
            error_channel_id: context.config.telegram.error_channel_id,
        })
    }

    async fn run(self) -> Result<(), ServiceManagerError> {
        loop {
            let mut rx = self.receiver.lock().await;
            let Some(message) = rx.recv().await else {
                return Err(ServiceManagerError::new("Error channel closed"));
            };
            drop(rx);

            let Some(channel_id) = self.error_channel_id else {
                warn!(alert = %message, "No error channel configured");
                continue;
            };
            if let Err(e) = self.bot.send_message(ChatId(channel_id), message).await {
                error!(error = %e, "Failed to deliver error alert");
            }
        }
    }
}
