use dotenvy::dotenv;
use registrar::communication::error_alert::ErrorAlertService;
use registrar::communication::telegram::TelegramService;
use registrar::configuration::Context;
use registrar::core::http_server::HealthServer;
use registrar::core::ServiceManager;
use registrar::AppError;
use std::env;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenv().ok();
    let config_file = env::var("REGISTRAR_CONFIG").unwrap_or_else(|_| "config.json".to_string());
    let context = Context::new(&config_file).map_err(|e| AppError::ConfigError(e.to_string()))?;

    let filter = EnvFilter::try_new(&context.config.log_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(filter)
        .init();
    tracing::info!(storage = ?context.config.storage, "Starting registration bot");

    let mut service_manager = ServiceManager::new(context);
    let (error_sender, error_receiver) = mpsc::channel::<String>(100);
    let shared_error_receiver = Arc::new(Mutex::new(error_receiver));

    service_manager.spawn_with_error_receiver::<ErrorAlertService>(shared_error_receiver);
    service_manager.spawn_with_error_sender::<TelegramService>(error_sender);
    service_manager.spawn::<HealthServer>();

    service_manager
        .wait()
        .await
        .map_err(|_| AppError::ServiceError)
}
