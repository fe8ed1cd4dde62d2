use async_trait::async_trait;
use std::any::type_name;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tracing::{error, warn};

const RESTART_DELAY: Duration = Duration::from_secs(5);

#[derive(Error, Debug)]
#[error("{0}")]
pub struct Error(String);

impl Error {
    pub fn new(s: &str) -> Error {
        Error(s.to_string())
    }

    pub fn from<E: std::error::Error>(e: E) -> Self {
        Self(e.to_string())
    }
}

#[async_trait]
pub trait Service: Sized + Send {
    type Context: Clone + Send;
    async fn new(context: Self::Context) -> Result<Self, Error>;
    async fn run(self) -> Result<(), Error>;
}

#[async_trait]
pub trait ServiceWithErrorSender: Sized + Send {
    type Context: Clone + Send;
    async fn new(context: Self::Context, error_sender: mpsc::Sender<String>)
        -> Result<Self, Error>;
    async fn run(self) -> Result<(), Error>;
}

#[async_trait]
pub trait ServiceWithErrorReceiver: Sized + Send {
    type Context: Clone + Send;
    async fn new(
        context: Self::Context,
        receiver: Arc<Mutex<mpsc::Receiver<String>>>,
    ) -> Result<Self, Error>;
    async fn run(self) -> Result<(), Error>;
}

/// Runs services on a shared join set, restarting them when they stop.
pub struct ServiceManager<C> {
    context: C,
    services: JoinSet<()>,
}

impl<C> ServiceManager<C>
where
    C: 'static + Clone + Send,
{
    pub fn new(context: C) -> Self {
        Self {
            context,
            services: JoinSet::new(),
        }
    }

    pub fn spawn<T: Service<Context = C> + 'static>(&mut self) {
        let context = self.context.clone();
        self.services.spawn(async move {
            loop {
                match T::new(context.clone()).await {
                    Ok(service) => {
                        if let Err(e) = service.run().await {
                            error!(service = type_name::<T>(), error = %e, "Service failed");
                        }
                    }
                    Err(e) => error!(service = type_name::<T>(), error = %e, "Service init failed"),
                }
                warn!(service = type_name::<T>(), "Restarting service");
                tokio::time::sleep(RESTART_DELAY).await;
            }
        });
    }

    pub fn spawn_with_error_sender<T: ServiceWithErrorSender<Context = C> + 'static>(
        &mut self,
        sender: mpsc::Sender<String>,
    ) {
        let context = self.context.clone();
        self.services.spawn(async move {
            loop {
                match T::new(context.clone(), sender.clone()).await {
                    Ok(service) => {
                        if let Err(e) = service.run().await {
                            error!(service = type_name::<T>(), error = %e, "Service failed");
                        }
                    }
                    Err(e) => error!(service = type_name::<T>(), error = %e, "Service init failed"),
                }
                warn!(service = type_name::<T>(), "Restarting service");
                tokio::time::sleep(RESTART_DELAY).await;
            }
        });
    }

    pub fn spawn_with_error_receiver<T: ServiceWithErrorReceiver<Context = C> + 'static>(
        &mut self,
        receiver: Arc<Mutex<mpsc::Receiver<String>>>,
    ) {
        let context = self.context.clone();
        self.services.spawn(async move {
            loop {
                let service = match T::new(context.clone(), receiver.clone()).await {
                    Ok(service) => service,
                    Err(e) => {
                        error!(service = type_name::<T>(), error = %e, "Service init failed");
                        tokio::time::sleep(RESTART_DELAY).await;
                        continue;
                    }
                };
                if let Err(e) = service.run().await {
                    error!(service = type_name::<T>(), error = %e, "Service stopped");
                    break;
                }
            }
        });
    }

    pub async fn wait(&mut self) -> Result<(), Error> {
        if self.services.join_next().await.is_some() {
            return Err(Error::new("Internal Service Error"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static STARTS: AtomicUsize = AtomicUsize::new(0);

    struct ClosingReceiver;

    #[async_trait]
    impl ServiceWithErrorReceiver for ClosingReceiver {
        type Context = ();

        async fn new(
            _context: (),
            _receiver: Arc<Mutex<mpsc::Receiver<String>>>,
        ) -> Result<Self, Error> {
            STARTS.fetch_add(1, Ordering::SeqCst);
            Ok(Self)
        }

        async fn run(self) -> Result<(), Error> {
            Err(Error::new("closed"))
        }
    }

    #[tokio::test]
    async fn failing_receiver_service_ends_and_wait_reports_it() {
        let (_tx, rx) = mpsc::channel::<String>(1);
        let mut manager = ServiceManager::new(());
        manager.spawn_with_error_receiver::<ClosingReceiver>(Arc::new(Mutex::new(rx)));

        assert!(manager.wait().await.is_err());
        assert_eq!(STARTS.load(Ordering::SeqCst), 1);
    }
}
