pub mod http_server;
pub mod service_manager;
pub mod user_locks;

pub use service_manager::ServiceManager;
