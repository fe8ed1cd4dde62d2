mod errors;
pub mod memory;
mod services;
pub mod store;
pub mod types;

pub use errors::DatabaseError;
pub use memory::MemoryStore;
pub use services::DatabaseService;
pub use store::{AdminStore, ChannelStore, OtpStore, Stores, UserStore};
pub use types::{Channel, NewChannel, NewOtpCode, NewUser, OtpCode, Stats, User, UserPatch, UserStats};
