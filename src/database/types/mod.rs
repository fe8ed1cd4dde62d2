mod channel;
mod otp;
mod user;

pub use channel::{Channel, NewChannel};
pub use otp::{NewOtpCode, OtpCode};
pub use user::{NewUser, Stats, User, UserPatch, UserStats};
