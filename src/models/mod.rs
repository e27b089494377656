//! Data models for the Mentora booking system

pub mod booking;
pub mod lookup;
pub mod message;
pub mod session;
pub mod user;
pub mod verification_token;

pub use booking::Booking;
pub use lookup::{SessionDuration, SessionFormat, SessionType};
pub use message::ContactMessage;
pub use session::Session;
pub use user::User;
pub use verification_token::EmailVerificationToken;
