//! Data access repositories
//!
//! Each entity gets a trait defining its data access interface and a
//! SQLx-backed implementation supporting SQLite and MySQL.

pub mod booking;
pub mod lookup;
pub mod message;
pub mod session;
pub mod user;
pub mod verification_token;

pub use booking::{BookingRepository, SqlxBookingRepository};
pub use lookup::{LookupRepository, SqlxLookupRepository};
pub use message::{MessageRepository, SqlxMessageRepository};
pub use session::{SessionRepository, SqlxSessionRepository};
pub use user::{SqlxUserRepository, UserRepository};
pub use verification_token::{SqlxVerificationTokenRepository, VerificationTokenRepository};
