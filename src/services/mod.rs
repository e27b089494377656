//! Business logic services
//!
//! Services sit between the HTTP handlers and the repositories. Each service
//! owns the rules for one area: accounts, bookings, contact messages,
//! passwords, and outbound email.

pub mod account;
pub mod booking;
pub mod contact;
pub mod email;
pub mod password;

pub use account::{AccountService, AccountServiceError};
pub use booking::{BookingService, BookingServiceError};
pub use contact::{ContactService, ContactServiceError};
pub use email::{Mailer, OutboundEmail, SmtpMailer};
