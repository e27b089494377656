//! Background task machinery
//!
//! Bookings and accounts never send email inline: they describe a `Job` and
//! hand it to a `TaskDispatcher`. The in-process `QueueDispatcher` feeds a
//! `TaskRunner` that delivers with bounded retry, and a periodic sweep sends
//! reminders for upcoming unconfirmed sessions.

pub mod jobs;
pub mod queue;
pub mod reminder;
pub mod runner;

pub use queue::{Job, QueueDispatcher, TaskDispatcher};
pub use reminder::ReminderSweep;
pub use runner::TaskRunner;
