//! Booking model
//!
//! The central entity of the system: a requested mentorship session with
//! contact details, scheduling information, lifecycle flags, and the two
//! single-use tokens that drive the confirmation/completion workflow.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::SessionDuration;

/// A mentorship session booking.
///
/// Both tokens are generated together at creation and share one
/// `token_generated_at` timestamp and one validity window. Each token is
/// consumable at most once for its purpose; consuming one does not affect
/// the other.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: i64,
    /// Requester contact info
    pub full_name: String,
    pub email: String,
    pub phone_number: Option<String>,
    pub company: Option<String>,
    /// Requested start time, stored in UTC
    pub preferred_datetime: DateTime<Utc>,
    /// Named IANA timezone of the requester, kept for display only
    pub timezone: String,
    /// Lookup references
    pub session_type_id: i64,
    pub session_duration_id: i64,
    pub session_format_id: i64,
    /// Free text
    pub goals: Option<String>,
    pub referral_source: Option<String>,
    pub linkedin_or_website: Option<String>,
    /// Lifecycle flags
    pub mentor_confirmed: bool,
    pub session_completed: bool,
    /// Tri-state: None = unknown, Some(true/false) = held / not held
    pub session_held: Option<bool>,
    /// Single-use tokens, stored and matched as plaintext
    pub mentor_confirmation_token: String,
    pub session_completion_token: String,
    pub token_generated_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub last_reminder_sent_at: Option<DateTime<Utc>>,
}

impl Booking {
    /// When the session ends: `preferred_datetime + duration`.
    ///
    /// This, not the start time, anchors the completion-prompt schedule.
    pub fn session_end(&self, duration: &SessionDuration) -> DateTime<Utc> {
        self.preferred_datetime + Duration::minutes(duration.duration_minutes)
    }

    /// Check whether the booking tokens are still inside their validity window
    pub fn tokens_valid(&self, valid_hours: i64, now: DateTime<Utc>) -> bool {
        now <= self.token_generated_at + Duration::hours(valid_hours)
    }
}

/// Generate an opaque, collision-resistant token string (32 hex chars).
pub fn generate_token() -> String {
    Uuid::new_v4().simple().to_string()
}
