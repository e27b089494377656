//! Session lookup entities
//!
//! Small named lookup tables referenced by bookings. Seeded with defaults by
//! the migrations; editable through the database directly.

use serde::{Deserialize, Serialize};

/// Kind of mentorship session (e.g. "Leadership Coaching")
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionType {
    pub id: i64,
    pub name: String,
}

/// Session length option
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionDuration {
    pub id: i64,
    pub label: String,
    pub duration_minutes: i64,
}

/// How the session is conducted (e.g. "Video call")
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionFormat {
    pub id: i64,
    pub name: String,
}
