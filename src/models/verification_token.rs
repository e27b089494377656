//! Email verification token model
//!
//! A separate token family from booking tokens: minutes-scale expiry,
//! owned by a user, consumed at most once by the verification endpoint.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Single-use account verification token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailVerificationToken {
    pub id: i64,
    pub user_id: i64,
    pub token: String,
    pub created_at: DateTime<Utc>,
    pub used: bool,
}

impl EmailVerificationToken {
    /// Check whether the token has passed its validity window
    pub fn is_expired(&self, valid_minutes: i64, now: DateTime<Utc>) -> bool {
        now > self.created_at + Duration::minutes(valid_minutes)
    }
}
