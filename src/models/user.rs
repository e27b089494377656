//! User model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A registered account.
///
/// Accounts start inactive and are activated by consuming an email
/// verification token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    /// Argon2id PHC string
    pub password_hash: String,
    /// False until the email address has been verified
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Create a new (not yet persisted) inactive user
    pub fn new(
        username: impl Into<String>,
        email: impl Into<String>,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        password_hash: impl Into<String>,
    ) -> Self {
        Self {
            id: 0,
            username: username.into(),
            email: email.into(),
            first_name: first_name.into(),
            last_name: last_name.into(),
            password_hash: password_hash.into(),
            is_active: false,
            created_at: Utc::now(),
        }
    }
}
