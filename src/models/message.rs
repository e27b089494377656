//! Contact message model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A message submitted through the public contact form
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContactMessage {
    pub id: i64,
    pub full_name: String,
    pub email: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
}
