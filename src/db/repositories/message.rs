//! Contact message repository

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::ContactMessage;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

/// Contact message repository trait
#[async_trait]
pub trait MessageRepository: Send + Sync {
    /// Store a submitted message, returning it with its assigned id
    async fn create(&self, message: &ContactMessage) -> Result<ContactMessage>;

    /// Check whether the same sender already submitted the same text since
    /// the given instant
    async fn duplicate_exists(
        &self,
        email: &str,
        message: &str,
        since: DateTime<Utc>,
    ) -> Result<bool>;
}

/// SQLx-based contact message repository implementation
pub struct SqlxMessageRepository {
    pool: DynDatabasePool,
}

impl SqlxMessageRepository {
    /// Create a new SQLx message repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn MessageRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl MessageRepository for SqlxMessageRepository {
    async fn create(&self, message: &ContactMessage) -> Result<ContactMessage> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                create_message_sqlite(self.pool.as_sqlite().unwrap(), message).await
            }
            DatabaseDriver::Mysql => {
                create_message_mysql(self.pool.as_mysql().unwrap(), message).await
            }
        }
    }

    async fn duplicate_exists(
        &self,
        email: &str,
        message: &str,
        since: DateTime<Utc>,
    ) -> Result<bool> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                duplicate_exists_sqlite(self.pool.as_sqlite().unwrap(), email, message, since).await
            }
            DatabaseDriver::Mysql => {
                duplicate_exists_mysql(self.pool.as_mysql().unwrap(), email, message, since).await
            }
        }
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_message_sqlite(
    pool: &SqlitePool,
    message: &ContactMessage,
) -> Result<ContactMessage> {
    let result = sqlx::query(
        "INSERT INTO contact_messages (full_name, email, message, created_at) VALUES (?, ?, ?, ?)",
    )
    .bind(&message.full_name)
    .bind(&message.email)
    .bind(&message.message)
    .bind(message.created_at)
    .execute(pool)
    .await
    .context("Failed to store contact message")?;

    let mut created = message.clone();
    created.id = result.last_insert_rowid();
    Ok(created)
}

async fn duplicate_exists_sqlite(
    pool: &SqlitePool,
    email: &str,
    message: &str,
    since: DateTime<Utc>,
) -> Result<bool> {
    let row = sqlx::query(
        "SELECT count(*) AS n FROM contact_messages WHERE email = ? AND message = ? AND created_at >= ?",
    )
    .bind(email)
    .bind(message)
    .bind(since)
    .fetch_one(pool)
    .await
    .context("Failed to check for duplicate message")?;

    let n: i64 = row.get("n");
    Ok(n > 0)
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_message_mysql(
    pool: &MySqlPool,
    message: &ContactMessage,
) -> Result<ContactMessage> {
    let result = sqlx::query(
        "INSERT INTO contact_messages (full_name, email, message, created_at) VALUES (?, ?, ?, ?)",
    )
    .bind(&message.full_name)
    .bind(&message.email)
    .bind(&message.message)
    .bind(message.created_at)
    .execute(pool)
    .await
    .context("Failed to store contact message")?;

    let mut created = message.clone();
    created.id = result.last_insert_id() as i64;
    Ok(created)
}

async fn duplicate_exists_mysql(
    pool: &MySqlPool,
    email: &str,
    message: &str,
    since: DateTime<Utc>,
) -> Result<bool> {
    let row = sqlx::query(
        "SELECT count(*) AS n FROM contact_messages WHERE email = ? AND message = ? AND created_at >= ?",
    )
    .bind(email)
    .bind(message)
    .bind(since)
    .fetch_one(pool)
    .await
    .context("Failed to check for duplicate message")?;

    let n: i64 = row.get("n");
    Ok(n > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};
    use chrono::Duration;

    async fn setup() -> SqlxMessageRepository {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        SqlxMessageRepository::new(pool)
    }

    fn message(email: &str, text: &str) -> ContactMessage {
        ContactMessage {
            id: 0,
            full_name: "Grace Hopper".to_string(),
            email: email.to_string(),
            message: text.to_string(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_create_message() {
        let repo = setup().await;

        let created = repo
            .create(&message("grace@example.com", "Hello"))
            .await
            .expect("Failed to create message");
        assert!(created.id > 0);
    }

    #[tokio::test]
    async fn test_duplicate_detection_window() {
        let repo = setup().await;
        let now = Utc::now();

        repo.create(&message("grace@example.com", "Hello"))
            .await
            .expect("Failed to create message");

        // Same sender, same text, inside the window
        assert!(repo
            .duplicate_exists("grace@example.com", "Hello", now - Duration::minutes(5))
            .await
            .expect("query failed"));

        // Different text is not a duplicate
        assert!(!repo
            .duplicate_exists("grace@example.com", "Different", now - Duration::minutes(5))
            .await
            .expect("query failed"));

        // Different sender is not a duplicate
        assert!(!repo
            .duplicate_exists("other@example.com", "Hello", now - Duration::minutes(5))
            .await
            .expect("query failed"));

        // A window starting in the future excludes the stored row
        assert!(!repo
            .duplicate_exists("grace@example.com", "Hello", now + Duration::minutes(1))
            .await
            .expect("query failed"));
    }
}
