//! Email verification token repository

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::EmailVerificationToken;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

/// Verification token repository trait
#[async_trait]
pub trait VerificationTokenRepository: Send + Sync {
    /// Create a new token, returning it with its assigned id
    async fn create(&self, token: &EmailVerificationToken) -> Result<EmailVerificationToken>;

    /// Get token by its opaque value
    async fn get_by_token(&self, token: &str) -> Result<Option<EmailVerificationToken>>;

    /// Get the most recent unused token for a user, if any
    async fn get_unused_for_user(&self, user_id: i64) -> Result<Option<EmailVerificationToken>>;

    /// Mark a token as consumed
    async fn mark_used(&self, id: i64) -> Result<()>;
}

/// SQLx-based verification token repository implementation
pub struct SqlxVerificationTokenRepository {
    pool: DynDatabasePool,
}

impl SqlxVerificationTokenRepository {
    /// Create a new SQLx verification token repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn VerificationTokenRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl VerificationTokenRepository for SqlxVerificationTokenRepository {
    async fn create(&self, token: &EmailVerificationToken) -> Result<EmailVerificationToken> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                create_token_sqlite(self.pool.as_sqlite().unwrap(), token).await
            }
            DatabaseDriver::Mysql => create_token_mysql(self.pool.as_mysql().unwrap(), token).await,
        }
    }

    async fn get_by_token(&self, token: &str) -> Result<Option<EmailVerificationToken>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                get_by_token_sqlite(self.pool.as_sqlite().unwrap(), token).await
            }
            DatabaseDriver::Mysql => get_by_token_mysql(self.pool.as_mysql().unwrap(), token).await,
        }
    }

    async fn get_unused_for_user(&self, user_id: i64) -> Result<Option<EmailVerificationToken>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                get_unused_sqlite(self.pool.as_sqlite().unwrap(), user_id).await
            }
            DatabaseDriver::Mysql => get_unused_mysql(self.pool.as_mysql().unwrap(), user_id).await,
        }
    }

    async fn mark_used(&self, id: i64) -> Result<()> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => mark_used_sqlite(self.pool.as_sqlite().unwrap(), id).await,
            DatabaseDriver::Mysql => mark_used_mysql(self.pool.as_mysql().unwrap(), id).await,
        }
    }
}

const TOKEN_COLUMNS: &str = "id, user_id, token, created_at, used";

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_token_sqlite(
    pool: &SqlitePool,
    token: &EmailVerificationToken,
) -> Result<EmailVerificationToken> {
    let result = sqlx::query(
        "INSERT INTO email_verification_tokens (user_id, token, created_at, used) VALUES (?, ?, ?, ?)",
    )
    .bind(token.user_id)
    .bind(&token.token)
    .bind(token.created_at)
    .bind(token.used)
    .execute(pool)
    .await
    .context("Failed to create verification token")?;

    let mut created = token.clone();
    created.id = result.last_insert_rowid();
    Ok(created)
}

async fn get_by_token_sqlite(
    pool: &SqlitePool,
    token: &str,
) -> Result<Option<EmailVerificationToken>> {
    let query = format!(
        "SELECT {} FROM email_verification_tokens WHERE token = ?",
        TOKEN_COLUMNS
    );
    let row = sqlx::query(&query)
        .bind(token)
        .fetch_optional(pool)
        .await
        .context("Failed to get verification token")?;

    Ok(row.map(|row| row_to_token_sqlite(&row)))
}

async fn get_unused_sqlite(
    pool: &SqlitePool,
    user_id: i64,
) -> Result<Option<EmailVerificationToken>> {
    let query = format!(
        "SELECT {} FROM email_verification_tokens WHERE user_id = ? AND used = 0 ORDER BY created_at DESC LIMIT 1",
        TOKEN_COLUMNS
    );
    let row = sqlx::query(&query)
        .bind(user_id)
        .fetch_optional(pool)
        .await
        .context("Failed to get unused verification token")?;

    Ok(row.map(|row| row_to_token_sqlite(&row)))
}

async fn mark_used_sqlite(pool: &SqlitePool, id: i64) -> Result<()> {
    sqlx::query("UPDATE email_verification_tokens SET used = 1 WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to mark verification token used")?;

    Ok(())
}

fn row_to_token_sqlite(row: &sqlx::sqlite::SqliteRow) -> EmailVerificationToken {
    EmailVerificationToken {
        id: row.get("id"),
        user_id: row.get("user_id"),
        token: row.get("token"),
        created_at: row.get("created_at"),
        used: row.get("used"),
    }
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_token_mysql(
    pool: &MySqlPool,
    token: &EmailVerificationToken,
) -> Result<EmailVerificationToken> {
    let result = sqlx::query(
        "INSERT INTO email_verification_tokens (user_id, token, created_at, used) VALUES (?, ?, ?, ?)",
    )
    .bind(token.user_id)
    .bind(&token.token)
    .bind(token.created_at)
    .bind(token.used)
    .execute(pool)
    .await
    .context("Failed to create verification token")?;

    let mut created = token.clone();
    created.id = result.last_insert_id() as i64;
    Ok(created)
}

async fn get_by_token_mysql(
    pool: &MySqlPool,
    token: &str,
) -> Result<Option<EmailVerificationToken>> {
    let query = format!(
        "SELECT {} FROM email_verification_tokens WHERE token = ?",
        TOKEN_COLUMNS
    );
    let row = sqlx::query(&query)
        .bind(token)
        .fetch_optional(pool)
        .await
        .context("Failed to get verification token")?;

    Ok(row.map(|row| row_to_token_mysql(&row)))
}

async fn get_unused_mysql(
    pool: &MySqlPool,
    user_id: i64,
) -> Result<Option<EmailVerificationToken>> {
    let query = format!(
        "SELECT {} FROM email_verification_tokens WHERE user_id = ? AND used = FALSE ORDER BY created_at DESC LIMIT 1",
        TOKEN_COLUMNS
    );
    let row = sqlx::query(&query)
        .bind(user_id)
        .fetch_optional(pool)
        .await
        .context("Failed to get unused verification token")?;

    Ok(row.map(|row| row_to_token_mysql(&row)))
}

async fn mark_used_mysql(pool: &MySqlPool, id: i64) -> Result<()> {
    sqlx::query("UPDATE email_verification_tokens SET used = TRUE WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to mark verification token used")?;

    Ok(())
}

fn row_to_token_mysql(row: &sqlx::mysql::MySqlRow) -> EmailVerificationToken {
    let created_at: DateTime<Utc> = row.get("created_at");
    EmailVerificationToken {
        id: row.get("id"),
        user_id: row.get("user_id"),
        token: row.get("token"),
        created_at,
        used: row.get("used"),
    }
}
