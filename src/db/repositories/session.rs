//! Login session repository
//!
//! Database operations for cookie-backed login sessions.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::Session;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

/// Session repository trait
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Create a new session
    async fn create(&self, session: &Session) -> Result<()>;

    /// Get session by ID
    async fn get_by_id(&self, id: &str) -> Result<Option<Session>>;

    /// Delete a session by ID
    async fn delete(&self, id: &str) -> Result<()>;

    /// Delete all expired sessions, returning the number removed
    async fn delete_expired(&self) -> Result<u64>;
}

/// SQLx-based session repository implementation
pub struct SqlxSessionRepository {
    pool: DynDatabasePool,
}

impl SqlxSessionRepository {
    /// Create a new SQLx session repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn SessionRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl SessionRepository for SqlxSessionRepository {
    async fn create(&self, session: &Session) -> Result<()> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                create_session_sqlite(self.pool.as_sqlite().unwrap(), session).await
            }
            DatabaseDriver::Mysql => {
                create_session_mysql(self.pool.as_mysql().unwrap(), session).await
            }
        }
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<Session>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                get_session_sqlite(self.pool.as_sqlite().unwrap(), id).await
            }
            DatabaseDriver::Mysql => get_session_mysql(self.pool.as_mysql().unwrap(), id).await,
        }
    }

    async fn delete(&self, id: &str) -> Result<()> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                delete_session_sqlite(self.pool.as_sqlite().unwrap(), id).await
            }
            DatabaseDriver::Mysql => delete_session_mysql(self.pool.as_mysql().unwrap(), id).await,
        }
    }

    async fn delete_expired(&self) -> Result<u64> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                delete_expired_sqlite(self.pool.as_sqlite().unwrap()).await
            }
            DatabaseDriver::Mysql => delete_expired_mysql(self.pool.as_mysql().unwrap()).await,
        }
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_session_sqlite(pool: &SqlitePool, session: &Session) -> Result<()> {
    sqlx::query(
        "INSERT INTO sessions (id, user_id, expires_at, created_at) VALUES (?, ?, ?, ?)",
    )
    .bind(&session.id)
    .bind(session.user_id)
    .bind(session.expires_at)
    .bind(session.created_at)
    .execute(pool)
    .await
    .context("Failed to create session")?;

    Ok(())
}

async fn get_session_sqlite(pool: &SqlitePool, id: &str) -> Result<Option<Session>> {
    let row = sqlx::query("SELECT id, user_id, expires_at, created_at FROM sessions WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get session")?;

    match row {
        Some(row) => Ok(Some(Session {
            id: row.get("id"),
            user_id: row.get("user_id"),
            expires_at: row.get("expires_at"),
            created_at: row.get("created_at"),
        })),
        None => Ok(None),
    }
}

async fn delete_session_sqlite(pool: &SqlitePool, id: &str) -> Result<()> {
    sqlx::query("DELETE FROM sessions WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to delete session")?;

    Ok(())
}

async fn delete_expired_sqlite(pool: &SqlitePool) -> Result<u64> {
    let result = sqlx::query("DELETE FROM sessions WHERE expires_at < ?")
        .bind(Utc::now())
        .execute(pool)
        .await
        .context("Failed to delete expired sessions")?;

    Ok(result.rows_affected())
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_session_mysql(pool: &MySqlPool, session: &Session) -> Result<()> {
    sqlx::query(
        "INSERT INTO sessions (id, user_id, expires_at, created_at) VALUES (?, ?, ?, ?)",
    )
    .bind(&session.id)
    .bind(session.user_id)
    .bind(session.expires_at)
    .bind(session.created_at)
    .execute(pool)
    .await
    .context("Failed to create session")?;

    Ok(())
}

async fn get_session_mysql(pool: &MySqlPool, id: &str) -> Result<Option<Session>> {
    let row = sqlx::query("SELECT id, user_id, expires_at, created_at FROM sessions WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get session")?;

    match row {
        Some(row) => {
            let expires_at: DateTime<Utc> = row.get("expires_at");
            let created_at: DateTime<Utc> = row.get("created_at");
            Ok(Some(Session {
                id: row.get("id"),
                user_id: row.get("user_id"),
                expires_at,
                created_at,
            }))
        }
        None => Ok(None),
    }
}

async fn delete_session_mysql(pool: &MySqlPool, id: &str) -> Result<()> {
    sqlx::query("DELETE FROM sessions WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to delete session")?;

    Ok(())
}

async fn delete_expired_mysql(pool: &MySqlPool) -> Result<u64> {
    let result = sqlx::query("DELETE FROM sessions WHERE expires_at < ?")
        .bind(Utc::now())
        .execute(pool)
        .await
        .context("Failed to delete expired sessions")?;

    Ok(result.rows_affected())
}
