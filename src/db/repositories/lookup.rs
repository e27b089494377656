//! Session lookup repository
//!
//! Read-only access to the session type/duration/format lookup tables. The
//! rows are seeded by migrations; the booking form lists them and bookings
//! reference them by id.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{SessionDuration, SessionFormat, SessionType};
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

/// Lookup repository trait
#[async_trait]
pub trait LookupRepository: Send + Sync {
    /// List all session types
    async fn list_types(&self) -> Result<Vec<SessionType>>;

    /// List all session durations
    async fn list_durations(&self) -> Result<Vec<SessionDuration>>;

    /// List all session formats
    async fn list_formats(&self) -> Result<Vec<SessionFormat>>;

    /// Get a session type by id
    async fn get_type(&self, id: i64) -> Result<Option<SessionType>>;

    /// Get a session duration by id
    async fn get_duration(&self, id: i64) -> Result<Option<SessionDuration>>;

    /// Get a session format by id
    async fn get_format(&self, id: i64) -> Result<Option<SessionFormat>>;
}

/// SQLx-based lookup repository implementation
pub struct SqlxLookupRepository {
    pool: DynDatabasePool,
}

impl SqlxLookupRepository {
    /// Create a new SQLx lookup repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn LookupRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl LookupRepository for SqlxLookupRepository {
    async fn list_types(&self) -> Result<Vec<SessionType>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => list_types_sqlite(self.pool.as_sqlite().unwrap()).await,
            DatabaseDriver::Mysql => list_types_mysql(self.pool.as_mysql().unwrap()).await,
        }
    }

    async fn list_durations(&self) -> Result<Vec<SessionDuration>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => list_durations_sqlite(self.pool.as_sqlite().unwrap()).await,
            DatabaseDriver::Mysql => list_durations_mysql(self.pool.as_mysql().unwrap()).await,
        }
    }

    async fn list_formats(&self) -> Result<Vec<SessionFormat>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => list_formats_sqlite(self.pool.as_sqlite().unwrap()).await,
            DatabaseDriver::Mysql => list_formats_mysql(self.pool.as_mysql().unwrap()).await,
        }
    }

    async fn get_type(&self, id: i64) -> Result<Option<SessionType>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_type_sqlite(self.pool.as_sqlite().unwrap(), id).await,
            DatabaseDriver::Mysql => get_type_mysql(self.pool.as_mysql().unwrap(), id).await,
        }
    }

    async fn get_duration(&self, id: i64) -> Result<Option<SessionDuration>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_duration_sqlite(self.pool.as_sqlite().unwrap(), id).await,
            DatabaseDriver::Mysql => get_duration_mysql(self.pool.as_mysql().unwrap(), id).await,
        }
    }

    async fn get_format(&self, id: i64) -> Result<Option<SessionFormat>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_format_sqlite(self.pool.as_sqlite().unwrap(), id).await,
            DatabaseDriver::Mysql => get_format_mysql(self.pool.as_mysql().unwrap(), id).await,
        }
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn list_types_sqlite(pool: &SqlitePool) -> Result<Vec<SessionType>> {
    let rows = sqlx::query("SELECT id, name FROM session_types ORDER BY id")
        .fetch_all(pool)
        .await
        .context("Failed to list session types")?;

    Ok(rows
        .iter()
        .map(|row| SessionType {
            id: row.get("id"),
            name: row.get("name"),
        })
        .collect())
}

async fn list_durations_sqlite(pool: &SqlitePool) -> Result<Vec<SessionDuration>> {
    let rows = sqlx::query("SELECT id, label, duration_minutes FROM session_durations ORDER BY id")
        .fetch_all(pool)
        .await
        .context("Failed to list session durations")?;

    Ok(rows
        .iter()
        .map(|row| SessionDuration {
            id: row.get("id"),
            label: row.get("label"),
            duration_minutes: row.get("duration_minutes"),
        })
        .collect())
}

async fn list_formats_sqlite(pool: &SqlitePool) -> Result<Vec<SessionFormat>> {
    let rows = sqlx::query("SELECT id, name FROM session_formats ORDER BY id")
        .fetch_all(pool)
        .await
        .context("Failed to list session formats")?;

    Ok(rows
        .iter()
        .map(|row| SessionFormat {
            id: row.get("id"),
            name: row.get("name"),
        })
        .collect())
}

async fn get_type_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<SessionType>> {
    let row = sqlx::query("SELECT id, name FROM session_types WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get session type")?;

    Ok(row.map(|row| SessionType {
        id: row.get("id"),
        name: row.get("name"),
    }))
}

async fn get_duration_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<SessionDuration>> {
    let row = sqlx::query("SELECT id, label, duration_minutes FROM session_durations WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get session duration")?;

    Ok(row.map(|row| SessionDuration {
        id: row.get("id"),
        label: row.get("label"),
        duration_minutes: row.get("duration_minutes"),
    }))
}

async fn get_format_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<SessionFormat>> {
    let row = sqlx::query("SELECT id, name FROM session_formats WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get session format")?;

    Ok(row.map(|row| SessionFormat {
        id: row.get("id"),
        name: row.get("name"),
    }))
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn list_types_mysql(pool: &MySqlPool) -> Result<Vec<SessionType>> {
    let rows = sqlx::query("SELECT id, name FROM session_types ORDER BY id")
        .fetch_all(pool)
        .await
        .context("Failed to list session types")?;

    Ok(rows
        .iter()
        .map(|row| SessionType {
            id: row.get("id"),
            name: row.get("name"),
        })
        .collect())
}

async fn list_durations_mysql(pool: &MySqlPool) -> Result<Vec<SessionDuration>> {
    let rows = sqlx::query("SELECT id, label, duration_minutes FROM session_durations ORDER BY id")
        .fetch_all(pool)
        .await
        .context("Failed to list session durations")?;

    Ok(rows
        .iter()
        .map(|row| SessionDuration {
            id: row.get("id"),
            label: row.get("label"),
            duration_minutes: {
                let minutes: i32 = row.get("duration_minutes");
                minutes as i64
            },
        })
        .collect())
}

async fn list_formats_mysql(pool: &MySqlPool) -> Result<Vec<SessionFormat>> {
    let rows = sqlx::query("SELECT id, name FROM session_formats ORDER BY id")
        .fetch_all(pool)
        .await
        .context("Failed to list session formats")?;

    Ok(rows
        .iter()
        .map(|row| SessionFormat {
            id: row.get("id"),
            name: row.get("name"),
        })
        .collect())
}

async fn get_type_mysql(pool: &MySqlPool, id: i64) -> Result<Option<SessionType>> {
    let row = sqlx::query("SELECT id, name FROM session_types WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get session type")?;

    Ok(row.map(|row| SessionType {
        id: row.get("id"),
        name: row.get("name"),
    }))
}

async fn get_duration_mysql(pool: &MySqlPool, id: i64) -> Result<Option<SessionDuration>> {
    let row = sqlx::query("SELECT id, label, duration_minutes FROM session_durations WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get session duration")?;

    Ok(row.map(|row| {
        let minutes: i32 = row.get("duration_minutes");
        SessionDuration {
            id: row.get("id"),
            label: row.get("label"),
            duration_minutes: minutes as i64,
        }
    }))
}

async fn get_format_mysql(pool: &MySqlPool, id: i64) -> Result<Option<SessionFormat>> {
    let row = sqlx::query("SELECT id, name FROM session_formats WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get session format")?;

    Ok(row.map(|row| SessionFormat {
        id: row.get("id"),
        name: row.get("name"),
    }))
}
