//! User repository
//!
//! Database operations for user accounts.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::User;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

/// User repository trait
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Create a new user, returning it with its assigned id
    async fn create(&self, user: &User) -> Result<User>;

    /// Get user by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<User>>;

    /// Get user by username
    async fn get_by_username(&self, username: &str) -> Result<Option<User>>;

    /// Get user by email
    async fn get_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Mark a user account as active (email verified)
    async fn activate(&self, user_id: i64) -> Result<()>;
}

/// SQLx-based user repository implementation
pub struct SqlxUserRepository {
    pool: DynDatabasePool,
}

impl SqlxUserRepository {
    /// Create a new SQLx user repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn UserRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl UserRepository for SqlxUserRepository {
    async fn create(&self, user: &User) -> Result<User> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_user_sqlite(self.pool.as_sqlite().unwrap(), user).await,
            DatabaseDriver::Mysql => create_user_mysql(self.pool.as_mysql().unwrap(), user).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<User>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                get_user_sqlite(self.pool.as_sqlite().unwrap(), "id", &id.to_string()).await
            }
            DatabaseDriver::Mysql => {
                get_user_mysql(self.pool.as_mysql().unwrap(), "id", &id.to_string()).await
            }
        }
    }

    async fn get_by_username(&self, username: &str) -> Result<Option<User>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                get_user_sqlite(self.pool.as_sqlite().unwrap(), "username", username).await
            }
            DatabaseDriver::Mysql => {
                get_user_mysql(self.pool.as_mysql().unwrap(), "username", username).await
            }
        }
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<User>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                get_user_sqlite(self.pool.as_sqlite().unwrap(), "email", email).await
            }
            DatabaseDriver::Mysql => {
                get_user_mysql(self.pool.as_mysql().unwrap(), "email", email).await
            }
        }
    }

    async fn activate(&self, user_id: i64) -> Result<()> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                activate_user_sqlite(self.pool.as_sqlite().unwrap(), user_id).await
            }
            DatabaseDriver::Mysql => {
                activate_user_mysql(self.pool.as_mysql().unwrap(), user_id).await
            }
        }
    }
}

const USER_COLUMNS: &str =
    "id, username, email, first_name, last_name, password_hash, is_active, created_at";

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_user_sqlite(pool: &SqlitePool, user: &User) -> Result<User> {
    let result = sqlx::query(
        r#"
        INSERT INTO users (username, email, first_name, last_name, password_hash, is_active, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&user.username)
    .bind(&user.email)
    .bind(&user.first_name)
    .bind(&user.last_name)
    .bind(&user.password_hash)
    .bind(user.is_active)
    .bind(user.created_at)
    .execute(pool)
    .await
    .context("Failed to create user")?;

    let mut created = user.clone();
    created.id = result.last_insert_rowid();
    Ok(created)
}

async fn get_user_sqlite(pool: &SqlitePool, column: &str, value: &str) -> Result<Option<User>> {
    let query = format!("SELECT {} FROM users WHERE {} = ?", USER_COLUMNS, column);
    let row = sqlx::query(&query)
        .bind(value)
        .fetch_optional(pool)
        .await
        .with_context(|| format!("Failed to get user by {}", column))?;

    match row {
        Some(row) => Ok(Some(row_to_user_sqlite(&row)?)),
        None => Ok(None),
    }
}

async fn activate_user_sqlite(pool: &SqlitePool, user_id: i64) -> Result<()> {
    sqlx::query("UPDATE users SET is_active = 1 WHERE id = ?")
        .bind(user_id)
        .execute(pool)
        .await
        .context("Failed to activate user")?;

    Ok(())
}

fn row_to_user_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<User> {
    Ok(User {
        id: row.get("id"),
        username: row.get("username"),
        email: row.get("email"),
        first_name: row.get("first_name"),
        last_name: row.get("last_name"),
        password_hash: row.get("password_hash"),
        is_active: row.get("is_active"),
        created_at: row.get("created_at"),
    })
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_user_mysql(pool: &MySqlPool, user: &User) -> Result<User> {
    let result = sqlx::query(
        r#"
        INSERT INTO users (username, email, first_name, last_name, password_hash, is_active, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&user.username)
    .bind(&user.email)
    .bind(&user.first_name)
    .bind(&user.last_name)
    .bind(&user.password_hash)
    .bind(user.is_active)
    .bind(user.created_at)
    .execute(pool)
    .await
    .context("Failed to create user")?;

    let mut created = user.clone();
    created.id = result.last_insert_id() as i64;
    Ok(created)
}

async fn get_user_mysql(pool: &MySqlPool, column: &str, value: &str) -> Result<Option<User>> {
    let query = format!("SELECT {} FROM users WHERE {} = ?", USER_COLUMNS, column);
    let row = sqlx::query(&query)
        .bind(value)
        .fetch_optional(pool)
        .await
        .with_context(|| format!("Failed to get user by {}", column))?;

    match row {
        Some(row) => Ok(Some(row_to_user_mysql(&row)?)),
        None => Ok(None),
    }
}

async fn activate_user_mysql(pool: &MySqlPool, user_id: i64) -> Result<()> {
    sqlx::query("UPDATE users SET is_active = TRUE WHERE id = ?")
        .bind(user_id)
        .execute(pool)
        .await
        .context("Failed to activate user")?;

    Ok(())
}

fn row_to_user_mysql(row: &sqlx::mysql::MySqlRow) -> Result<User> {
    let created_at: DateTime<Utc> = row.get("created_at");
    Ok(User {
        id: row.get("id"),
        username: row.get("username"),
        email: row.get("email"),
        first_name: row.get("first_name"),
        last_name: row.get("last_name"),
        password_hash: row.get("password_hash"),
        is_active: row.get("is_active"),
        created_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};

    async fn setup_test_repo() -> SqlxUserRepository {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        SqlxUserRepository::new(pool)
    }

    fn test_user(username: &str, email: &str) -> User {
        User::new(username, email, "Test", "User", "$argon2id$fakehash")
    }

    #[tokio::test]
    async fn test_create_and_get_user() {
        let repo = setup_test_repo().await;

        let created = repo
            .create(&test_user("ada", "ada@example.com"))
            .await
            .expect("Failed to create user");
        assert!(created.id > 0);
        assert!(!created.is_active);

        let found = repo
            .get_by_id(created.id)
            .await
            .expect("Failed to get user")
            .expect("User not found");
        assert_eq!(found.username, "ada");
        assert_eq!(found.email, "ada@example.com");
    }

    #[tokio::test]
    async fn test_get_by_username_and_email() {
        let repo = setup_test_repo().await;
        repo.create(&test_user("grace", "grace@example.com"))
            .await
            .expect("Failed to create user");

        assert!(repo
            .get_by_username("grace")
            .await
            .expect("query failed")
            .is_some());
        assert!(repo
            .get_by_email("grace@example.com")
            .await
            .expect("query failed")
            .is_some());
        assert!(repo
            .get_by_username("nobody")
            .await
            .expect("query failed")
            .is_none());
    }

    #[tokio::test]
    async fn test_activate_user() {
        let repo = setup_test_repo().await;
        let created = repo
            .create(&test_user("alan", "alan@example.com"))
            .await
            .expect("Failed to create user");

        repo.activate(created.id).await.expect("Failed to activate");

        let found = repo
            .get_by_id(created.id)
            .await
            .expect("Failed to get user")
            .expect("User not found");
        assert!(found.is_active);
    }

    #[tokio::test]
    async fn test_duplicate_username_rejected() {
        let repo = setup_test_repo().await;
        repo.create(&test_user("dup", "first@example.com"))
            .await
            .expect("Failed to create user");

        let result = repo.create(&test_user("dup", "second@example.com")).await;
        assert!(result.is_err());
    }
}
