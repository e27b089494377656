//! Database migrations module
//!
//! Code-based database migrations for the Mentora booking system. All
//! migrations are embedded directly in Rust code as SQL strings, supporting
//! both SQLite and MySQL databases for single-binary deployment.
//!
//! # Usage
//!
//! ```ignore
//! use mentora::db::{create_pool, migrations};
//!
//! let pool = create_pool(&config).await?;
//! migrations::run_migrations(&pool).await?;
//! ```

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{MySqlPool, Row, SqlitePool};

use super::DynDatabasePool;
use crate::config::DatabaseDriver;

/// A database migration with SQL for both SQLite and MySQL
#[derive(Debug, Clone)]
pub struct Migration {
    /// Migration version number (must be unique and sequential)
    pub version: i32,
    /// Human-readable migration name
    pub name: &'static str,
    /// SQL statements for SQLite
    pub up_sqlite: &'static str,
    /// SQL statements for MySQL
    pub up_mysql: &'static str,
}

/// Migration record stored in the database
#[derive(Debug, Clone)]
pub struct MigrationRecord {
    pub version: i64,
    pub name: String,
    pub applied_at: DateTime<Utc>,
}

/// All migrations for the Mentora booking system.
pub const MIGRATIONS: &[Migration] = &[
    // Migration 1: Create users table
    Migration {
        version: 1,
        name: "create_users",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                username VARCHAR(150) NOT NULL UNIQUE,
                email VARCHAR(255) NOT NULL UNIQUE,
                first_name VARCHAR(30) NOT NULL DEFAULT '',
                last_name VARCHAR(30) NOT NULL DEFAULT '',
                password_hash VARCHAR(255) NOT NULL,
                is_active BOOLEAN NOT NULL DEFAULT 0,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
            CREATE INDEX IF NOT EXISTS idx_users_username ON users(username);
            CREATE INDEX IF NOT EXISTS idx_users_email ON users(email);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS users (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                username VARCHAR(150) NOT NULL UNIQUE,
                email VARCHAR(255) NOT NULL UNIQUE,
                first_name VARCHAR(30) NOT NULL DEFAULT '',
                last_name VARCHAR(30) NOT NULL DEFAULT '',
                password_hash VARCHAR(255) NOT NULL,
                is_active BOOLEAN NOT NULL DEFAULT FALSE,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                INDEX idx_users_username (username),
                INDEX idx_users_email (email)
            ) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4;
        "#,
    },
    // Migration 2: Create login sessions table
    Migration {
        version: 2,
        name: "create_sessions",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS sessions (
                id VARCHAR(64) PRIMARY KEY,
                user_id INTEGER NOT NULL,
                expires_at TIMESTAMP NOT NULL,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_sessions_user_id ON sessions(user_id);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS sessions (
                id VARCHAR(64) PRIMARY KEY,
                user_id BIGINT NOT NULL,
                expires_at TIMESTAMP NOT NULL,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                INDEX idx_sessions_user_id (user_id),
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            ) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4;
        "#,
    },
    // Migration 3: Create email verification tokens table
    Migration {
        version: 3,
        name: "create_email_verification_tokens",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS email_verification_tokens (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                token VARCHAR(64) NOT NULL UNIQUE,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                used BOOLEAN NOT NULL DEFAULT 0,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_verification_tokens_user_id
                ON email_verification_tokens(user_id);
            CREATE INDEX IF NOT EXISTS idx_verification_tokens_token
                ON email_verification_tokens(token);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS email_verification_tokens (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                user_id BIGINT NOT NULL,
                token VARCHAR(64) NOT NULL UNIQUE,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                used BOOLEAN NOT NULL DEFAULT FALSE,
                INDEX idx_verification_tokens_user_id (user_id),
                INDEX idx_verification_tokens_token (token),
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            ) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4;
        "#,
    },
    // Migration 4: Create session lookup tables with default rows
    Migration {
        version: 4,
        name: "create_session_lookups",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS session_types (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name VARCHAR(100) NOT NULL UNIQUE
            );
            CREATE TABLE IF NOT EXISTS session_durations (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                label VARCHAR(50) NOT NULL UNIQUE,
                duration_minutes INTEGER NOT NULL DEFAULT 30
            );
            CREATE TABLE IF NOT EXISTS session_formats (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name VARCHAR(50) NOT NULL UNIQUE
            );
            INSERT OR IGNORE INTO session_types (name) VALUES
                ('Leadership Coaching'), ('Career Guidance'), ('Technical Mentorship');
            INSERT OR IGNORE INTO session_durations (label, duration_minutes) VALUES
                ('30 minutes', 30), ('45 minutes', 45), ('1 hour', 60);
            INSERT OR IGNORE INTO session_formats (name) VALUES
                ('Video call'), ('Phone call'), ('In person');
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS session_types (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                name VARCHAR(100) NOT NULL UNIQUE
            ) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4;
            CREATE TABLE IF NOT EXISTS session_durations (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                label VARCHAR(50) NOT NULL UNIQUE,
                duration_minutes INT NOT NULL DEFAULT 30
            ) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4;
            CREATE TABLE IF NOT EXISTS session_formats (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                name VARCHAR(50) NOT NULL UNIQUE
            ) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4;
            INSERT IGNORE INTO session_types (name) VALUES
                ('Leadership Coaching'), ('Career Guidance'), ('Technical Mentorship');
            INSERT IGNORE INTO session_durations (label, duration_minutes) VALUES
                ('30 minutes', 30), ('45 minutes', 45), ('1 hour', 60);
            INSERT IGNORE INTO session_formats (name) VALUES
                ('Video call'), ('Phone call'), ('In person');
        "#,
    },
    // Migration 5: Create bookings table
    Migration {
        version: 5,
        name: "create_bookings",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS bookings (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                full_name VARCHAR(100) NOT NULL,
                email VARCHAR(254) NOT NULL,
                phone_number VARCHAR(20),
                company VARCHAR(100),
                preferred_datetime TIMESTAMP NOT NULL,
                timezone VARCHAR(50) NOT NULL,
                session_type_id INTEGER NOT NULL,
                session_duration_id INTEGER NOT NULL,
                session_format_id INTEGER NOT NULL,
                goals TEXT,
                referral_source VARCHAR(100),
                linkedin_or_website VARCHAR(255),
                mentor_confirmed BOOLEAN NOT NULL DEFAULT 0,
                session_completed BOOLEAN NOT NULL DEFAULT 0,
                session_held BOOLEAN,
                mentor_confirmation_token VARCHAR(64) NOT NULL,
                session_completion_token VARCHAR(64) NOT NULL,
                token_generated_at TIMESTAMP NOT NULL,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                confirmed_at TIMESTAMP,
                completed_at TIMESTAMP,
                last_reminder_sent_at TIMESTAMP,
                FOREIGN KEY (session_type_id) REFERENCES session_types(id),
                FOREIGN KEY (session_duration_id) REFERENCES session_durations(id),
                FOREIGN KEY (session_format_id) REFERENCES session_formats(id)
            );
            CREATE INDEX IF NOT EXISTS idx_bookings_mentor_token
                ON bookings(mentor_confirmation_token);
            CREATE INDEX IF NOT EXISTS idx_bookings_completion_token
                ON bookings(session_completion_token);
            CREATE INDEX IF NOT EXISTS idx_bookings_preferred_datetime
                ON bookings(preferred_datetime);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS bookings (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                full_name VARCHAR(100) NOT NULL,
                email VARCHAR(254) NOT NULL,
                phone_number VARCHAR(20),
                company VARCHAR(100),
                preferred_datetime TIMESTAMP NOT NULL,
                timezone VARCHAR(50) NOT NULL,
                session_type_id BIGINT NOT NULL,
                session_duration_id BIGINT NOT NULL,
                session_format_id BIGINT NOT NULL,
                goals TEXT,
                referral_source VARCHAR(100),
                linkedin_or_website VARCHAR(255),
                mentor_confirmed BOOLEAN NOT NULL DEFAULT FALSE,
                session_completed BOOLEAN NOT NULL DEFAULT FALSE,
                session_held BOOLEAN,
                mentor_confirmation_token VARCHAR(64) NOT NULL,
                session_completion_token VARCHAR(64) NOT NULL,
                token_generated_at TIMESTAMP NOT NULL,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                confirmed_at TIMESTAMP NULL,
                completed_at TIMESTAMP NULL,
                last_reminder_sent_at TIMESTAMP NULL,
                INDEX idx_bookings_mentor_token (mentor_confirmation_token),
                INDEX idx_bookings_completion_token (session_completion_token),
                INDEX idx_bookings_preferred_datetime (preferred_datetime),
                FOREIGN KEY (session_type_id) REFERENCES session_types(id),
                FOREIGN KEY (session_duration_id) REFERENCES session_durations(id),
                FOREIGN KEY (session_format_id) REFERENCES session_formats(id)
            ) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4;
        "#,
    },
    // Migration 6: Create contact messages table
    Migration {
        version: 6,
        name: "create_contact_messages",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS contact_messages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                full_name VARCHAR(100) NOT NULL,
                email VARCHAR(254) NOT NULL,
                message TEXT NOT NULL,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
            CREATE INDEX IF NOT EXISTS idx_contact_messages_email
                ON contact_messages(email);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS contact_messages (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                full_name VARCHAR(100) NOT NULL,
                email VARCHAR(254) NOT NULL,
                message TEXT NOT NULL,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                INDEX idx_contact_messages_email (email)
            ) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4;
        "#,
    },
];

/// Run all pending migrations.
///
/// Returns the number of migrations applied.
pub async fn run_migrations(pool: &DynDatabasePool) -> Result<usize> {
    create_migrations_table(pool).await?;

    let applied = get_applied_migrations(pool).await?;
    let applied_versions: Vec<i32> = applied.iter().map(|m| m.version as i32).collect();

    let mut count = 0;

    for migration in MIGRATIONS {
        if !applied_versions.contains(&migration.version) {
            tracing::info!(
                "Applying migration {}: {}",
                migration.version,
                migration.name
            );
            apply_migration(pool, migration)
                .await
                .with_context(|| format!("Failed to apply migration: {}", migration.name))?;
            count += 1;
        }
    }

    if count > 0 {
        tracing::info!("Applied {} migration(s)", count);
    } else {
        tracing::debug!("No pending migrations");
    }

    Ok(count)
}

/// Create the migrations tracking table if it doesn't exist
async fn create_migrations_table(pool: &DynDatabasePool) -> Result<()> {
    let sql = match pool.driver() {
        DatabaseDriver::Sqlite => {
            r#"
            CREATE TABLE IF NOT EXISTS _migrations (
                version INTEGER PRIMARY KEY,
                name VARCHAR(255) NOT NULL UNIQUE,
                applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            "#
        }
        DatabaseDriver::Mysql => {
            r#"
            CREATE TABLE IF NOT EXISTS _migrations (
                version INT PRIMARY KEY,
                name VARCHAR(255) NOT NULL UNIQUE,
                applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            "#
        }
    };

    pool.execute(sql).await?;
    Ok(())
}

/// Get list of already applied migrations
async fn get_applied_migrations(pool: &DynDatabasePool) -> Result<Vec<MigrationRecord>> {
    match pool.driver() {
        DatabaseDriver::Sqlite => get_applied_migrations_sqlite(pool.as_sqlite().unwrap()).await,
        DatabaseDriver::Mysql => get_applied_migrations_mysql(pool.as_mysql().unwrap()).await,
    }
}

async fn get_applied_migrations_sqlite(pool: &SqlitePool) -> Result<Vec<MigrationRecord>> {
    let rows = sqlx::query("SELECT version, name, applied_at FROM _migrations ORDER BY version")
        .fetch_all(pool)
        .await?;

    let mut records = Vec::new();
    for row in rows {
        records.push(MigrationRecord {
            version: row.get("version"),
            name: row.get("name"),
            applied_at: row.get("applied_at"),
        });
    }

    Ok(records)
}

async fn get_applied_migrations_mysql(pool: &MySqlPool) -> Result<Vec<MigrationRecord>> {
    let rows = sqlx::query("SELECT version, name, applied_at FROM _migrations ORDER BY version")
        .fetch_all(pool)
        .await?;

    let mut records = Vec::new();
    for row in rows {
        records.push(MigrationRecord {
            version: row.get("version"),
            name: row.get("name"),
            applied_at: row.get("applied_at"),
        });
    }

    Ok(records)
}

async fn apply_migration(pool: &DynDatabasePool, migration: &Migration) -> Result<()> {
    match pool.driver() {
        DatabaseDriver::Sqlite => apply_migration_sqlite(pool.as_sqlite().unwrap(), migration).await,
        DatabaseDriver::Mysql => apply_migration_mysql(pool.as_mysql().unwrap(), migration).await,
    }
}

async fn apply_migration_sqlite(pool: &SqlitePool, migration: &Migration) -> Result<()> {
    for statement in split_sql_statements(migration.up_sqlite) {
        let statement = statement.trim();
        if !statement.is_empty() {
            sqlx::query(statement)
                .execute(pool)
                .await
                .with_context(|| format!("Failed to execute: {}", truncate_sql(statement)))?;
        }
    }

    sqlx::query("INSERT INTO _migrations (version, name) VALUES (?, ?)")
        .bind(migration.version)
        .bind(migration.name)
        .execute(pool)
        .await?;

    Ok(())
}

async fn apply_migration_mysql(pool: &MySqlPool, migration: &Migration) -> Result<()> {
    for statement in split_sql_statements(migration.up_mysql) {
        let statement = statement.trim();
        if !statement.is_empty() {
            sqlx::query(statement)
                .execute(pool)
                .await
                .with_context(|| format!("Failed to execute: {}", truncate_sql(statement)))?;
        }
    }

    sqlx::query("INSERT INTO _migrations (version, name) VALUES (?, ?)")
        .bind(migration.version)
        .bind(migration.name)
        .execute(pool)
        .await?;

    Ok(())
}

/// Truncate SQL for error messages
fn truncate_sql(sql: &str) -> String {
    if sql.len() > 100 {
        format!("{}...", &sql[..100])
    } else {
        sql.to_string()
    }
}

/// Split SQL into individual statements on semicolons
fn split_sql_statements(sql: &str) -> Vec<&str> {
    sql.split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_test_pool;

    #[tokio::test]
    async fn test_run_migrations_fresh_database() {
        let pool = create_test_pool().await.expect("Failed to create test pool");

        let count = run_migrations(&pool).await.expect("Failed to run migrations");
        assert_eq!(count, MIGRATIONS.len());
    }

    #[tokio::test]
    async fn test_run_migrations_idempotent() {
        let pool = create_test_pool().await.expect("Failed to create test pool");

        run_migrations(&pool).await.expect("Failed to run migrations");
        let second = run_migrations(&pool).await.expect("Failed to re-run migrations");
        assert_eq!(second, 0);
    }

    #[tokio::test]
    async fn test_migrations_create_expected_tables() {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        run_migrations(&pool).await.expect("Failed to run migrations");

        for table in [
            "users",
            "sessions",
            "email_verification_tokens",
            "session_types",
            "session_durations",
            "session_formats",
            "bookings",
            "contact_messages",
        ] {
            let count = pool
                .execute(&format!("SELECT count(*) FROM {}", table))
                .await;
            assert!(count.is_ok(), "table {} should exist", table);
        }
    }

    #[tokio::test]
    async fn test_lookup_tables_seeded() {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        run_migrations(&pool).await.expect("Failed to run migrations");

        let sqlite = pool.as_sqlite().unwrap();
        let row = sqlx::query("SELECT count(*) AS n FROM session_durations")
            .fetch_one(sqlite)
            .await
            .expect("Failed to count durations");
        let n: i64 = row.get("n");
        assert_eq!(n, 3);
    }

    #[test]
    fn test_migration_versions_unique_and_sequential() {
        for (i, migration) in MIGRATIONS.iter().enumerate() {
            assert_eq!(migration.version, (i + 1) as i32);
        }
    }

    #[test]
    fn test_split_sql_statements() {
        let stmts = split_sql_statements("CREATE TABLE a (id INT); CREATE TABLE b (id INT);");
        assert_eq!(stmts.len(), 2);
    }
}
