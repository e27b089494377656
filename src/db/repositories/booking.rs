//! Booking repository
//!
//! Database operations for bookings, including token lookups, lifecycle
//! flag updates, and the reminder sweep query.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::Booking;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

/// Booking repository trait
#[async_trait]
pub trait BookingRepository: Send + Sync {
    /// Create a new booking, returning it with its assigned id
    async fn create(&self, booking: &Booking) -> Result<Booking>;

    /// Get booking by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<Booking>>;

    /// Get booking by its mentor confirmation token
    async fn get_by_mentor_token(&self, token: &str) -> Result<Option<Booking>>;

    /// Get booking by its session completion token
    async fn get_by_completion_token(&self, token: &str) -> Result<Option<Booking>>;

    /// Set the mentor-confirmed flag and timestamp
    async fn set_confirmed(&self, id: i64, at: DateTime<Utc>) -> Result<()>;

    /// Set the session-completed flag and timestamp
    async fn set_completed(&self, id: i64, at: DateTime<Utc>) -> Result<()>;

    /// Record whether the session was held, also marking the booking
    /// completed
    async fn set_held(&self, id: i64, held: bool, at: DateTime<Utc>) -> Result<()>;

    /// Bookings whose session start falls inside `[window_start, window_end]`,
    /// that are neither confirmed nor completed, and that have not been
    /// reminded since `cooldown_cutoff`.
    async fn due_for_reminder(
        &self,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
        cooldown_cutoff: DateTime<Utc>,
    ) -> Result<Vec<Booking>>;

    /// Record that a reminder was sent for this booking
    async fn mark_reminder_sent(&self, id: i64, at: DateTime<Utc>) -> Result<()>;
}

/// SQLx-based booking repository implementation
pub struct SqlxBookingRepository {
    pool: DynDatabasePool,
}

impl SqlxBookingRepository {
    /// Create a new SQLx booking repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn BookingRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl BookingRepository for SqlxBookingRepository {
    async fn create(&self, booking: &Booking) -> Result<Booking> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                create_booking_sqlite(self.pool.as_sqlite().unwrap(), booking).await
            }
            DatabaseDriver::Mysql => {
                create_booking_mysql(self.pool.as_mysql().unwrap(), booking).await
            }
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Booking>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                get_booking_sqlite(self.pool.as_sqlite().unwrap(), "id", &id.to_string()).await
            }
            DatabaseDriver::Mysql => {
                get_booking_mysql(self.pool.as_mysql().unwrap(), "id", &id.to_string()).await
            }
        }
    }

    async fn get_by_mentor_token(&self, token: &str) -> Result<Option<Booking>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                get_booking_sqlite(
                    self.pool.as_sqlite().unwrap(),
                    "mentor_confirmation_token",
                    token,
                )
                .await
            }
            DatabaseDriver::Mysql => {
                get_booking_mysql(
                    self.pool.as_mysql().unwrap(),
                    "mentor_confirmation_token",
                    token,
                )
                .await
            }
        }
    }

    async fn get_by_completion_token(&self, token: &str) -> Result<Option<Booking>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                get_booking_sqlite(
                    self.pool.as_sqlite().unwrap(),
                    "session_completion_token",
                    token,
                )
                .await
            }
            DatabaseDriver::Mysql => {
                get_booking_mysql(
                    self.pool.as_mysql().unwrap(),
                    "session_completion_token",
                    token,
                )
                .await
            }
        }
    }

    async fn set_confirmed(&self, id: i64, at: DateTime<Utc>) -> Result<()> {
        let sql = "UPDATE bookings SET mentor_confirmed = 1, confirmed_at = ? WHERE id = ?";
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                update_booking_sqlite(self.pool.as_sqlite().unwrap(), sql, at, id).await
            }
            DatabaseDriver::Mysql => {
                let sql =
                    "UPDATE bookings SET mentor_confirmed = TRUE, confirmed_at = ? WHERE id = ?";
                update_booking_mysql(self.pool.as_mysql().unwrap(), sql, at, id).await
            }
        }
    }

    async fn set_completed(&self, id: i64, at: DateTime<Utc>) -> Result<()> {
        let sql = "UPDATE bookings SET session_completed = 1, completed_at = ? WHERE id = ?";
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                update_booking_sqlite(self.pool.as_sqlite().unwrap(), sql, at, id).await
            }
            DatabaseDriver::Mysql => {
                let sql =
                    "UPDATE bookings SET session_completed = TRUE, completed_at = ? WHERE id = ?";
                update_booking_mysql(self.pool.as_mysql().unwrap(), sql, at, id).await
            }
        }
    }

    async fn set_held(&self, id: i64, held: bool, at: DateTime<Utc>) -> Result<()> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                set_held_sqlite(self.pool.as_sqlite().unwrap(), id, held, at).await
            }
            DatabaseDriver::Mysql => {
                set_held_mysql(self.pool.as_mysql().unwrap(), id, held, at).await
            }
        }
    }

    async fn due_for_reminder(
        &self,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
        cooldown_cutoff: DateTime<Utc>,
    ) -> Result<Vec<Booking>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                due_for_reminder_sqlite(
                    self.pool.as_sqlite().unwrap(),
                    window_start,
                    window_end,
                    cooldown_cutoff,
                )
                .await
            }
            DatabaseDriver::Mysql => {
                due_for_reminder_mysql(
                    self.pool.as_mysql().unwrap(),
                    window_start,
                    window_end,
                    cooldown_cutoff,
                )
                .await
            }
        }
    }

    async fn mark_reminder_sent(&self, id: i64, at: DateTime<Utc>) -> Result<()> {
        let sql = "UPDATE bookings SET last_reminder_sent_at = ? WHERE id = ?";
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                update_booking_sqlite(self.pool.as_sqlite().unwrap(), sql, at, id).await
            }
            DatabaseDriver::Mysql => {
                update_booking_mysql(self.pool.as_mysql().unwrap(), sql, at, id).await
            }
        }
    }
}

const BOOKING_COLUMNS: &str = "id, full_name, email, phone_number, company, preferred_datetime, \
    timezone, session_type_id, session_duration_id, session_format_id, goals, referral_source, \
    linkedin_or_website, mentor_confirmed, session_completed, session_held, \
    mentor_confirmation_token, session_completion_token, token_generated_at, created_at, \
    confirmed_at, completed_at, last_reminder_sent_at";

const INSERT_BOOKING: &str = "INSERT INTO bookings (full_name, email, phone_number, company, \
    preferred_datetime, timezone, session_type_id, session_duration_id, session_format_id, \
    goals, referral_source, linkedin_or_website, mentor_confirmed, session_completed, \
    session_held, mentor_confirmation_token, session_completion_token, token_generated_at, \
    created_at, confirmed_at, completed_at, last_reminder_sent_at) \
    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)";

const REMINDER_FILTER: &str = "preferred_datetime >= ? AND preferred_datetime <= ? \
    AND mentor_confirmed = 0 AND session_completed = 0 \
    AND (last_reminder_sent_at IS NULL OR last_reminder_sent_at < ?)";

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_booking_sqlite(pool: &SqlitePool, booking: &Booking) -> Result<Booking> {
    let result = sqlx::query(INSERT_BOOKING)
        .bind(&booking.full_name)
        .bind(&booking.email)
        .bind(&booking.phone_number)
        .bind(&booking.company)
        .bind(booking.preferred_datetime)
        .bind(&booking.timezone)
        .bind(booking.session_type_id)
        .bind(booking.session_duration_id)
        .bind(booking.session_format_id)
        .bind(&booking.goals)
        .bind(&booking.referral_source)
        .bind(&booking.linkedin_or_website)
        .bind(booking.mentor_confirmed)
        .bind(booking.session_completed)
        .bind(booking.session_held)
        .bind(&booking.mentor_confirmation_token)
        .bind(&booking.session_completion_token)
        .bind(booking.token_generated_at)
        .bind(booking.created_at)
        .bind(booking.confirmed_at)
        .bind(booking.completed_at)
        .bind(booking.last_reminder_sent_at)
        .execute(pool)
        .await
        .context("Failed to create booking")?;

    let mut created = booking.clone();
    created.id = result.last_insert_rowid();
    Ok(created)
}

async fn get_booking_sqlite(
    pool: &SqlitePool,
    column: &str,
    value: &str,
) -> Result<Option<Booking>> {
    let query = format!("SELECT {} FROM bookings WHERE {} = ?", BOOKING_COLUMNS, column);
    let row = sqlx::query(&query)
        .bind(value)
        .fetch_optional(pool)
        .await
        .with_context(|| format!("Failed to get booking by {}", column))?;

    Ok(row.map(|row| row_to_booking_sqlite(&row)))
}

async fn update_booking_sqlite(
    pool: &SqlitePool,
    sql: &str,
    at: DateTime<Utc>,
    id: i64,
) -> Result<()> {
    sqlx::query(sql)
        .bind(at)
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to update booking")?;

    Ok(())
}

async fn set_held_sqlite(pool: &SqlitePool, id: i64, held: bool, at: DateTime<Utc>) -> Result<()> {
    sqlx::query(
        "UPDATE bookings SET session_held = ?, session_completed = 1, completed_at = ? WHERE id = ?",
    )
    .bind(held)
    .bind(at)
    .bind(id)
    .execute(pool)
    .await
    .context("Failed to record session outcome")?;

    Ok(())
}

async fn due_for_reminder_sqlite(
    pool: &SqlitePool,
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
    cooldown_cutoff: DateTime<Utc>,
) -> Result<Vec<Booking>> {
    let query = format!(
        "SELECT {} FROM bookings WHERE {} ORDER BY preferred_datetime",
        BOOKING_COLUMNS, REMINDER_FILTER
    );
    let rows = sqlx::query(&query)
        .bind(window_start)
        .bind(window_end)
        .bind(cooldown_cutoff)
        .fetch_all(pool)
        .await
        .context("Failed to query bookings due for reminder")?;

    Ok(rows.iter().map(row_to_booking_sqlite).collect())
}

fn row_to_booking_sqlite(row: &sqlx::sqlite::SqliteRow) -> Booking {
    Booking {
        id: row.get("id"),
        full_name: row.get("full_name"),
        email: row.get("email"),
        phone_number: row.get("phone_number"),
        company: row.get("company"),
        preferred_datetime: row.get("preferred_datetime"),
        timezone: row.get("timezone"),
        session_type_id: row.get("session_type_id"),
        session_duration_id: row.get("session_duration_id"),
        session_format_id: row.get("session_format_id"),
        goals: row.get("goals"),
        referral_source: row.get("referral_source"),
        linkedin_or_website: row.get("linkedin_or_website"),
        mentor_confirmed: row.get("mentor_confirmed"),
        session_completed: row.get("session_completed"),
        session_held: row.get("session_held"),
        mentor_confirmation_token: row.get("mentor_confirmation_token"),
        session_completion_token: row.get("session_completion_token"),
        token_generated_at: row.get("token_generated_at"),
        created_at: row.get("created_at"),
        confirmed_at: row.get("confirmed_at"),
        completed_at: row.get("completed_at"),
        last_reminder_sent_at: row.get("last_reminder_sent_at"),
    }
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_booking_mysql(pool: &MySqlPool, booking: &Booking) -> Result<Booking> {
    let result = sqlx::query(INSERT_BOOKING)
        .bind(&booking.full_name)
        .bind(&booking.email)
        .bind(&booking.phone_number)
        .bind(&booking.company)
        .bind(booking.preferred_datetime)
        .bind(&booking.timezone)
        .bind(booking.session_type_id)
        .bind(booking.session_duration_id)
        .bind(booking.session_format_id)
        .bind(&booking.goals)
        .bind(&booking.referral_source)
        .bind(&booking.linkedin_or_website)
        .bind(booking.mentor_confirmed)
        .bind(booking.session_completed)
        .bind(booking.session_held)
        .bind(&booking.mentor_confirmation_token)
        .bind(&booking.session_completion_token)
        .bind(booking.token_generated_at)
        .bind(booking.created_at)
        .bind(booking.confirmed_at)
        .bind(booking.completed_at)
        .bind(booking.last_reminder_sent_at)
        .execute(pool)
        .await
        .context("Failed to create booking")?;

    let mut created = booking.clone();
    created.id = result.last_insert_id() as i64;
    Ok(created)
}

async fn get_booking_mysql(
    pool: &MySqlPool,
    column: &str,
    value: &str,
) -> Result<Option<Booking>> {
    let query = format!("SELECT {} FROM bookings WHERE {} = ?", BOOKING_COLUMNS, column);
    let row = sqlx::query(&query)
        .bind(value)
        .fetch_optional(pool)
        .await
        .with_context(|| format!("Failed to get booking by {}", column))?;

    Ok(row.map(|row| row_to_booking_mysql(&row)))
}

async fn update_booking_mysql(
    pool: &MySqlPool,
    sql: &str,
    at: DateTime<Utc>,
    id: i64,
) -> Result<()> {
    sqlx::query(sql)
        .bind(at)
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to update booking")?;

    Ok(())
}

async fn set_held_mysql(pool: &MySqlPool, id: i64, held: bool, at: DateTime<Utc>) -> Result<()> {
    sqlx::query(
        "UPDATE bookings SET session_held = ?, session_completed = TRUE, completed_at = ? WHERE id = ?",
    )
    .bind(held)
    .bind(at)
    .bind(id)
    .execute(pool)
    .await
    .context("Failed to record session outcome")?;

    Ok(())
}

async fn due_for_reminder_mysql(
    pool: &MySqlPool,
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
    cooldown_cutoff: DateTime<Utc>,
) -> Result<Vec<Booking>> {
    let query = format!(
        "SELECT {} FROM bookings WHERE {} ORDER BY preferred_datetime",
        BOOKING_COLUMNS, REMINDER_FILTER
    );
    let rows = sqlx::query(&query)
        .bind(window_start)
        .bind(window_end)
        .bind(cooldown_cutoff)
        .fetch_all(pool)
        .await
        .context("Failed to query bookings due for reminder")?;

    Ok(rows.iter().map(row_to_booking_mysql).collect())
}

fn row_to_booking_mysql(row: &sqlx::mysql::MySqlRow) -> Booking {
    let preferred_datetime: DateTime<Utc> = row.get("preferred_datetime");
    let token_generated_at: DateTime<Utc> = row.get("token_generated_at");
    let created_at: DateTime<Utc> = row.get("created_at");
    Booking {
        id: row.get("id"),
        full_name: row.get("full_name"),
        email: row.get("email"),
        phone_number: row.get("phone_number"),
        company: row.get("company"),
        preferred_datetime,
        timezone: row.get("timezone"),
        session_type_id: row.get("session_type_id"),
        session_duration_id: row.get("session_duration_id"),
        session_format_id: row.get("session_format_id"),
        goals: row.get("goals"),
        referral_source: row.get("referral_source"),
        linkedin_or_website: row.get("linkedin_or_website"),
        mentor_confirmed: row.get("mentor_confirmed"),
        session_completed: row.get("session_completed"),
        session_held: row.get("session_held"),
        mentor_confirmation_token: row.get("mentor_confirmation_token"),
        session_completion_token: row.get("session_completion_token"),
        token_generated_at,
        created_at,
        confirmed_at: row.get("confirmed_at"),
        completed_at: row.get("completed_at"),
        last_reminder_sent_at: row.get("last_reminder_sent_at"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};
    use crate::models::booking::generate_token;
    use chrono::Duration;

    async fn setup() -> SqlxBookingRepository {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        SqlxBookingRepository::new(pool)
    }

    fn sample_booking(preferred: DateTime<Utc>) -> Booking {
        Booking {
            id: 0,
            full_name: "Ada Lovelace".to_string(),
            email: "ada@example.com".to_string(),
            phone_number: Some("+44 20 7946 0000".to_string()),
            company: None,
            preferred_datetime: preferred,
            timezone: "Europe/London".to_string(),
            session_type_id: 1,
            session_duration_id: 1,
            session_format_id: 1,
            goals: Some("Architecture review".to_string()),
            referral_source: None,
            linkedin_or_website: None,
            mentor_confirmed: false,
            session_completed: false,
            session_held: None,
            mentor_confirmation_token: generate_token(),
            session_completion_token: generate_token(),
            token_generated_at: Utc::now(),
            created_at: Utc::now(),
            confirmed_at: None,
            completed_at: None,
            last_reminder_sent_at: None,
        }
    }

    #[tokio::test]
    async fn test_create_and_get_booking() {
        let repo = setup().await;

        let created = repo
            .create(&sample_booking(Utc::now() + Duration::days(2)))
            .await
            .expect("Failed to create booking");
        assert!(created.id > 0);

        let found = repo
            .get_by_id(created.id)
            .await
            .expect("Failed to get booking")
            .expect("Booking not found");
        assert_eq!(found.full_name, "Ada Lovelace");
        assert_eq!(found.session_held, None);
        assert!(!found.mentor_confirmed);
    }

    #[tokio::test]
    async fn test_token_lookups() {
        let repo = setup().await;
        let created = repo
            .create(&sample_booking(Utc::now() + Duration::days(1)))
            .await
            .expect("Failed to create booking");

        let by_mentor = repo
            .get_by_mentor_token(&created.mentor_confirmation_token)
            .await
            .expect("query failed")
            .expect("Booking not found by mentor token");
        assert_eq!(by_mentor.id, created.id);

        let by_completion = repo
            .get_by_completion_token(&created.session_completion_token)
            .await
            .expect("query failed")
            .expect("Booking not found by completion token");
        assert_eq!(by_completion.id, created.id);

        assert!(repo
            .get_by_mentor_token("not-a-token")
            .await
            .expect("query failed")
            .is_none());
    }

    #[tokio::test]
    async fn test_set_confirmed_and_completed() {
        let repo = setup().await;
        let created = repo
            .create(&sample_booking(Utc::now() + Duration::days(1)))
            .await
            .expect("Failed to create booking");

        let now = Utc::now();
        repo.set_confirmed(created.id, now)
            .await
            .expect("Failed to confirm");
        repo.set_completed(created.id, now)
            .await
            .expect("Failed to complete");

        let found = repo
            .get_by_id(created.id)
            .await
            .expect("query failed")
            .expect("Booking not found");
        assert!(found.mentor_confirmed);
        assert!(found.session_completed);
        assert!(found.confirmed_at.is_some());
        assert!(found.completed_at.is_some());
    }

    #[tokio::test]
    async fn test_set_held_also_completes() {
        let repo = setup().await;
        let created = repo
            .create(&sample_booking(Utc::now() - Duration::hours(2)))
            .await
            .expect("Failed to create booking");

        repo.set_held(created.id, true, Utc::now())
            .await
            .expect("Failed to record outcome");

        let found = repo
            .get_by_id(created.id)
            .await
            .expect("query failed")
            .expect("Booking not found");
        assert_eq!(found.session_held, Some(true));
        assert!(found.session_completed);
    }

    #[tokio::test]
    async fn test_set_held_false() {
        let repo = setup().await;
        let created = repo
            .create(&sample_booking(Utc::now() - Duration::hours(2)))
            .await
            .expect("Failed to create booking");

        repo.set_held(created.id, false, Utc::now())
            .await
            .expect("Failed to record outcome");

        let found = repo
            .get_by_id(created.id)
            .await
            .expect("query failed")
            .expect("Booking not found");
        assert_eq!(found.session_held, Some(false));
    }

    #[tokio::test]
    async fn test_due_for_reminder_window_and_flags() {
        let repo = setup().await;
        let now = Utc::now();

        // In window, unconfirmed: due
        let due = repo
            .create(&sample_booking(now + Duration::hours(12)))
            .await
            .expect("create failed");
        // Outside window: not due
        repo.create(&sample_booking(now + Duration::hours(48)))
            .await
            .expect("create failed");
        // In window but confirmed: not due
        let confirmed = repo
            .create(&sample_booking(now + Duration::hours(6)))
            .await
            .expect("create failed");
        repo.set_confirmed(confirmed.id, now).await.expect("confirm failed");
        // In the past: not due
        repo.create(&sample_booking(now - Duration::hours(3)))
            .await
            .expect("create failed");

        let found = repo
            .due_for_reminder(now, now + Duration::hours(24), now - Duration::hours(6))
            .await
            .expect("query failed");

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, due.id);
    }

    #[tokio::test]
    async fn test_due_for_reminder_respects_cooldown() {
        let repo = setup().await;
        let now = Utc::now();

        let booking = repo
            .create(&sample_booking(now + Duration::hours(12)))
            .await
            .expect("create failed");

        // A reminder sent inside the cooldown keeps the booking out
        repo.mark_reminder_sent(booking.id, now - Duration::hours(1))
            .await
            .expect("mark failed");
        let found = repo
            .due_for_reminder(now, now + Duration::hours(24), now - Duration::hours(6))
            .await
            .expect("query failed");
        assert!(found.is_empty());

        // Once the last reminder is older than the cutoff it is due again
        repo.mark_reminder_sent(booking.id, now - Duration::hours(7))
            .await
            .expect("mark failed");
        let found = repo
            .due_for_reminder(now, now + Duration::hours(24), now - Duration::hours(6))
            .await
            .expect("query failed");
        assert_eq!(found.len(), 1);
    }
}
