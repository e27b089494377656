//! Reminder sweep
//!
//! Periodically finds bookings whose session starts soon but that no mentor
//! has confirmed, and nudges the mentor. Each booking gets one delivery
//! attempt per pass, sent before marking, so a failure leaves the booking
//! due for the next sweep rather than marking it on an unconfirmed send.

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

use crate::config::{AppConfig, BookingConfig, EmailConfig};
use crate::db::repositories::BookingRepository;
use crate::services::booking::reminder_email;
use crate::services::Mailer;

/// Periodic sweep over upcoming unconfirmed bookings
pub struct ReminderSweep {
    bookings: Arc<dyn BookingRepository>,
    mailer: Arc<dyn Mailer>,
    email: EmailConfig,
    app: AppConfig,
    booking_cfg: BookingConfig,
}

impl ReminderSweep {
    pub fn new(
        bookings: Arc<dyn BookingRepository>,
        mailer: Arc<dyn Mailer>,
        email: EmailConfig,
        app: AppConfig,
        booking_cfg: BookingConfig,
    ) -> Self {
        Self {
            bookings,
            mailer,
            email,
            app,
            booking_cfg,
        }
    }

    /// Run sweeps forever at the configured interval.
    pub async fn run(self) {
        let interval = std::time::Duration::from_secs(self.booking_cfg.reminder_sweep_interval_secs);
        tracing::info!(interval_secs = interval.as_secs(), "Reminder sweep started");

        loop {
            match self.run_once(Utc::now()).await {
                Ok(0) => tracing::debug!("Reminder sweep found nothing due"),
                Ok(sent) => tracing::info!(sent, "Reminder sweep sent reminders"),
                Err(e) => tracing::error!(error = %e, "Reminder sweep failed"),
            }
            tokio::time::sleep(interval).await;
        }
    }

    /// One sweep pass. Returns how many reminders went out.
    ///
    /// A failed send is logged and skipped without marking, so the booking
    /// comes back on the next pass; later bookings in the batch still get
    /// their reminders.
    pub async fn run_once(&self, now: DateTime<Utc>) -> Result<usize> {
        let window_end = now + Duration::hours(self.booking_cfg.reminder_window_hours);
        let cooldown_cutoff = now - Duration::hours(self.booking_cfg.reminder_cooldown_hours);

        let due = self
            .bookings
            .due_for_reminder(now, window_end, cooldown_cutoff)
            .await?;

        let mut sent = 0;
        for booking in due {
            let email = reminder_email(&booking, &self.email.mentor_address, &self.app.base_url);
            match self.mailer.send(&email).await {
                Ok(()) => {
                    self.bookings.mark_reminder_sent(booking.id, now).await?;
                    sent += 1;
                }
                Err(e) => {
                    tracing::warn!(
                        booking_id = booking.id,
                        error = %e,
                        "Reminder delivery failed, will retry next sweep"
                    );
                }
            }
        }

        Ok(sent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::SqlxBookingRepository;
    use crate::db::{create_test_pool, migrations};
    use crate::models::booking::generate_token;
    use crate::models::Booking;
    use crate::services::email::testing::RecordingMailer;

    async fn setup(
        mailer: Arc<RecordingMailer>,
    ) -> (ReminderSweep, Arc<dyn BookingRepository>) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let bookings: Arc<dyn BookingRepository> =
            Arc::new(SqlxBookingRepository::new(pool));
        let sweep = ReminderSweep::new(
            bookings.clone(),
            mailer,
            EmailConfig::default(),
            AppConfig::default(),
            BookingConfig::default(),
        );
        (sweep, bookings)
    }

    fn booking_at(preferred: DateTime<Utc>) -> Booking {
        Booking {
            id: 0,
            full_name: "Ada Lovelace".to_string(),
            email: "ada@example.com".to_string(),
            phone_number: None,
            company: None,
            preferred_datetime: preferred,
            timezone: "UTC".to_string(),
            session_type_id: 1,
            session_duration_id: 1,
            session_format_id: 1,
            goals: None,
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
    async fn test_sweep_sends_and_marks() {
        let mailer = Arc::new(RecordingMailer::new());
        let (sweep, bookings) = setup(mailer.clone()).await;
        let now = Utc::now();

        let due = bookings
            .create(&booking_at(now + Duration::hours(12)))
            .await
            .expect("create failed");

        let sent = sweep.run_once(now).await.expect("sweep failed");
        assert_eq!(sent, 1);
        assert_eq!(mailer.sent_count(), 1);

        let marked = bookings
            .get_by_id(due.id)
            .await
            .expect("query failed")
            .expect("booking not found");
        assert!(marked.last_reminder_sent_at.is_some());
    }

    #[tokio::test]
    async fn test_sweep_respects_cooldown() {
        let mailer = Arc::new(RecordingMailer::new());
        let (sweep, bookings) = setup(mailer.clone()).await;
        let now = Utc::now();

        bookings
            .create(&booking_at(now + Duration::hours(12)))
            .await
            .expect("create failed");

        assert_eq!(sweep.run_once(now).await.expect("sweep failed"), 1);
        // Second pass right away finds nothing due
        assert_eq!(sweep.run_once(now).await.expect("sweep failed"), 0);
        assert_eq!(mailer.sent_count(), 1);
    }

    #[tokio::test]
    async fn test_sweep_skips_confirmed_and_out_of_window() {
        let mailer = Arc::new(RecordingMailer::new());
        let (sweep, bookings) = setup(mailer.clone()).await;
        let now = Utc::now();

        let confirmed = bookings
            .create(&booking_at(now + Duration::hours(10)))
            .await
            .expect("create failed");
        bookings
            .set_confirmed(confirmed.id, now)
            .await
            .expect("confirm failed");
        bookings
            .create(&booking_at(now + Duration::hours(30)))
            .await
            .expect("create failed");

        assert_eq!(sweep.run_once(now).await.expect("sweep failed"), 0);
        assert_eq!(mailer.sent_count(), 0);
    }

    #[tokio::test]
    async fn test_failed_send_leaves_booking_due() {
        let mailer = Arc::new(RecordingMailer::failing(1));
        let (sweep, bookings) = setup(mailer.clone()).await;
        let now = Utc::now();

        let due = bookings
            .create(&booking_at(now + Duration::hours(12)))
            .await
            .expect("create failed");

        // First pass fails to deliver and must not mark
        assert_eq!(sweep.run_once(now).await.expect("sweep failed"), 0);
        let unmarked = bookings
            .get_by_id(due.id)
            .await
            .expect("query failed")
            .expect("booking not found");
        assert!(unmarked.last_reminder_sent_at.is_none());

        // Second pass succeeds
        assert_eq!(sweep.run_once(now).await.expect("sweep failed"), 1);
        assert_eq!(mailer.sent_count(), 1);
    }
}
