//! Job execution
//!
//! Each job is a self-contained delivery attempt. Transient failures (the
//! mailer returning an error) are retried a bounded number of times with a
//! fixed delay; a missing booking is final and never retried.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::config::{AppConfig, TasksConfig};
use crate::db::repositories::BookingRepository;
use crate::services::booking::completion_prompt_email;
use crate::services::{Mailer, OutboundEmail};
use crate::tasks::Job;

/// Shared dependencies for job execution
pub struct JobContext {
    pub mailer: Arc<dyn Mailer>,
    pub bookings: Arc<dyn BookingRepository>,
    pub app: AppConfig,
    pub tasks: TasksConfig,
    /// Deliveries that exhausted their retry budget since startup
    pub delivery_failures: AtomicU64,
}

/// Execute one job to completion, including its retries.
pub async fn run_job(ctx: &JobContext, job: Job) {
    match job {
        Job::SendEmail(email) => {
            send_with_retry(ctx, &email).await;
        }
        Job::SessionCompletionPrompt { booking_id } => {
            run_completion_prompt(ctx, booking_id).await;
        }
    }
}

/// Deliver an email, retrying transient failures.
///
/// Returns true when the message was delivered on some attempt.
pub async fn send_with_retry(ctx: &JobContext, email: &OutboundEmail) -> bool {
    let max_attempts = ctx.tasks.max_attempts.max(1);

    for attempt in 1..=max_attempts {
        match ctx.mailer.send(email).await {
            Ok(()) => {
                tracing::debug!(to = %email.to, subject = %email.subject, "Email delivered");
                return true;
            }
            Err(e) if attempt < max_attempts => {
                tracing::warn!(
                    to = %email.to,
                    attempt,
                    max_attempts,
                    error = %e,
                    "Email delivery failed, will retry"
                );
                tokio::time::sleep(Duration::from_secs(ctx.tasks.retry_delay_secs)).await;
            }
            Err(e) => {
                ctx.delivery_failures.fetch_add(1, Ordering::Relaxed);
                tracing::error!(
                    to = %email.to,
                    attempts = max_attempts,
                    error = %e,
                    "Email delivery failed permanently"
                );
            }
        }
    }

    false
}

/// Fire the session-end prompt for one booking.
///
/// The booking is re-read at fire time: its state may have changed since the
/// job was scheduled. A booking that vanished or was already completed is
/// final, not an error.
async fn run_completion_prompt(ctx: &JobContext, booking_id: i64) {
    let booking = match ctx.bookings.get_by_id(booking_id).await {
        Ok(Some(booking)) => booking,
        Ok(None) => {
            tracing::warn!(booking_id, "Completion prompt skipped, booking no longer exists");
            return;
        }
        Err(e) => {
            tracing::error!(booking_id, error = %e, "Completion prompt failed to load booking");
            return;
        }
    };

    if booking.session_completed {
        tracing::debug!(booking_id, "Completion prompt skipped, session already completed");
        return;
    }

    if booking.email.is_empty() {
        tracing::warn!(booking_id, "Completion prompt skipped, booking has no email address");
        return;
    }

    let email = completion_prompt_email(&booking, &ctx.app.base_url);
    send_with_retry(ctx, &email).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::SqlxBookingRepository;
    use crate::db::{create_test_pool, migrations};
    use crate::models::booking::generate_token;
    use crate::models::Booking;
    use crate::services::email::testing::RecordingMailer;
    use chrono::{Duration as ChronoDuration, Utc};

    async fn setup(mailer: Arc<RecordingMailer>) -> JobContext {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        JobContext {
            mailer,
            bookings: SqlxBookingRepository::boxed(pool),
            app: AppConfig::default(),
            tasks: TasksConfig {
                max_attempts: 3,
                retry_delay_secs: 0,
            },
            delivery_failures: AtomicU64::new(0),
        }
    }

    fn sample_booking() -> Booking {
        Booking {
            id: 0,
            full_name: "Ada Lovelace".to_string(),
            email: "ada@example.com".to_string(),
            phone_number: None,
            company: None,
            preferred_datetime: Utc::now() - ChronoDuration::minutes(30),
            timezone: "UTC".to_string(),
            session_type_id: 1,
            session_duration_id: 1,
            session_format_id: 1,
            goals: None,
            referral_source: None,
            linkedin_or_website: None,
            mentor_confirmed: true,
            session_completed: false,
            session_held: None,
            mentor_confirmation_token: generate_token(),
            session_completion_token: generate_token(),
            token_generated_at: Utc::now() - ChronoDuration::hours(1),
            created_at: Utc::now() - ChronoDuration::hours(1),
            confirmed_at: Some(Utc::now() - ChronoDuration::hours(1)),
            completed_at: None,
            last_reminder_sent_at: None,
        }
    }

    #[tokio::test]
    async fn test_send_email_first_try() {
        let mailer = Arc::new(RecordingMailer::new());
        let ctx = setup(mailer.clone()).await;

        run_job(
            &ctx,
            Job::SendEmail(OutboundEmail::text("a@example.com", "Hi", "Body")),
        )
        .await;

        assert_eq!(mailer.sent_count(), 1);
    }

    #[tokio::test]
    async fn test_send_email_retries_transient_failure() {
        let mailer = Arc::new(RecordingMailer::failing(2));
        let ctx = setup(mailer.clone()).await;

        let delivered =
            send_with_retry(&ctx, &OutboundEmail::text("a@example.com", "Hi", "Body")).await;

        assert!(delivered, "third attempt should succeed");
        assert_eq!(mailer.sent_count(), 1);
    }

    #[tokio::test]
    async fn test_send_email_gives_up_after_max_attempts() {
        let mailer = Arc::new(RecordingMailer::failing(10));
        let ctx = setup(mailer.clone()).await;

        let delivered =
            send_with_retry(&ctx, &OutboundEmail::text("a@example.com", "Hi", "Body")).await;

        assert!(!delivered);
        assert_eq!(mailer.sent_count(), 0);
        assert_eq!(ctx.delivery_failures.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_completion_prompt_sends_to_requester() {
        let mailer = Arc::new(RecordingMailer::new());
        let ctx = setup(mailer.clone()).await;
        let booking = ctx
            .bookings
            .create(&sample_booking())
            .await
            .expect("create failed");

        run_job(
            &ctx,
            Job::SessionCompletionPrompt {
                booking_id: booking.id,
            },
        )
        .await;

        let sent = mailer.sent_to(&booking.email);
        assert_eq!(sent.len(), 1);
        let html = sent[0].html_body.as_deref().expect("expected html body");
        assert!(html.contains(&booking.session_completion_token));
        assert!(!html.contains(&booking.mentor_confirmation_token));
    }

    #[tokio::test]
    async fn test_completion_prompt_missing_booking_is_final() {
        let mailer = Arc::new(RecordingMailer::new());
        let ctx = setup(mailer.clone()).await;

        run_job(&ctx, Job::SessionCompletionPrompt { booking_id: 999 }).await;

        assert_eq!(mailer.sent_count(), 0);
    }

    #[tokio::test]
    async fn test_completion_prompt_skips_completed_session() {
        let mailer = Arc::new(RecordingMailer::new());
        let ctx = setup(mailer.clone()).await;
        let booking = ctx
            .bookings
            .create(&sample_booking())
            .await
            .expect("create failed");
        ctx.bookings
            .set_held(booking.id, true, Utc::now())
            .await
            .expect("set_held failed");

        run_job(
            &ctx,
            Job::SessionCompletionPrompt {
                booking_id: booking.id,
            },
        )
        .await;

        assert_eq!(mailer.sent_count(), 0);
    }
}
