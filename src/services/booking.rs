//! Booking service
//!
//! Owns the booking lifecycle: creation with its notification fan-out,
//! token-gated confirmation and completion, and the session outcome record.
//! Delivery itself happens in the background; this service only composes
//! messages and enqueues jobs.

use anyhow::Result;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;

use crate::config::{AppConfig, BookingConfig, EmailConfig};
use crate::db::repositories::{BookingRepository, LookupRepository};
use crate::models::booking::generate_token;
use crate::models::{Booking, SessionDuration, SessionFormat, SessionType};
use crate::services::OutboundEmail;
use crate::tasks::{Job, TaskDispatcher};

/// Booking service errors
#[derive(Debug, Error)]
pub enum BookingServiceError {
    #[error("Booking not found")]
    NotFound,
    #[error("This link has expired")]
    TokenExpired,
    #[error("This booking has already been confirmed")]
    AlreadyConfirmed,
    #[error("This session has already been marked as completed")]
    AlreadyCompleted,
    #[error("{0}")]
    Validation(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Input for creating a booking
#[derive(Debug, Clone)]
pub struct NewBooking {
    pub full_name: String,
    pub email: String,
    pub phone_number: Option<String>,
    pub company: Option<String>,
    pub preferred_datetime: DateTime<Utc>,
    pub timezone: String,
    pub session_type_id: i64,
    pub session_duration_id: i64,
    pub session_format_id: i64,
    pub goals: Option<String>,
    pub referral_source: Option<String>,
    pub linkedin_or_website: Option<String>,
}

/// The lookup options presented on the booking form
#[derive(Debug, Clone)]
pub struct BookingOptions {
    pub session_types: Vec<SessionType>,
    pub session_durations: Vec<SessionDuration>,
    pub session_formats: Vec<SessionFormat>,
}

/// Booking lifecycle service
pub struct BookingService {
    bookings: Arc<dyn BookingRepository>,
    lookups: Arc<dyn LookupRepository>,
    dispatcher: Arc<dyn TaskDispatcher>,
    email: EmailConfig,
    app: AppConfig,
    booking_cfg: BookingConfig,
}

impl BookingService {
    pub fn new(
        bookings: Arc<dyn BookingRepository>,
        lookups: Arc<dyn LookupRepository>,
        dispatcher: Arc<dyn TaskDispatcher>,
        email: EmailConfig,
        app: AppConfig,
        booking_cfg: BookingConfig,
    ) -> Self {
        Self {
            bookings,
            lookups,
            dispatcher,
            email,
            app,
            booking_cfg,
        }
    }

    /// The lookup options for the booking form
    pub async fn options(&self) -> Result<BookingOptions, BookingServiceError> {
        Ok(BookingOptions {
            session_types: self.lookups.list_types().await?,
            session_durations: self.lookups.list_durations().await?,
            session_formats: self.lookups.list_formats().await?,
        })
    }

    /// Create a booking and fan out its notifications.
    ///
    /// Two emails are enqueued immediately (requester acknowledgement and
    /// mentor invite) and a completion prompt is scheduled for the session's
    /// end time. The booking itself is persisted before anything is
    /// enqueued, so a queue failure never loses the booking.
    pub async fn create(&self, input: NewBooking) -> Result<Booking, BookingServiceError> {
        let now = Utc::now();
        self.validate(&input, now)?;

        let session_type = self
            .lookups
            .get_type(input.session_type_id)
            .await?
            .ok_or_else(|| BookingServiceError::Validation("Unknown session type".to_string()))?;
        let duration = self
            .lookups
            .get_duration(input.session_duration_id)
            .await?
            .ok_or_else(|| {
                BookingServiceError::Validation("Unknown session duration".to_string())
            })?;
        let format = self
            .lookups
            .get_format(input.session_format_id)
            .await?
            .ok_or_else(|| BookingServiceError::Validation("Unknown session format".to_string()))?;

        let booking = Booking {
            id: 0,
            full_name: input.full_name,
            email: input.email,
            phone_number: input.phone_number,
            company: input.company,
            preferred_datetime: input.preferred_datetime,
            timezone: input.timezone,
            session_type_id: session_type.id,
            session_duration_id: duration.id,
            session_format_id: format.id,
            goals: input.goals,
            referral_source: input.referral_source,
            linkedin_or_website: input.linkedin_or_website,
            mentor_confirmed: false,
            session_completed: false,
            session_held: None,
            mentor_confirmation_token: generate_token(),
            session_completion_token: generate_token(),
            token_generated_at: now,
            created_at: now,
            confirmed_at: None,
            completed_at: None,
            last_reminder_sent_at: None,
        };

        let booking = self.bookings.create(&booking).await?;
        tracing::info!(booking_id = booking.id, "Booking created");

        // Fire-and-continue: the booking is already saved, so a queue
        // problem must not fail the request
        if let Err(e) = self
            .dispatcher
            .enqueue(Job::SendEmail(requester_confirmation_email(
                &booking,
                &session_type,
                &duration,
                &format,
            )))
            .await
        {
            tracing::error!(booking_id = booking.id, error = %e, "Failed to enqueue requester confirmation");
        }

        if let Err(e) = self
            .dispatcher
            .enqueue(Job::SendEmail(mentor_invite_email(
                &booking,
                &session_type,
                &duration,
                &format,
                &self.email.mentor_address,
                &self.app.base_url,
            )))
            .await
        {
            tracing::error!(booking_id = booking.id, error = %e, "Failed to enqueue mentor invite");
        }

        let session_end = booking.session_end(&duration);
        if let Err(e) = self
            .dispatcher
            .enqueue_at(
                Job::SessionCompletionPrompt {
                    booking_id: booking.id,
                },
                session_end,
            )
            .await
        {
            tracing::error!(booking_id = booking.id, error = %e, "Failed to schedule completion prompt");
        }

        Ok(booking)
    }

    /// Confirm a booking through its mentor confirmation token.
    ///
    /// The checks run in order: unknown token, expired token, already
    /// confirmed. An expired token reports expiry even if the booking was
    /// confirmed while the token was still live.
    pub async fn confirm_mentor(&self, token: &str) -> Result<Booking, BookingServiceError> {
        let booking = self
            .bookings
            .get_by_mentor_token(token)
            .await?
            .ok_or(BookingServiceError::NotFound)?;

        let now = Utc::now();
        if !booking.tokens_valid(self.booking_cfg.token_valid_hours, now) {
            return Err(BookingServiceError::TokenExpired);
        }
        if booking.mentor_confirmed {
            return Err(BookingServiceError::AlreadyConfirmed);
        }

        self.bookings.set_confirmed(booking.id, now).await?;
        tracing::info!(booking_id = booking.id, "Booking confirmed by mentor");

        let booking = self
            .bookings
            .get_by_id(booking.id)
            .await?
            .ok_or(BookingServiceError::NotFound)?;

        if let Err(e) = self
            .dispatcher
            .enqueue(Job::SendEmail(session_confirmed_email(&booking)))
            .await
        {
            tracing::error!(booking_id = booking.id, error = %e, "Failed to enqueue confirmation notice");
        }

        Ok(booking)
    }

    /// Mark a session completed through its completion token.
    pub async fn complete_session(&self, token: &str) -> Result<Booking, BookingServiceError> {
        let booking = self
            .bookings
            .get_by_completion_token(token)
            .await?
            .ok_or(BookingServiceError::NotFound)?;

        let now = Utc::now();
        if !booking.tokens_valid(self.booking_cfg.token_valid_hours, now) {
            return Err(BookingServiceError::TokenExpired);
        }
        if booking.session_completed {
            return Err(BookingServiceError::AlreadyCompleted);
        }

        self.bookings.set_completed(booking.id, now).await?;
        tracing::info!(booking_id = booking.id, "Session marked completed");

        self.bookings
            .get_by_id(booking.id)
            .await?
            .ok_or(BookingServiceError::NotFound)
    }

    /// Record whether the session was actually held.
    ///
    /// Deliberately permissive: no expiry check and no idempotence guard, so
    /// a mentor can correct an earlier answer by following the other link.
    /// Recording an outcome also marks the booking completed.
    pub async fn mark_session_held(
        &self,
        token: &str,
        held: bool,
    ) -> Result<Booking, BookingServiceError> {
        let booking = self
            .bookings
            .get_by_completion_token(token)
            .await?
            .ok_or(BookingServiceError::NotFound)?;

        self.bookings.set_held(booking.id, held, Utc::now()).await?;
        tracing::info!(booking_id = booking.id, held, "Session outcome recorded");

        self.bookings
            .get_by_id(booking.id)
            .await?
            .ok_or(BookingServiceError::NotFound)
    }

    fn validate(&self, input: &NewBooking, now: DateTime<Utc>) -> Result<(), BookingServiceError> {
        if input.full_name.trim().is_empty() {
            return Err(BookingServiceError::Validation(
                "Full name is required".to_string(),
            ));
        }
        if !input.email.contains('@') {
            return Err(BookingServiceError::Validation(
                "A valid email address is required".to_string(),
            ));
        }
        if input.timezone.trim().is_empty() {
            return Err(BookingServiceError::Validation(
                "Timezone is required".to_string(),
            ));
        }
        if input.preferred_datetime <= now {
            return Err(BookingServiceError::Validation(
                "Preferred session time must be in the future".to_string(),
            ));
        }
        Ok(())
    }
}

// ============================================================================
// Email composition
// ============================================================================

/// Acknowledgement sent to the requester right after booking
pub fn requester_confirmation_email(
    booking: &Booking,
    session_type: &SessionType,
    duration: &SessionDuration,
    format: &SessionFormat,
) -> OutboundEmail {
    let html = format!(
        "<p>Hi {},</p>\
         <p>Thanks for booking a mentorship session. Here is what we have:</p>\
         <ul>\
         <li>Session: {}</li>\
         <li>Duration: {}</li>\
         <li>Format: {}</li>\
         <li>Requested time: {} ({})</li>\
         </ul>\
         <p>You will hear from us once your mentor confirms the session.</p>",
        booking.full_name,
        session_type.name,
        duration.label,
        format.name,
        booking.preferred_datetime.format("%Y-%m-%d %H:%M UTC"),
        booking.timezone,
    );

    OutboundEmail::html(
        booking.email.clone(),
        "Your mentorship session request",
        html,
    )
}

/// Invite sent to the mentor with the single-use confirmation link
pub fn mentor_invite_email(
    booking: &Booking,
    session_type: &SessionType,
    duration: &SessionDuration,
    format: &SessionFormat,
    mentor_address: &str,
    base_url: &str,
) -> OutboundEmail {
    let confirm_url = format!(
        "{}/api/v1/bookings/confirm/{}",
        base_url, booking.mentor_confirmation_token
    );
    let html = format!(
        "<p>New session request from {} ({}):</p>\
         <ul>\
         <li>Session: {}</li>\
         <li>Duration: {}</li>\
         <li>Format: {}</li>\
         <li>Requested time: {} ({})</li>\
         <li>Goals: {}</li>\
         </ul>\
         <p><a href=\"{}\">Confirm this session</a></p>\
         <p>The link is valid for a limited time and can be used once.</p>",
        booking.full_name,
        booking.email,
        session_type.name,
        duration.label,
        format.name,
        booking.preferred_datetime.format("%Y-%m-%d %H:%M UTC"),
        booking.timezone,
        booking.goals.as_deref().unwrap_or("-"),
        confirm_url,
    );

    OutboundEmail::html(
        mentor_address.to_string(),
        format!("New session request from {}", booking.full_name),
        html,
    )
}

/// Notice to the requester that the mentor accepted the session
pub fn session_confirmed_email(booking: &Booking) -> OutboundEmail {
    let html = format!(
        "<p>Hi {},</p>\
         <p>Good news: your mentor confirmed the session requested for {} ({}).</p>\
         <p>See you there!</p>",
        booking.full_name,
        booking.preferred_datetime.format("%Y-%m-%d %H:%M UTC"),
        booking.timezone,
    );

    OutboundEmail::html(
        booking.email.clone(),
        "Your mentorship session is confirmed",
        html,
    )
}

/// Prompt sent at the session's end asking the requester to confirm it took
/// place, carrying the single-use completion link
pub fn completion_prompt_email(booking: &Booking, base_url: &str) -> OutboundEmail {
    let complete_url = format!(
        "{}/api/v1/bookings/complete/{}",
        base_url, booking.session_completion_token
    );
    let html = format!(
        "<p>Hi {},</p>\
         <p>Your mentorship session was scheduled to end just now. Please \
         confirm it took place:</p>\
         <p><a href=\"{}\">Confirm session completion</a></p>",
        booking.full_name, complete_url,
    );
    let text = format!(
        "Hi {}, please confirm your session here: {}",
        booking.full_name, complete_url,
    );

    let mut email = OutboundEmail::html(
        booking.email.clone(),
        "Please confirm your session completion",
        html,
    );
    email.text_body = text;
    email
}

/// Reminder about an upcoming session the mentor has not confirmed yet
pub fn reminder_email(booking: &Booking, mentor_address: &str, base_url: &str) -> OutboundEmail {
    let confirm_url = format!(
        "{}/api/v1/bookings/confirm/{}",
        base_url, booking.mentor_confirmation_token
    );
    let html = format!(
        "<p>Reminder: the session requested by {} is coming up at {} and has not \
         been confirmed yet.</p>\
         <p><a href=\"{}\">Confirm this session</a></p>",
        booking.full_name,
        booking.preferred_datetime.format("%Y-%m-%d %H:%M UTC"),
        confirm_url,
    );

    OutboundEmail::html(
        mentor_address.to_string(),
        format!("Unconfirmed session with {}", booking.full_name),
        html,
    )
}
