//! Booking API endpoints
//!
//! The booking form (options + create) and the token-gated links delivered
//! by email: confirm for the mentor, complete for the requester, held and
//! not-held as the correction paths. Token links are GETs: they are followed
//! from email clients, and the token itself is the credential.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::api::middleware::{ApiError, AppState};
use crate::models::Booking;
use crate::services::booking::{BookingServiceError, NewBooking};

/// Booking routes (all public)
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/options", get(options))
        .route("/", post(create))
        .route("/confirm/{token}", get(confirm))
        .route("/complete/{token}", get(complete))
        .route("/held/{token}", get(mark_held))
        .route("/not-held/{token}", get(mark_not_held))
}

#[derive(Debug, Deserialize)]
pub struct CreateBookingBody {
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

/// Booking as exposed over the API. The tokens never appear here; they
/// travel only inside the emails.
#[derive(Debug, Serialize)]
pub struct BookingResponse {
    pub id: i64,
    pub full_name: String,
    pub email: String,
    pub preferred_datetime: DateTime<Utc>,
    pub timezone: String,
    pub session_type_id: i64,
    pub session_duration_id: i64,
    pub session_format_id: i64,
    pub mentor_confirmed: bool,
    pub session_completed: bool,
    pub session_held: Option<bool>,
    pub created_at: DateTime<Utc>,
}

impl From<Booking> for BookingResponse {
    fn from(booking: Booking) -> Self {
        Self {
            id: booking.id,
            full_name: booking.full_name,
            email: booking.email,
            preferred_datetime: booking.preferred_datetime,
            timezone: booking.timezone,
            session_type_id: booking.session_type_id,
            session_duration_id: booking.session_duration_id,
            session_format_id: booking.session_format_id,
            mentor_confirmed: booking.mentor_confirmed,
            session_completed: booking.session_completed,
            session_held: booking.session_held,
            created_at: booking.created_at,
        }
    }
}

async fn options(State(state): State<AppState>) -> Result<Response, ApiError> {
    let options = state.bookings.options().await.map_err(booking_error)?;

    Ok(Json(serde_json::json!({
        "session_types": options.session_types,
        "session_durations": options.session_durations,
        "session_formats": options.session_formats,
    }))
    .into_response())
}

async fn create(
    State(state): State<AppState>,
    Json(body): Json<CreateBookingBody>,
) -> Result<impl IntoResponse, ApiError> {
    let booking = state
        .bookings
        .create(NewBooking {
            full_name: body.full_name,
            email: body.email,
            phone_number: body.phone_number,
            company: body.company,
            preferred_datetime: body.preferred_datetime,
            timezone: body.timezone,
            session_type_id: body.session_type_id,
            session_duration_id: body.session_duration_id,
            session_format_id: body.session_format_id,
            goals: body.goals,
            referral_source: body.referral_source,
            linkedin_or_website: body.linkedin_or_website,
        })
        .await
        .map_err(booking_error)?;

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "booking": BookingResponse::from(booking),
            "message": "Booking received. A confirmation email is on its way.",
        })),
    ))
}

async fn confirm(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Response, ApiError> {
    match state.bookings.confirm_mentor(&token).await {
        Ok(booking) => Ok(Json(serde_json::json!({
            "booking": BookingResponse::from(booking),
            "message": "Session confirmed. The requester will be glad to hear from you.",
        }))
        .into_response()),
        Err(e) => already_done_or_error(e),
    }
}

async fn complete(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Response, ApiError> {
    match state.bookings.complete_session(&token).await {
        Ok(booking) => Ok(Json(serde_json::json!({
            "booking": BookingResponse::from(booking),
            "message": "Session marked as completed.",
        }))
        .into_response()),
        Err(e) => already_done_or_error(e),
    }
}

async fn mark_held(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Response, ApiError> {
    record_outcome(state, token, true).await
}

async fn mark_not_held(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Response, ApiError> {
    record_outcome(state, token, false).await
}

async fn record_outcome(
    state: AppState,
    token: String,
    held: bool,
) -> Result<Response, ApiError> {
    let booking = state
        .bookings
        .mark_session_held(&token, held)
        .await
        .map_err(booking_error)?;

    let message = if held {
        "Thanks for letting us know the session took place."
    } else {
        "Thanks for letting us know the session did not take place."
    };
    Ok(Json(serde_json::json!({
        "booking": BookingResponse::from(booking),
        "message": message,
    }))
    .into_response())
}

/// A second click on a single-use link answers 200 with a message rather
/// than an error; the mentor did nothing wrong.
fn already_done_or_error(error: BookingServiceError) -> Result<Response, ApiError> {
    match error {
        BookingServiceError::AlreadyConfirmed => Ok(Json(serde_json::json!({
            "message": "This booking has already been confirmed.",
        }))
        .into_response()),
        BookingServiceError::AlreadyCompleted => Ok(Json(serde_json::json!({
            "message": "This session has already been marked as completed.",
        }))
        .into_response()),
        other => Err(booking_error(other)),
    }
}

fn booking_error(error: BookingServiceError) -> ApiError {
    match error {
        BookingServiceError::NotFound => ApiError::not_found("Booking not found"),
        BookingServiceError::TokenExpired => ApiError::token_expired("This link has expired"),
        BookingServiceError::AlreadyConfirmed => {
            ApiError::validation_error("This booking has already been confirmed")
        }
        BookingServiceError::AlreadyCompleted => {
            ApiError::validation_error("This session has already been marked as completed")
        }
        BookingServiceError::Validation(message) => ApiError::validation_error(message),
        BookingServiceError::Internal(e) => {
            tracing::error!("Booking operation failed: {:#}", e);
            ApiError::internal_error("Something went wrong")
        }
    }
}
