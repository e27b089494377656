//! Contact form API endpoint

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use serde::Deserialize;

use crate::api::middleware::{ApiError, AppState};
use crate::services::contact::{ContactServiceError, ContactSubmission};

pub fn router() -> Router<AppState> {
    Router::new().route("/", post(submit))
}

#[derive(Debug, Deserialize)]
pub struct ContactBody {
    pub full_name: String,
    pub email: String,
    pub message: String,
}

async fn submit(
    State(state): State<AppState>,
    Json(body): Json<ContactBody>,
) -> Result<impl IntoResponse, ApiError> {
    let message = state
        .contact
        .submit(ContactSubmission {
            full_name: body.full_name,
            email: body.email,
            message: body.message,
        })
        .await
        .map_err(|e| match e {
            ContactServiceError::Validation(message) => ApiError::validation_error(message),
            ContactServiceError::Duplicate => {
                ApiError::duplicate("This message was already received, no need to send it again")
            }
            ContactServiceError::Internal(e) => {
                tracing::error!("Contact submission failed: {:#}", e);
                ApiError::internal_error("Something went wrong")
            }
        })?;

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "id": message.id,
            "message": "Thanks for reaching out. We'll get back to you soon.",
        })),
    ))
}
