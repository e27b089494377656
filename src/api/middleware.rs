//! API middleware and shared state
//!
//! Session-cookie authentication and the JSON error envelope every handler
//! uses.

use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::models::User;
use crate::services::{AccountService, BookingService, ContactService};

/// Application state containing shared services
#[derive(Clone)]
pub struct AppState {
    pub pool: crate::db::DynDatabasePool,
    pub accounts: Arc<AccountService>,
    pub bookings: Arc<BookingService>,
    pub contact: Arc<ContactService>,
}

/// Authenticated user extracted from request
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub User);

/// Error response for API errors
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiErrorDetail {
    pub code: String,
    pub message: String,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
            },
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new("UNAUTHORIZED", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("NOT_FOUND", message)
    }

    pub fn token_expired(message: impl Into<String>) -> Self {
        Self::new("TOKEN_EXPIRED", message)
    }

    pub fn validation_error(message: impl Into<String>) -> Self {
        Self::new("VALIDATION_ERROR", message)
    }

    pub fn duplicate(message: impl Into<String>) -> Self {
        Self::new("DUPLICATE", message)
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new("INTERNAL_ERROR", message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.error.code.as_str() {
            "UNAUTHORIZED" => StatusCode::UNAUTHORIZED,
            "NOT_FOUND" => StatusCode::NOT_FOUND,
            "TOKEN_EXPIRED" => StatusCode::GONE,
            "VALIDATION_ERROR" => StatusCode::BAD_REQUEST,
            "DUPLICATE" => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (status, Json(self)).into_response()
    }
}

/// Extract the session token from the Authorization header or cookie
pub fn extract_session_token(request: &Request) -> Option<String> {
    if let Some(auth_header) = request.headers().get(header::AUTHORIZATION) {
        if let Ok(auth_str) = auth_header.to_str() {
            if let Some(token) = auth_str.strip_prefix("Bearer ") {
                return Some(token.to_string());
            }
        }
    }

    if let Some(cookie_header) = request.headers().get(header::COOKIE) {
        if let Ok(cookie_str) = cookie_header.to_str() {
            for cookie in cookie_str.split(';') {
                let cookie = cookie.trim();
                if let Some(token) = cookie.strip_prefix("session=") {
                    return Some(token.to_string());
                }
            }
        }
    }

    None
}

/// Authentication middleware
///
/// Resolves the session token to a user and stores it as a request
/// extension for handlers to pick up.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_session_token(&request)
        .ok_or_else(|| ApiError::unauthorized("Missing authentication token"))?;

    let user = state
        .accounts
        .current_user(&token)
        .await
        .map_err(|e| {
            tracing::error!("Session lookup failed: {}", e);
            ApiError::internal_error("Failed to validate session")
        })?
        .ok_or_else(|| ApiError::unauthorized("Invalid or expired session"))?;

    request.extensions_mut().insert(AuthenticatedUser(user));
    request.extensions_mut().insert(SessionToken(token));

    Ok(next.run(request).await)
}

/// The raw session token, kept alongside the user for logout
#[derive(Debug, Clone)]
pub struct SessionToken(pub String);
