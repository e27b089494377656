//! API layer - HTTP handlers and routing
//!
//! All HTTP endpoints for the Mentora booking system:
//! - Auth endpoints (signup, email verification, login/logout)
//! - Booking endpoints (form options, creation, token-gated lifecycle links)
//! - Contact form endpoint

pub mod auth;
pub mod bookings;
pub mod contact;
pub mod middleware;

use axum::{
    http::{header, HeaderValue, Method},
    middleware as axum_middleware,
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub use middleware::{ApiError, AppState};

/// Build the main API router
pub fn build_api_router(state: AppState) -> Router<AppState> {
    let protected_routes = Router::new()
        .nest("/auth", auth::protected_router())
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    Router::new()
        .nest("/auth", auth::public_router())
        .nest("/bookings", bookings::router())
        .nest("/contact", contact::router())
        .merge(protected_routes)
}

/// Build the complete router with middleware
pub fn build_router(state: AppState, cors_origin: &str) -> Router {
    // CORS configuration - credentials allowed for cookie auth
    let cors = CorsLayer::new()
        .allow_origin(cors_origin.parse::<HeaderValue>().unwrap())
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::COOKIE])
        .allow_credentials(true);

    Router::new()
        .nest("/api/v1", build_api_router(state.clone()))
        .fallback(not_found)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// JSON 404 for unknown paths, matching the API error envelope
async fn not_found() -> ApiError {
    ApiError::not_found("Resource not found")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AppConfig, BookingConfig, EmailConfig};
    use crate::db::repositories::{
        SqlxBookingRepository, SqlxLookupRepository, SqlxMessageRepository, SqlxSessionRepository,
        SqlxUserRepository, SqlxVerificationTokenRepository,
    };
    use crate::db::{create_test_pool, migrations};
    use crate::services::{AccountService, BookingService, ContactService};
    use crate::tasks::queue::testing::RecordingDispatcher;
    use crate::tasks::Job;
    use axum_test::TestServer;
    use chrono::{Duration, Utc};
    use serde_json::{json, Value};
    use std::sync::Arc;

    async fn test_server() -> (TestServer, Arc<RecordingDispatcher>, crate::db::DynDatabasePool) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let dispatcher = Arc::new(RecordingDispatcher::new());

        let accounts = Arc::new(AccountService::new(
            SqlxUserRepository::boxed(pool.clone()),
            SqlxVerificationTokenRepository::boxed(pool.clone()),
            SqlxSessionRepository::boxed(pool.clone()),
            dispatcher.clone(),
            AppConfig::default(),
            BookingConfig::default(),
        ));
        let bookings = Arc::new(BookingService::new(
            SqlxBookingRepository::boxed(pool.clone()),
            SqlxLookupRepository::boxed(pool.clone()),
            dispatcher.clone(),
            EmailConfig::default(),
            AppConfig::default(),
            BookingConfig::default(),
        ));
        let contact = Arc::new(ContactService::new(
            SqlxMessageRepository::boxed(pool.clone()),
            dispatcher.clone(),
            EmailConfig::default(),
        ));

        let state = AppState {
            pool: pool.clone(),
            accounts,
            bookings,
            contact,
        };

        let mut server = TestServer::new(build_router(state, "http://localhost:3000"))
            .expect("Failed to build test server");
        server.save_cookies();
        (server, dispatcher, pool)
    }

    /// Pull a token out of the latest queued email by its link prefix
    fn token_from_emails(dispatcher: &RecordingDispatcher, marker: &str) -> String {
        let jobs = dispatcher.immediate.lock().unwrap();
        for job in jobs.iter().rev() {
            if let Job::SendEmail(email) = job {
                if let Some(html) = &email.html_body {
                    if let Some(start) = html.find(marker) {
                        let start = start + marker.len();
                        return html[start..start + 32].to_string();
                    }
                }
            }
        }
        panic!("no queued email contains '{}'", marker);
    }

    fn booking_body() -> Value {
        json!({
            "full_name": "Ada Lovelace",
            "email": "ada@example.com",
            "preferred_datetime": (Utc::now() + Duration::days(2)).to_rfc3339(),
            "timezone": "Europe/London",
            "session_type_id": 1,
            "session_duration_id": 1,
            "session_format_id": 1,
            "goals": "Architecture review"
        })
    }

    #[tokio::test]
    async fn test_booking_options() {
        let (server, _, _) = test_server().await;

        let response = server.get("/api/v1/bookings/options").await;
        response.assert_status_ok();

        let body: Value = response.json();
        assert_eq!(body["session_types"].as_array().unwrap().len(), 3);
        assert_eq!(body["session_durations"].as_array().unwrap().len(), 3);
        assert_eq!(body["session_formats"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_create_booking_hides_tokens() {
        let (server, dispatcher, _pool) = test_server().await;

        let response = server.post("/api/v1/bookings").json(&booking_body()).await;
        response.assert_status(axum::http::StatusCode::CREATED);

        let body: Value = response.json();
        assert!(body["booking"]["id"].as_i64().unwrap() > 0);
        assert!(body["booking"].get("mentor_confirmation_token").is_none());
        assert!(body["booking"].get("session_completion_token").is_none());

        assert_eq!(dispatcher.immediate_count(), 2);
        assert_eq!(dispatcher.scheduled_count(), 1);
    }

    #[tokio::test]
    async fn test_create_booking_validation_error() {
        let (server, _, _) = test_server().await;

        let mut body = booking_body();
        body["preferred_datetime"] = json!((Utc::now() - Duration::hours(1)).to_rfc3339());

        let response = server.post("/api/v1/bookings").json(&body).await;
        response.assert_status_bad_request();

        let body: Value = response.json();
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_confirm_link_lifecycle() {
        let (server, dispatcher, _pool) = test_server().await;
        server
            .post("/api/v1/bookings")
            .json(&booking_body())
            .await
            .assert_status(axum::http::StatusCode::CREATED);
        let token = token_from_emails(&dispatcher, "/api/v1/bookings/confirm/");

        // First click confirms and queues the notice to the requester
        let response = server
            .get(&format!("/api/v1/bookings/confirm/{}", token))
            .await;
        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["booking"]["mentor_confirmed"], json!(true));
        assert_eq!(dispatcher.immediate_count(), 3);

        // Second click is a friendly no-op with no re-send
        let response = server
            .get(&format!("/api/v1/bookings/confirm/{}", token))
            .await;
        response.assert_status_ok();
        let body: Value = response.json();
        assert!(body["message"]
            .as_str()
            .unwrap()
            .contains("already been confirmed"));
        assert_eq!(dispatcher.immediate_count(), 3);
    }

    #[tokio::test]
    async fn test_unknown_token_is_404() {
        let (server, _, _) = test_server().await;

        let response = server
            .get("/api/v1/bookings/confirm/ffffffffffffffffffffffffffffffff")
            .await;
        response.assert_status_not_found();

        let body: Value = response.json();
        assert_eq!(body["error"]["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_outcome_links() {
        use crate::db::repositories::BookingRepository;

        let (server, dispatcher, pool) = test_server().await;
        let response = server.post("/api/v1/bookings").json(&booking_body()).await;
        response.assert_status(axum::http::StatusCode::CREATED);
        let created: Value = response.json();
        let booking_id = created["booking"]["id"].as_i64().unwrap();

        // The completion prompt was scheduled for this booking
        {
            let scheduled = dispatcher.scheduled.lock().unwrap();
            let Some((Job::SessionCompletionPrompt { booking_id: id }, _)) = scheduled.first()
            else {
                panic!("expected a scheduled completion prompt");
            };
            assert_eq!(*id, booking_id);
        }

        // The completion token never leaves the emails, so read it back
        // from storage to exercise the links
        let repo = SqlxBookingRepository::new(pool);
        let booking = repo
            .get_by_id(booking_id)
            .await
            .expect("query failed")
            .expect("booking not found");

        let response = server
            .get(&format!(
                "/api/v1/bookings/held/{}",
                booking.session_completion_token
            ))
            .await;
        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["booking"]["session_held"], json!(true));
        assert_eq!(body["booking"]["session_completed"], json!(true));

        // The other link silently overwrites the answer
        let response = server
            .get(&format!(
                "/api/v1/bookings/not-held/{}",
                booking.session_completion_token
            ))
            .await;
        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["booking"]["session_held"], json!(false));
    }

    #[tokio::test]
    async fn test_complete_link() {
        use crate::db::repositories::BookingRepository;

        let (server, _, pool) = test_server().await;
        let response = server.post("/api/v1/bookings").json(&booking_body()).await;
        let created: Value = response.json();
        let booking_id = created["booking"]["id"].as_i64().unwrap();

        let repo = SqlxBookingRepository::new(pool);
        let booking = repo
            .get_by_id(booking_id)
            .await
            .expect("query failed")
            .expect("booking not found");

        let response = server
            .get(&format!(
                "/api/v1/bookings/complete/{}",
                booking.session_completion_token
            ))
            .await;
        response.assert_status_ok();

        // Second click is a friendly no-op
        let response = server
            .get(&format!(
                "/api/v1/bookings/complete/{}",
                booking.session_completion_token
            ))
            .await;
        response.assert_status_ok();
        let body: Value = response.json();
        assert!(body["message"]
            .as_str()
            .unwrap()
            .contains("already been marked as completed"));
    }

    #[tokio::test]
    async fn test_contact_flow_and_duplicate() {
        let (server, dispatcher, _pool) = test_server().await;
        let body = json!({
            "full_name": "Grace Hopper",
            "email": "grace@example.com",
            "message": "I would like to get in touch."
        });

        let response = server.post("/api/v1/contact").json(&body).await;
        response.assert_status(axum::http::StatusCode::CREATED);
        assert_eq!(dispatcher.immediate_count(), 2);

        let response = server.post("/api/v1/contact").json(&body).await;
        response.assert_status(axum::http::StatusCode::CONFLICT);
        let body: Value = response.json();
        assert_eq!(body["error"]["code"], "DUPLICATE");
    }

    #[tokio::test]
    async fn test_signup_verify_login_me_logout() {
        let (server, dispatcher, _pool) = test_server().await;

        let response = server
            .post("/api/v1/auth/signup")
            .json(&json!({
                "email": "ada@example.com",
                "first_name": "Ada",
                "last_name": "Lovelace",
                "password": "correct horse battery"
            }))
            .await;
        response.assert_status(axum::http::StatusCode::CREATED);

        // Login before verification is rejected
        let response = server
            .post("/api/v1/auth/login")
            .json(&json!({
                "username_or_email": "ada@example.com",
                "password": "correct horse battery"
            }))
            .await;
        response.assert_status_unauthorized();

        // Verify via the emailed link
        let token = token_from_emails(&dispatcher, "/api/v1/auth/verify-email/");
        let response = server
            .get(&format!("/api/v1/auth/verify-email/{}", token))
            .await;
        response.assert_status_ok();

        // Second click on the verify link stays friendly
        let response = server
            .get(&format!("/api/v1/auth/verify-email/{}", token))
            .await;
        response.assert_status_ok();

        // Login now succeeds and sets the session cookie
        let response = server
            .post("/api/v1/auth/login")
            .json(&json!({
                "username_or_email": "ada@example.com",
                "password": "correct horse battery"
            }))
            .await;
        response.assert_status_ok();

        let response = server.get("/api/v1/auth/me").await;
        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["email"], "ada@example.com");

        server.post("/api/v1/auth/logout").await.assert_status_ok();
        server.get("/api/v1/auth/me").await.assert_status_unauthorized();
    }

    #[tokio::test]
    async fn test_me_without_session_is_unauthorized() {
        let (server, _, _) = test_server().await;
        server.get("/api/v1/auth/me").await.assert_status_unauthorized();
    }

    #[tokio::test]
    async fn test_check_username() {
        let (server, _, _) = test_server().await;
        server
            .post("/api/v1/auth/signup")
            .json(&json!({
                "username": "ada",
                "email": "ada@example.com",
                "password": "correct horse battery"
            }))
            .await
            .assert_status(axum::http::StatusCode::CREATED);

        let response = server
            .get("/api/v1/auth/check-username")
            .add_query_param("username", "ada")
            .await;
        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["available"], json!(false));
        assert!(body["suggestion"].as_str().unwrap().starts_with("ada"));

        let response = server
            .get("/api/v1/auth/check-username")
            .add_query_param("username", "grace")
            .await;
        let body: Value = response.json();
        assert_eq!(body["available"], json!(true));
    }

    #[tokio::test]
    async fn test_unknown_path_gets_json_404() {
        let (server, _, _) = test_server().await;

        let response = server.get("/api/v1/does-not-exist").await;
        response.assert_status_not_found();
        let body: Value = response.json();
        assert_eq!(body["error"]["code"], "NOT_FOUND");
    }
}
