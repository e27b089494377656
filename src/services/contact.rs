//! Contact form service
//!
//! Stores submitted messages, suppresses rapid duplicates, and notifies
//! both sides: an acknowledgement to the sender and an alert to the admin
//! address.

use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use std::sync::Arc;
use thiserror::Error;

use crate::config::EmailConfig;
use crate::db::repositories::MessageRepository;
use crate::models::ContactMessage;
use crate::services::OutboundEmail;
use crate::tasks::{Job, TaskDispatcher};

/// Identical submissions inside this window are treated as double-sends
const DUPLICATE_WINDOW_MINUTES: i64 = 5;

/// Contact service errors
#[derive(Debug, Error)]
pub enum ContactServiceError {
    #[error("{0}")]
    Validation(String),
    #[error("This message was already received, no need to send it again")]
    Duplicate,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Input for a contact form submission
#[derive(Debug, Clone)]
pub struct ContactSubmission {
    pub full_name: String,
    pub email: String,
    pub message: String,
}

/// Contact form service
pub struct ContactService {
    messages: Arc<dyn MessageRepository>,
    dispatcher: Arc<dyn TaskDispatcher>,
    email: EmailConfig,
}

impl ContactService {
    pub fn new(
        messages: Arc<dyn MessageRepository>,
        dispatcher: Arc<dyn TaskDispatcher>,
        email: EmailConfig,
    ) -> Self {
        Self {
            messages,
            dispatcher,
            email,
        }
    }

    /// Store a submission and enqueue its two notifications.
    pub async fn submit(
        &self,
        submission: ContactSubmission,
    ) -> Result<ContactMessage, ContactServiceError> {
        if submission.full_name.trim().is_empty() {
            return Err(ContactServiceError::Validation(
                "Full name is required".to_string(),
            ));
        }
        if !submission.email.contains('@') {
            return Err(ContactServiceError::Validation(
                "A valid email address is required".to_string(),
            ));
        }
        if submission.message.trim().is_empty() {
            return Err(ContactServiceError::Validation(
                "Message is required".to_string(),
            ));
        }

        let now = Utc::now();
        let window_start = now - Duration::minutes(DUPLICATE_WINDOW_MINUTES);
        if self
            .messages
            .duplicate_exists(&submission.email, &submission.message, window_start)
            .await?
        {
            return Err(ContactServiceError::Duplicate);
        }

        let message = self
            .messages
            .create(&ContactMessage {
                id: 0,
                full_name: submission.full_name,
                email: submission.email,
                message: submission.message,
                created_at: now,
            })
            .await?;
        tracing::info!(message_id = message.id, "Contact message received");

        self.dispatcher
            .enqueue(Job::SendEmail(sender_acknowledgement_email(&message)))
            .await
            .context("Failed to enqueue sender acknowledgement")?;
        self.dispatcher
            .enqueue(Job::SendEmail(admin_alert_email(
                &message,
                &self.email.admin_address,
            )))
            .await
            .context("Failed to enqueue admin alert")?;

        Ok(message)
    }
}

/// Acknowledgement sent back to the person who wrote in
fn sender_acknowledgement_email(message: &ContactMessage) -> OutboundEmail {
    OutboundEmail::html(
        message.email.clone(),
        "We received your message",
        format!(
            "<p>Hi {},</p>\
             <p>Thanks for getting in touch. We read every message and will \
             get back to you soon.</p>",
            message.full_name,
        ),
    )
}

/// Alert sent to the admin address with the full message text
fn admin_alert_email(message: &ContactMessage, admin_address: &str) -> OutboundEmail {
    OutboundEmail::text(
        admin_address.to_string(),
        format!("Contact form message from {}", message.full_name),
        format!(
            "From: {} <{}>\n\n{}",
            message.full_name, message.email, message.message,
        ),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::SqlxMessageRepository;
    use crate::db::{create_test_pool, migrations};
    use crate::tasks::queue::testing::RecordingDispatcher;

    async fn setup() -> (ContactService, Arc<RecordingDispatcher>) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let dispatcher = Arc::new(RecordingDispatcher::new());
        let service = ContactService::new(
            SqlxMessageRepository::boxed(pool),
            dispatcher.clone(),
            EmailConfig::default(),
        );
        (service, dispatcher)
    }

    fn submission(text: &str) -> ContactSubmission {
        ContactSubmission {
            full_name: "Grace Hopper".to_string(),
            email: "grace@example.com".to_string(),
            message: text.to_string(),
        }
    }

    #[tokio::test]
    async fn test_submit_stores_and_notifies_both_sides() {
        let (service, dispatcher) = setup().await;

        let message = service
            .submit(submission("Hello there"))
            .await
            .expect("submit failed");
        assert!(message.id > 0);
        assert_eq!(dispatcher.immediate_count(), 2);

        let jobs = dispatcher.immediate.lock().unwrap();
        let recipients: Vec<&str> = jobs
            .iter()
            .map(|job| match job {
                Job::SendEmail(email) => email.to.as_str(),
                other => panic!("unexpected job: {:?}", other),
            })
            .collect();
        assert!(recipients.contains(&"grace@example.com"));
        assert!(recipients.contains(&EmailConfig::default().admin_address.as_str()));
    }

    #[tokio::test]
    async fn test_duplicate_inside_window_rejected() {
        let (service, dispatcher) = setup().await;
        service
            .submit(submission("Hello there"))
            .await
            .expect("submit failed");

        let result = service.submit(submission("Hello there")).await;
        assert!(matches!(result, Err(ContactServiceError::Duplicate)));
        // No extra notifications for the rejected duplicate
        assert_eq!(dispatcher.immediate_count(), 2);
    }

    #[tokio::test]
    async fn test_different_message_not_a_duplicate() {
        let (service, _) = setup().await;
        service
            .submit(submission("Hello there"))
            .await
            .expect("submit failed");

        assert!(service.submit(submission("Another question")).await.is_ok());
    }

    #[tokio::test]
    async fn test_validation_errors() {
        let (service, dispatcher) = setup().await;

        let mut empty_name = submission("Hi");
        empty_name.full_name = "  ".to_string();
        assert!(matches!(
            service.submit(empty_name).await,
            Err(ContactServiceError::Validation(_))
        ));

        let mut bad_email = submission("Hi");
        bad_email.email = "not-an-email".to_string();
        assert!(matches!(
            service.submit(bad_email).await,
            Err(ContactServiceError::Validation(_))
        ));

        let empty_message = submission("   ");
        assert!(matches!(
            service.submit(empty_message).await,
            Err(ContactServiceError::Validation(_))
        ));

        assert_eq!(dispatcher.immediate_count(), 0);
    }
}
