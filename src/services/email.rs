//! Outbound email
//!
//! `OutboundEmail` is the delivery-agnostic description of one message, and
//! `Mailer` is the seam the task runner and reminder sweep talk to. The
//! production implementation is an SMTP relay via lettre; tests substitute a
//! recording mailer.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

use crate::config::EmailConfig;

/// Plain-text part used when a message is authored as HTML only
pub const HTML_FALLBACK_TEXT: &str =
    "This is an HTML email. Please use a compatible email client.";

/// One outbound message, independent of how it gets delivered
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundEmail {
    pub to: String,
    pub subject: String,
    /// Plain-text body, always present
    pub text_body: String,
    /// Optional HTML alternative
    pub html_body: Option<String>,
    /// Sender override; the configured from address is used when absent
    pub from: Option<String>,
}

impl OutboundEmail {
    /// Plain-text message
    pub fn text(to: impl Into<String>, subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            to: to.into(),
            subject: subject.into(),
            text_body: body.into(),
            html_body: None,
            from: None,
        }
    }

    /// HTML message with the standard plain-text fallback
    pub fn html(to: impl Into<String>, subject: impl Into<String>, html: impl Into<String>) -> Self {
        Self {
            to: to.into(),
            subject: subject.into(),
            text_body: HTML_FALLBACK_TEXT.to_string(),
            html_body: Some(html.into()),
            from: None,
        }
    }

    /// Replace the sender for this one message
    pub fn with_from(mut self, from: impl Into<String>) -> Self {
        self.from = Some(from.into());
        self
    }
}

/// Email delivery trait
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Deliver one message. A returned error is treated as transient by
    /// callers that retry.
    async fn send(&self, email: &OutboundEmail) -> Result<()>;
}

/// SMTP mailer backed by lettre's async transport
pub struct SmtpMailer {
    config: EmailConfig,
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpMailer {
    /// Create a mailer from SMTP configuration
    pub fn new(config: &EmailConfig) -> Result<Self> {
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_host)
            .map_err(|e| anyhow!("Failed to create SMTP transport: {}", e))?
            .port(config.smtp_port);

        if !config.smtp_username.is_empty() {
            builder = builder.credentials(Credentials::new(
                config.smtp_username.clone(),
                config.smtp_password.clone(),
            ));
        }

        Ok(Self {
            config: config.clone(),
            transport: builder.build(),
        })
    }
}

impl SmtpMailer {
    fn build_message(&self, email: &OutboundEmail) -> Result<Message> {
        let from = match &email.from {
            Some(from) => from.clone(),
            None => format!("{} <{}>", self.config.from_name, self.config.from_address),
        };

        let builder = Message::builder()
            .from(from.parse().map_err(|e| anyhow!("Invalid from address: {}", e))?)
            .to(email
                .to
                .parse()
                .map_err(|e| anyhow!("Invalid to address '{}': {}", email.to, e))?)
            .subject(&email.subject);

        let message = match &email.html_body {
            Some(html) => builder
                .multipart(
                    MultiPart::alternative()
                        .singlepart(
                            SinglePart::builder()
                                .header(ContentType::TEXT_PLAIN)
                                .body(email.text_body.clone()),
                        )
                        .singlepart(
                            SinglePart::builder()
                                .header(ContentType::TEXT_HTML)
                                .body(html.clone()),
                        ),
                )
                .map_err(|e| anyhow!("Failed to build email: {}", e))?,
            None => builder
                .header(ContentType::TEXT_PLAIN)
                .body(email.text_body.clone())
                .map_err(|e| anyhow!("Failed to build email: {}", e))?,
        };

        Ok(message)
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: &OutboundEmail) -> Result<()> {
        let message = self.build_message(email)?;

        self.transport
            .send(message)
            .await
            .map_err(|e| anyhow!("Failed to send email to {}: {}", email.to, e))?;

        Ok(())
    }
}

#[cfg(test)]
pub mod testing {
    //! Test double that records sent messages instead of delivering them

    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    /// Mailer that records every message; can be told to fail the first N
    /// sends to exercise retry paths.
    #[derive(Default)]
    pub struct RecordingMailer {
        pub sent: Mutex<Vec<OutboundEmail>>,
        pub failures_remaining: AtomicU32,
    }

    impl RecordingMailer {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn failing(times: u32) -> Self {
            let mailer = Self::default();
            mailer.failures_remaining.store(times, Ordering::SeqCst);
            mailer
        }

        pub fn sent_count(&self) -> usize {
            self.sent.lock().unwrap().len()
        }

        pub fn sent_to(&self, address: &str) -> Vec<OutboundEmail> {
            self.sent
                .lock()
                .unwrap()
                .iter()
                .filter(|e| e.to == address)
                .cloned()
                .collect()
        }
    }

    #[async_trait]
    impl Mailer for RecordingMailer {
        async fn send(&self, email: &OutboundEmail) -> Result<()> {
            let remaining = self.failures_remaining.load(Ordering::SeqCst);
            if remaining > 0 {
                self.failures_remaining.store(remaining - 1, Ordering::SeqCst);
                return Err(anyhow!("simulated delivery failure"));
            }
            self.sent.lock().unwrap().push(email.clone());
            Ok(())
        }
    }
}
