//! Job queue and dispatcher
//!
//! `TaskDispatcher` is the seam between request handling and background
//! delivery: handlers enqueue and return without waiting. `QueueDispatcher`
//! is the in-process implementation over an unbounded channel; delayed jobs
//! are parked in a timer task until their fire time.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

use crate::services::OutboundEmail;

/// A unit of background work
#[derive(Debug, Clone)]
pub enum Job {
    /// Deliver one already-composed email
    SendEmail(OutboundEmail),
    /// Re-read the booking at fire time and prompt the requester to confirm
    /// the session took place
    SessionCompletionPrompt { booking_id: i64 },
}

impl Job {
    /// Short label for logs
    pub fn kind(&self) -> &'static str {
        match self {
            Job::SendEmail(_) => "send_email",
            Job::SessionCompletionPrompt { .. } => "session_completion_prompt",
        }
    }
}

/// Dispatcher trait for enqueueing background jobs
#[async_trait]
pub trait TaskDispatcher: Send + Sync {
    /// Enqueue a job for execution as soon as a worker picks it up
    async fn enqueue(&self, job: Job) -> Result<()>;

    /// Enqueue a job to run no earlier than `at`. A fire time in the past
    /// runs the job immediately.
    async fn enqueue_at(&self, job: Job, at: DateTime<Utc>) -> Result<()>;
}

/// In-process dispatcher feeding the task runner's channel
#[derive(Clone)]
pub struct QueueDispatcher {
    tx: mpsc::UnboundedSender<Job>,
}

impl QueueDispatcher {
    /// Create a dispatcher and the receiving end for a `TaskRunner`
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Job>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl TaskDispatcher for QueueDispatcher {
    async fn enqueue(&self, job: Job) -> Result<()> {
        self.tx
            .send(job)
            .map_err(|e| anyhow!("Task queue closed: {}", e))
    }

    async fn enqueue_at(&self, job: Job, at: DateTime<Utc>) -> Result<()> {
        let delay = (at - Utc::now()).to_std().unwrap_or_default();
        if delay.is_zero() {
            return self.enqueue(job).await;
        }

        let tx = self.tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Err(e) = tx.send(job) {
                tracing::warn!("Dropping delayed job, task queue closed: {}", e);
            }
        });

        Ok(())
    }
}
