//! Task runner
//!
//! Drains the job channel and executes each job on its own task, so one
//! job's retry delays never hold up the rest of the queue.

use std::sync::Arc;
use tokio::sync::mpsc;

use crate::tasks::jobs::{run_job, JobContext};
use crate::tasks::Job;

/// Background worker over the job channel
pub struct TaskRunner {
    rx: mpsc::UnboundedReceiver<Job>,
    ctx: Arc<JobContext>,
}

impl TaskRunner {
    pub fn new(rx: mpsc::UnboundedReceiver<Job>, ctx: JobContext) -> Self {
        Self {
            rx,
            ctx: Arc::new(ctx),
        }
    }

    /// Run until every dispatcher handle is dropped and the channel drains.
    pub async fn run(mut self) {
        tracing::info!("Task runner started");

        while let Some(job) = self.rx.recv().await {
            tracing::debug!(kind = job.kind(), "Job picked up");
            let ctx = self.ctx.clone();
            tokio::spawn(async move {
                run_job(&ctx, job).await;
            });
        }

        tracing::info!("Task queue closed, runner stopping");
    }
}
