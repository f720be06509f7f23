//! # Job Status
//!
//! The channel the pipeline publishes progress through. Implementations
//! must be cheap and infallible; a status consumer going away must never
//! fail a report job.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::info;

/// Lifecycle state of a report job.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Processing,
    Completed,
    Failed,
}

/// One progress update.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub status: JobState,
    pub progress_percent: u8,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StatusUpdate {
    pub fn processing(progress_percent: u8, message: impl Into<String>) -> Self {
        Self {
            status: JobState::Processing,
            progress_percent,
            message: message.into(),
            error: None,
        }
    }

    pub fn completed() -> Self {
        Self {
            status: JobState::Completed,
            progress_percent: 100,
            message: "completed".to_string(),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        let error = error.into();
        Self {
            status: JobState::Failed,
            progress_percent: 0,
            message: "failed".to_string(),
            error: Some(error),
        }
    }
}

/// A consumer of job progress.
#[async_trait]
pub trait JobStatus: Send + Sync {
    async fn publish(&self, job_id: &str, update: StatusUpdate);
}

/// Logs status transitions through `tracing`.
#[derive(Debug, Clone, Default)]
pub struct TracingJobStatus;

#[async_trait]
impl JobStatus for TracingJobStatus {
    async fn publish(&self, job_id: &str, update: StatusUpdate) {
        info!(
            job_id,
            status = ?update.status,
            progress = update.progress_percent,
            error = update.error.as_deref(),
            "{}",
            update.message
        );
    }
}

/// Forwards updates to an mpsc consumer (e.g. a dashboard bridge).
#[derive(Debug, Clone)]
pub struct ChannelJobStatus {
    tx: mpsc::UnboundedSender<(String, StatusUpdate)>,
}

impl ChannelJobStatus {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<(String, StatusUpdate)>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl JobStatus for ChannelJobStatus {
    async fn publish(&self, job_id: &str, update: StatusUpdate) {
        // A dropped receiver must not fail the job.
        let _ = self.tx.send((job_id.to_string(), update));
    }
}
