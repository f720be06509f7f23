//! # Report Sink
//!
//! Write-only destination for the final artifacts of a run. The pipeline
//! writes only on success; a failed job persists nothing.

use crate::errors::PipelineError;
use async_trait::async_trait;
use std::path::PathBuf;

/// Artifact names written by the orchestrator.
pub mod artifact {
    pub const POLISHED_ARTICLE: &str = "polished_article";
    pub const DRAFT_ARTICLE: &str = "draft_article";
    pub const OUTLINE: &str = "outline";
    pub const DRAFT_OUTLINE: &str = "draft_outline";
    pub const CONVERSATION_LOG: &str = "conversation_log";
    pub const URL_TO_INFO: &str = "url_to_info";
    pub const RUN_CONFIG: &str = "run_config";
    pub const LLM_CALL_HISTORY: &str = "llm_call_history";
}

/// A write-only key/value artifact store.
#[async_trait]
pub trait ReportSink: Send + Sync {
    async fn write(&self, job_id: &str, name: &str, content: &str) -> Result<(), PipelineError>;
}

/// Writes each artifact as a UTF-8 file under `{root}/{job_id}/`.
#[derive(Debug, Clone)]
pub struct FsReportSink {
    root: PathBuf,
}

impl FsReportSink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn file_name(name: &str) -> String {
        let extension = match name {
            artifact::POLISHED_ARTICLE
            | artifact::DRAFT_ARTICLE
            | artifact::OUTLINE
            | artifact::DRAFT_OUTLINE => "md",
            artifact::CONVERSATION_LOG | artifact::URL_TO_INFO | artifact::RUN_CONFIG => "json",
            artifact::LLM_CALL_HISTORY => "jsonl",
            _ => "txt",
        };
        format!("{name}.{extension}")
    }
}

#[async_trait]
impl ReportSink for FsReportSink {
    async fn write(&self, job_id: &str, name: &str, content: &str) -> Result<(), PipelineError> {
        let dir = self.root.join(job_id);
        let sink_error = |e: std::io::Error| PipelineError::Sink {
            name: name.to_string(),
            message: e.to_string(),
        };
        tokio::fs::create_dir_all(&dir).await.map_err(sink_error)?;
        // Explicit UTF-8: content is a &str, so the bytes written are
        // UTF-8 regardless of platform defaults.
        tokio::fs::write(dir.join(Self::file_name(name)), content.as_bytes())
            .await
            .map_err(sink_error)
    }
}
