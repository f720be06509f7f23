//! # Call Recording Decorator
//!
//! Captures every prompt/response pair flowing through a role so the
//! orchestrator can emit the `llm_call_history` artifact as JSON lines.

use super::{LanguageModel, LmUsage};
use crate::errors::LmError;
use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use std::fmt::Debug;
use std::sync::{Arc, Mutex};
use std::time::Instant;

/// One recorded language model call.
#[derive(Debug, Clone, Serialize)]
pub struct LmCallRecord {
    pub timestamp: String,
    pub role: String,
    pub system_prompt: String,
    pub user_prompt: String,
    pub response: String,
    pub duration_ms: u64,
    pub ok: bool,
}

/// Shared, append-only call log. Cloned into each recording decorator.
#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<LmCallRecord>>>);

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, record: LmCallRecord) {
        self.0.lock().unwrap_or_else(|e| e.into_inner()).push(record);
    }

    pub fn records(&self) -> Vec<LmCallRecord> {
        self.0.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Renders the log as JSON lines for the `llm_call_history` artifact.
    pub fn to_jsonl(&self) -> String {
        self.records()
            .iter()
            .filter_map(|record| serde_json::to_string(record).ok())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// A `LanguageModel` decorator that appends calls to a shared log.
#[derive(Clone, Debug)]
pub struct RecordingLm {
    inner: Arc<dyn LanguageModel>,
    role: &'static str,
    log: CallLog,
}

impl RecordingLm {
    pub fn new(inner: Arc<dyn LanguageModel>, role: &'static str, log: CallLog) -> Self {
        Self { inner, role, log }
    }
}

#[async_trait]
impl LanguageModel for RecordingLm {
    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String, LmError> {
        let started = Instant::now();
        let result = self.inner.complete(system_prompt, user_prompt).await;
        let duration_ms = started.elapsed().as_millis() as u64;

        self.log.push(LmCallRecord {
            timestamp: Utc::now().to_rfc3339(),
            role: self.role.to_string(),
            system_prompt: system_prompt.to_string(),
            user_prompt: user_prompt.to_string(),
            response: result.as_deref().unwrap_or_default().to_string(),
            duration_ms,
            ok: result.is_ok(),
        });

        result
    }

    fn usage(&self) -> LmUsage {
        self.inner.usage()
    }

    fn reset_usage(&self) {
        self.inner.reset_usage()
    }
}
