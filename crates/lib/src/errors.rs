//! # Error Types
//!
//! Each layer of the library carries its own error enum: language model
//! providers, the knowledge store, retrieval backends, and the pipeline
//! itself. Retrieval errors never cross the `Retriever` boundary; the
//! pipeline degrades to fewer results instead.

use thiserror::Error;

/// Errors surfaced by language model providers.
#[derive(Error, Debug)]
pub enum LmError {
    #[error("Failed to build Reqwest client: {0}")]
    ClientBuild(reqwest::Error),
    #[error("Failed to send request to the model provider: {0}")]
    Request(reqwest::Error),
    #[error("Model provider returned an error (status {status}): {body}")]
    Api { status: u16, body: String },
    #[error("Model provider rate limited the request: {0}")]
    RateLimited(String),
    #[error("Failed to deserialize model provider response: {0}")]
    Deserialization(reqwest::Error),
    #[error("Model call did not succeed within the retry budget: {0}")]
    RetriesExhausted(String),
}

impl LmError {
    /// Transient failures are worth retrying; client-side mistakes are not.
    pub fn is_transient(&self) -> bool {
        match self {
            LmError::Request(_) | LmError::RateLimited(_) => true,
            LmError::Api { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    /// Rate limits get an unbounded attempt count within the elapsed-time cap.
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, LmError::RateLimited(_)) || matches!(self, LmError::Api { status: 429, .. })
    }
}

/// Errors from the internal knowledge store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Store vector dimension {store} does not match embedder dimension {embedder}")]
    DimensionMismatch { store: usize, embedder: usize },
    #[error("Invalid store configuration: {0}")]
    Config(String),
}

/// Errors raised inside a retrieval backend.
///
/// These are internal to the retriever stack: `Retriever::retrieve` logs
/// them and returns whatever the surviving backend produced.
#[derive(Error, Debug)]
pub enum RetrievalError {
    #[error("Query embedding failed: {0}")]
    Embedding(#[from] LmError),
    #[error("Knowledge store query failed: {0}")]
    Store(#[from] StoreError),
    #[error("Web search failed: {0}")]
    Web(String),
}

/// Fatal errors that halt a report job.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Language model call failed: {0}")]
    Lm(#[from] LmError),
    #[error("{stage} produced no output")]
    EmptyStageOutput { stage: &'static str },
    #[error("Knowledge store error: {0}")]
    Store(#[from] StoreError),
    #[error("Job was cancelled")]
    Cancelled,
    #[error("Failed to persist report artifact `{name}`: {message}")]
    Sink { name: String, message: String },
    #[error("Failed to serialize artifact: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl PipelineError {
    /// Short, user-facing message published to the job status channel.
    /// Never includes backtraces or provider payloads.
    pub fn status_message(&self) -> String {
        match self {
            PipelineError::Cancelled => "cancelled".to_string(),
            PipelineError::EmptyStageOutput { stage } => {
                format!("{stage} produced no usable output")
            }
            PipelineError::Lm(_) => "language model call failed".to_string(),
            PipelineError::Store(_) => "knowledge store unavailable".to_string(),
            PipelineError::Sink { name, .. } => format!("could not persist artifact {name}"),
            PipelineError::Serialization(_) => "artifact serialization failed".to_string(),
        }
    }
}
