//! # dartwiki
//!
//! Grounded, Wikipedia-style corporate analysis reports from a DART
//! filing corpus plus optional web search.
//!
//! The library is a four-stage pipeline with a retriever in the loop:
//! persona generation, multi-perspective knowledge curation through
//! simulated writer/expert dialogues, two-pass outline induction, and
//! parallel section drafting followed by a deduplication polish. Every
//! factual claim in the output carries an inline `[k]` citation resolving
//! through the unified citation index built during curation.

pub mod config;
pub mod errors;
pub mod pipeline;
pub mod prompts;
pub mod providers;
pub mod retrieval;
pub mod sink;
pub mod status;
pub mod store;
pub mod types;

pub use config::PipelineConfig;
pub use errors::{LmError, PipelineError, RetrievalError, StoreError};
pub use pipeline::{CancellationFlag, Pipeline, RunRequest};
pub use providers::ai::{
    CallLog, EmbeddingClient, GeminiProvider, LanguageModel, LmSuite, LmUsage,
    OpenAiCompatProvider, RecordingLm, RetryingLm,
};
pub use retrieval::{HybridRetriever, InternalRetriever, Retriever, WebSearchProvider};
pub use sink::{FsReportSink, ReportSink};
pub use status::{ChannelJobStatus, JobState, JobStatus, StatusUpdate, TracingJobStatus};
pub use store::{ensure_embedding_dimension, postgres::PgVectorStore, KnowledgeStore};
pub use types::{
    Article, ArticleSection, ChunkType, Conversation, DialogueTurn, InformationTable, Outline,
    OutlineNode, Passage, Persona, Provenance,
};
