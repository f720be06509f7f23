//! # Knowledge Store
//!
//! Read-only access to the ingested corpus. The pipeline never writes to
//! the store; it only runs vector searches, fetches adjacent chunks for
//! table context, and loads the company alias registry.

pub mod postgres;

use crate::errors::StoreError;
use crate::providers::ai::EmbeddingClient;
use crate::types::ChunkType;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use tracing::info;

/// One corpus chunk joined with its report and company.
#[derive(Debug, Clone)]
pub struct ChunkRow {
    pub id: i64,
    pub report_id: i64,
    pub sequence_order: i32,
    pub chunk_type: ChunkType,
    pub section_path: String,
    pub raw_content: String,
    pub metadata: serde_json::Value,
    /// Company name resolved through the report JOIN, never from chunk
    /// metadata (which may be absent for bulk-ingested data).
    pub company_name: String,
    /// Cosine similarity against the query, when produced by a search.
    pub similarity: f64,
}

impl ChunkRow {
    /// Whether the ingestion flagged this chunk's units/base-dates as
    /// merged into adjacent context.
    pub fn has_merged_meta(&self) -> bool {
        self.metadata
            .get("has_merged_meta")
            .and_then(|value| value.as_bool())
            .unwrap_or(false)
    }
}

/// Read-only corpus interface backing the internal retriever.
#[async_trait]
pub trait KnowledgeStore: Send + Sync {
    /// Top-`k` chunks by cosine similarity, excluding `noise_merged`
    /// chunks and any chunk whose stable URL is in `exclude_urls`.
    async fn vector_search(
        &self,
        query_embedding: &[f32],
        k: usize,
        exclude_urls: &HashSet<String>,
    ) -> Result<Vec<ChunkRow>, StoreError>;

    /// Chunks of the same report within `window` positions of
    /// `sequence_order`, in document order, the anchor excluded.
    async fn fetch_adjacent(
        &self,
        report_id: i64,
        sequence_order: i32,
        window: i32,
    ) -> Result<Vec<ChunkRow>, StoreError>;

    /// Canonical company name to alias list, for entity-aware reranking.
    async fn company_aliases(&self) -> Result<HashMap<String, Vec<String>>, StoreError>;

    /// Dimension of the stored embedding vectors.
    async fn embedding_dimension(&self) -> Result<usize, StoreError>;
}

/// Fails fast when the configured embedder and the corpus disagree on
/// vector dimension. Changing embedding providers requires re-embedding
/// the corpus, so a mismatch is a deployment error, not a runtime one.
pub async fn ensure_embedding_dimension(
    store: &dyn KnowledgeStore,
    embedder: &EmbeddingClient,
) -> Result<(), StoreError> {
    let store_dimension = store.embedding_dimension().await?;
    if store_dimension != embedder.dimension() {
        return Err(StoreError::DimensionMismatch {
            store: store_dimension,
            embedder: embedder.dimension(),
        });
    }
    info!("Embedding dimension check passed ({store_dimension})");
    Ok(())
}
