//! # Internal Retriever
//!
//! Vector search over the DART corpus with the post-processing that makes
//! raw chunks usable as evidence: sliding-window context assembly for
//! tables, stable URL assignment, entity-aware reranking, and source
//! tagging.

use super::rerank::{rerank_by_entity, AliasRegistry, RerankWeights};
use super::tagger::tag_passage;
use crate::config::PipelineConfig;
use crate::errors::RetrievalError;
use crate::providers::ai::EmbeddingClient;
use crate::store::{ChunkRow, KnowledgeStore};
use crate::types::{ChunkType, Passage, Provenance};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

/// The note prepended to table passages whose units/base-dates were merged
/// into adjacent chunks during ingestion.
pub const MERGED_META_NOTE: &str =
    "[Note: merged meta info — consult adjacent context for units/base-dates.]";

/// Retriever over the internal Postgres/pgvector corpus.
pub struct InternalRetriever {
    store: Arc<dyn KnowledgeStore>,
    embedder: EmbeddingClient,
    aliases: AliasRegistry,
    weights: RerankWeights,
    window_size: i32,
    window_expand_factor: usize,
}

impl InternalRetriever {
    /// Builds the retriever, loading the company alias registry once.
    pub async fn new(
        store: Arc<dyn KnowledgeStore>,
        embedder: EmbeddingClient,
        config: &PipelineConfig,
    ) -> Result<Self, RetrievalError> {
        let aliases = store.company_aliases().await?;
        Ok(Self {
            store,
            embedder,
            aliases,
            weights: RerankWeights {
                boost_multiplier: config.boost_multiplier,
                penalty_multiplier: config.penalty_multiplier,
                drop_unmatched_tables: config.drop_unmatched_tables,
            },
            window_size: config.window_size,
            window_expand_factor: config.window_expand_factor.max(1),
        })
    }

    /// Top-`k` passages for one query.
    pub async fn search(
        &self,
        query: &str,
        exclude_urls: &HashSet<String>,
        k: usize,
    ) -> Result<Vec<Passage>, RetrievalError> {
        if k == 0 {
            return Ok(Vec::new());
        }
        let embedding = self.embedder.embed(query).await?;

        // Over-fetch so reranking has candidates to drop.
        let candidate_count = k * self.window_expand_factor;
        let rows = self
            .store
            .vector_search(&embedding, candidate_count, exclude_urls)
            .await?;
        debug!(
            query,
            candidates = rows.len(),
            "Internal vector search returned candidates"
        );

        let mut passages = Vec::with_capacity(rows.len());
        for row in rows {
            passages.push(self.assemble_passage(row).await?);
        }

        let mut reranked = rerank_by_entity(query, passages, &self.aliases, self.weights);
        reranked.truncate(k);
        Ok(reranked.into_iter().map(tag_passage).collect())
    }

    /// Turns a store row into a passage, restoring adjacent context for
    /// table chunks so units, base dates, and legends survive chunking.
    async fn assemble_passage(&self, row: ChunkRow) -> Result<Passage, RetrievalError> {
        let content = if row.chunk_type == ChunkType::Table {
            let adjacent = self
                .store
                .fetch_adjacent(row.report_id, row.sequence_order, self.window_size)
                .await?;
            compose_table_context(&row, &adjacent)
        } else {
            row.raw_content.clone()
        };

        Ok(Passage {
            url: Passage::internal_url(row.report_id, row.id),
            title: row.section_path.clone(),
            snippets: vec![content],
            description: String::new(),
            score: row.similarity,
            source_tag: String::new(),
            provenance: Some(Provenance {
                chunk_id: row.id,
                report_id: row.report_id,
                has_merged_meta: row.has_merged_meta(),
                company_name: row.company_name,
                chunk_type: row.chunk_type,
                sequence_order: row.sequence_order,
            }),
        })
    }
}

/// `[Previous context] .. [Table] .. [Next context]` assembly, with the
/// merged-meta note in front when the ingestion flagged the row.
fn compose_table_context(row: &ChunkRow, adjacent: &[ChunkRow]) -> String {
    let previous: Vec<&str> = adjacent
        .iter()
        .filter(|a| a.sequence_order < row.sequence_order)
        .map(|a| a.raw_content.as_str())
        .collect();
    let next: Vec<&str> = adjacent
        .iter()
        .filter(|a| a.sequence_order > row.sequence_order)
        .map(|a| a.raw_content.as_str())
        .collect();

    let mut content = format!(
        "[Previous context] {} [Table] {} [Next context] {}",
        previous.join(" "),
        row.raw_content,
        next.join(" "),
    );
    if row.has_merged_meta() {
        content = format!("{MERGED_META_NOTE}\n{content}");
    }
    content
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(sequence_order: i32, chunk_type: ChunkType, content: &str) -> ChunkRow {
        ChunkRow {
            id: 100 + i64::from(sequence_order),
            report_id: 7,
            sequence_order,
            chunk_type,
            section_path: "재무에 관한 사항".to_string(),
            raw_content: content.to_string(),
            metadata: json!({}),
            company_name: "SK하이닉스".to_string(),
            similarity: 0.9,
        }
    }

    #[test]
    fn table_context_wraps_previous_and_next() {
        let table = row(5, ChunkType::Table, "| 매출 | 50조 |");
        let adjacent = vec![
            row(4, ChunkType::Text, "단위: 십억원"),
            row(6, ChunkType::Text, "전년 대비 증가"),
        ];
        let content = compose_table_context(&table, &adjacent);
        assert_eq!(
            content,
            "[Previous context] 단위: 십억원 [Table] | 매출 | 50조 | [Next context] 전년 대비 증가"
        );
    }

    #[test]
    fn merged_meta_note_comes_first() {
        let mut table = row(5, ChunkType::Table, "| 매출 | 50조 |");
        table.metadata = json!({"has_merged_meta": true});
        let content = compose_table_context(&table, &[]);
        assert!(content.starts_with(MERGED_META_NOTE));
        assert!(content.contains("[Previous context]"));
    }
}
