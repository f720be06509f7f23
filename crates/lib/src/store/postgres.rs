//! # Postgres/pgvector Store
//!
//! The production `KnowledgeStore`: DART filing chunks in
//! `source_materials`, joined through `analysis_reports` to `companies`,
//! with pgvector cosine similarity over the `embedding` column.

use super::{ChunkRow, KnowledgeStore};
use crate::errors::StoreError;
use crate::types::ChunkType;
use async_trait::async_trait;
use pgvector::Vector;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use std::collections::{HashMap, HashSet};
use tracing::debug;

const CHUNK_COLUMNS: &str = "sm.id, sm.report_id, sm.sequence_order, sm.chunk_type, \
     sm.section_path, sm.raw_content, sm.metadata, c.name AS company_name";

/// `KnowledgeStore` backed by a Postgres connection pool.
#[derive(Debug, Clone)]
pub struct PgVectorStore {
    pool: PgPool,
}

impl PgVectorStore {
    /// Connects a new pool to `database_url`.
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    /// Wraps an existing pool (shared with other process components).
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_chunk(row: &sqlx::postgres::PgRow, similarity: f64) -> Result<ChunkRow, sqlx::Error> {
        let chunk_type: String = row.try_get("chunk_type")?;
        Ok(ChunkRow {
            id: row.try_get("id")?,
            report_id: row.try_get("report_id")?,
            sequence_order: row.try_get("sequence_order")?,
            chunk_type: ChunkType::from_db(&chunk_type),
            section_path: row.try_get("section_path")?,
            raw_content: row.try_get("raw_content")?,
            metadata: row
                .try_get::<Option<serde_json::Value>, _>("metadata")?
                .unwrap_or(serde_json::Value::Null),
            company_name: row.try_get("company_name")?,
            similarity,
        })
    }
}

/// Chunk ids recovered from internal passage URLs. Web URLs in the
/// exclusion set are ignored here; they never match an internal row.
fn internal_chunk_ids(exclude_urls: &HashSet<String>) -> Vec<i64> {
    exclude_urls
        .iter()
        .filter_map(|url| {
            let rest = url.strip_prefix("dart_report_")?;
            let (_, chunk) = rest.split_once("_chunk_")?;
            chunk.parse::<i64>().ok()
        })
        .collect()
}

#[async_trait]
impl KnowledgeStore for PgVectorStore {
    async fn vector_search(
        &self,
        query_embedding: &[f32],
        k: usize,
        exclude_urls: &HashSet<String>,
    ) -> Result<Vec<ChunkRow>, StoreError> {
        let excluded_ids = internal_chunk_ids(exclude_urls);
        let embedding = Vector::from(query_embedding.to_vec());

        let sql = format!(
            "SELECT {CHUNK_COLUMNS}, 1 - (sm.embedding <=> $1) AS similarity
             FROM source_materials sm
             JOIN analysis_reports ar ON ar.id = sm.report_id
             JOIN companies c ON c.id = ar.company_id
             WHERE sm.embedding IS NOT NULL
               AND sm.chunk_type <> 'noise_merged'
               AND NOT (sm.id = ANY($2))
             ORDER BY sm.embedding <=> $1
             LIMIT $3"
        );

        debug!(k, excluded = excluded_ids.len(), "Executing vector search");
        let rows = sqlx::query(&sql)
            .bind(&embedding)
            .bind(&excluded_ids)
            .bind(k as i64)
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| {
                let similarity: f64 = row.try_get("similarity")?;
                Self::row_to_chunk(row, similarity)
            })
            .collect::<Result<Vec<_>, _>>()
            .map_err(StoreError::from)
    }

    async fn fetch_adjacent(
        &self,
        report_id: i64,
        sequence_order: i32,
        window: i32,
    ) -> Result<Vec<ChunkRow>, StoreError> {
        let sql = format!(
            "SELECT {CHUNK_COLUMNS}
             FROM source_materials sm
             JOIN analysis_reports ar ON ar.id = sm.report_id
             JOIN companies c ON c.id = ar.company_id
             WHERE sm.report_id = $1
               AND sm.sequence_order BETWEEN $2 - $3 AND $2 + $3
               AND sm.sequence_order <> $2
               AND sm.chunk_type <> 'noise_merged'
             ORDER BY sm.sequence_order ASC"
        );

        let rows = sqlx::query(&sql)
            .bind(report_id)
            .bind(sequence_order)
            .bind(window)
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| Self::row_to_chunk(row, 0.0))
            .collect::<Result<Vec<_>, _>>()
            .map_err(StoreError::from)
    }

    async fn company_aliases(&self) -> Result<HashMap<String, Vec<String>>, StoreError> {
        let rows = sqlx::query("SELECT name, COALESCE(aliases, '{}') AS aliases FROM companies")
            .fetch_all(&self.pool)
            .await?;

        let mut registry = HashMap::new();
        for row in rows {
            let name: String = row.try_get("name").map_err(StoreError::from)?;
            let mut aliases: Vec<String> = row.try_get("aliases").map_err(StoreError::from)?;
            // The canonical name is always its own alias.
            if !aliases.contains(&name) {
                aliases.insert(0, name.clone());
            }
            registry.insert(name, aliases);
        }
        Ok(registry)
    }

    async fn embedding_dimension(&self) -> Result<usize, StoreError> {
        let dimension: Option<i32> = sqlx::query_scalar(
            "SELECT vector_dims(embedding)
             FROM source_materials
             WHERE embedding IS NOT NULL
             LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;

        match dimension {
            Some(d) if d > 0 => Ok(d as usize),
            _ => Err(StoreError::Config(
                "cannot determine embedding dimension: corpus has no embedded chunks".to_string(),
            )),
        }
    }
}
