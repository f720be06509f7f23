//! # dartwiki-test-utils
//!
//! Shared scaffolding for integration tests: a scripted language model,
//! an in-memory knowledge store, a deterministic embedding scheme (used
//! by both fixtures and the mock embeddings server so queries and chunks
//! live in one vector space), and in-memory sink/status collectors.

use async_trait::async_trait;
use dartwiki::errors::{LmError, PipelineError, RetrievalError, StoreError};
use dartwiki::providers::ai::LanguageModel;
use dartwiki::retrieval::{Retriever, WebSearchProvider, WebSearchResult};
use dartwiki::sink::ReportSink;
use dartwiki::status::{JobStatus, StatusUpdate};
use dartwiki::store::{ChunkRow, KnowledgeStore};
use dartwiki::types::{ChunkType, Passage};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

// --- Scripted language model ---

/// A mock language model keyed on system-prompt substrings.
///
/// Each key holds a queue of responses consumed in order; when a queue is
/// down to one response it repeats. Calls with no matching key return the
/// configured default, or an error when none is set.
#[derive(Clone, Debug, Default)]
pub struct ScriptedLm {
    responses: Arc<Mutex<HashMap<String, VecDeque<String>>>>,
    default_response: Arc<Mutex<Option<String>>>,
    calls: Arc<Mutex<Vec<(String, String)>>>,
}

impl ScriptedLm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-programs a single response for any system prompt containing `key`.
    pub fn add_response(&self, key: &str, response: &str) {
        self.add_sequence(key, &[response]);
    }

    /// Pre-programs a sequence of responses, consumed call by call. The
    /// final response repeats once the rest are exhausted.
    pub fn add_sequence(&self, key: &str, responses: &[&str]) {
        let mut map = self.responses.lock().unwrap();
        map.insert(
            key.to_string(),
            responses.iter().map(|r| r.to_string()).collect(),
        );
    }

    /// A fallback for calls that match no key.
    pub fn set_default_response(&self, response: &str) {
        *self.default_response.lock().unwrap() = Some(response.to_string());
    }

    /// All recorded `(system_prompt, user_prompt)` calls.
    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl LanguageModel for ScriptedLm {
    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String, LmError> {
        self.calls
            .lock()
            .unwrap()
            .push((system_prompt.to_string(), user_prompt.to_string()));

        let mut responses = self.responses.lock().unwrap();
        for (key, queue) in responses.iter_mut() {
            if system_prompt.contains(key.as_str()) {
                let response = if queue.len() > 1 {
                    queue.pop_front().unwrap_or_default()
                } else {
                    queue.front().cloned().unwrap_or_default()
                };
                return Ok(response);
            }
        }
        drop(responses);

        if let Some(default) = self.default_response.lock().unwrap().clone() {
            return Ok(default);
        }
        Err(LmError::Api {
            status: 500,
            body: format!("ScriptedLm: no response programmed for system prompt: {system_prompt}"),
        })
    }
}

// --- Deterministic embeddings ---

/// A deterministic hashed bag-of-words embedding.
///
/// Word overlap between two texts produces cosine similarity, which is
/// all the retrieval tests need. The same function backs fixture chunks
/// and the mock embeddings server, so query and corpus vectors are
/// comparable.
pub fn deterministic_embedding(text: &str, dimension: usize) -> Vec<f32> {
    let mut vector = vec![0.0f32; dimension.max(1)];
    for word in text.split_whitespace() {
        let mut hash: u64 = 1469598103934665603;
        for byte in word.as_bytes() {
            hash ^= u64::from(*byte);
            hash = hash.wrapping_mul(1099511628211);
        }
        let idx = (hash % vector.len() as u64) as usize;
        vector[idx] += 1.0;
    }
    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in &mut vector {
            *v /= norm;
        }
    }
    vector
}

/// Wiremock responder emulating an OpenAI-compatible embeddings endpoint
/// with `deterministic_embedding`.
pub struct EmbeddingResponder {
    pub dimension: usize,
}

impl Respond for EmbeddingResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let body: serde_json::Value = match serde_json::from_slice(&request.body) {
            Ok(body) => body,
            Err(_) => return ResponseTemplate::new(400),
        };
        let inputs: Vec<String> = body
            .get("input")
            .and_then(|input| input.as_array())
            .map(|array| {
                array
                    .iter()
                    .filter_map(|value| value.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();

        let data: Vec<serde_json::Value> = inputs
            .iter()
            .map(|text| {
                serde_json::json!({
                    "embedding": deterministic_embedding(text, self.dimension)
                })
            })
            .collect();
        ResponseTemplate::new(200).set_body_json(serde_json::json!({ "data": data }))
    }
}

/// Starts a mock embeddings server answering every POST with
/// deterministic vectors of the given dimension.
pub async fn start_embedding_server(dimension: usize) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(wiremock::matchers::method("POST"))
        .respond_with(EmbeddingResponder { dimension })
        .mount(&server)
        .await;
    server
}

// --- In-memory knowledge store ---

/// An in-memory `KnowledgeStore` with a fixture corpus.
#[derive(Debug, Default)]
pub struct MemoryStore {
    chunks: Vec<StoredChunk>,
    aliases: HashMap<String, Vec<String>>,
    dimension: usize,
}

#[derive(Debug, Clone)]
struct StoredChunk {
    row: ChunkRow,
    embedding: Vec<f32>,
}

impl MemoryStore {
    pub fn new(dimension: usize) -> Self {
        Self {
            chunks: Vec::new(),
            aliases: HashMap::new(),
            dimension,
        }
    }

    /// Registers a company with its aliases.
    pub fn add_company(&mut self, name: &str, aliases: &[&str]) {
        let mut all: Vec<String> = vec![name.to_string()];
        all.extend(aliases.iter().map(|a| a.to_string()));
        self.aliases.insert(name.to_string(), all);
    }

    /// Adds a chunk whose embedding is derived from its content.
    #[allow(clippy::too_many_arguments)]
    pub fn add_chunk(
        &mut self,
        id: i64,
        report_id: i64,
        sequence_order: i32,
        chunk_type: &str,
        section_path: &str,
        raw_content: &str,
        company_name: &str,
        metadata: serde_json::Value,
    ) {
        let embedding = deterministic_embedding(raw_content, self.dimension);
        self.chunks.push(StoredChunk {
            row: ChunkRow {
                id,
                report_id,
                sequence_order,
                chunk_type: ChunkType::from_db(chunk_type),
                section_path: section_path.to_string(),
                raw_content: raw_content.to_string(),
                metadata,
                company_name: company_name.to_string(),
                similarity: 0.0,
            },
            embedding,
        });
    }
}

fn cosine(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f64 = a.iter().zip(b).map(|(x, y)| f64::from(*x) * f64::from(*y)).sum();
    let norm_a: f64 = a.iter().map(|x| f64::from(*x) * f64::from(*x)).sum::<f64>().sqrt();
    let norm_b: f64 = b.iter().map(|y| f64::from(*y) * f64::from(*y)).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

#[async_trait]
impl KnowledgeStore for MemoryStore {
    async fn vector_search(
        &self,
        query_embedding: &[f32],
        k: usize,
        exclude_urls: &HashSet<String>,
    ) -> Result<Vec<ChunkRow>, StoreError> {
        let mut scored: Vec<ChunkRow> = self
            .chunks
            .iter()
            .filter(|chunk| chunk.row.chunk_type != ChunkType::NoiseMerged)
            .filter(|chunk| {
                let url = format!(
                    "dart_report_{}_chunk_{}",
                    chunk.row.report_id, chunk.row.id
                );
                !exclude_urls.contains(&url)
            })
            .map(|chunk| {
                let mut row = chunk.row.clone();
                row.similarity = cosine(query_embedding, &chunk.embedding);
                row
            })
            .collect();
        scored.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(k);
        Ok(scored)
    }

    async fn fetch_adjacent(
        &self,
        report_id: i64,
        sequence_order: i32,
        window: i32,
    ) -> Result<Vec<ChunkRow>, StoreError> {
        let mut rows: Vec<ChunkRow> = self
            .chunks
            .iter()
            .filter(|chunk| {
                chunk.row.report_id == report_id
                    && chunk.row.sequence_order != sequence_order
                    && (chunk.row.sequence_order - sequence_order).abs() <= window
                    && chunk.row.chunk_type != ChunkType::NoiseMerged
            })
            .map(|chunk| chunk.row.clone())
            .collect();
        rows.sort_by_key(|row| row.sequence_order);
        Ok(rows)
    }

    async fn company_aliases(&self) -> Result<HashMap<String, Vec<String>>, StoreError> {
        Ok(self.aliases.clone())
    }

    async fn embedding_dimension(&self) -> Result<usize, StoreError> {
        Ok(self.dimension)
    }
}

// --- Sink and status collectors ---

/// A `ReportSink` retaining artifacts in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    artifacts: Arc<Mutex<HashMap<(String, String), String>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, job_id: &str, name: &str) -> Option<String> {
        self.artifacts
            .lock()
            .unwrap()
            .get(&(job_id.to_string(), name.to_string()))
            .cloned()
    }

    pub fn names(&self, job_id: &str) -> Vec<String> {
        let mut names: Vec<String> = self
            .artifacts
            .lock()
            .unwrap()
            .keys()
            .filter(|(job, _)| job == job_id)
            .map(|(_, name)| name.clone())
            .collect();
        names.sort();
        names
    }
}

#[async_trait]
impl ReportSink for MemorySink {
    async fn write(&self, job_id: &str, name: &str, content: &str) -> Result<(), PipelineError> {
        self.artifacts
            .lock()
            .unwrap()
            .insert((job_id.to_string(), name.to_string()), content.to_string());
        Ok(())
    }
}

// --- Retrieval fixtures ---

/// A `Retriever` returning a fixed passage list, minus excluded URLs.
#[derive(Debug, Clone, Default)]
pub struct FixedRetriever {
    passages: Vec<Passage>,
    calls: Arc<Mutex<Vec<Vec<String>>>>,
}

impl FixedRetriever {
    pub fn new(passages: Vec<Passage>) -> Self {
        Self {
            passages,
            calls: Arc::default(),
        }
    }

    /// The query batches the pipeline actually issued.
    pub fn query_batches(&self) -> Vec<Vec<String>> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Retriever for FixedRetriever {
    async fn retrieve(
        &self,
        queries: &[String],
        exclude_urls: &HashSet<String>,
        k: usize,
    ) -> Vec<Passage> {
        self.calls.lock().unwrap().push(queries.to_vec());
        self.passages
            .iter()
            .filter(|passage| !exclude_urls.contains(&passage.url))
            .take(k * queries.len().max(1))
            .cloned()
            .collect()
    }
}

/// A `WebSearchProvider` returning fixed results, or an error.
#[derive(Debug, Clone, Default)]
pub struct FixedWebSearch {
    results: Vec<WebSearchResult>,
    fail: bool,
}

impl FixedWebSearch {
    pub fn new(results: Vec<WebSearchResult>) -> Self {
        Self {
            results,
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            results: Vec::new(),
            fail: true,
        }
    }
}

#[async_trait]
impl WebSearchProvider for FixedWebSearch {
    async fn search(
        &self,
        _query: &str,
        top_k: usize,
        exclude_urls: &HashSet<String>,
    ) -> Result<Vec<WebSearchResult>, RetrievalError> {
        if self.fail {
            return Err(RetrievalError::Web("backend down".to_string()));
        }
        Ok(self
            .results
            .iter()
            .filter(|result| !exclude_urls.contains(&result.url))
            .take(top_k)
            .cloned()
            .collect())
    }
}

/// A `JobStatus` retaining updates in memory.
#[derive(Debug, Clone, Default)]
pub struct VecStatus {
    updates: Arc<Mutex<Vec<(String, StatusUpdate)>>>,
}

impl VecStatus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn updates(&self) -> Vec<(String, StatusUpdate)> {
        self.updates.lock().unwrap().clone()
    }
}

#[async_trait]
impl JobStatus for VecStatus {
    async fn publish(&self, job_id: &str, update: StatusUpdate) {
        self.updates
            .lock()
            .unwrap()
            .push((job_id.to_string(), update));
    }
}
