//! # Embedding Client
//!
//! Generates query and snippet embeddings by calling an external
//! embeddings API. Both OpenAI-compatible and Gemini batch endpoints are
//! supported; the payload shape is picked from the URL.
//!
//! The embedding dimension is part of the deployment contract: it must
//! match the corpus vectors, and the store asserts that at startup.

use crate::errors::LmError;
use reqwest::Client as ReqwestClient;
use serde::{Deserialize, Serialize};
use tracing::debug;

// --- OpenAI-compatible request and response structures ---

#[derive(Serialize, Debug)]
struct OpenAiEmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
}

#[derive(Deserialize, Debug)]
struct OpenAiEmbeddingResponse {
    data: Vec<OpenAiEmbeddingData>,
}

#[derive(Deserialize, Debug)]
struct OpenAiEmbeddingData {
    embedding: Vec<f32>,
}

// --- Gemini-specific request and response structures ---

#[derive(Serialize, Debug)]
struct GeminiBatchEmbeddingRequest<'a> {
    requests: Vec<GeminiEmbeddingRequest<'a>>,
}

#[derive(Serialize, Debug)]
struct GeminiEmbeddingRequest<'a> {
    model: String,
    content: GeminiEmbeddingContent<'a>,
}

#[derive(Serialize, Debug)]
struct GeminiEmbeddingContent<'a> {
    parts: Vec<GeminiEmbeddingPart<'a>>,
}

#[derive(Serialize, Debug)]
struct GeminiEmbeddingPart<'a> {
    text: &'a str,
}

#[derive(Deserialize, Debug)]
struct GeminiBatchEmbeddingResponse {
    embeddings: Vec<GeminiEmbeddingValue>,
}

#[derive(Deserialize, Debug)]
struct GeminiEmbeddingValue {
    values: Vec<f32>,
}

/// A client for an external embeddings API with a fixed output dimension.
#[derive(Debug, Clone)]
pub struct EmbeddingClient {
    client: ReqwestClient,
    api_url: String,
    model: String,
    api_key: Option<String>,
    dimension: usize,
}

impl EmbeddingClient {
    pub fn new(
        api_url: String,
        model: String,
        api_key: Option<String>,
        dimension: usize,
    ) -> Result<Self, LmError> {
        let client = ReqwestClient::builder()
            .build()
            .map_err(LmError::ClientBuild)?;
        Ok(Self {
            client,
            api_url,
            model,
            api_key,
            dimension,
        })
    }

    /// The configured output dimension, validated against the store at startup.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Embeds a single text.
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>, LmError> {
        let mut vectors = self.embed_batch(&[text]).await?;
        vectors
            .pop()
            .ok_or_else(|| LmError::Api {
                status: 200,
                body: "embeddings API returned no vectors".to_string(),
            })
    }

    /// Embeds a batch of texts, preserving input order.
    pub async fn embed_batch(&self, inputs: &[&str]) -> Result<Vec<Vec<f32>>, LmError> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }

        // The Gemini batch endpoint differs from the single-shot one.
        let final_api_url = if self.api_url.ends_with(":embedContent") {
            self.api_url.replace(":embedContent", ":batchEmbedContents")
        } else {
            self.api_url.clone()
        };
        let is_gemini = final_api_url.contains("generativelanguage.googleapis.com");
        let mut request_builder = self.client.post(&final_api_url);

        if is_gemini {
            let gemini_model_name = if self.model.starts_with("models/") {
                self.model.clone()
            } else {
                format!("models/{}", self.model)
            };
            let requests = inputs
                .iter()
                .map(|&text| GeminiEmbeddingRequest {
                    model: gemini_model_name.clone(),
                    content: GeminiEmbeddingContent {
                        parts: vec![GeminiEmbeddingPart { text }],
                    },
                })
                .collect();
            debug!(
                batch = inputs.len(),
                "--> Sending batch request to Gemini embeddings API"
            );
            request_builder = request_builder.json(&GeminiBatchEmbeddingRequest { requests });
            if let Some(key) = &self.api_key {
                request_builder = request_builder.header("x-goog-api-key", key);
            }
        } else {
            debug!(
                batch = inputs.len(),
                "--> Sending batch request to OpenAI-compatible embeddings API"
            );
            request_builder = request_builder.json(&OpenAiEmbeddingRequest {
                model: &self.model,
                input: inputs,
            });
            if let Some(key) = &self.api_key {
                request_builder = request_builder.bearer_auth(key);
            }
        }

        let response = request_builder.send().await.map_err(LmError::Request)?;
        let status = response.status();
        let response_text = response.text().await.unwrap_or_default();
        if !status.is_success() {
            if status.as_u16() == 429 {
                return Err(LmError::RateLimited(response_text));
            }
            return Err(LmError::Api {
                status: status.as_u16(),
                body: response_text,
            });
        }

        let vectors = if is_gemini {
            let parsed: GeminiBatchEmbeddingResponse = serde_json::from_str(&response_text)
                .map_err(|e| LmError::Api {
                    status: status.as_u16(),
                    body: format!("embedding deserialization error: {e}"),
                })?;
            parsed.embeddings.into_iter().map(|e| e.values).collect()
        } else {
            let parsed: OpenAiEmbeddingResponse =
                serde_json::from_str(&response_text).map_err(|e| LmError::Api {
                    status: status.as_u16(),
                    body: format!("embedding deserialization error: {e}"),
                })?;
            let mut data: Vec<Vec<f32>> =
                parsed.data.into_iter().map(|d| d.embedding).collect();
            data.truncate(inputs.len());
            data
        };

        debug!(vectors = vectors.len(), "<-- Received embeddings");
        Ok(vectors)
    }
}

/// Cosine similarity between two vectors of equal dimension.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += f64::from(*x) * f64::from(*y);
        norm_a += f64::from(*x) * f64::from(*x);
        norm_b += f64::from(*y) * f64::from(*y);
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}
