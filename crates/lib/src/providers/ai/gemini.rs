//! # Gemini Provider
//!
//! Calls the Gemini `generateContent` REST endpoint. Safety settings are
//! forced open for every harm category: the corpus is corporate and
//! financial text, and default thresholds intermittently block passages
//! quoting filings. A response whose candidates were filtered resolves to
//! an empty string, never an error.

use super::{approximate_tokens, LanguageModel, LmUsage, UsageCounter};
use crate::errors::LmError;
use async_trait::async_trait;
use reqwest::Client as ReqwestClient;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use tracing::{debug, warn};

// --- Gemini-specific request and response structures ---

#[derive(Serialize)]
struct GeminiRequest<'a> {
    contents: Vec<Content<'a>>,
    #[serde(rename = "systemInstruction", skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content<'a>>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
    #[serde(rename = "safetySettings")]
    safety_settings: Vec<SafetySetting>,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct GenerationConfig {
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
    temperature: f32,
}

#[derive(Serialize)]
struct SafetySetting {
    category: &'static str,
    threshold: &'static str,
}

const OPEN_SAFETY_CATEGORIES: [&str; 4] = [
    "HARM_CATEGORY_HARASSMENT",
    "HARM_CATEGORY_HATE_SPEECH",
    "HARM_CATEGORY_SEXUALLY_EXPLICIT",
    "HARM_CATEGORY_DANGEROUS_CONTENT",
];

#[derive(Deserialize, Debug)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(rename = "usageMetadata")]
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Deserialize, Debug)]
struct Candidate {
    content: Option<ContentResponse>,
    #[serde(rename = "finishReason")]
    finish_reason: Option<String>,
}

#[derive(Deserialize, Debug)]
struct ContentResponse {
    #[serde(default)]
    parts: Vec<PartResponse>,
}

#[derive(Deserialize, Debug)]
struct PartResponse {
    #[serde(default)]
    text: String,
}

#[derive(Deserialize, Debug)]
struct UsageMetadata {
    #[serde(rename = "promptTokenCount", default)]
    prompt_token_count: u64,
    #[serde(rename = "candidatesTokenCount", default)]
    candidates_token_count: u64,
}

// --- Gemini Provider implementation ---

/// A provider for the Google Gemini API.
#[derive(Clone, Debug)]
pub struct GeminiProvider {
    client: ReqwestClient,
    api_url: String,
    api_key: String,
    max_output_tokens: u32,
    usage: UsageCounter,
}

impl GeminiProvider {
    /// Creates a new `GeminiProvider` targeting a `generateContent` URL.
    pub fn new(api_url: String, api_key: String, max_output_tokens: u32) -> Result<Self, LmError> {
        let client = ReqwestClient::builder()
            .build()
            .map_err(LmError::ClientBuild)?;
        Ok(Self {
            client,
            api_url,
            api_key,
            max_output_tokens,
            usage: UsageCounter::new(),
        })
    }
}

#[async_trait]
impl LanguageModel for GeminiProvider {
    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String, LmError> {
        let request_body = GeminiRequest {
            contents: vec![Content {
                parts: vec![Part { text: user_prompt }],
            }],
            system_instruction: (!system_prompt.is_empty()).then(|| Content {
                parts: vec![Part {
                    text: system_prompt,
                }],
            }),
            generation_config: GenerationConfig {
                max_output_tokens: self.max_output_tokens,
                temperature: 1.0,
            },
            safety_settings: OPEN_SAFETY_CATEGORIES
                .into_iter()
                .map(|category| SafetySetting {
                    category,
                    threshold: "BLOCK_NONE",
                })
                .collect(),
        };

        debug!("--> Sending request to Gemini: {}", self.api_url);
        let response = self
            .client
            .post(&self.api_url)
            .query(&[("key", &self.api_key)])
            .json(&request_body)
            .send()
            .await
            .map_err(LmError::Request)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            if status.as_u16() == 429 {
                return Err(LmError::RateLimited(body));
            }
            return Err(LmError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let gemini_response: GeminiResponse =
            response.json().await.map_err(LmError::Deserialization)?;

        if let Some(usage) = &gemini_response.usage_metadata {
            self.usage
                .record(usage.prompt_token_count, usage.candidates_token_count);
        } else {
            self.usage.record(
                approximate_tokens(system_prompt) + approximate_tokens(user_prompt),
                0,
            );
        }

        // Safety-filtered or truncated-empty responses degrade to "".
        let text = gemini_response
            .candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .and_then(|content| content.parts.first())
            .map(|part| part.text.clone())
            .unwrap_or_default();

        if text.is_empty() {
            let reason = gemini_response
                .candidates
                .first()
                .and_then(|c| c.finish_reason.clone())
                .unwrap_or_else(|| "no candidates".to_string());
            warn!("<-- Gemini returned no text (finish reason: {reason})");
        } else {
            debug!("<-- Gemini response: {} chars", text.len());
        }

        Ok(text)
    }

    fn usage(&self) -> LmUsage {
        self.usage.snapshot()
    }

    fn reset_usage(&self) {
        self.usage.reset()
    }
}
