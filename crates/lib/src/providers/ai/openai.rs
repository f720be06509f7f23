//! # OpenAI-Compatible Provider
//!
//! Targets any `/chat/completions` endpoint: a hosted service or a local
//! server. Used when a deployment prefers self-hosted models for some or
//! all pipeline roles.

use super::{approximate_tokens, LanguageModel, LmUsage, UsageCounter};
use crate::errors::LmError;
use async_trait::async_trait;
use reqwest::Client as ReqwestClient;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use tracing::debug;

// --- OpenAI-compatible request and response structures ---

#[derive(Serialize, Debug)]
struct ChatRequest<'a> {
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
    temperature: f32,
    max_tokens: u32,
    stream: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Deserialize, Debug)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
}

#[derive(Deserialize, Debug)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize, Debug)]
struct ChatUsage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

// --- Provider implementation ---

/// A provider for OpenAI-compatible chat completion APIs.
#[derive(Clone, Debug)]
pub struct OpenAiCompatProvider {
    client: ReqwestClient,
    api_url: String,
    api_key: Option<String>,
    model: Option<String>,
    max_output_tokens: u32,
    usage: UsageCounter,
}

impl OpenAiCompatProvider {
    /// Creates a new provider. `api_key` and `model` are optional for
    /// local servers that ignore them.
    pub fn new(
        api_url: String,
        api_key: Option<String>,
        model: Option<String>,
        max_output_tokens: u32,
    ) -> Result<Self, LmError> {
        let client = ReqwestClient::builder()
            .build()
            .map_err(LmError::ClientBuild)?;
        Ok(Self {
            client,
            api_url,
            api_key,
            model,
            max_output_tokens,
            usage: UsageCounter::new(),
        })
    }
}

#[async_trait]
impl LanguageModel for OpenAiCompatProvider {
    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String, LmError> {
        let mut messages = Vec::with_capacity(2);
        if !system_prompt.is_empty() {
            messages.push(ChatMessage {
                role: "system".to_string(),
                content: system_prompt.to_string(),
            });
        }
        messages.push(ChatMessage {
            role: "user".to_string(),
            content: user_prompt.to_string(),
        });

        let request_body = ChatRequest {
            messages,
            model: self.model.as_deref(),
            temperature: 1.0,
            max_tokens: self.max_output_tokens,
            stream: false,
        };

        debug!("--> Sending request to chat API: {}", self.api_url);
        let mut request_builder = self.client.post(&self.api_url);
        if let Some(key) = &self.api_key {
            request_builder = request_builder.bearer_auth(key);
        }

        let response = request_builder
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

        let chat_response: ChatResponse =
            response.json().await.map_err(LmError::Deserialization)?;

        let text = chat_response
            .choices
            .first()
            .map(|choice| choice.message.content.clone())
            .unwrap_or_default();

        match &chat_response.usage {
            Some(usage) => self
                .usage
                .record(usage.prompt_tokens, usage.completion_tokens),
            None => self.usage.record(
                approximate_tokens(system_prompt) + approximate_tokens(user_prompt),
                approximate_tokens(&text),
            ),
        }

        debug!("<-- Chat API response: {} chars", text.len());
        Ok(text)
    }

    fn usage(&self) -> LmUsage {
        self.usage.snapshot()
    }

    fn reset_usage(&self) {
        self.usage.reset()
    }
}
