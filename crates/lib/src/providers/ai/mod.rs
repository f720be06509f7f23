//! # Language Model Providers
//!
//! A common interface over the text-completion backends used by the
//! pipeline, plus the decorators layered on top of them: retry with
//! exponential backoff and call recording for the `llm_call_history`
//! artifact.

pub mod embedding;
pub mod gemini;
pub mod openai;
pub mod recording;
pub mod retry;

use crate::errors::LmError;
use async_trait::async_trait;
use dyn_clone::DynClone;
pub use embedding::EmbeddingClient;
pub use gemini::GeminiProvider;
pub use openai::OpenAiCompatProvider;
pub use recording::{CallLog, RecordingLm};
pub use retry::RetryingLm;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::sync::{Arc, Mutex};

/// A trait for stateless text completion against a language model.
///
/// Implementations must return `Ok("")` (not an error) when the provider
/// filters or blocks the output; the pipeline treats an empty completion
/// as "no information".
#[async_trait]
pub trait LanguageModel: Send + Sync + Debug + DynClone {
    /// Generates a completion from a system and user prompt.
    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String, LmError>;

    /// Cumulative token usage since construction or the last reset.
    fn usage(&self) -> LmUsage {
        LmUsage::default()
    }

    /// Resets the usage counters.
    fn reset_usage(&self) {}
}

dyn_clone::clone_trait_object!(LanguageModel);

/// Token and call counters for one provider instance.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct LmUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub calls: u64,
}

/// Shared usage counter. Writes are serialized behind a mutex because the
/// same physical provider may back several concurrently-running roles.
#[derive(Debug, Clone, Default)]
pub struct UsageCounter(Arc<Mutex<LmUsage>>);

impl UsageCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, prompt_tokens: u64, completion_tokens: u64) {
        let mut usage = self.0.lock().unwrap_or_else(|e| e.into_inner());
        usage.prompt_tokens += prompt_tokens;
        usage.completion_tokens += completion_tokens;
        usage.calls += 1;
    }

    pub fn snapshot(&self) -> LmUsage {
        *self.0.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn reset(&self) {
        *self.0.lock().unwrap_or_else(|e| e.into_inner()) = LmUsage::default();
    }
}

/// The five logical model roles of the pipeline.
///
/// Roles may share one physical provider or each carry their own; the
/// pipeline only ever addresses them through this bundle.
#[derive(Debug, Clone)]
pub struct LmSuite {
    /// Expert answers and question-to-query expansion.
    pub conv_simulator: Arc<dyn LanguageModel>,
    /// Writer questions and persona generation.
    pub question_asker: Arc<dyn LanguageModel>,
    /// Outline draft and refinement.
    pub outline_gen: Arc<dyn LanguageModel>,
    /// Section drafting.
    pub article_gen: Arc<dyn LanguageModel>,
    /// Lead section and deduplication polish.
    pub article_polish: Arc<dyn LanguageModel>,
}

impl LmSuite {
    /// Backs every role with the same provider.
    pub fn from_single(lm: Arc<dyn LanguageModel>) -> Self {
        Self {
            conv_simulator: lm.clone(),
            question_asker: lm.clone(),
            outline_gen: lm.clone(),
            article_gen: lm.clone(),
            article_polish: lm,
        }
    }

    /// Usage across all roles. Roles sharing a provider are deduplicated
    /// by the provider's own counter, so this is an upper bound only when
    /// distinct instances are configured.
    pub fn usage_by_role(&self) -> Vec<(&'static str, LmUsage)> {
        vec![
            ("conv_simulator_lm", self.conv_simulator.usage()),
            ("question_asker_lm", self.question_asker.usage()),
            ("outline_gen_lm", self.outline_gen.usage()),
            ("article_gen_lm", self.article_gen.usage()),
            ("article_polish_lm", self.article_polish.usage()),
        ]
    }
}

/// Rough whitespace token estimate for providers that do not report usage.
pub(crate) fn approximate_tokens(text: &str) -> u64 {
    text.split_whitespace().count() as u64
}
