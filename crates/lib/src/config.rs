//! # Pipeline Configuration
//!
//! Runtime knobs for the report generation pipeline. Every field has a
//! serde default so partial configuration (e.g. from a YAML file or
//! environment overrides in the CLI) merges cleanly over the built-ins.

use serde::{Deserialize, Serialize};

/// Configuration for one report generation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Maximum writer/expert turns per persona dialogue.
    #[serde(default = "default_max_conv_turn")]
    pub max_conv_turn: usize,
    /// Maximum LM-generated personas (the fixed fact writer is extra).
    #[serde(default = "default_max_perspective")]
    pub max_perspective: usize,
    /// Maximum search queries expanded from one question.
    #[serde(default = "default_max_search_queries_per_turn")]
    pub max_search_queries_per_turn: usize,
    /// Results requested from the retriever per query.
    #[serde(default = "default_search_top_k")]
    pub search_top_k: usize,
    /// Passages selected per section during drafting.
    #[serde(default = "default_retrieve_top_k")]
    pub retrieve_top_k: usize,
    /// Upper bound on concurrent dialogue / section tasks.
    #[serde(default = "default_max_thread_num")]
    pub max_thread_num: usize,
    /// Adjacent chunks fetched on each side of a table chunk.
    #[serde(default = "default_window_size")]
    pub window_size: i32,
    /// Over-fetch multiplier applied before reranking trims to top-k.
    #[serde(default = "default_window_expand_factor")]
    pub window_expand_factor: usize,
    /// Internal scores below this admit web results in hybrid retrieval.
    #[serde(default = "default_internal_min_score")]
    pub internal_min_score: f64,
    /// Score multiplier for passages that mention a target company.
    #[serde(default = "default_boost_multiplier")]
    pub boost_multiplier: f64,
    /// Score multiplier for analytical-intent text passages that do not.
    #[serde(default = "default_penalty_multiplier")]
    pub penalty_multiplier: f64,
    /// Drop table passages that do not mention a target company.
    #[serde(default = "default_drop_unmatched_tables")]
    pub drop_unmatched_tables: bool,
}

fn default_max_conv_turn() -> usize {
    3
}
fn default_max_perspective() -> usize {
    3
}
fn default_max_search_queries_per_turn() -> usize {
    3
}
fn default_search_top_k() -> usize {
    3
}
fn default_retrieve_top_k() -> usize {
    3
}
fn default_max_thread_num() -> usize {
    10
}
fn default_window_size() -> i32 {
    1
}
fn default_window_expand_factor() -> usize {
    3
}
fn default_internal_min_score() -> f64 {
    0.6
}
fn default_boost_multiplier() -> f64 {
    1.3
}
fn default_penalty_multiplier() -> f64 {
    0.5
}
fn default_drop_unmatched_tables() -> bool {
    true
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_conv_turn: default_max_conv_turn(),
            max_perspective: default_max_perspective(),
            max_search_queries_per_turn: default_max_search_queries_per_turn(),
            search_top_k: default_search_top_k(),
            retrieve_top_k: default_retrieve_top_k(),
            max_thread_num: default_max_thread_num(),
            window_size: default_window_size(),
            window_expand_factor: default_window_expand_factor(),
            internal_min_score: default_internal_min_score(),
            boost_multiplier: default_boost_multiplier(),
            penalty_multiplier: default_penalty_multiplier(),
            drop_unmatched_tables: default_drop_unmatched_tables(),
        }
    }
}

/// Recommended max output tokens per language model role.
pub mod token_budget {
    /// Expert answers and question-to-query expansion.
    pub const CONV_SIMULATOR: u32 = 500;
    /// Writer questions and persona synthesis.
    pub const QUESTION_ASKER: u32 = 500;
    /// Outline draft and refinement.
    pub const OUTLINE_GEN: u32 = 400;
    /// Section drafting.
    pub const ARTICLE_GEN: u32 = 700;
    /// Lead section and deduplication polish.
    pub const ARTICLE_POLISH: u32 = 4000;
}

/// Word caps applied when flattening dialogue history into prompts.
pub mod history_limit {
    /// Per-dialogue history window fed back to the question asker.
    pub const QUESTION_CONTEXT_WORDS: usize = 2500;
    /// Flattened all-persona history fed to outline refinement.
    pub const OUTLINE_CONTEXT_WORDS: usize = 5000;
    /// Concatenated evidence fed to the section drafter.
    pub const SECTION_EVIDENCE_WORDS: usize = 1500;
    /// Full-text turns kept before older answers are elided.
    pub const RECENT_TURNS_KEPT: usize = 4;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = PipelineConfig::default();
        assert_eq!(config.max_conv_turn, 3);
        assert_eq!(config.max_perspective, 3);
        assert_eq!(config.max_search_queries_per_turn, 3);
        assert_eq!(config.search_top_k, 3);
        assert_eq!(config.retrieve_top_k, 3);
        assert_eq!(config.max_thread_num, 10);
        assert_eq!(config.window_size, 1);
        assert!(config.drop_unmatched_tables);
        assert!((config.internal_min_score - 0.6).abs() < f64::EPSILON);
    }

    #[test]
    fn partial_yaml_merges_over_defaults() {
        let config: PipelineConfig = serde_json::from_str(r#"{"max_conv_turn": 5}"#).unwrap();
        assert_eq!(config.max_conv_turn, 5);
        assert_eq!(config.max_perspective, 3);
    }
}
