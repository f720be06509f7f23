//! # Application Configuration
//!
//! Loads the CLI configuration from an optional `config.yml` plus
//! environment variables. Top-level keys map to plain variables
//! (`DATABASE_URL`, `GEMINI_API_KEY`, `EMBEDDINGS_API_URL`); nested keys
//! are overridable with `DARTWIKI_`-prefixed variables
//! (e.g. `DARTWIKI_PIPELINE__MAX_CONV_TURN`).

use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use dartwiki::PipelineConfig;
use serde::Deserialize;
use std::env;
use tracing::info;

/// A configuration loading error.
#[derive(Debug)]
pub enum ConfigError {
    General(String),
    Missing(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::General(msg) => write!(f, "Configuration error: {msg}"),
            ConfigError::Missing(key) => write!(f, "Missing required configuration: {key}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::General(err.to_string())
    }
}

/// The root configuration structure, mapping to `config.yml`.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    /// Postgres connection string. Loaded from `DATABASE_URL`.
    pub database_url: String,
    /// Directory report artifacts are written under.
    #[serde(default = "default_out_dir")]
    pub out_dir: String,
    /// The embedding endpoint backing both retrieval and drafting.
    pub embedding: EmbeddingConfig,
    /// Gemini credentials; preferred when present.
    #[serde(default)]
    pub gemini: Option<GeminiConfig>,
    /// OpenAI-compatible fallback (local or hosted).
    #[serde(default)]
    pub local_ai: Option<LocalAiConfig>,
    /// Tavily key; web retrieval is disabled when absent.
    #[serde(default)]
    pub tavily_api_key: Option<String>,
    /// Pipeline knobs, all defaulted.
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

/// The same structure before required-field resolution.
#[derive(Debug, Deserialize)]
struct RawAppConfig {
    #[serde(default)]
    database_url: Option<String>,
    #[serde(default = "default_out_dir")]
    out_dir: String,
    #[serde(default)]
    embedding: Option<EmbeddingConfig>,
    #[serde(default)]
    gemini: Option<GeminiConfig>,
    #[serde(default)]
    local_ai: Option<LocalAiConfig>,
    #[serde(default)]
    tavily_api_key: Option<String>,
    #[serde(default)]
    pipeline: Option<PipelineConfig>,
}

fn default_out_dir() -> String {
    "reports".to_string()
}

/// Configuration for the embedding model provider.
#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    pub api_url: String,
    pub model_name: String,
    #[serde(default)]
    pub api_key: Option<String>,
    /// Must equal the corpus vector dimension; checked at startup.
    pub dimension: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GeminiConfig {
    pub api_url: String,
    pub api_key: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LocalAiConfig {
    pub api_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
}

/// Loads the configuration: `config.yml` if present, then environment
/// overrides. Missing required keys fail here, before any stage runs.
pub fn get_config(config_path_override: Option<&str>) -> Result<AppConfig, ConfigError> {
    let mut builder = ConfigBuilder::builder();

    let config_path = config_path_override.unwrap_or("config.yml");
    if std::path::Path::new(config_path).exists() {
        info!("Loading configuration from '{config_path}'.");
        let content = std::fs::read_to_string(config_path)
            .map_err(|e| ConfigError::General(format!("cannot read {config_path}: {e}")))?;
        builder = builder.add_source(File::from_str(&content, FileFormat::Yaml));
    }

    let settings = builder
        // Top-level keys from plain environment variables.
        .add_source(Environment::default())
        // Nested overrides: DARTWIKI_PIPELINE__MAX_CONV_TURN etc.
        .add_source(
            Environment::with_prefix("DARTWIKI")
                .prefix_separator("_")
                .try_parsing(true)
                .separator("__"),
        )
        .build()?;

    let raw: RawAppConfig = settings.try_deserialize()?;

    let database_url = raw
        .database_url
        .or_else(|| env::var("DATABASE_URL").ok())
        .ok_or_else(|| ConfigError::Missing("DATABASE_URL".to_string()))?;

    let embedding = match raw.embedding {
        Some(embedding) => embedding,
        None => embedding_from_env()?,
    };

    let gemini = raw.gemini.or_else(|| {
        match (env::var("GEMINI_API_URL"), env::var("GEMINI_API_KEY")) {
            (Ok(api_url), Ok(api_key)) => Some(GeminiConfig { api_url, api_key }),
            _ => None,
        }
    });
    let local_ai = raw.local_ai.or_else(|| {
        env::var("LOCAL_AI_API_URL").ok().map(|api_url| LocalAiConfig {
            api_url,
            api_key: env::var("LOCAL_AI_API_KEY").ok(),
            model: env::var("LOCAL_AI_MODEL").ok(),
        })
    });
    if gemini.is_none() && local_ai.is_none() {
        return Err(ConfigError::Missing(
            "a language model provider (gemini or local_ai)".to_string(),
        ));
    }

    let tavily_api_key = raw
        .tavily_api_key
        .or_else(|| env::var("TAVILY_API_KEY").ok())
        .filter(|key| !key.is_empty());

    Ok(AppConfig {
        database_url,
        out_dir: raw.out_dir,
        embedding,
        gemini,
        local_ai,
        tavily_api_key,
        pipeline: raw.pipeline.unwrap_or_default(),
    })
}

fn embedding_from_env() -> Result<EmbeddingConfig, ConfigError> {
    let api_url = env::var("EMBEDDINGS_API_URL")
        .map_err(|_| ConfigError::Missing("EMBEDDINGS_API_URL".to_string()))?;
    let model_name = env::var("EMBEDDINGS_MODEL")
        .map_err(|_| ConfigError::Missing("EMBEDDINGS_MODEL".to_string()))?;
    let dimension = env::var("EMBEDDINGS_DIMENSION")
        .map_err(|_| ConfigError::Missing("EMBEDDINGS_DIMENSION".to_string()))?
        .parse::<usize>()
        .map_err(|_| {
            ConfigError::General("EMBEDDINGS_DIMENSION must be a positive integer".to_string())
        })?;
    Ok(EmbeddingConfig {
        api_url,
        model_name,
        api_key: env::var("EMBEDDINGS_API_KEY").ok(),
        dimension,
    })
}
