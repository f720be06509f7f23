//! # Provider Wiring
//!
//! Builds the language model suite, the embedder, the knowledge store,
//! and the hybrid retriever from the resolved application configuration.

use crate::config::AppConfig;
use anyhow::Result;
use dartwiki::config::token_budget;
use dartwiki::{
    CallLog, EmbeddingClient, GeminiProvider, HybridRetriever, InternalRetriever, KnowledgeStore,
    LanguageModel, LmSuite, OpenAiCompatProvider, PgVectorStore, RecordingLm, Retriever,
    RetryingLm, WebSearchProvider,
};
use dartwiki_web::TavilySearchProvider;
use std::sync::Arc;
use tracing::info;

/// Everything the pipeline needs, built from configuration.
pub struct Wiring {
    pub suite: LmSuite,
    pub retriever: Arc<dyn Retriever>,
    pub embedder: EmbeddingClient,
    pub store: Arc<dyn KnowledgeStore>,
    pub call_log: CallLog,
}

impl Wiring {
    pub async fn build(app: &AppConfig) -> Result<Self> {
        let store: Arc<dyn KnowledgeStore> =
            Arc::new(PgVectorStore::connect(&app.database_url).await?);

        let embedder = EmbeddingClient::new(
            app.embedding.api_url.clone(),
            app.embedding.model_name.clone(),
            app.embedding.api_key.clone(),
            app.embedding.dimension,
        )?;

        let call_log = CallLog::new();
        let suite = LmSuite {
            conv_simulator: build_role(app, "conv_simulator_lm", token_budget::CONV_SIMULATOR, &call_log)?,
            question_asker: build_role(app, "question_asker_lm", token_budget::QUESTION_ASKER, &call_log)?,
            outline_gen: build_role(app, "outline_gen_lm", token_budget::OUTLINE_GEN, &call_log)?,
            article_gen: build_role(app, "article_gen_lm", token_budget::ARTICLE_GEN, &call_log)?,
            article_polish: build_role(
                app,
                "article_polish_lm",
                token_budget::ARTICLE_POLISH,
                &call_log,
            )?,
        };

        let internal =
            InternalRetriever::new(store.clone(), embedder.clone(), &app.pipeline).await?;
        let web = web_provider(app);
        if web.is_none() {
            info!("No Tavily key configured; web retrieval disabled");
        }
        let retriever: Arc<dyn Retriever> = Arc::new(HybridRetriever::new(
            internal,
            web,
            app.pipeline.internal_min_score,
        ));

        Ok(Self {
            suite,
            retriever,
            embedder,
            store,
            call_log,
        })
    }
}

/// One provider instance per role, wrapped with retry and recording.
fn build_role(
    app: &AppConfig,
    role: &'static str,
    max_output_tokens: u32,
    call_log: &CallLog,
) -> Result<Arc<dyn LanguageModel>> {
    let base: Arc<dyn LanguageModel> = if let Some(gemini) = &app.gemini {
        Arc::new(GeminiProvider::new(
            gemini.api_url.clone(),
            gemini.api_key.clone(),
            max_output_tokens,
        )?)
    } else if let Some(local) = &app.local_ai {
        Arc::new(OpenAiCompatProvider::new(
            local.api_url.clone(),
            local.api_key.clone(),
            local.model.clone(),
            max_output_tokens,
        )?)
    } else {
        // get_config rejects this combination before wiring starts.
        anyhow::bail!("no language model provider configured");
    };
    let retried: Arc<dyn LanguageModel> = Arc::new(RetryingLm::new(base));
    Ok(Arc::new(RecordingLm::new(retried, role, call_log.clone())))
}

fn web_provider(app: &AppConfig) -> Option<Arc<dyn WebSearchProvider>> {
    app.tavily_api_key
        .as_ref()
        .map(|key| Arc::new(TavilySearchProvider::new(key.clone())) as Arc<dyn WebSearchProvider>)
}
