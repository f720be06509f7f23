//! # Pipeline Orchestration
//!
//! Drives the four stages in order, publishes progress after each one,
//! and persists the final artifacts. The orchestrator exclusively owns
//! the information table, the outlines, and the article; stage components
//! receive them by reference and produce new values.

pub mod article;
pub mod curation;
pub mod outline;
pub mod persona;
pub mod polish;

use crate::config::PipelineConfig;
use crate::errors::PipelineError;
use crate::providers::ai::{CallLog, EmbeddingClient, LmSuite};
use crate::retrieval::Retriever;
use crate::sink::{artifact, ReportSink};
use crate::status::{JobStatus, StatusUpdate};
use crate::types::{Article, InformationTable, Persona};
use article::ArticleGenerator;
use chrono::Utc;
use curation::KnowledgeCurator;
use outline::{OutlineBundle, OutlineGenerator};
use persona::PersonaGenerator;
use polish::ArticlePolisher;
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{error, info};

/// One report generation request.
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub job_id: String,
    pub topic: String,
    /// Target company, recorded in `run_config` for traceability.
    pub company: Option<String>,
}

/// Cooperative cancellation. In-flight model and retrieval calls finish;
/// the pipeline halts at the next stage boundary.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// The report generation pipeline.
pub struct Pipeline {
    suite: LmSuite,
    retriever: Arc<dyn Retriever>,
    embedder: EmbeddingClient,
    config: PipelineConfig,
    call_log: CallLog,
}

impl Pipeline {
    pub fn new(
        suite: LmSuite,
        retriever: Arc<dyn Retriever>,
        embedder: EmbeddingClient,
        config: PipelineConfig,
    ) -> Self {
        Self {
            suite,
            retriever,
            embedder,
            config,
            call_log: CallLog::new(),
        }
    }

    /// Shares a call log already wired into the suite's recording
    /// decorators, so the `llm_call_history` artifact has content.
    pub fn with_call_log(mut self, call_log: CallLog) -> Self {
        self.call_log = call_log;
        self
    }

    /// Runs a job to completion. Progress goes to `status`; artifacts go
    /// to `sink` only when every stage succeeded.
    pub async fn run(
        &self,
        request: &RunRequest,
        status: &dyn JobStatus,
        sink: &dyn ReportSink,
        cancel: CancellationFlag,
    ) -> Result<(), PipelineError> {
        match self.run_stages(request, status, sink, cancel).await {
            Ok(()) => {
                status
                    .publish(&request.job_id, StatusUpdate::completed())
                    .await;
                Ok(())
            }
            Err(e) => {
                error!(job_id = %request.job_id, "Report job failed: {e}");
                status
                    .publish(&request.job_id, StatusUpdate::failed(e.status_message()))
                    .await;
                Err(e)
            }
        }
    }

    async fn run_stages(
        &self,
        request: &RunRequest,
        status: &dyn JobStatus,
        sink: &dyn ReportSink,
        cancel: CancellationFlag,
    ) -> Result<(), PipelineError> {
        let topic = request.topic.as_str();
        status
            .publish(&request.job_id, StatusUpdate::processing(0, "starting"))
            .await;

        // Stage 1: personas.
        self.checkpoint(&cancel)?;
        let personas = PersonaGenerator::new(self.suite.question_asker.clone())
            .generate(topic, self.config.max_perspective)
            .await?;
        info!(personas = personas.len(), "Stage 1 complete");
        status
            .publish(
                &request.job_id,
                StatusUpdate::processing(10, "persona generation"),
            )
            .await;

        // Stage 2: knowledge curation.
        self.checkpoint(&cancel)?;
        let table = self.curate(topic, &personas).await;
        info!(
            sources = table.url_to_info.len(),
            "Stage 2 complete"
        );
        status
            .publish(
                &request.job_id,
                StatusUpdate::processing(40, "knowledge curation"),
            )
            .await;

        // Stage 3: outline.
        self.checkpoint(&cancel)?;
        let outlines = OutlineGenerator::new(self.suite.outline_gen.clone())
            .generate(topic, &table)
            .await?;
        status
            .publish(
                &request.job_id,
                StatusUpdate::processing(55, "outline generation"),
            )
            .await;

        // Stage 4a: section drafting.
        self.checkpoint(&cancel)?;
        let draft_article = ArticleGenerator::new(
            self.suite.article_gen.clone(),
            self.embedder.clone(),
            self.config.clone(),
        )
        .generate(topic, &outlines.refined, &table)
        .await;
        status
            .publish(
                &request.job_id,
                StatusUpdate::processing(80, "article generation"),
            )
            .await;

        // Stage 4b: polish.
        self.checkpoint(&cancel)?;
        let mut polished_article = ArticlePolisher::new(self.suite.article_polish.clone())
            .polish(topic, &draft_article)
            .await;
        // The lead and polish passes can invent markers Stage 4a never
        // remapped; unresolvable ones are stripped, not fatal.
        for section in &mut polished_article.sections {
            section.markdown = article::strip_unresolvable_citations(&section.markdown, &table);
        }
        status
            .publish(
                &request.job_id,
                StatusUpdate::processing(95, "article polishing"),
            )
            .await;

        self.checkpoint(&cancel)?;
        self.persist(request, sink, &table, &outlines, &draft_article, &polished_article)
            .await
    }

    async fn curate(&self, topic: &str, personas: &[Persona]) -> InformationTable {
        KnowledgeCurator::new(
            self.suite.question_asker.clone(),
            self.suite.conv_simulator.clone(),
            self.retriever.clone(),
            self.config.clone(),
        )
        .research(topic, personas)
        .await
    }

    async fn persist(
        &self,
        request: &RunRequest,
        sink: &dyn ReportSink,
        table: &InformationTable,
        outlines: &OutlineBundle,
        draft_article: &Article,
        polished_article: &Article,
    ) -> Result<(), PipelineError> {
        let job_id = &request.job_id;
        sink.write(
            job_id,
            artifact::POLISHED_ARTICLE,
            &polished_article.to_markdown(),
        )
        .await?;
        sink.write(job_id, artifact::DRAFT_ARTICLE, &draft_article.to_markdown())
            .await?;
        sink.write(job_id, artifact::OUTLINE, &outlines.refined.to_markdown())
            .await?;
        sink.write(
            job_id,
            artifact::DRAFT_OUTLINE,
            &outlines.draft.to_markdown(),
        )
        .await?;
        sink.write(
            job_id,
            artifact::CONVERSATION_LOG,
            &serde_json::to_string_pretty(&table.conversation_log())?,
        )
        .await?;
        sink.write(
            job_id,
            artifact::URL_TO_INFO,
            &serde_json::to_string_pretty(&table.url_snapshot())?,
        )
        .await?;
        sink.write(
            job_id,
            artifact::RUN_CONFIG,
            &serde_json::to_string_pretty(&self.run_config(request))?,
        )
        .await?;
        sink.write(job_id, artifact::LLM_CALL_HISTORY, &self.call_log.to_jsonl())
            .await?;
        Ok(())
    }

    fn run_config(&self, request: &RunRequest) -> serde_json::Value {
        json!({
            "job_id": request.job_id,
            "topic": request.topic,
            "company": request.company,
            "generated_at": Utc::now().to_rfc3339(),
            "config": self.config,
            "lm_usage": self
                .suite
                .usage_by_role()
                .into_iter()
                .map(|(role, usage)| (role.to_string(), json!(usage)))
                .collect::<serde_json::Map<_, _>>(),
        })
    }

    fn checkpoint(&self, cancel: &CancellationFlag) -> Result<(), PipelineError> {
        if cancel.is_cancelled() {
            Err(PipelineError::Cancelled)
        } else {
            Ok(())
        }
    }
}
