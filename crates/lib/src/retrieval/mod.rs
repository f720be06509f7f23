//! # Retrieval
//!
//! The retriever stack: internal vector search over the corpus, an
//! optional web search backend, and the hybrid fusion over both.
//!
//! `Retriever::retrieve` is infallible by contract. A failing backend is
//! logged and degrades to the surviving backend's results; both backends
//! failing yields an empty list, which every downstream consumer accepts.

pub mod internal;
pub mod rerank;
pub mod tagger;

use crate::types::Passage;
use async_trait::async_trait;
pub use internal::InternalRetriever;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::warn;

/// A retrieval frontend resolving queries to ranked passages.
#[async_trait]
pub trait Retriever: Send + Sync {
    /// Resolves one or more queries. Per-query results are capped at `k`,
    /// concatenated, and deduplicated by URL preferring the higher score.
    async fn retrieve(
        &self,
        queries: &[String],
        exclude_urls: &HashSet<String>,
        k: usize,
    ) -> Vec<Passage>;
}

/// One result from an external web search backend.
#[derive(Debug, Clone, Deserialize)]
pub struct WebSearchResult {
    pub url: String,
    pub title: String,
    pub snippets: Vec<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub score: f64,
}

/// An external web search API (implemented by capability crates).
#[async_trait]
pub trait WebSearchProvider: Send + Sync {
    async fn search(
        &self,
        query: &str,
        top_k: usize,
        exclude_urls: &HashSet<String>,
    ) -> Result<Vec<WebSearchResult>, crate::errors::RetrievalError>;
}

impl From<WebSearchResult> for Passage {
    fn from(result: WebSearchResult) -> Self {
        Passage {
            url: result.url,
            title: result.title,
            snippets: result.snippets,
            description: result.description,
            score: result.score,
            source_tag: "web".to_string(),
            provenance: None,
        }
    }
}

/// Deduplicates by URL, keeping first-seen position and the higher score.
pub fn dedupe_by_url(passages: Vec<Passage>) -> Vec<Passage> {
    let mut by_url: HashMap<String, usize> = HashMap::new();
    let mut deduped: Vec<Passage> = Vec::with_capacity(passages.len());
    for passage in passages {
        match by_url.get(&passage.url) {
            Some(&index) => {
                if passage.score > deduped[index].score {
                    deduped[index] = passage;
                }
            }
            None => {
                by_url.insert(passage.url.clone(), deduped.len());
                deduped.push(passage);
            }
        }
    }
    deduped
}

/// Fuses the internal retriever with an optional web backend.
///
/// Internal evidence is authoritative: web results are admitted for a
/// query only when the best internal score falls below the configured
/// threshold, and on a URL collision the internal passage wins.
pub struct HybridRetriever {
    internal: InternalRetriever,
    web: Option<Arc<dyn WebSearchProvider>>,
    internal_min_score: f64,
}

impl HybridRetriever {
    pub fn new(
        internal: InternalRetriever,
        web: Option<Arc<dyn WebSearchProvider>>,
        internal_min_score: f64,
    ) -> Self {
        Self {
            internal,
            web,
            internal_min_score,
        }
    }

    async fn retrieve_one(
        &self,
        query: &str,
        exclude_urls: &HashSet<String>,
        k: usize,
    ) -> Vec<Passage> {
        let internal_task = async {
            match self.internal.search(query, exclude_urls, k).await {
                Ok(passages) => passages,
                Err(e) => {
                    warn!("Internal retrieval failed for '{query}': {e}");
                    Vec::new()
                }
            }
        };
        let web_task = async {
            match &self.web {
                Some(provider) => match provider.search(query, k, exclude_urls).await {
                    Ok(results) => results.into_iter().map(Passage::from).collect(),
                    Err(e) => {
                        warn!("Web retrieval failed for '{query}': {e}");
                        Vec::new()
                    }
                },
                None => Vec::new(),
            }
        };

        let (internal_results, web_results): (Vec<Passage>, Vec<Passage>) =
            tokio::join!(internal_task, web_task);

        let internal_top = internal_results
            .iter()
            .map(|p| p.score)
            .fold(f64::NEG_INFINITY, f64::max);
        let admit_web = internal_top < self.internal_min_score;

        let internal_urls: HashSet<&str> =
            internal_results.iter().map(|p| p.url.as_str()).collect();
        let mut fused = internal_results.clone();
        if admit_web {
            fused.extend(
                web_results
                    .into_iter()
                    .filter(|p| !internal_urls.contains(p.url.as_str())),
            );
        }

        fused.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        fused.truncate(k);
        fused
    }
}

#[async_trait]
impl Retriever for HybridRetriever {
    async fn retrieve(
        &self,
        queries: &[String],
        exclude_urls: &HashSet<String>,
        k: usize,
    ) -> Vec<Passage> {
        let per_query = futures::future::join_all(
            queries
                .iter()
                .map(|query| self.retrieve_one(query, exclude_urls, k)),
        )
        .await;
        dedupe_by_url(per_query.into_iter().flatten().collect())
    }
}

#[async_trait]
impl Retriever for InternalRetriever {
    async fn retrieve(
        &self,
        queries: &[String],
        exclude_urls: &HashSet<String>,
        k: usize,
    ) -> Vec<Passage> {
        let per_query = futures::future::join_all(queries.iter().map(|query| async move {
            match self.search(query, exclude_urls, k).await {
                Ok(passages) => passages,
                Err(e) => {
                    warn!("Internal retrieval failed for '{query}': {e}");
                    Vec::new()
                }
            }
        }))
        .await;
        dedupe_by_url(per_query.into_iter().flatten().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn passage(url: &str, score: f64) -> Passage {
        Passage {
            url: url.to_string(),
            title: String::new(),
            snippets: vec![],
            description: String::new(),
            score,
            source_tag: String::new(),
            provenance: None,
        }
    }

    #[test]
    fn dedupe_keeps_higher_score_in_first_seen_position() {
        let deduped = dedupe_by_url(vec![
            passage("a", 0.3),
            passage("b", 0.9),
            passage("a", 0.7),
        ]);
        assert_eq!(deduped.len(), 2);
        assert_eq!(deduped[0].url, "a");
        assert!((deduped[0].score - 0.7).abs() < 1e-9);
        assert_eq!(deduped[1].url, "b");
    }
}
