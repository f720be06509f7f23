//! # dartwiki-web: Web Search Backend
//!
//! Tavily-backed implementation of the core's `WebSearchProvider`,
//! supplying public-web evidence when the internal corpus is thin for a
//! query. Plugged into the hybrid retriever; never used on its own.

use async_trait::async_trait;
use dartwiki::errors::RetrievalError;
use dartwiki::retrieval::{WebSearchProvider, WebSearchResult};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::debug;

/// Tavily search request.
#[derive(Debug, Serialize)]
struct TavilyRequest<'a> {
    query: &'a str,
    search_depth: &'a str,
    max_results: usize,
}

/// Tavily search response.
#[derive(Debug, Deserialize)]
struct TavilyResponse {
    results: Vec<TavilyResult>,
}

/// A single Tavily search result.
#[derive(Debug, Deserialize)]
struct TavilyResult {
    url: String,
    title: String,
    content: String,
    #[serde(default)]
    score: f64,
}

/// Web search over the Tavily API.
pub struct TavilySearchProvider {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    search_depth: String,
}

impl TavilySearchProvider {
    pub const DEFAULT_API_URL: &'static str = "https://api.tavily.com/search";

    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: Self::DEFAULT_API_URL.to_string(),
            api_key: api_key.into(),
            search_depth: "basic".to_string(),
        }
    }

    /// Overrides the endpoint (tests point this at a mock server).
    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    /// Sets search depth ("basic" or "advanced").
    pub fn with_search_depth(mut self, depth: impl Into<String>) -> Self {
        self.search_depth = depth.into();
        self
    }
}

#[async_trait]
impl WebSearchProvider for TavilySearchProvider {
    async fn search(
        &self,
        query: &str,
        top_k: usize,
        exclude_urls: &HashSet<String>,
    ) -> Result<Vec<WebSearchResult>, RetrievalError> {
        let request = TavilyRequest {
            query,
            search_depth: &self.search_depth,
            // Over-request so exclusions do not starve the result set.
            max_results: top_k + exclude_urls.len().min(top_k),
        };

        debug!("--> Tavily search: {query}");
        let response = self
            .client
            .post(&self.api_url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| RetrievalError::Web(e.to_string()))?;

        if !response.status().is_success() {
            return Err(RetrievalError::Web(format!(
                "Tavily API error: {}",
                response.status()
            )));
        }

        let tavily_response: TavilyResponse = response
            .json()
            .await
            .map_err(|e| RetrievalError::Web(e.to_string()))?;

        let results: Vec<WebSearchResult> = tavily_response
            .results
            .into_iter()
            .filter(|result| !exclude_urls.contains(&result.url))
            .take(top_k)
            .map(|result| WebSearchResult {
                url: result.url,
                title: result.title,
                snippets: vec![result.content],
                description: String::new(),
                score: result.score,
            })
            .collect();
        debug!("<-- Tavily returned {} results", results.len());
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn maps_results_and_applies_exclusions() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [
                    {"url": "https://a.example", "title": "A", "content": "alpha", "score": 0.9},
                    {"url": "https://b.example", "title": "B", "content": "beta", "score": 0.8},
                ]
            })))
            .mount(&server)
            .await;

        let provider = TavilySearchProvider::new("key")
            .with_api_url(format!("{}/search", server.uri()));
        let excluded: HashSet<String> = ["https://a.example".to_string()].into_iter().collect();

        let results = provider.search("query", 3, &excluded).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].url, "https://b.example");
        assert_eq!(results[0].snippets, vec!["beta"]);
    }

    #[tokio::test]
    async fn non_success_status_is_a_web_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let provider = TavilySearchProvider::new("key").with_api_url(server.uri());
        let error = provider
            .search("query", 3, &HashSet::new())
            .await
            .unwrap_err();
        assert!(matches!(error, RetrievalError::Web(_)));
    }
}
