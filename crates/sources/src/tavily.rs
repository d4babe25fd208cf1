//! Tavily search client (paid, preferred when a key is configured).

use async_trait::async_trait;
use repairkit_core::error::SearchError;
use repairkit_core::search::{FallbackSearch, SearchHit};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

pub struct TavilySearch {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl TavilySearch {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();

        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    results: Vec<TavilyResult>,
}

#[derive(Debug, Deserialize)]
struct TavilyResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    content: String,
}

fn into_hits(response: TavilyResponse, max_results: usize) -> Vec<SearchHit> {
    response
        .results
        .into_iter()
        .filter(|r| !r.url.is_empty())
        .take(max_results)
        .map(|r| SearchHit {
            title: if r.title.is_empty() { r.url.clone() } else { r.title },
            url: r.url,
            snippet: r.content,
        })
        .collect()
}

#[async_trait]
impl FallbackSearch for TavilySearch {
    fn name(&self) -> &str {
        "tavily"
    }

    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>, SearchError> {
        if self.api_key.is_empty() {
            return Err(SearchError::NotConfigured("tavily api key is empty".into()));
        }

        let url = format!("{}/search", self.base_url);
        let body = serde_json::json!({
            "api_key": self.api_key,
            "query": query,
            "max_results": max_results,
            "search_depth": "basic",
        });

        debug!(query = %query, "Tavily search");

        let response = self.client.post(&url).json(&body).send().await.map_err(|e| {
            if e.is_timeout() {
                SearchError::Timeout(e.to_string())
            } else {
                SearchError::Network(e.to_string())
            }
        })?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            let message = response.text().await.unwrap_or_default();
            warn!(status, "Tavily returned error");
            return Err(SearchError::ApiError { status_code: status, message });
        }

        let parsed: TavilyResponse = response
            .json()
            .await
            .map_err(|e| SearchError::InvalidResponse(e.to_string()))?;

        Ok(into_hits(parsed, max_results))
    }
}
