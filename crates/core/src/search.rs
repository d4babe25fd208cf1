//! FallbackSearch trait: general web search used when the catalog has no guide.

use crate::error::SearchError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One web search result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub snippet: String,
}

#[async_trait]
pub trait FallbackSearch: Send + Sync {
    /// Source label recorded on the answer (e.g., "tavily", "duckduckgo").
    fn name(&self) -> &str;

    /// Run a search returning at most `max_results` hits.
    async fn search(&self, query: &str, max_results: usize) -> std::result::Result<Vec<SearchHit>, SearchError>;
}
