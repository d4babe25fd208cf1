//! Knowledge sources for RepairKit.
//!
//! - [`IfixitCatalog`] implements `DeviceCatalog` against the iFixit API.
//! - [`TavilySearch`] and [`DuckDuckGoSearch`] implement `FallbackSearch`.
//!
//! [`build_searchers`] returns the search backends in the order the
//! fallback step should try them.

pub mod duckduckgo;
pub mod ifixit;
pub mod tavily;

pub use duckduckgo::DuckDuckGoSearch;
pub use ifixit::IfixitCatalog;
pub use tavily::TavilySearch;

use repairkit_config::AppConfig;
use repairkit_core::{DeviceCatalog, FallbackSearch};
use std::sync::Arc;
use std::time::Duration;

pub fn build_catalog(config: &AppConfig) -> Arc<dyn DeviceCatalog> {
    Arc::new(IfixitCatalog::from_config(&config.catalog))
}

/// Search backends in priority order: Tavily when keyed, then DuckDuckGo.
pub fn build_searchers(config: &AppConfig) -> Vec<Arc<dyn FallbackSearch>> {
    let timeout = Duration::from_secs(config.search.timeout_secs);
    let mut searchers: Vec<Arc<dyn FallbackSearch>> = Vec::new();

    if let Some(key) = config.search.tavily_api_key.as_deref().filter(|k| !k.is_empty()) {
        searchers.push(Arc::new(TavilySearch::new(&config.search.tavily_url, key, timeout)));
    }
    if config.search.duckduckgo_enabled {
        searchers.push(Arc::new(DuckDuckGoSearch::new(&config.search.duckduckgo_url, timeout)));
    }

    searchers
}
