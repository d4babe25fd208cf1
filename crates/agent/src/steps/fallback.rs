//! Fallback-search: community results when the catalog comes up empty.
//!
//! Search backends are tried in order. The first one that answers with at
//! least one hit wins and the rest are never called. An empty answer counts
//! as a miss, the same as an error or a timeout.

use super::StepContext;
use crate::state::{FallbackHit, PipelineState, ResolvedSteps, StatePatch};
use repairkit_core::search::SearchHit;
use tracing::{info, warn};

/// Most community results shown in an answer.
pub const MAX_RESULTS: usize = 3;

fn to_hit(hit: SearchHit) -> FallbackHit {
    FallbackHit {
        title: hit.title,
        link: hit.url,
        snippet: hit.snippet,
    }
}

pub async fn run(ctx: &StepContext, state: &PipelineState) -> StatePatch {
    let mut patch = StatePatch {
        used_fallback: true,
        ..StatePatch::status("Searching community sources as fallback...")
    };

    let query = format!("{} repair guide", state.request_text);
    let limit = ctx.max_results.clamp(1, MAX_RESULTS);

    for searcher in &ctx.searchers {
        let outcome = tokio::time::timeout(ctx.search_timeout, searcher.search(&query, limit)).await;
        match outcome {
            Ok(Ok(hits)) if !hits.is_empty() => {
                let results: Vec<FallbackHit> = hits.into_iter().take(limit).map(to_hit).collect();
                info!(source = searcher.name(), count = results.len(), "Fallback search succeeded");
                patch.progress.push(format!("Found {} community sources", results.len()));
                patch.resolved_steps = Some(ResolvedSteps::Fallback {
                    source: searcher.name().to_string(),
                    results,
                });
                return patch;
            }
            Ok(Ok(_)) => warn!(source = searcher.name(), "Fallback search returned nothing"),
            Ok(Err(e)) => warn!(source = searcher.name(), error = %e, "Fallback search failed"),
            Err(_) => warn!(source = searcher.name(), timeout = ?ctx.search_timeout, "Fallback search timed out"),
        }
    }

    patch.note("No results from fallback search")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{FakeCatalog, FakeSearch, SequentialMockProvider, hit};
    use repairkit_core::search::FallbackSearch;
    use std::sync::Arc;
    use std::time::Duration;

    fn ctx(searchers: Vec<Arc<dyn FallbackSearch>>) -> StepContext {
        let mut ctx = StepContext::new(
            Arc::new(SequentialMockProvider::texts(&[])),
            "mock-model",
            Arc::new(FakeCatalog::default()),
        );
        ctx.searchers = searchers;
        ctx.search_timeout = Duration::from_millis(50);
        ctx
    }

    fn state() -> PipelineState {
        PipelineState::new("my toaster sparks", vec![])
    }

    #[tokio::test]
    async fn primary_success_short_circuits() {
        let primary = Arc::new(FakeSearch::ok("tavily", vec![hit("a"), hit("b"), hit("c"), hit("d")]));
        let secondary = Arc::new(FakeSearch::ok("duckduckgo", vec![hit("z")]));
        let patch = run(&ctx(vec![primary.clone(), secondary.clone()]), &state()).await;

        assert!(patch.used_fallback);
        let Some(ResolvedSteps::Fallback { source, results }) = patch.resolved_steps else {
            panic!("expected fallback results");
        };
        assert_eq!(source, "tavily");
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].link, "https://example.com/a");
        assert_eq!(secondary.call_count(), 0);
    }

    #[tokio::test]
    async fn failure_and_empty_move_to_next() {
        let failing = Arc::new(FakeSearch::failing("tavily"));
        let empty = Arc::new(FakeSearch::ok("empty", vec![]));
        let free = Arc::new(FakeSearch::ok("duckduckgo", vec![hit("z")]));
        let patch = run(&ctx(vec![failing.clone(), empty.clone(), free]), &state()).await;

        let Some(ResolvedSteps::Fallback { source, .. }) = patch.resolved_steps else {
            panic!("expected fallback results");
        };
        assert_eq!(source, "duckduckgo");
        assert_eq!(failing.call_count(), 1);
        assert_eq!(empty.call_count(), 1);
    }

    #[tokio::test]
    async fn timeout_counts_as_failure() {
        let slow = Arc::new(FakeSearch::slow("tavily", Duration::from_secs(5)));
        let free = Arc::new(FakeSearch::ok("duckduckgo", vec![hit("z")]));
        let patch = run(&ctx(vec![slow, free]), &state()).await;
        assert!(matches!(
            patch.resolved_steps,
            Some(ResolvedSteps::Fallback { ref source, .. }) if source == "duckduckgo"
        ));
    }

    #[tokio::test]
    async fn all_fail_leaves_none_but_marks_fallback() {
        let patch = run(&ctx(vec![Arc::new(FakeSearch::failing("tavily"))]), &state()).await;
        assert!(patch.used_fallback);
        assert!(patch.resolved_steps.is_none());
        assert_eq!(patch.progress.last().unwrap(), "No results from fallback search");
    }

    #[tokio::test]
    async fn no_searchers_configured() {
        let patch = run(&ctx(vec![]), &state()).await;
        assert!(patch.used_fallback);
        assert!(patch.resolved_steps.is_none());
    }
}
