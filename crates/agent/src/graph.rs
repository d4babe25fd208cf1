//! The step graph and its executor.
//!
//! ```text
//!            ┌─ conversational ──────────────────────────────────────────┐
//! entry ─────┤                                                           ├─▶ answer
//!            └─ interpret → locate → list → select ─┬─ fetch ────┐       │
//!                                                   └─ fallback ─┴─ format
//! ```
//!
//! Each step runs to completion, its patch is applied, and every new
//! progress line is emitted before the next decision. A run ends when a
//! step sets `answer_text`.

use crate::routing::{EntryRoute, MidChainRoute, route_after_selection, route_entry};
use crate::state::PipelineState;
use crate::steps::{Step, StepContext};
use crate::stream_event::PipelineEvent;
use crate::title;
use repairkit_config::AppConfig;
use repairkit_core::catalog::DeviceCatalog;
use repairkit_core::provider::Provider;
use repairkit_core::search::FallbackSearch;
use repairkit_core::{Error, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Hard cap on steps per run. The longest path is six steps (interpret,
/// locate, list, select, fetch or fallback, format), so hitting the cap
/// means the routing looped and the run is failed.
pub const MAX_STEPS: usize = 12;

/// Shown to callers when a run fails unexpectedly.
pub const GENERIC_ERROR: &str =
    "Sorry, something went wrong while working on your request. Please try again.";

const CHANNEL_CAPACITY: usize = 64;

/// Outcome of a completed run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub state: PipelineState,
    /// Steps in execution order.
    pub visited: Vec<Step>,
}

impl RunReport {
    pub fn answer(&self) -> &str {
        self.state.answer_text.as_deref().unwrap_or_default()
    }
}

/// The repair assistant pipeline.
#[derive(Clone)]
pub struct RepairPipeline {
    ctx: StepContext,
    max_steps: usize,
}

impl RepairPipeline {
    pub fn new(
        provider: Arc<dyn Provider>,
        model: impl Into<String>,
        catalog: Arc<dyn DeviceCatalog>,
    ) -> Self {
        Self {
            ctx: StepContext::new(provider, model, catalog),
            max_steps: MAX_STEPS,
        }
    }

    /// Wire a pipeline with limits and timeouts from config.
    pub fn from_config(
        config: &AppConfig,
        provider: Arc<dyn Provider>,
        catalog: Arc<dyn DeviceCatalog>,
        searchers: Vec<Arc<dyn FallbackSearch>>,
    ) -> Self {
        Self::new(provider, config.default_model.clone(), catalog)
            .with_temperature(config.default_temperature)
            .with_max_tokens(config.default_max_tokens)
            .with_searchers(searchers)
            .with_timeouts(
                Duration::from_secs(config.model_timeout_secs),
                Duration::from_secs(config.catalog.timeout_secs),
                Duration::from_secs(config.search.timeout_secs),
            )
            .with_max_results(config.search.max_results)
    }

    /// Search backends, tried in the given order.
    pub fn with_searchers(mut self, searchers: Vec<Arc<dyn FallbackSearch>>) -> Self {
        self.ctx.searchers = searchers;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.ctx.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.ctx.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_timeouts(mut self, provider: Duration, catalog: Duration, search: Duration) -> Self {
        self.ctx.provider_timeout = provider;
        self.ctx.catalog_timeout = catalog;
        self.ctx.search_timeout = search;
        self
    }

    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.ctx.max_results = max_results;
        self
    }

    /// Cap on steps per run. Exceeding it fails the run.
    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    pub fn model(&self) -> &str {
        &self.ctx.model
    }

    /// Short title for a session that starts with `first_message`.
    pub async fn generate_title(&self, first_message: &str) -> String {
        title::generate_title(&self.ctx, first_message).await
    }

    fn entry(state: &PipelineState) -> Step {
        let route = route_entry(state);
        debug!(route = route.as_str(), "Entry routing");
        match route {
            EntryRoute::Conversational => Step::Conversational,
            EntryRoute::RepairChain => Step::InterpretRequest,
        }
    }

    fn next(step: Step, state: &PipelineState) -> Option<Step> {
        match step {
            Step::InterpretRequest => Some(Step::LocateDevice),
            Step::LocateDevice => Some(Step::ListGuides),
            Step::ListGuides => Some(Step::SelectGuide),
            Step::SelectGuide => {
                let route = route_after_selection(state);
                debug!(route = route.as_str(), "Mid-chain routing");
                Some(match route {
                    MidChainRoute::Fetch => Step::FetchGuide,
                    MidChainRoute::Fallback => Step::FallbackSearch,
                })
            }
            Step::FetchGuide | Step::FallbackSearch => Some(Step::FormatAnswer),
            Step::Conversational | Step::FormatAnswer => None,
        }
    }

    /// Walk the graph from the entry decision to a terminal step.
    ///
    /// With a sender, new progress lines go out after every step and the
    /// walk stops early once the receiver is gone.
    async fn drive(
        self,
        mut state: PipelineState,
        tx: Option<mpsc::Sender<PipelineEvent>>,
    ) -> Result<RunReport> {
        let mut step = Self::entry(&state);
        let mut visited = Vec::new();
        let mut emitted = state.progress_log.len();

        loop {
            if visited.len() >= self.max_steps {
                return Err(Error::Internal(format!(
                    "step limit of {} exceeded at {step}",
                    self.max_steps
                )));
            }
            if tx.as_ref().is_some_and(|tx| tx.is_closed()) {
                info!(at = %step, "Caller disconnected; stopping run");
                break;
            }

            debug!(step = %step, "Running step");
            let patch = step.run(&self.ctx, &state).await;
            state.apply(patch);
            visited.push(step);

            if let Some(tx) = &tx {
                for line in &state.progress_log[emitted..] {
                    if tx.send(PipelineEvent::Status { text: line.clone() }).await.is_err() {
                        break;
                    }
                }
            }
            emitted = state.progress_log.len();

            if state.is_finished() {
                break;
            }
            if step.is_terminal() {
                return Err(Error::Internal(format!("{step} finished without an answer")));
            }
            step = match Self::next(step, &state) {
                Some(next) => next,
                None => return Err(Error::Internal(format!("no route out of {step}"))),
            };
        }

        info!(
            steps = visited.len(),
            used_fallback = state.used_fallback,
            answered = state.is_finished(),
            "Pipeline run complete"
        );
        Ok(RunReport { state, visited })
    }

    /// Run to completion and return the final state.
    ///
    /// The run executes on its own task, so a panicking step surfaces as
    /// `Error::Internal` instead of unwinding into the caller.
    pub async fn run(&self, state: PipelineState) -> Result<RunReport> {
        let report = tokio::spawn(self.clone().drive(state, None))
            .await
            .map_err(|e| Error::Internal(format!("pipeline task failed: {e}")))??;
        if report.state.answer_text.is_none() {
            return Err(Error::Internal("run ended without an answer".into()));
        }
        Ok(report)
    }

    /// Run on a background task, streaming events.
    ///
    /// The receiver yields `status` events in order, then one `answer` or
    /// `error`, then `done`.
    pub fn run_stream(&self, state: PipelineState) -> mpsc::Receiver<PipelineEvent> {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let pipeline = self.clone();

        tokio::spawn(async move {
            let outcome = tokio::spawn(pipeline.drive(state, Some(tx.clone()))).await;

            let last = match outcome {
                Ok(Ok(report)) => match report.state.answer_text {
                    Some(text) => PipelineEvent::Answer { text },
                    None if tx.is_closed() => return,
                    None => {
                        error!("Run ended without an answer");
                        PipelineEvent::Error {
                            text: GENERIC_ERROR.into(),
                        }
                    }
                },
                Ok(Err(e)) => {
                    error!(error = %e, "Pipeline run failed");
                    PipelineEvent::Error {
                        text: GENERIC_ERROR.into(),
                    }
                }
                Err(e) => {
                    error!(panic = e.is_panic(), error = %e, "Pipeline task aborted");
                    PipelineEvent::Error {
                        text: GENERIC_ERROR.into(),
                    }
                }
            };

            if tx.send(last).await.is_err() || tx.send(PipelineEvent::Done).await.is_err() {
                warn!("Caller went away before the run finished");
            }
        });

        rx
    }
}
