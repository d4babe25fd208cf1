//! Step functions.
//!
//! Every step reads `&PipelineState` and returns a [`StatePatch`]. Steps
//! own their collaborator failures: a timeout or error becomes a degraded
//! patch plus a status line, never an `Err`.

pub mod conversational;
pub mod fallback;
pub mod fetch;
pub mod format;
pub mod interpret;
pub mod list_guides;
pub mod locate;
pub mod select;

use crate::state::{PipelineState, StatePatch};
use repairkit_core::catalog::DeviceCatalog;
use repairkit_core::error::{CatalogError, ProviderError};
use repairkit_core::message::Message;
use repairkit_core::provider::{Provider, ProviderRequest};
use repairkit_core::search::FallbackSearch;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Collaborators and limits shared by all steps of a run.
#[derive(Clone)]
pub struct StepContext {
    pub provider: Arc<dyn Provider>,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    pub catalog: Arc<dyn DeviceCatalog>,
    /// Tried in order by fallback-search.
    pub searchers: Vec<Arc<dyn FallbackSearch>>,
    pub provider_timeout: Duration,
    pub catalog_timeout: Duration,
    pub search_timeout: Duration,
    pub max_results: usize,
}

impl StepContext {
    pub fn new(
        provider: Arc<dyn Provider>,
        model: impl Into<String>,
        catalog: Arc<dyn DeviceCatalog>,
    ) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature: 0.1,
            max_tokens: None,
            catalog,
            searchers: Vec::new(),
            provider_timeout: Duration::from_secs(30),
            catalog_timeout: Duration::from_secs(30),
            search_timeout: Duration::from_secs(15),
            max_results: fallback::MAX_RESULTS,
        }
    }

    /// One text-generation call bounded by the provider timeout.
    pub async fn generate(&self, messages: Vec<Message>) -> Result<String, ProviderError> {
        let mut request = ProviderRequest::new(self.model.clone(), messages);
        request.temperature = self.temperature;
        request.max_tokens = self.max_tokens;

        match tokio::time::timeout(self.provider_timeout, self.provider.complete(request)).await {
            Ok(result) => result.map(|response| response.message.content),
            Err(_) => Err(ProviderError::Timeout(format!(
                "{} gave no reply within {:?}",
                self.provider.name(),
                self.provider_timeout
            ))),
        }
    }

    /// Bound a catalog call by the catalog timeout.
    pub async fn catalog_call<T>(
        &self,
        operation: &str,
        call: impl Future<Output = Result<T, CatalogError>>,
    ) -> Result<T, CatalogError> {
        tokio::time::timeout(self.catalog_timeout, call)
            .await
            .unwrap_or_else(|_| {
                Err(CatalogError::Timeout(format!(
                    "{operation} exceeded {:?}",
                    self.catalog_timeout
                )))
            })
    }
}

/// The nodes of the step graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    Conversational,
    InterpretRequest,
    LocateDevice,
    ListGuides,
    SelectGuide,
    FetchGuide,
    FallbackSearch,
    FormatAnswer,
}

impl Step {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Conversational => "conversational_reply",
            Self::InterpretRequest => "interpret_request",
            Self::LocateDevice => "locate_device",
            Self::ListGuides => "list_guides",
            Self::SelectGuide => "select_guide",
            Self::FetchGuide => "fetch_guide",
            Self::FallbackSearch => "fallback_search",
            Self::FormatAnswer => "format_answer",
        }
    }

    /// Terminal steps set `answer_text`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Conversational | Self::FormatAnswer)
    }

    pub async fn run(&self, ctx: &StepContext, state: &PipelineState) -> StatePatch {
        match self {
            Self::Conversational => conversational::run(ctx, state).await,
            Self::InterpretRequest => interpret::run(ctx, state).await,
            Self::LocateDevice => locate::run(ctx, state).await,
            Self::ListGuides => list_guides::run(ctx, state).await,
            Self::SelectGuide => select::run(state),
            Self::FetchGuide => fetch::run(ctx, state).await,
            Self::FallbackSearch => fallback::run(ctx, state).await,
            Self::FormatAnswer => format::run(state),
        }
    }
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
