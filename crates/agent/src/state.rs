//! Typed pipeline state.
//!
//! One [`PipelineState`] exists per run and is owned by the executor.
//! Steps never mutate it directly: they read `&PipelineState` and return
//! a [`StatePatch`], which the executor merges with [`PipelineState::apply`].
//! `apply` is where the write-once and append-only rules live.

use repairkit_core::catalog::{GuideDetail, GuideSummary};
use repairkit_core::message::Message;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Source type written by locate-device when no catalog entry survives filtering.
pub const SYNTHESIZED_SOURCE: &str = "synthesized";

/// The device the catalog lookups will use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedDevice {
    pub title: String,
    pub source_type: String,
}

impl ResolvedDevice {
    /// Placeholder used when the catalog returns nothing usable.
    pub fn synthesized(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            source_type: SYNTHESIZED_SOURCE.to_string(),
        }
    }

    pub fn is_synthesized(&self) -> bool {
        self.source_type == SYNTHESIZED_SOURCE
    }
}

/// One normalized community result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FallbackHit {
    pub title: String,
    pub link: String,
    pub snippet: String,
}

/// Repair content produced by exactly one of fetch-guide or fallback-search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResolvedSteps {
    Catalog(GuideDetail),
    Fallback {
        source: String,
        results: Vec<FallbackHit>,
    },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineState {
    /// The caller's raw message.
    pub request_text: String,
    /// Prior turns, already trimmed by the context budgeter.
    pub conversation_history: Vec<Message>,
    /// Set once by interpret-request. The only value sent to the catalog.
    pub canonical_device: Option<String>,
    pub resolved_device: Option<ResolvedDevice>,
    pub guide_candidates: Option<Vec<GuideSummary>>,
    pub chosen_guide: Option<GuideSummary>,
    pub resolved_steps: Option<ResolvedSteps>,
    pub used_fallback: bool,
    /// Set once by a terminal step. Its presence ends the run.
    pub answer_text: Option<String>,
    pub progress_log: Vec<String>,

    pub user_id: String,
    pub session_id: String,
}

impl PipelineState {
    pub fn new(request_text: impl Into<String>, conversation_history: Vec<Message>) -> Self {
        Self {
            request_text: request_text.into(),
            conversation_history,
            ..Default::default()
        }
    }

    /// Attach the caller bookkeeping carried through to persistence.
    pub fn with_caller(mut self, user_id: impl Into<String>, session_id: impl Into<String>) -> Self {
        self.user_id = user_id.into();
        self.session_id = session_id.into();
        self
    }

    pub fn is_finished(&self) -> bool {
        self.answer_text.is_some()
    }

    /// Merge a step's patch.
    ///
    /// `canonical_device` and `answer_text` are write-once: a second write
    /// is dropped and logged. `used_fallback` only ever goes from false to
    /// true. Progress entries are appended in order.
    pub fn apply(&mut self, patch: StatePatch) {
        if let Some(device) = patch.canonical_device {
            match &self.canonical_device {
                None => self.canonical_device = Some(device),
                Some(existing) if *existing != device => {
                    warn!(existing = %existing, rejected = %device, "canonical_device is write-once");
                }
                Some(_) => {}
            }
        }
        if let Some(device) = patch.resolved_device {
            self.resolved_device = Some(device);
        }
        if let Some(guides) = patch.guide_candidates {
            self.guide_candidates = Some(guides);
        }
        if let Some(guide) = patch.chosen_guide {
            self.chosen_guide = Some(guide);
        }
        if let Some(steps) = patch.resolved_steps {
            self.resolved_steps = Some(steps);
        }
        self.used_fallback |= patch.used_fallback;
        if let Some(answer) = patch.answer_text {
            if self.answer_text.is_none() {
                self.answer_text = Some(answer);
            } else {
                warn!("answer_text is write-once; ignoring second answer");
            }
        }
        self.progress_log.extend(patch.progress);
    }
}

/// Changes a single step wants to make. `None` means "leave as is".
#[derive(Debug, Clone, Default)]
pub struct StatePatch {
    pub canonical_device: Option<String>,
    pub resolved_device: Option<ResolvedDevice>,
    pub guide_candidates: Option<Vec<GuideSummary>>,
    pub chosen_guide: Option<GuideSummary>,
    pub resolved_steps: Option<ResolvedSteps>,
    pub used_fallback: bool,
    pub answer_text: Option<String>,
    pub progress: Vec<String>,
}

impl StatePatch {
    /// A patch that only records a status line.
    pub fn status(text: impl Into<String>) -> Self {
        Self {
            progress: vec![text.into()],
            ..Default::default()
        }
    }

    /// Append another status line.
    pub fn note(mut self, text: impl Into<String>) -> Self {
        self.progress.push(text.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_device_is_write_once() {
        let mut state = PipelineState::new("my ps5 fan is loud", vec![]);
        state.apply(StatePatch {
            canonical_device: Some("PlayStation 5".into()),
            ..Default::default()
        });
        state.apply(StatePatch {
            canonical_device: Some("PlayStation 5 fan noise".into()),
            ..Default::default()
        });
        assert_eq!(state.canonical_device.as_deref(), Some("PlayStation 5"));
    }

    #[test]
    fn used_fallback_never_resets() {
        let mut state = PipelineState::default();
        state.apply(StatePatch {
            used_fallback: true,
            ..Default::default()
        });
        state.apply(StatePatch::status("next"));
        assert!(state.used_fallback);
    }

    #[test]
    fn answer_is_write_once_and_progress_appends() {
        let mut state = PipelineState::default();
        state.apply(StatePatch {
            answer_text: Some("first".into()),
            ..StatePatch::status("a").note("b")
        });
        state.apply(StatePatch {
            answer_text: Some("second".into()),
            ..StatePatch::status("c")
        });
        assert_eq!(state.answer_text.as_deref(), Some("first"));
        assert_eq!(state.progress_log, vec!["a", "b", "c"]);
        assert!(state.is_finished());
    }

    #[test]
    fn synthesized_placeholder() {
        let device = ResolvedDevice::synthesized("Framework Laptop 13");
        assert!(device.is_synthesized());
        assert_eq!(device.title, "Framework Laptop 13");
    }
}
