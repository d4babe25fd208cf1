//! Pipeline streaming events.
//!
//! `PipelineEvent` is what a run emits to its caller. The gateway forwards
//! each one as an SSE frame, using [`PipelineEvent::event_type`] as the
//! event name. A run emits any number of `status` events, then exactly
//! one `answer` or `error`, then `done`.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PipelineEvent {
    /// A progress line appended by a step.
    Status { text: String },

    /// The final answer.
    Answer { text: String },

    /// The run failed unexpectedly. The text is safe to show to users.
    Error { text: String },

    /// The stream is complete.
    Done,
}

impl PipelineEvent {
    /// SSE event name for this event type.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Status { .. } => "status",
            Self::Answer { .. } => "answer",
            Self::Error { .. } => "error",
            Self::Done => "done",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done)
    }
}
