//! The repair pipeline: the heart of RepairKit.
//!
//! A request walks a fixed graph of steps:
//!
//! 1. **Route** the request: small talk and follow-ups go straight to a
//!    conversational reply, everything else enters the repair chain
//! 2. **Interpret** the request into a canonical device name
//! 3. **Locate** the device in the catalog and **list** its guides
//! 4. **Select** the guide that best matches the request
//! 5. **Fetch** that guide, or **fall back** to community web search
//! 6. **Format** the result as a Markdown answer
//!
//! Every step reads the shared [`PipelineState`] and returns a
//! [`StatePatch`]; the executor in [`graph`] applies patches, streams
//! progress, and contains failures at the run boundary.

pub mod context;
pub mod graph;
pub mod markup;
pub mod routing;
pub mod state;
pub mod steps;
pub mod stream_event;
pub mod title;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use context::{ContextBudget, TokenCounter, create_context_summary, estimate_cost, estimate_tokens};
pub use graph::{GENERIC_ERROR, MAX_STEPS, RepairPipeline, RunReport};
pub use routing::{EntryRoute, MidChainRoute};
pub use state::{FallbackHit, PipelineState, ResolvedDevice, ResolvedSteps, StatePatch};
pub use steps::{Step, StepContext};
pub use stream_event::PipelineEvent;
