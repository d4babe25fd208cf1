//! Conversation context management.
//!
//! - [`token`] counts tokens (exact with a loaded tokenizer, estimated otherwise)
//!   and prices usage per model.
//! - [`budget`] trims history to a message and token budget and summarises
//!   what it dropped.

pub mod budget;
pub mod token;

pub use budget::{ContextBudget, create_context_summary};
pub use token::{TokenCounter, estimate_cost, estimate_tokens};
