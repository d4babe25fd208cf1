//! Text-generation provider implementations for RepairKit.
//!
//! All providers implement the `repairkit_core::Provider` trait.
//! The router builds the configured provider, wrapped in a fallback chain
//! when secondary providers are listed.

pub mod fallback;
pub mod openai_compat;
pub mod router;

pub use fallback::FallbackProvider;
pub use openai_compat::OpenAiCompatProvider;
pub use router::{ProviderRouter, build_from_config};
