//! # RepairKit Core
//!
//! Domain types, capability traits, and error definitions for RepairKit.
//! This crate has **zero framework dependencies**; it defines the domain model
//! that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every external collaborator of the repair pipeline is a trait here:
//! text generation, the device catalog, fallback search, the session store
//! and token verification. Implementations live in their respective crates,
//! so tests swap in fakes and the pipeline never touches HTTP or SQL directly.

pub mod auth;
pub mod catalog;
pub mod error;
pub mod message;
pub mod provider;
pub mod search;
pub mod store;

// Re-export key types at crate root for ergonomics
pub use auth::{Caller, TokenVerifier};
pub use catalog::{DeviceCatalog, DeviceHit, GuideDetail, GuideStep, GuideSummary, StepImage};
pub use error::{Error, Result};
pub use message::{Message, Role};
pub use provider::{Provider, ProviderRequest, ProviderResponse, Usage};
pub use search::{FallbackSearch, SearchHit};
pub use store::{Session, SessionStore, StoredMessage, UsageRecord, UsageTotals};
