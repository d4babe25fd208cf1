//! DeviceCatalog trait: the structured repair-guide source.
//!
//! A catalog resolves device names, lists the guides filed under a device,
//! and returns full guide content. Result order is part of the contract:
//! the pipeline picks the first surviving device and breaks guide-score
//! ties by position.

use crate::error::CatalogError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A device search hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceHit {
    pub title: String,

    /// Catalog-specific record type (e.g. "wiki")
    #[serde(default)]
    pub data_type: String,

    #[serde(default)]
    pub url: String,
}

/// A guide listed for a device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuideSummary {
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub subject: String,
    /// Guide kind, e.g. "replacement" or "disassembly"
    #[serde(default, rename = "type")]
    pub guide_type: String,
    #[serde(default)]
    pub difficulty: String,
}

/// An image attached to a guide step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepImage {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
}

/// One numbered step of a guide.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuideStep {
    pub order: u32,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<StepImage>,
}

/// Full guide content.
///
/// Text fields may still carry the catalog's inline `[kind|target|label]`
/// markup; the fetch step converts it before the guide reaches the answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuideDetail {
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub introduction: String,
    #[serde(default)]
    pub difficulty: String,
    #[serde(default)]
    pub time_required: String,
    #[serde(default)]
    pub tools: Vec<String>,
    #[serde(default)]
    pub parts: Vec<String>,
    #[serde(default)]
    pub steps: Vec<GuideStep>,
}

#[async_trait]
pub trait DeviceCatalog: Send + Sync {
    /// The catalog name (e.g., "ifixit").
    fn name(&self) -> &str;

    /// Search for devices matching a free-text name. Order is relevance order.
    async fn search_devices(&self, query: &str) -> std::result::Result<Vec<DeviceHit>, CatalogError>;

    /// List the guides filed under a device title.
    async fn list_guides(&self, device_title: &str) -> std::result::Result<Vec<GuideSummary>, CatalogError>;

    /// Free-text guide search, used when a device has no guide listing.
    async fn search_guides(&self, query: &str) -> std::result::Result<Vec<GuideSummary>, CatalogError>;

    /// Fetch a guide's full content.
    async fn fetch_guide(&self, guide_id: u64) -> std::result::Result<GuideDetail, CatalogError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guide_summary_uses_type_on_the_wire() {
        let guide: GuideSummary = serde_json::from_str(
            r#"{"id":7,"title":"PS5 Fan Replacement","type":"replacement"}"#,
        )
        .unwrap();
        assert_eq!(guide.guide_type, "replacement");
        assert!(guide.subject.is_empty());
    }
}
