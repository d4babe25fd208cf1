//! iFixit API 2.0 client.
//!
//! Endpoints used:
//! - `GET /search/{query}?filter=device` for device resolution
//! - `GET /wikis/CATEGORY/{title}` for the guides filed under a device
//! - `GET /search/{query}?filter=guide` as a guide-search fallback
//! - `GET /guides/{id}` for full guide content
//!
//! Responses are reduced to the core catalog types right here so nothing
//! downstream depends on iFixit's JSON layout.

use async_trait::async_trait;
use repairkit_config::CatalogConfig;
use repairkit_core::catalog::*;
use repairkit_core::error::CatalogError;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

pub struct IfixitCatalog {
    base_url: String,
    client: reqwest::Client,
    max_devices: usize,
}

impl IfixitCatalog {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();

        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
            max_devices: 5,
        }
    }

    pub fn from_config(config: &CatalogConfig) -> Self {
        Self::new(&config.base_url, Duration::from_secs(config.timeout_secs))
            .with_max_devices(config.max_devices)
    }

    pub fn with_max_devices(mut self, max_devices: usize) -> Self {
        self.max_devices = max_devices;
        self
    }

    /// Build an endpoint URL, percent-encoding every path segment.
    fn endpoint(&self, segments: &[&str]) -> Result<reqwest::Url, CatalogError> {
        let mut url = reqwest::Url::parse(&self.base_url)
            .map_err(|e| CatalogError::InvalidResponse(format!("bad catalog base url: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| CatalogError::InvalidResponse("catalog base url cannot hold a path".into()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get_json(&self, url: reqwest::Url, what: &str) -> Result<Value, CatalogError> {
        debug!(url = %url, "Catalog request");

        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                CatalogError::Timeout(e.to_string())
            } else {
                CatalogError::Network(e.to_string())
            }
        })?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(CatalogError::NotFound(what.to_string()));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), body = %body, "Catalog returned error");
            return Err(CatalogError::ApiError {
                status_code: status.as_u16(),
                message: body,
            });
        }

        response
            .json()
            .await
            .map_err(|e| CatalogError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl DeviceCatalog for IfixitCatalog {
    fn name(&self) -> &str {
        "ifixit"
    }

    async fn search_devices(&self, query: &str) -> Result<Vec<DeviceHit>, CatalogError> {
        let mut url = self.endpoint(&["search", query])?;
        url.query_pairs_mut().append_pair("filter", "device");
        let body = self.get_json(url, query).await?;
        Ok(parse_devices(&body, self.max_devices))
    }

    async fn list_guides(&self, device_title: &str) -> Result<Vec<GuideSummary>, CatalogError> {
        let category = device_title.replace(' ', "_");
        let url = self.endpoint(&["wikis", "CATEGORY", &category])?;
        let body = self.get_json(url, device_title).await?;
        Ok(parse_guide_list(body.get("guides").unwrap_or(&Value::Null)))
    }

    async fn search_guides(&self, query: &str) -> Result<Vec<GuideSummary>, CatalogError> {
        let mut url = self.endpoint(&["search", query])?;
        url.query_pairs_mut().append_pair("filter", "guide");
        let body = self.get_json(url, query).await?;
        Ok(parse_guide_list(body.get("results").unwrap_or(&Value::Null)))
    }

    async fn fetch_guide(&self, guide_id: u64) -> Result<GuideDetail, CatalogError> {
        let id = guide_id.to_string();
        let url = self.endpoint(&["guides", &id])?;
        let body = self.get_json(url, &format!("guide {guide_id}")).await?;
        parse_guide(&body)
    }
}

fn text(value: &Value, key: &str) -> String {
    match value.get(key) {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

pub(crate) fn parse_devices(body: &Value, max: usize) -> Vec<DeviceHit> {
    body.get("results")
        .and_then(Value::as_array)
        .map(|results| {
            results
                .iter()
                .filter_map(|r| {
                    let title = text(r, "title");
                    (!title.is_empty()).then(|| DeviceHit {
                        title,
                        data_type: text(r, "dataType"),
                        url: text(r, "url"),
                    })
                })
                .take(max)
                .collect()
        })
        .unwrap_or_default()
}

pub(crate) fn parse_guide_list(guides: &Value) -> Vec<GuideSummary> {
    guides
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|g| {
                    let id = g.get("guideid").and_then(Value::as_u64)?;
                    Some(GuideSummary {
                        id,
                        title: text(g, "title"),
                        subject: text(g, "subject"),
                        guide_type: text(g, "type"),
                        difficulty: text(g, "difficulty"),
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}

pub(crate) fn parse_guide(body: &Value) -> Result<GuideDetail, CatalogError> {
    let id = body
        .get("guideid")
        .and_then(Value::as_u64)
        .ok_or_else(|| CatalogError::InvalidResponse("guide without guideid".into()))?;

    let named_list = |key: &str| -> Vec<String> {
        body.get(key)
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .map(|item| {
                        let t = text(item, "text");
                        if t.is_empty() { text(item, "name") } else { t }
                    })
                    .filter(|t| !t.is_empty())
                    .collect()
            })
            .unwrap_or_default()
    };

    let steps = body
        .get("steps")
        .and_then(Value::as_array)
        .map(|steps| {
            steps
                .iter()
                .enumerate()
                .map(|(i, s)| parse_step(s, i as u32 + 1))
                .collect()
        })
        .unwrap_or_default();

    Ok(GuideDetail {
        id,
        title: text(body, "title"),
        subject: text(body, "subject"),
        introduction: text(body, "introduction_raw"),
        difficulty: text(body, "difficulty"),
        time_required: text(body, "time_required"),
        tools: named_list("tools"),
        parts: named_list("parts"),
        steps,
    })
}

fn parse_step(step: &Value, position: u32) -> GuideStep {
    let order = step
        .get("orderby")
        .and_then(Value::as_u64)
        .map(|o| o as u32)
        .unwrap_or(position);

    let lines = step.get("lines").and_then(Value::as_array);

    let mut body = text(step, "text");
    if body.is_empty() {
        body = lines
            .map(|lines| {
                lines
                    .iter()
                    .filter_map(|line| {
                        let t = text(line, "text_raw");
                        if t.is_empty() {
                            return None;
                        }
                        let depth = line.get("level").and_then(Value::as_u64).unwrap_or(0) as usize;
                        Some(format!("{}- {t}", "  ".repeat(depth)))
                    })
                    .collect::<Vec<_>>()
                    .join("\n")
            })
            .unwrap_or_default();
    }

    let mut images: Vec<StepImage> = Vec::new();

    // Inline images are only taken from full-level lines.
    if let Some(lines) = lines {
        for line in lines {
            if line.get("level").and_then(Value::as_str) != Some("full") {
                continue;
            }
            if let Some(image) = line.get("image").and_then(image_of) {
                images.push(image);
            }
        }
    }

    if let Some(media) = step.get("media") {
        if media.get("type").and_then(Value::as_str) == Some("image") {
            if let Some(data) = media.get("data").and_then(Value::as_array) {
                images.extend(data.iter().filter_map(image_of));
            }
        }
    }

    GuideStep {
        order,
        title: text(step, "title"),
        body,
        images,
    }
}

fn image_of(value: &Value) -> Option<StepImage> {
    let url = text(value, "standard");
    if url.is_empty() {
        return None;
    }
    let thumbnail = text(value, "thumbnail");
    Some(StepImage {
        url,
        thumbnail: (!thumbnail.is_empty()).then_some(thumbnail),
    })
}
