//! DuckDuckGo Instant Answer client (free, no key).
//!
//! The Instant Answer endpoint returns an abstract plus a tree of related
//! topics. Both are flattened into plain search hits, abstract first.

use async_trait::async_trait;
use repairkit_core::error::SearchError;
use repairkit_core::search::{FallbackSearch, SearchHit};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

pub struct DuckDuckGoSearch {
    base_url: String,
    client: reqwest::Client,
}

impl DuckDuckGoSearch {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("repairkit/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_default();

        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        }
    }
}

fn s<'a>(value: &'a Value, key: &str) -> &'a str {
    value.get(key).and_then(Value::as_str).unwrap_or("").trim()
}

fn collect_topics(topics: &Value, out: &mut Vec<SearchHit>) {
    let Some(items) = topics.as_array() else {
        return;
    };
    for item in items {
        if let Some(nested) = item.get("Topics") {
            collect_topics(nested, out);
            continue;
        }
        let text = s(item, "Text");
        let url = s(item, "FirstURL");
        if text.is_empty() || url.is_empty() {
            continue;
        }
        let title = text.split(" - ").next().unwrap_or(text);
        out.push(SearchHit {
            title: title.to_string(),
            url: url.to_string(),
            snippet: text.to_string(),
        });
    }
}

pub(crate) fn parse_instant_answer(body: &Value, max_results: usize) -> Vec<SearchHit> {
    let mut hits = Vec::new();

    let abstract_text = s(body, "AbstractText");
    let abstract_url = s(body, "AbstractURL");
    if !abstract_text.is_empty() && !abstract_url.is_empty() {
        let heading = s(body, "Heading");
        hits.push(SearchHit {
            title: if heading.is_empty() { abstract_url } else { heading }.to_string(),
            url: abstract_url.to_string(),
            snippet: abstract_text.to_string(),
        });
    }

    collect_topics(body.get("RelatedTopics").unwrap_or(&Value::Null), &mut hits);
    hits.truncate(max_results);
    hits
}

#[async_trait]
impl FallbackSearch for DuckDuckGoSearch {
    fn name(&self) -> &str {
        "duckduckgo"
    }

    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>, SearchError> {
        debug!(query = %query, "DuckDuckGo search");

        let response = self
            .client
            .get(format!("{}/", self.base_url))
            .query(&[
                ("q", query),
                ("format", "json"),
                ("no_html", "1"),
                ("skip_disambig", "1"),
            ])
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    SearchError::Timeout(e.to_string())
                } else {
                    SearchError::Network(e.to_string())
                }
            })?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            return Err(SearchError::ApiError {
                status_code: status,
                message: response.text().await.unwrap_or_default(),
            });
        }

        // Served as application/x-javascript, so decode from text.
        let raw = response
            .text()
            .await
            .map_err(|e| SearchError::Network(e.to_string()))?;
        let body: Value =
            serde_json::from_str(&raw).map_err(|e| SearchError::InvalidResponse(e.to_string()))?;

        Ok(parse_instant_answer(&body, max_results))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn abstract_comes_first_then_flattened_topics() {
        let body = json!({
            "Heading": "PlayStation 5",
            "AbstractText": "The PlayStation 5 is a home console.",
            "AbstractURL": "https://en.wikipedia.org/wiki/PlayStation_5",
            "RelatedTopics": [
                {"Text": "PS5 fan noise - common causes", "FirstURL": "https://duckduckgo.com/a"},
                {"Name": "Hardware", "Topics": [
                    {"Text": "Dust cleaning - how to", "FirstURL": "https://duckduckgo.com/b"}
                ]},
                {"Text": "", "FirstURL": "https://duckduckgo.com/empty"}
            ]
        });

        let hits = parse_instant_answer(&body, 5);
        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].title, "PlayStation 5");
        assert_eq!(hits[1].title, "PS5 fan noise");
        assert_eq!(hits[2].url, "https://duckduckgo.com/b");
    }

    #[test]
    fn empty_answer_yields_no_hits() {
        let hits = parse_instant_answer(&json!({"AbstractText": "", "RelatedTopics": []}), 3);
        assert!(hits.is_empty());
    }

    #[test]
    fn hits_are_capped() {
        let topics: Vec<_> = (0..6)
            .map(|i| json!({"Text": format!("t{i}"), "FirstURL": format!("https://x/{i}")}))
            .collect();
        let hits = parse_instant_answer(&json!({"RelatedTopics": topics}), 3);
        assert_eq!(hits.len(), 3);
    }
}
