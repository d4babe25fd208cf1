//! Shared test doubles for pipeline tests.

use async_trait::async_trait;
use repairkit_core::catalog::{DeviceCatalog, DeviceHit, GuideDetail, GuideStep, GuideSummary};
use repairkit_core::error::{CatalogError, ProviderError, SearchError};
use repairkit_core::message::Message;
use repairkit_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};
use repairkit_core::search::{FallbackSearch, SearchHit};
use std::sync::Mutex;
use std::time::Duration;

/// A mock provider that returns a sequence of scripted responses.
///
/// Each call to `complete` returns the next response in the queue and
/// records the request. Panics if more calls are made than responses provided.
pub struct SequentialMockProvider {
    responses: Mutex<Vec<Result<ProviderResponse, ProviderError>>>,
    call_count: Mutex<usize>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl SequentialMockProvider {
    pub fn new(responses: Vec<Result<ProviderResponse, ProviderError>>) -> Self {
        Self {
            responses: Mutex::new(responses),
            call_count: Mutex::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Text answers, one per call.
    pub fn texts(texts: &[&str]) -> Self {
        Self::new(texts.iter().map(|t| Ok(make_text_response(t))).collect())
    }

    pub fn single_text(text: &str) -> Self {
        Self::texts(&[text])
    }

    /// Every call fails.
    pub fn failing(times: usize) -> Self {
        Self::new(
            (0..times)
                .map(|_| Err(ProviderError::Network("connection refused".into())))
                .collect(),
        )
    }

    pub fn call_count(&self) -> usize {
        *self.call_count.lock().unwrap()
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for SequentialMockProvider {
    fn name(&self) -> &str {
        "sequential_mock"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        self.requests.lock().unwrap().push(request);
        let mut count = self.call_count.lock().unwrap();
        let responses = self.responses.lock().unwrap();

        if *count >= responses.len() {
            panic!(
                "SequentialMockProvider: no more responses (call #{}, have {})",
                *count,
                responses.len()
            );
        }

        let response = responses[*count].clone();
        *count += 1;
        response
    }
}

/// Create a simple text response.
pub fn make_text_response(text: &str) -> ProviderResponse {
    ProviderResponse {
        message: Message::assistant(text),
        usage: Some(Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        }),
        model: "mock-model".into(),
    }
}

/// Catalog with canned answers and a log of every query it saw.
#[derive(Default)]
pub struct FakeCatalog {
    pub devices: Vec<DeviceHit>,
    pub guides: Vec<GuideSummary>,
    pub searched_guides: Vec<GuideSummary>,
    pub detail: Option<GuideDetail>,
    pub fail_devices: bool,
    pub fail_fetch: bool,
    pub calls: Mutex<Vec<String>>,
}

impl FakeCatalog {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn log(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl DeviceCatalog for FakeCatalog {
    fn name(&self) -> &str {
        "fake"
    }

    async fn search_devices(&self, query: &str) -> Result<Vec<DeviceHit>, CatalogError> {
        self.log(format!("search_devices:{query}"));
        if self.fail_devices {
            return Err(CatalogError::Timeout("search_devices".into()));
        }
        Ok(self.devices.clone())
    }

    async fn list_guides(&self, device_title: &str) -> Result<Vec<GuideSummary>, CatalogError> {
        self.log(format!("list_guides:{device_title}"));
        Ok(self.guides.clone())
    }

    async fn search_guides(&self, query: &str) -> Result<Vec<GuideSummary>, CatalogError> {
        self.log(format!("search_guides:{query}"));
        Ok(self.searched_guides.clone())
    }

    async fn fetch_guide(&self, guide_id: u64) -> Result<GuideDetail, CatalogError> {
        self.log(format!("fetch_guide:{guide_id}"));
        match (&self.detail, self.fail_fetch) {
            (Some(detail), false) => Ok(detail.clone()),
            _ => Err(CatalogError::NotFound(format!("guide {guide_id}"))),
        }
    }
}

/// Search backend with a fixed outcome.
pub struct FakeSearch {
    name: &'static str,
    outcome: Result<Vec<SearchHit>, SearchError>,
    delay: Option<Duration>,
    pub calls: Mutex<usize>,
}

impl FakeSearch {
    pub fn ok(name: &'static str, hits: Vec<SearchHit>) -> Self {
        Self {
            name,
            outcome: Ok(hits),
            delay: None,
            calls: Mutex::new(0),
        }
    }

    pub fn failing(name: &'static str) -> Self {
        Self {
            name,
            outcome: Err(SearchError::Network("unreachable".into())),
            delay: None,
            calls: Mutex::new(0),
        }
    }

    pub fn slow(name: &'static str, delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::ok(name, vec![hit("slow result")])
        }
    }

    pub fn call_count(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl FallbackSearch for FakeSearch {
    fn name(&self) -> &str {
        self.name
    }

    async fn search(&self, _query: &str, max_results: usize) -> Result<Vec<SearchHit>, SearchError> {
        *self.calls.lock().unwrap() += 1;
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.outcome
            .clone()
            .map(|hits| hits.into_iter().take(max_results).collect())
    }
}

pub fn hit(title: &str) -> SearchHit {
    SearchHit {
        title: title.to_string(),
        url: format!("https://example.com/{}", title.replace(' ', "-")),
        snippet: format!("{title} snippet"),
    }
}

pub fn device(title: &str) -> DeviceHit {
    DeviceHit {
        title: title.to_string(),
        data_type: "wiki".into(),
        url: format!("https://www.ifixit.com/Device/{}", title.replace(' ', "_")),
    }
}

pub fn guide(id: u64, title: &str, subject: &str) -> GuideSummary {
    GuideSummary {
        id,
        title: title.to_string(),
        subject: subject.to_string(),
        guide_type: "replacement".into(),
        difficulty: "Moderate".into(),
    }
}

pub fn guide_detail(id: u64, title: &str) -> GuideDetail {
    GuideDetail {
        id,
        title: title.to_string(),
        subject: "Battery".into(),
        introduction: "Swap a worn battery.".into(),
        difficulty: "Moderate".into(),
        time_required: "1 - 2 hours".into(),
        tools: vec!["Spudger".into()],
        parts: vec!["Replacement battery".into()],
        steps: vec![GuideStep {
            order: 1,
            title: "Remove the back cover".into(),
            body: "Pry gently. See [guide|42|Opening Procedure].".into(),
            images: vec![],
        }],
    }
}
