//! Provider fallback: ordered chain with per-provider timeouts.
//!
//! When the primary provider fails (timeout, rate limit, error), the next
//! provider in the chain gets the same request. Each entry may pin its own
//! model, since model names rarely carry across vendors.

use async_trait::async_trait;
use repairkit_core::Provider;
use repairkit_core::error::ProviderError;
use repairkit_core::provider::{ProviderRequest, ProviderResponse};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

const DEFAULT_ENTRY_TIMEOUT: Duration = Duration::from_secs(30);

/// A provider that wraps an ordered list of providers and falls back on failure.
pub struct FallbackProvider {
    name: String,
    chain: Vec<FallbackEntry>,
}

struct FallbackEntry {
    provider: Arc<dyn Provider>,
    timeout: Duration,
    model: Option<String>,
}

impl FallbackEntry {
    async fn attempt(&self, mut request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        if let Some(model) = &self.model {
            request.model = model.clone();
        }
        match tokio::time::timeout(self.timeout, self.provider.complete(request)).await {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Timeout(format!(
                "Provider '{}' timed out after {}s",
                self.provider.name(),
                self.timeout.as_secs_f32()
            ))),
        }
    }
}

impl FallbackProvider {
    /// Create a new fallback provider with no entries.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            chain: Vec::new(),
        }
    }

    /// Append a provider that receives the request's model unchanged.
    pub fn add(mut self, provider: Arc<dyn Provider>, timeout: Duration) -> Self {
        self.chain.push(FallbackEntry {
            provider,
            timeout,
            model: None,
        });
        self
    }

    /// Append a provider that always answers with `model`.
    pub fn add_with_model(
        mut self,
        provider: Arc<dyn Provider>,
        timeout: Duration,
        model: impl Into<String>,
    ) -> Self {
        self.chain.push(FallbackEntry {
            provider,
            timeout,
            model: Some(model.into()),
        });
        self
    }

    /// Append a provider with the default 30s timeout.
    pub fn add_default(self, provider: Arc<dyn Provider>) -> Self {
        self.add(provider, DEFAULT_ENTRY_TIMEOUT)
    }

    pub fn len(&self) -> usize {
        self.chain.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }
}

#[async_trait]
impl Provider for FallbackProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(
        &self,
        request: ProviderRequest,
    ) -> std::result::Result<ProviderResponse, ProviderError> {
        let mut last_error = ProviderError::NotConfigured("No providers in fallback chain".into());

        for (i, entry) in self.chain.iter().enumerate() {
            info!(
                provider = %entry.provider.name(),
                attempt = i + 1,
                total = self.chain.len(),
                "Fallback: trying provider"
            );

            match entry.attempt(request.clone()).await {
                Ok(response) => return Ok(response),
                Err(e) => {
                    warn!(
                        provider = %entry.provider.name(),
                        error = %e,
                        "Fallback: provider failed, trying next"
                    );
                    last_error = e;
                }
            }
        }

        Err(last_error)
    }

    async fn health_check(&self) -> std::result::Result<bool, ProviderError> {
        for entry in &self.chain {
            if let Ok(true) = entry.provider.health_check().await {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use repairkit_core::message::Message;
    use std::sync::Mutex;

    /// Answers with the model it was asked for, or fails with a fixed error.
    struct StubProvider {
        name: String,
        error: Option<ProviderError>,
        delay: Option<Duration>,
        seen_models: Mutex<Vec<String>>,
    }

    impl StubProvider {
        fn ok(name: &str) -> Arc<Self> {
            Arc::new(Self {
                name: name.into(),
                error: None,
                delay: None,
                seen_models: Mutex::new(Vec::new()),
            })
        }

        fn failing(name: &str, error: ProviderError) -> Arc<Self> {
            Arc::new(Self {
                name: name.into(),
                error: Some(error),
                delay: None,
                seen_models: Mutex::new(Vec::new()),
            })
        }

        fn slow(name: &str, delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                name: name.into(),
                error: None,
                delay: Some(delay),
                seen_models: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> usize {
            self.seen_models.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl Provider for StubProvider {
        fn name(&self) -> &str {
            &self.name
        }

        async fn complete(
            &self,
            request: ProviderRequest,
        ) -> std::result::Result<ProviderResponse, ProviderError> {
            self.seen_models.lock().unwrap().push(request.model.clone());
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            match &self.error {
                Some(e) => Err(e.clone()),
                None => Ok(ProviderResponse {
                    message: Message::assistant(format!("{} via {}", request.model, self.name)),
                    usage: None,
                    model: request.model,
                }),
            }
        }
    }

    fn request() -> ProviderRequest {
        ProviderRequest::new("gemini-2.5-flash", vec![Message::user("my ps5 fan is loud")])
    }

    #[tokio::test]
    async fn primary_answers_without_touching_secondary() {
        let primary = StubProvider::ok("gemini");
        let secondary = StubProvider::ok("openai");
        let chain = FallbackProvider::new("chain")
            .add_default(primary.clone())
            .add_default(secondary.clone());

        let response = chain.complete(request()).await.unwrap();
        assert_eq!(response.message.content, "gemini-2.5-flash via gemini");
        assert_eq!(primary.calls(), 1);
        assert_eq!(secondary.calls(), 0);
    }

    #[tokio::test]
    async fn secondary_uses_its_pinned_model() {
        let primary = StubProvider::failing("gemini", ProviderError::RateLimited { retry_after_secs: 5 });
        let secondary = StubProvider::ok("openai");
        let chain = FallbackProvider::new("chain")
            .add_default(primary.clone())
            .add_with_model(secondary.clone(), DEFAULT_ENTRY_TIMEOUT, "gpt-4o-mini");

        let response = chain.complete(request()).await.unwrap();
        assert_eq!(response.model, "gpt-4o-mini");
        assert_eq!(primary.seen_models.lock().unwrap()[0], "gemini-2.5-flash");
        assert_eq!(secondary.seen_models.lock().unwrap()[0], "gpt-4o-mini");
    }

    #[tokio::test]
    async fn exhausted_chain_returns_last_error() {
        let chain = FallbackProvider::new("chain")
            .add_default(StubProvider::failing("a", ProviderError::Network("refused".into())))
            .add_default(StubProvider::failing(
                "b",
                ProviderError::AuthenticationFailed("bad key".into()),
            ));

        let err = chain.complete(request()).await.unwrap_err();
        assert!(matches!(err, ProviderError::AuthenticationFailed(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_entry_times_out_and_falls_through() {
        let slow = StubProvider::slow("slow", Duration::from_secs(3600));
        let backup = StubProvider::ok("backup");
        let chain = FallbackProvider::new("chain")
            .add(slow.clone(), Duration::from_millis(50))
            .add_default(backup.clone());

        let response = chain.complete(request()).await.unwrap();
        assert!(response.message.content.ends_with("via backup"));
        assert_eq!(slow.calls(), 1);
    }

    #[tokio::test]
    async fn empty_chain_is_not_configured() {
        let chain = FallbackProvider::new("empty");
        assert!(chain.is_empty());
        let err = chain.complete(request()).await.unwrap_err();
        assert!(matches!(err, ProviderError::NotConfigured(_)));
    }

    #[tokio::test]
    async fn health_check_passes_when_any_entry_is_healthy() {
        let chain = FallbackProvider::new("chain")
            .add_default(StubProvider::ok("a"))
            .add_default(StubProvider::ok("b"));
        assert_eq!(chain.len(), 2);
        assert!(chain.health_check().await.unwrap());
    }
}
