//! Provider router: builds the configured providers and the fallback chain.

use crate::fallback::FallbackProvider;
use crate::openai_compat::OpenAiCompatProvider;
use repairkit_config::AppConfig;
use repairkit_core::provider::Provider;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Named providers plus the default selection.
pub struct ProviderRouter {
    providers: HashMap<String, Arc<dyn Provider>>,
    models: HashMap<String, String>,
    default_provider: String,
    fallback_order: Vec<String>,
    timeout: Duration,
}

impl ProviderRouter {
    /// Create a new router with a default provider.
    pub fn new(default_provider: impl Into<String>) -> Self {
        Self {
            providers: HashMap::new(),
            models: HashMap::new(),
            default_provider: default_provider.into(),
            fallback_order: Vec::new(),
            timeout: Duration::from_secs(30),
        }
    }

    /// Register a provider.
    pub fn register(&mut self, name: impl Into<String>, provider: Arc<dyn Provider>) {
        self.providers.insert(name.into(), provider);
    }

    /// Pin the model a provider answers with when it serves as a fallback.
    pub fn set_model(&mut self, name: impl Into<String>, model: impl Into<String>) {
        self.models.insert(name.into(), model.into());
    }

    pub fn with_fallbacks(mut self, order: Vec<String>) -> Self {
        self.fallback_order = order;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Get the default provider.
    pub fn default(&self) -> Option<Arc<dyn Provider>> {
        self.providers.get(&self.default_provider).cloned()
    }

    /// Get a specific provider by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Provider>> {
        self.providers.get(name).cloned()
    }

    /// List all registered provider names.
    pub fn list(&self) -> Vec<&str> {
        self.providers.keys().map(|s| s.as_str()).collect()
    }

    /// The provider the pipeline should call: the default one, wrapped in a
    /// [`FallbackProvider`] when fallbacks are configured.
    pub fn primary(&self) -> Option<Arc<dyn Provider>> {
        let default = self.default()?;
        if self.fallback_order.is_empty() {
            return Some(default);
        }

        let mut chain = FallbackProvider::new(format!("{}+fallback", self.default_provider))
            .add(default, self.timeout);
        for name in &self.fallback_order {
            let Some(provider) = self.get(name) else {
                warn!(provider = %name, "Fallback provider not registered, skipping");
                continue;
            };
            chain = match self.models.get(name) {
                Some(model) => chain.add_with_model(provider, self.timeout, model.clone()),
                None => chain.add(provider, self.timeout),
            };
        }
        Some(Arc::new(chain))
    }
}

/// Build providers from configuration.
pub fn build_from_config(config: &AppConfig) -> ProviderRouter {
    let mut router = ProviderRouter::new(&config.default_provider)
        .with_fallbacks(config.fallback_providers.clone())
        .with_timeout(Duration::from_secs(config.model_timeout_secs));

    for (name, provider_config) in &config.providers {
        let api_key = provider_config
            .api_key
            .clone()
            .or_else(|| config.api_key.clone())
            .unwrap_or_default();

        let base_url = provider_config
            .api_url
            .clone()
            .unwrap_or_else(|| default_base_url(name));

        router.register(
            name.clone(),
            Arc::new(OpenAiCompatProvider::new(name, &base_url, &api_key)),
        );
        if let Some(model) = &provider_config.default_model {
            router.set_model(name.clone(), model.clone());
        }
    }

    // Ensure the default provider exists (even if not explicitly configured)
    if router.get(&config.default_provider).is_none() {
        let api_key = config.api_key.clone().unwrap_or_default();
        let base_url = default_base_url(&config.default_provider);
        router.register(
            config.default_provider.clone(),
            Arc::new(OpenAiCompatProvider::new(
                &config.default_provider,
                &base_url,
                &api_key,
            )),
        );
    }

    router
}

/// Get the default base URL for well-known providers.
fn default_base_url(provider_name: &str) -> String {
    match provider_name {
        "gemini" => "https://generativelanguage.googleapis.com/v1beta/openai".into(),
        "openai" => "https://api.openai.com/v1".into(),
        "openrouter" => "https://openrouter.ai/api/v1".into(),
        "ollama" => "http://localhost:11434/v1".into(),
        "groq" => "https://api.groq.com/openai/v1".into(),
        _ => format!("https://{provider_name}.api.example.com/v1"),
    }
}
