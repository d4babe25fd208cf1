//! `repairkit doctor`: Diagnose configuration and dependencies.

use repairkit_agent::TokenCounter;
use repairkit_core::provider::Provider;
use repairkit_core::store::SessionStore;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Ask the provider the pipeline would call whether it is reachable.
async fn check_provider(provider: Option<Arc<dyn Provider>>) -> Result<String, String> {
    let Some(provider) = provider else {
        return Err("No default provider configured".into());
    };
    debug!(provider = provider.name(), "Checking provider health");
    match provider.health_check().await {
        Ok(true) => Ok(format!("Provider reachable ({})", provider.name())),
        Ok(false) => Err(format!("Provider {} rejected the health check", provider.name())),
        Err(e) => Err(format!("Provider {} unreachable: {e}", provider.name())),
    }
}

pub async fn run(explicit: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    println!("🩺 RepairKit Doctor");
    println!("===================\n");

    let mut issues = 0;
    let config_path = super::config_path(explicit);

    if config_path.exists() {
        println!("  ✅ Config file found: {}", config_path.display());
    } else {
        println!("  ⚠️  No config file; defaults apply (run `repairkit init`)");
    }

    let config = match super::load_config(explicit) {
        Ok(config) => {
            println!("  ✅ Config valid");
            config
        }
        Err(e) => {
            println!("  ❌ {e}");
            println!("\n  ⚠️  Fix the config before running further checks.");
            return Ok(());
        }
    };

    if config.has_api_key() || config.providers.values().any(|p| p.api_key.is_some()) {
        println!("  ✅ API key configured");
    } else {
        println!("  ⚠️  No API key; set GEMINI_API_KEY or api_key in config.toml");
        issues += 1;
    }

    let providers = repairkit_providers::router::build_from_config(&config);
    match check_provider(providers.primary()).await {
        Ok(line) => println!("  ✅ {line}"),
        Err(line) => {
            warn!(provider = %config.default_provider, "{line}");
            println!("  ❌ {line}");
            issues += 1;
        }
    }

    if config.search.tavily_api_key.is_none() && !config.search.duckduckgo_enabled {
        println!("  ⚠️  No fallback search backend enabled");
        issues += 1;
    } else {
        println!("  ✅ Fallback search available");
    }

    match &config.context.tokenizer_path {
        Some(path) => match TokenCounter::from_file(path) {
            Ok(_) => println!("  ✅ Tokenizer loaded from {path}"),
            Err(e) => {
                println!("  ❌ Tokenizer failed to load: {e}");
                issues += 1;
            }
        },
        None => println!("  ✅ Token counts use the word estimate"),
    }

    match repairkit_store::open(&config.store).await {
        Ok(store) => println!("  ✅ Store opened ({})", store.name()),
        Err(e) => {
            println!("  ❌ Store failed to open: {e}");
            issues += 1;
        }
    }

    info!(issues, "Doctor finished");
    println!();
    if issues == 0 {
        println!("  🎉 All checks passed!");
    } else {
        println!("  ⚠️  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use repairkit_core::error::ProviderError;
    use repairkit_core::provider::{ProviderRequest, ProviderResponse};

    struct HealthStub(Result<bool, ProviderError>);

    #[async_trait::async_trait]
    impl Provider for HealthStub {
        fn name(&self) -> &str {
            "stub"
        }

        async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
            Err(ProviderError::NotConfigured("stub".into()))
        }

        async fn health_check(&self) -> Result<bool, ProviderError> {
            self.0.clone()
        }
    }

    #[tokio::test]
    async fn healthy_provider_passes() {
        let line = check_provider(Some(Arc::new(HealthStub(Ok(true))))).await.unwrap();
        assert_eq!(line, "Provider reachable (stub)");
    }

    #[tokio::test]
    async fn unhealthy_or_unreachable_provider_is_an_issue() {
        assert!(check_provider(Some(Arc::new(HealthStub(Ok(false))))).await.is_err());
        let err = check_provider(Some(Arc::new(HealthStub(Err(ProviderError::Network("refused".into()))))))
            .await
            .unwrap_err();
        assert!(err.contains("unreachable"));
    }

    #[tokio::test]
    async fn missing_provider_is_an_issue() {
        assert_eq!(check_provider(None).await.unwrap_err(), "No default provider configured");
    }
}
