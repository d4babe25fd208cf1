//! Subcommand implementations.

pub mod ask;
pub mod doctor;
pub mod init;
pub mod serve;
pub mod status;

use repairkit_agent::RepairPipeline;
use repairkit_config::AppConfig;
use std::path::{Path, PathBuf};
use tracing::info;

/// The config file in use: the explicit path or the default location.
pub fn config_path(explicit: Option<&Path>) -> PathBuf {
    explicit
        .map(Path::to_path_buf)
        .unwrap_or_else(|| AppConfig::config_dir().join("config.toml"))
}

pub fn load_config(explicit: Option<&Path>) -> Result<AppConfig, Box<dyn std::error::Error>> {
    let path = config_path(explicit);
    AppConfig::load_with_env(&path)
        .map_err(|e| format!("Failed to load config: {e}").into())
}

/// Wire providers and knowledge sources from config.
pub fn build_pipeline(config: &AppConfig) -> Result<RepairPipeline, Box<dyn std::error::Error>> {
    let providers = repairkit_providers::router::build_from_config(config);
    let provider = providers
        .primary()
        .ok_or("No default provider configured")?;
    let catalog = repairkit_sources::build_catalog(config);
    let searchers = repairkit_sources::build_searchers(config);
    info!(
        provider = provider.name(),
        model = %config.default_model,
        catalog = catalog.name(),
        searchers = searchers.len(),
        "Pipeline wired"
    );
    Ok(RepairPipeline::from_config(config, provider, catalog, searchers))
}
