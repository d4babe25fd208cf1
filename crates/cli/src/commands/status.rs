//! `repairkit status`: Show the effective configuration.

use repairkit_config::AppConfig;

fn on_off(enabled: bool) -> &'static str {
    if enabled { "enabled" } else { "disabled" }
}

pub async fn run(config: &AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    println!("🔧 RepairKit Status");
    println!("===================");
    println!("  Config dir:   {}", AppConfig::config_dir().display());
    println!("  Environment:  {}", config.environment);
    println!("  Provider:     {}", config.default_provider);
    println!("  Model:        {}", config.default_model);
    println!("  Temperature:  {}", config.default_temperature);
    if !config.fallback_providers.is_empty() {
        println!("  Fallbacks:    {}", config.fallback_providers.join(", "));
    }
    println!("  Catalog:      {}", config.catalog.base_url);
    println!("  Tavily:       {}", on_off(config.search.tavily_api_key.is_some()));
    println!("  DuckDuckGo:   {}", on_off(config.search.duckduckgo_enabled));
    println!(
        "  Context:      {} tokens / {} messages",
        config.context.max_tokens, config.context.max_messages
    );
    println!(
        "  Tokenizer:    {}",
        config.context.tokenizer_path.as_deref().unwrap_or("word estimate")
    );
    println!("  Store:        {}", config.store.backend);
    println!("  Gateway:      {}:{}", config.gateway.host, config.gateway.port);
    println!("  Auth:         {}", on_off(config.auth.is_configured()));

    Ok(())
}
