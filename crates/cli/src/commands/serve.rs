//! `repairkit serve`: Start the HTTP API server.

use repairkit_config::AppConfig;
use tracing::{error, info};

pub async fn run(mut config: AppConfig, port_override: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(port) = port_override {
        config.gateway.port = port;
    }

    println!("🔧 RepairKit Gateway");
    println!("   Listening:   {}:{}", config.gateway.host, config.gateway.port);
    println!("   Environment: {}", config.environment);
    println!("   Store:       {}", config.store.backend);

    info!(
        host = %config.gateway.host,
        port = config.gateway.port,
        environment = %config.environment,
        "Starting gateway"
    );
    repairkit_gateway::start(config)
        .await
        .inspect_err(|e| error!(error = %e, "Gateway stopped with an error"))?;

    Ok(())
}
