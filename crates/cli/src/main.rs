//! RepairKit CLI: the main entry point.
//!
//! Commands:
//! - `init`   : Create the config directory and a default config file
//! - `ask`    : Ask a repair question (single message or interactive)
//! - `serve`  : Start the HTTP gateway
//! - `status` : Show the effective configuration
//! - `doctor` : Diagnose configuration and dependencies

use clap::{Parser, Subcommand};
use repairkit_config::AppConfig;
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(
    name = "repairkit",
    about = "RepairKit: device repair assistant backed by iFixit guides",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (defaults to ~/.repairkit/config.toml)
    #[arg(short, long, global = true, env = "REPAIRKIT_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the config directory and a default config file
    Init,

    /// Ask a repair question
    Ask {
        /// The question; omit to enter interactive mode
        message: Option<String>,

        /// Hide progress lines
        #[arg(short, long)]
        quiet: bool,
    },

    /// Start the HTTP gateway
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Show the effective configuration
    Status,

    /// Diagnose configuration and dependencies
    Doctor,
}

fn init_tracing(verbose: bool, config: Option<&AppConfig>) {
    let level = if verbose {
        "debug"
    } else {
        config.map_or("info", |c| c.log_level.as_str())
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    if config.is_some_and(|c| c.log_format.eq_ignore_ascii_case("json")) {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // `init` and `doctor` must work without a valid config.
    let config = match cli.command {
        Commands::Init | Commands::Doctor => None,
        _ => Some(commands::load_config(cli.config.as_deref())?),
    };
    init_tracing(cli.verbose, config.as_ref());

    match (cli.command, config) {
        (Commands::Init, _) => commands::init::run(cli.config.as_deref()).await?,
        (Commands::Doctor, _) => commands::doctor::run(cli.config.as_deref()).await?,
        (Commands::Ask { message, quiet }, Some(config)) => {
            commands::ask::run(config, message, quiet).await?
        }
        (Commands::Serve { port }, Some(config)) => commands::serve::run(config, port).await?,
        (Commands::Status, Some(config)) => commands::status::run(&config).await?,
        (_, None) => return Err("configuration was not loaded".into()),
    }

    Ok(())
}
