//! `repairkit ask`: Single-question or interactive mode.

use repairkit_agent::{ContextBudget, PipelineEvent, PipelineState, RepairPipeline};
use repairkit_config::AppConfig;
use repairkit_core::message::Message;
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info, warn};

/// Run one request, echoing progress to stderr. Returns the answer or the
/// error text the pipeline reported.
async fn ask_once(
    pipeline: &RepairPipeline,
    message: &str,
    history: Vec<Message>,
    quiet: bool,
) -> Result<String, String> {
    let mut events = pipeline.run_stream(PipelineState::new(message, history));
    let mut outcome = Err("No answer was produced.".to_string());

    while let Some(event) = events.recv().await {
        let finished = event.is_terminal();
        match event {
            PipelineEvent::Status { text } => {
                if !quiet {
                    eprintln!("  · {text}");
                }
            }
            PipelineEvent::Answer { text } => outcome = Ok(text),
            PipelineEvent::Error { text } => {
                warn!(error = %text, "Pipeline run failed");
                outcome = Err(text)
            }
            PipelineEvent::Done => debug!("Pipeline stream finished"),
        }
        if finished {
            break;
        }
    }

    outcome
}

pub async fn run(
    config: AppConfig,
    message: Option<String>,
    quiet: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    if !config.has_api_key() && config.providers.values().all(|p| p.api_key.is_none()) {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set one of these environment variables:");
        eprintln!("    GEMINI_API_KEY     (default provider)");
        eprintln!("    OPENAI_API_KEY     (OpenAI)");
        eprintln!("    REPAIRKIT_API_KEY  (generic)");
        eprintln!();
        eprintln!("  Or add it to your config file:");
        eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    }

    let pipeline = super::build_pipeline(&config)?;

    if let Some(message) = message {
        match ask_once(&pipeline, &message, Vec::new(), quiet).await {
            Ok(answer) => println!("{answer}"),
            Err(error) => return Err(error.into()),
        }
        return Ok(());
    }

    let budget = ContextBudget::from_config(&config.context);
    info!(
        max_messages = config.context.max_messages,
        exact_tokens = budget.counter().is_exact(),
        "Starting interactive session"
    );

    println!();
    println!("  ╔══════════════════════════════════════════════╗");
    println!("  ║        RepairKit - Interactive Mode          ║");
    println!("  ╚══════════════════════════════════════════════╝");
    println!();
    println!("  Provider:  {}", config.default_provider);
    println!("  Model:     {}", config.default_model);
    println!();
    println!("  Describe what needs fixing and press Enter.");
    println!("  Type 'exit' or Ctrl+D to quit.");
    println!();

    let mut history: Vec<Message> = Vec::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    print!("  You > ");
    std::io::stdout().flush()?;

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.eq_ignore_ascii_case("exit") || line.eq_ignore_ascii_case("quit") {
            break;
        }
        if line.is_empty() {
            print!("  You > ");
            std::io::stdout().flush()?;
            continue;
        }

        let context = budget.manage(&history);
        let reply = match ask_once(&pipeline, line, context, quiet).await {
            Ok(answer) => answer,
            Err(error) => {
                eprintln!("  [Error] {error}");
                print!("\n  You > ");
                std::io::stdout().flush()?;
                continue;
            }
        };

        println!();
        for text_line in reply.lines() {
            println!("  Assistant > {text_line}");
        }
        println!();

        history.push(Message::user(line));
        history.push(Message::assistant(reply));

        print!("  You > ");
        std::io::stdout().flush()?;
    }

    println!();
    println!("  Goodbye! 🔧");
    println!();

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use repairkit_agent::GENERIC_ERROR;
    use repairkit_core::catalog::{DeviceCatalog, DeviceHit, GuideDetail, GuideSummary};
    use repairkit_core::error::{CatalogError, ProviderError};
    use repairkit_core::provider::{Provider, ProviderRequest, ProviderResponse};
    use std::sync::Arc;

    struct ReplyProvider(Option<&'static str>);

    #[async_trait::async_trait]
    impl Provider for ReplyProvider {
        fn name(&self) -> &str {
            "reply"
        }

        async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
            match self.0 {
                Some(text) => Ok(ProviderResponse {
                    message: Message::assistant(text),
                    usage: None,
                    model: "mock".into(),
                }),
                None => panic!("provider blew up"),
            }
        }
    }

    struct NoCatalog;

    #[async_trait::async_trait]
    impl DeviceCatalog for NoCatalog {
        fn name(&self) -> &str {
            "none"
        }
        async fn search_devices(&self, _query: &str) -> Result<Vec<DeviceHit>, CatalogError> {
            Ok(vec![])
        }
        async fn list_guides(&self, _device_title: &str) -> Result<Vec<GuideSummary>, CatalogError> {
            Ok(vec![])
        }
        async fn search_guides(&self, _query: &str) -> Result<Vec<GuideSummary>, CatalogError> {
            Ok(vec![])
        }
        async fn fetch_guide(&self, guide_id: u64) -> Result<GuideDetail, CatalogError> {
            Err(CatalogError::NotFound(format!("guide {guide_id}")))
        }
    }

    fn pipeline(reply: Option<&'static str>) -> RepairPipeline {
        RepairPipeline::new(Arc::new(ReplyProvider(reply)), "mock", Arc::new(NoCatalog))
    }

    #[tokio::test]
    async fn ask_once_returns_the_answer() {
        let answer = ask_once(&pipeline(Some("Hello! Tell me what broke.")), "hi", vec![], true)
            .await
            .unwrap();
        assert!(answer.starts_with("Hello! Tell me what broke."));
    }

    #[tokio::test]
    async fn ask_once_reports_run_failures() {
        let error = ask_once(&pipeline(None), "hi", vec![], true).await.unwrap_err();
        assert_eq!(error, GENERIC_ERROR);
    }
}
