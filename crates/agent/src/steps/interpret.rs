//! Interpret-request: turn casual wording into a canonical device name.
//!
//! "my ps5 fan is loud" becomes "PlayStation 5". Symptoms and guide-type
//! words are left out so the name can go straight to the catalog.

use super::StepContext;
use crate::state::{PipelineState, StatePatch};
use repairkit_core::message::Message;
use tracing::{info, warn};

fn prompt(request: &str) -> String {
    format!(
        "Extract the device from this repair request so it can be looked up in a repair catalog.\n\
         Request: {request}\n\n\
         Rules:\n\
         - Output ONLY the canonical device name (brand and model), e.g. \"PlayStation 5\", \"iPhone 12\", \"MacBook Pro 13\\\" 2019\".\n\
         - Do not include symptoms, issues or part names.\n\
         - Do not include words like repair, replacement, guide, teardown or disassembly.\n\
         - If no device is mentioned, output NONE."
    )
}

/// First non-empty line, stripped of quotes, markdown and a trailing period.
pub(crate) fn parse_device(raw: &str) -> Option<String> {
    let line = raw.lines().map(str::trim).find(|l| !l.is_empty())?;
    let line = line
        .trim_start_matches("Device:")
        .trim()
        .trim_end_matches('.')
        .trim_matches(|c: char| matches!(c, '"' | '\'' | '`' | '*'))
        .trim_end_matches('.')
        .trim();
    if line.is_empty() || line.eq_ignore_ascii_case("none") {
        None
    } else {
        Some(line.to_string())
    }
}

pub async fn run(ctx: &StepContext, state: &PipelineState) -> StatePatch {
    let patch = StatePatch::status("Understanding your device...");

    let raw = match ctx.generate(vec![Message::user(prompt(&state.request_text))]).await {
        Ok(raw) => raw,
        Err(e) => {
            warn!(error = %e, "Device extraction failed");
            return patch.note("Could not identify the device");
        }
    };

    match parse_device(&raw) {
        Some(device) => {
            info!(request = %state.request_text, device = %device, "Interpreted request");
            StatePatch {
                canonical_device: Some(device.clone()),
                ..patch.note(format!("Identified device: {device}"))
            }
        }
        None => {
            warn!(request = %state.request_text, "No device in request");
            patch.note("Could not identify the device")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{FakeCatalog, SequentialMockProvider};
    use std::sync::Arc;

    fn ctx(provider: SequentialMockProvider) -> (StepContext, Arc<SequentialMockProvider>) {
        let provider = Arc::new(provider);
        let ctx = StepContext::new(provider.clone(), "mock-model", Arc::new(FakeCatalog::default()));
        (ctx, provider)
    }

    #[test]
    fn parse_strips_decoration() {
        assert_eq!(parse_device("\"PlayStation 5\"\n").as_deref(), Some("PlayStation 5"));
        assert_eq!(parse_device("\n**iPhone 12**.").as_deref(), Some("iPhone 12"));
        assert_eq!(parse_device("Device: Pixel 7").as_deref(), Some("Pixel 7"));
        assert_eq!(parse_device("NONE"), None);
        assert_eq!(parse_device("   \n "), None);
    }

    #[tokio::test]
    async fn writes_canonical_device() {
        let (ctx, provider) = ctx(SequentialMockProvider::single_text("PlayStation 5"));
        let state = PipelineState::new("my ps5 fan is loud", vec![]);

        let patch = run(&ctx, &state).await;
        assert_eq!(patch.canonical_device.as_deref(), Some("PlayStation 5"));
        assert_eq!(patch.progress.last().unwrap(), "Identified device: PlayStation 5");

        let request = &provider.requests()[0];
        assert!(request.messages[0].content.contains("my ps5 fan is loud"));
    }

    #[tokio::test]
    async fn provider_failure_leaves_device_unset() {
        let (ctx, _) = ctx(SequentialMockProvider::failing(1));
        let patch = run(&ctx, &PipelineState::new("my ps5 fan is loud", vec![])).await;
        assert!(patch.canonical_device.is_none());
        assert_eq!(patch.progress.len(), 2);
    }

    #[tokio::test]
    async fn empty_output_leaves_device_unset() {
        let (ctx, _) = ctx(SequentialMockProvider::single_text("  "));
        let patch = run(&ctx, &PipelineState::new("something broke", vec![])).await;
        assert!(patch.canonical_device.is_none());
    }
}
