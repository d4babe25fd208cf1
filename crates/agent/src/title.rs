//! Session titles from the first message of a chat.

use crate::steps::StepContext;
use repairkit_core::message::Message;
use tracing::{debug, warn};

const TITLE_PROMPT: &str = "Generate a short title (3-5 words) for a repair chat that starts with the user's message. \
Reply with the title only, no quotes and no punctuation at the end.";

pub const DEFAULT_TITLE: &str = "New Chat";

const MAX_TITLE_CHARS: usize = 50;
const MAX_TITLE_WORDS: usize = 6;

const FILLER_WORDS: &[&str] = &[
    "a", "an", "the", "i", "i'm", "my", "me", "is", "are", "was", "it", "its", "it's", "to", "of",
    "for", "on", "in", "with", "how", "do", "does", "can", "could", "you", "please", "help",
    "need", "want", "what", "and", "so",
];

fn truncate(title: &str) -> String {
    if title.chars().count() <= MAX_TITLE_CHARS {
        return title.to_string();
    }
    let mut cut: String = title.chars().take(MAX_TITLE_CHARS - 3).collect();
    cut.truncate(cut.trim_end().len());
    cut.push_str("...");
    cut
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Clean up a model-written title. `None` when nothing usable remains.
pub fn clean_title(raw: &str) -> Option<String> {
    let line = raw.lines().map(str::trim).find(|l| !l.is_empty())?;
    let line = line
        .strip_prefix("Title:")
        .or_else(|| line.strip_prefix("title:"))
        .unwrap_or(line);
    let title = line
        .trim()
        .trim_matches(|c| matches!(c, '"' | '\'' | '*' | '`'))
        .trim_end_matches('.')
        .trim();
    (!title.is_empty()).then(|| truncate(title))
}

/// Title built from the message itself: filler words dropped once the
/// message is longer than three words, at most six words, capitalized.
pub fn fallback_title(message: &str) -> String {
    let words: Vec<&str> = message
        .split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()))
        .filter(|w| !w.is_empty())
        .collect();

    let kept: Vec<&str> = if words.len() <= 3 {
        words
    } else {
        let meaningful: Vec<&str> = words
            .iter()
            .copied()
            .filter(|w| !FILLER_WORDS.contains(&w.to_lowercase().as_str()))
            .collect();
        if meaningful.is_empty() { words } else { meaningful }
    };

    let title = kept
        .into_iter()
        .take(MAX_TITLE_WORDS)
        .map(capitalize)
        .collect::<Vec<_>>()
        .join(" ");

    if title.is_empty() {
        DEFAULT_TITLE.to_string()
    } else {
        truncate(&title)
    }
}

/// Ask the model for a title, falling back to [`fallback_title`].
pub async fn generate_title(ctx: &StepContext, first_message: &str) -> String {
    let messages = vec![Message::system(TITLE_PROMPT), Message::user(first_message)];
    match ctx.generate(messages).await {
        Ok(raw) => match clean_title(&raw) {
            Some(title) => {
                debug!(%title, "Generated session title");
                title
            }
            None => fallback_title(first_message),
        },
        Err(e) => {
            warn!(error = %e, "Title generation failed; using heuristic title");
            fallback_title(first_message)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{FakeCatalog, SequentialMockProvider};
    use std::sync::Arc;

    fn step_ctx(provider: SequentialMockProvider) -> StepContext {
        StepContext::new(Arc::new(provider), "mock-model", Arc::new(FakeCatalog::default()))
    }

    #[test]
    fn model_titles_are_cleaned() {
        assert_eq!(clean_title("\"PS5 Fan Noise Fix\"\n").as_deref(), Some("PS5 Fan Noise Fix"));
        assert_eq!(clean_title("Title: Cracked Screen Repair.").as_deref(), Some("Cracked Screen Repair"));
        assert_eq!(clean_title("  \n\"\"  "), None);
    }

    #[test]
    fn long_titles_are_cut() {
        let title = clean_title(&"word ".repeat(20)).unwrap();
        assert!(title.chars().count() <= 50);
        assert!(title.ends_with("..."));
    }

    #[test]
    fn heuristic_title_drops_filler() {
        assert_eq!(
            fallback_title("how do I fix my cracked iphone 12 screen please"),
            "Fix Cracked Iphone 12 Screen"
        );
        assert_eq!(fallback_title("hi there!"), "Hi There");
        assert_eq!(fallback_title("   "), DEFAULT_TITLE);
    }

    #[test]
    fn heuristic_title_keeps_six_words() {
        let title = fallback_title("laptop keyboard trackpad hinge battery screen speaker fan");
        assert_eq!(title.split(' ').count(), 6);
    }

    #[tokio::test]
    async fn uses_model_title() {
        let title = generate_title(
            &step_ctx(SequentialMockProvider::single_text("PS5 Loud Fan")),
            "my ps5 fan is loud",
        )
        .await;
        assert_eq!(title, "PS5 Loud Fan");
    }

    #[tokio::test]
    async fn provider_failure_uses_heuristic() {
        let title = generate_title(&step_ctx(SequentialMockProvider::failing(1)), "my ps5 fan is loud").await;
        assert_eq!(title, "Ps5 Fan Loud");
    }
}
