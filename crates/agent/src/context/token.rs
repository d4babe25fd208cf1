//! Token counting for context budgeting and usage accounting.
//!
//! With a HuggingFace `tokenizer.json` loaded, counts are exact subword
//! counts. Without one, the estimate is `word_count × 1.33`, which tracks
//! BPE tokenizers closely enough on English text.

use repairkit_core::message::Message;
use std::path::Path;
use std::sync::Arc;
use tokenizers::Tokenizer;
use tracing::{debug, warn};

/// Formatting overhead per message (role name and delimiters).
pub const MESSAGE_OVERHEAD: usize = 4;

/// Overhead added once per reply.
pub const REPLY_OVERHEAD: usize = 2;

/// Counts tokens, exactly when a tokenizer is loaded.
#[derive(Clone, Default)]
pub struct TokenCounter {
    tokenizer: Option<Arc<Tokenizer>>,
}

impl std::fmt::Debug for TokenCounter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCounter")
            .field("exact", &self.tokenizer.is_some())
            .finish()
    }
}

impl TokenCounter {
    /// Word-count estimator only.
    pub fn heuristic() -> Self {
        Self::default()
    }

    /// Load a `tokenizer.json` file.
    pub fn from_file(path: impl AsRef<Path>) -> repairkit_core::Result<Self> {
        let path = path.as_ref();
        let tokenizer = Tokenizer::from_file(path).map_err(|e| repairkit_core::Error::Config {
            message: format!("failed to load tokenizer {}: {e}", path.display()),
        })?;
        debug!(path = %path.display(), "Loaded tokenizer");
        Ok(Self {
            tokenizer: Some(Arc::new(tokenizer)),
        })
    }

    /// Use the configured tokenizer if it loads, the estimator otherwise.
    pub fn from_optional_path(path: Option<&str>) -> Self {
        match path {
            Some(path) => Self::from_file(path).unwrap_or_else(|e| {
                warn!(error = %e, "Falling back to word-count token estimate");
                Self::heuristic()
            }),
            None => Self::heuristic(),
        }
    }

    pub fn is_exact(&self) -> bool {
        self.tokenizer.is_some()
    }

    pub fn count(&self, text: &str) -> usize {
        if text.is_empty() {
            return 0;
        }
        if let Some(tokenizer) = &self.tokenizer {
            match tokenizer.encode(text, false) {
                Ok(encoding) => return encoding.len(),
                Err(e) => warn!(error = %e, "Tokenizer failed; estimating"),
            }
        }
        estimate_tokens(text)
    }

    /// Tokens for a chat transcript including per-message and reply overhead.
    pub fn count_messages(&self, messages: &[Message]) -> usize {
        let body: usize = messages
            .iter()
            .map(|m| MESSAGE_OVERHEAD + self.count(m.role.as_str()) + self.count(&m.content))
            .sum();
        body + REPLY_OVERHEAD
    }
}

/// `word_count × 1.33`, truncated.
pub fn estimate_tokens(text: &str) -> usize {
    let words = text.split_whitespace().count();
    (words as f64 * 1.33) as usize
}

/// Approximate USD cost for `tokens` on `model`, priced per 1K tokens.
pub fn estimate_cost(tokens: u64, model: &str) -> f64 {
    let per_1k = match model {
        "gemini-2.5-flash" => 0.0001,
        "gemini-pro" => 0.0005,
        "gpt-3.5-turbo" => 0.002,
        "gpt-4" => 0.03,
        _ => 0.0001,
    };
    tokens as f64 / 1000.0 * per_1k
}
