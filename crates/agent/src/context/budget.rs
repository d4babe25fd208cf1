//! Conversation trimming before a run starts.
//!
//! # Rules
//!
//! | Step | Rule |
//! |------|------|
//! | 1 | System messages are always kept and never count toward `max_messages` |
//! | 2 | Keep the most recent `max_messages` non-system messages |
//! | 3 | Drop the oldest non-system message until under `max_tokens` or one remains |
//!
//! Surviving messages keep their original relative order, which makes
//! [`ContextBudget::trim`] idempotent.

use super::token::TokenCounter;
use repairkit_config::ContextConfig;
use repairkit_core::message::{Message, Role};
use tracing::{debug, info, warn};

/// Device names recognised when summarising dropped turns.
const DEVICE_KEYWORDS: &[&str] = &[
    "ps5",
    "playstation",
    "xbox",
    "nintendo switch",
    "iphone",
    "ipad",
    "macbook",
    "pixel",
    "galaxy",
    "laptop",
    "phone",
    "tablet",
];

/// A summary is only inserted when more than this many messages were dropped.
const SUMMARY_MIN_DROPPED: usize = 10;

#[derive(Debug, Clone)]
pub struct ContextBudget {
    max_tokens: usize,
    max_messages: usize,
    summarize_threshold: usize,
    counter: TokenCounter,
}

impl Default for ContextBudget {
    fn default() -> Self {
        Self::new(100_000, 50)
    }
}

impl ContextBudget {
    pub fn new(max_tokens: usize, max_messages: usize) -> Self {
        Self {
            max_tokens,
            max_messages,
            summarize_threshold: 30,
            counter: TokenCounter::heuristic(),
        }
    }

    /// Budget from config, loading the tokenizer if one is configured.
    pub fn from_config(config: &ContextConfig) -> Self {
        Self::new(config.max_tokens, config.max_messages)
            .with_summarize_threshold(config.summarize_threshold)
            .with_counter(TokenCounter::from_optional_path(config.tokenizer_path.as_deref()))
    }

    pub fn with_summarize_threshold(mut self, threshold: usize) -> Self {
        self.summarize_threshold = threshold;
        self
    }

    pub fn with_counter(mut self, counter: TokenCounter) -> Self {
        self.counter = counter;
        self
    }

    pub fn counter(&self) -> &TokenCounter {
        &self.counter
    }

    /// Indices into `history` that survive trimming, ascending.
    fn kept_indices(&self, history: &[Message]) -> Vec<usize> {
        let conversation: Vec<usize> = history
            .iter()
            .enumerate()
            .filter(|(_, m)| !m.is_system())
            .map(|(i, _)| i)
            .collect();

        let mut first_kept = conversation.len().saturating_sub(self.max_messages);
        if first_kept > 0 {
            info!(
                from = conversation.len(),
                to = self.max_messages,
                "Trimming conversation by message count"
            );
        }

        let assemble = |first: usize| -> Vec<usize> {
            let keep = &conversation[first..];
            (0..history.len())
                .filter(|i| history[*i].is_system() || keep.binary_search(i).is_ok())
                .collect()
        };

        let mut kept = assemble(first_kept);
        let mut tokens = self.count(history, &kept);
        while tokens > self.max_tokens && conversation.len() - first_kept > 1 {
            debug!(tokens, "Context over budget, dropping oldest message");
            first_kept += 1;
            kept = assemble(first_kept);
            tokens = self.count(history, &kept);
        }

        if tokens > self.max_tokens {
            warn!(tokens, max_tokens = self.max_tokens, "Unable to trim context under budget");
        }
        kept
    }

    fn count(&self, history: &[Message], indices: &[usize]) -> usize {
        let selected: Vec<Message> = indices.iter().map(|i| history[*i].clone()).collect();
        self.counter.count_messages(&selected)
    }

    /// Trim `history` to the message and token budget.
    pub fn trim(&self, history: &[Message]) -> Vec<Message> {
        self.kept_indices(history)
            .into_iter()
            .map(|i| history[i].clone())
            .collect()
    }

    /// True when the non-system history is longer than the threshold.
    pub fn should_summarize(&self, history: &[Message]) -> bool {
        history.iter().filter(|m| !m.is_system()).count() > self.summarize_threshold
    }

    /// Trim, and when a large history lost more than ten messages, put a
    /// `[Context Summary]` system message ahead of the retained turns.
    pub fn manage(&self, history: &[Message]) -> Vec<Message> {
        let kept = self.kept_indices(history);
        let dropped_count = history.len() - kept.len();

        if !(self.should_summarize(history) && dropped_count > SUMMARY_MIN_DROPPED) {
            return kept.into_iter().map(|i| history[i].clone()).collect();
        }

        let dropped: Vec<Message> = (0..history.len())
            .filter(|i| kept.binary_search(i).is_err())
            .map(|i| history[i].clone())
            .collect();
        let summary = Message::system(format!("[Context Summary] {}", create_context_summary(&dropped)));

        let (system, turns): (Vec<Message>, Vec<Message>) = kept
            .into_iter()
            .map(|i| history[i].clone())
            .partition(Message::is_system);

        info!(dropped = dropped_count, "Summarised dropped context");
        let mut managed = system;
        managed.push(summary);
        managed.extend(turns);
        managed
    }
}

/// One-line summary of dropped turns: question count plus devices mentioned.
pub fn create_context_summary(dropped: &[Message]) -> String {
    let user_turns: Vec<String> = dropped
        .iter()
        .filter(|m| m.role == Role::User)
        .map(|m| m.content.to_lowercase())
        .collect();

    if user_turns.is_empty() {
        return "No previous conversation context.".to_string();
    }

    let devices: Vec<&str> = DEVICE_KEYWORDS
        .iter()
        .copied()
        .filter(|device| user_turns.iter().any(|turn| turn.contains(device)))
        .collect();

    let mut summary = format!(
        "Previous conversation summary: User asked {} questions",
        user_turns.len()
    );
    if !devices.is_empty() {
        summary.push_str(" about: ");
        summary.push_str(&devices.join(", "));
    }
    summary.push('.');
    summary
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conversation(pairs: usize) -> Vec<Message> {
        let mut history = vec![Message::system("You are a repair assistant.")];
        for i in 0..pairs {
            history.push(Message::user(format!("question {i} about my iphone")));
            history.push(Message::assistant(format!("answer {i}")));
        }
        history
    }

    fn non_system(history: &[Message]) -> usize {
        history.iter().filter(|m| !m.is_system()).count()
    }

    #[test]
    fn from_config_owns_the_counter() {
        let config = ContextConfig {
            tokenizer_path: Some("/nonexistent/tokenizer.json".into()),
            max_messages: 7,
            ..ContextConfig::default()
        };
        let budget = ContextBudget::from_config(&config);
        assert!(!budget.counter().is_exact());
        assert_eq!(budget.trim(&conversation(5)).iter().filter(|m| !m.is_system()).count(), 7);
    }

    #[test]
    fn keeps_most_recent_and_all_system() {
        let budget = ContextBudget::new(100_000, 4);
        let trimmed = budget.trim(&conversation(5));
        assert_eq!(non_system(&trimmed), 4);
        assert!(trimmed[0].is_system());
        assert_eq!(trimmed.last().unwrap().content, "answer 4");
        assert_eq!(trimmed[1].content, "question 3 about my iphone");
    }

    #[test]
    fn trim_is_idempotent() {
        let budget = ContextBudget::new(40, 6);
        let once = budget.trim(&conversation(8));
        let twice = budget.trim(&once);
        let ids = |v: &[Message]| v.iter().map(|m| m.id.clone()).collect::<Vec<_>>();
        assert_eq!(ids(&once), ids(&twice));
    }

    #[test]
    fn token_budget_drops_oldest_but_keeps_one() {
        let budget = ContextBudget::new(1, 50);
        let trimmed = budget.trim(&conversation(3));
        assert_eq!(non_system(&trimmed), 1);
        assert!(trimmed[0].is_system());
        assert_eq!(trimmed[1].content, "answer 2");
    }

    #[test]
    fn interleaved_system_messages_keep_their_place() {
        let history = vec![
            Message::user("old"),
            Message::system("pinned"),
            Message::user("new"),
        ];
        let trimmed = ContextBudget::new(100_000, 1).trim(&history);
        let contents: Vec<&str> = trimmed.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["pinned", "new"]);
    }

    #[test]
    fn empty_history() {
        assert!(ContextBudget::default().trim(&[]).is_empty());
    }

    #[test]
    fn should_summarize_ignores_system() {
        let budget = ContextBudget::default().with_summarize_threshold(4);
        assert!(!budget.should_summarize(&conversation(2)));
        assert!(budget.should_summarize(&conversation(3)));
    }

    #[test]
    fn summary_lists_devices_in_keyword_order() {
        let dropped = vec![
            Message::user("My MacBook won't charge"),
            Message::assistant("Try the SMC reset"),
            Message::user("and my PS5 fan is loud"),
        ];
        assert_eq!(
            create_context_summary(&dropped),
            "Previous conversation summary: User asked 2 questions about: ps5, macbook."
        );
    }

    #[test]
    fn summary_without_user_turns() {
        let dropped = vec![Message::assistant("hello")];
        assert_eq!(create_context_summary(&dropped), "No previous conversation context.");
    }

    #[test]
    fn manage_inserts_summary_after_system_messages() {
        let budget = ContextBudget::new(100_000, 10);
        let managed = budget.manage(&conversation(20));
        assert!(managed[0].is_system());
        assert!(managed[1].is_system());
        assert!(managed[1].content.starts_with("[Context Summary] Previous conversation summary: User asked 15 questions"));
        assert!(managed[1].content.contains("iphone"));
        assert_eq!(non_system(&managed), 10);
    }

    #[test]
    fn manage_without_enough_dropped_is_plain_trim() {
        let budget = ContextBudget::new(100_000, 30);
        let history = conversation(20);
        let managed = budget.manage(&history);
        assert_eq!(managed.len(), budget.trim(&history).len());
        assert!(!managed.iter().any(|m| m.content.starts_with("[Context Summary]")));
    }
}
