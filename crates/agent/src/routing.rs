//! Routing decisions.
//!
//! Both decisions are pure functions of [`PipelineState`]. Phrase lists are
//! matched on whole words, so "hi" does not fire inside "machine" and
//! "sup" does not fire inside "support".

use crate::state::PipelineState;
use repairkit_core::message::Role;

const GREETINGS: &[&str] = &[
    "hi",
    "hello",
    "hey",
    "good morning",
    "good afternoon",
    "good evening",
    "greetings",
    "howdy",
    "what's up",
    "whats up",
    "sup",
    "how are you",
    "how r u",
    "how do you do",
];

const COURTESY: &[&str] = &[
    "thanks",
    "thank you",
    "appreciate",
    "great job",
    "bye",
    "goodbye",
    "see you",
    "later",
];

const META: &[&str] = &[
    "who are you",
    "what can you do",
    "what do you do",
    "what is this",
    "what's this",
    "whats this",
];

/// Requests for help are only small talk when nothing repair-related follows.
const HELP_REQUESTS: &[&str] = &["help me", "can you help", "i need help"];

const REPAIR_KEYWORDS: &[&str] = &["fix", "repair", "broken", "replace", "screen", "battery"];

const FOLLOW_UP_INDICATORS: &[&str] = &[
    "what about",
    "how do i",
    "can you explain",
    "why",
    "when",
    "what is",
    "what are",
    "which",
    "where",
    "tell me more",
    "clarify",
    "confused",
    "don't understand",
    "what does",
    "in step",
    "the step",
    "this step",
    "that part",
    "alternative",
    "instead",
    "easier way",
    "different",
    "tool",
    "part",
    "where to buy",
    "how much",
    "skip",
    "necessary",
    "optional",
    "important",
];

/// The greeting subset used to pick the conversational closing line.
const SALUTATIONS: &[&str] = &["hi", "hello", "hey", "good morning", "good afternoon", "good evening"];

/// Prior assistant turns longer than this mean a guide was already delivered.
const REPAIR_CONTEXT_CHARS: usize = 200;

/// Where a run starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryRoute {
    Conversational,
    RepairChain,
}

/// Where the chain goes after select-guide.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MidChainRoute {
    Fetch,
    Fallback,
}

impl EntryRoute {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Conversational => "conversational",
            Self::RepairChain => "repair_chain",
        }
    }
}

impl MidChainRoute {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fetch => "fetch",
            Self::Fallback => "fallback",
        }
    }
}

/// Lowercased words with surrounding punctuation removed. Apostrophes stay.
fn words(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !(c.is_alphanumeric() || c == '\'' || c == '’'))
        .filter(|w| !w.is_empty())
        .map(|w| w.replace('’', "'"))
        .collect()
}

fn contains_phrase_by(words: &[String], phrase: &str, same: impl Fn(&str, &str) -> bool) -> bool {
    let needle: Vec<&str> = phrase.split_whitespace().collect();
    if needle.is_empty() || needle.len() > words.len() {
        return false;
    }
    words
        .windows(needle.len())
        .any(|window| window.iter().zip(&needle).all(|(w, n)| same(w.as_str(), n)))
}

fn contains_phrase(words: &[String], phrase: &str) -> bool {
    contains_phrase_by(words, phrase, |w, n| w == n)
}

fn any_phrase(words: &[String], phrases: &[&str]) -> bool {
    phrases.iter().any(|p| contains_phrase(words, p))
}

/// Follow-up indicators also match their plural ("tools", "parts").
fn any_follow_up(words: &[String]) -> bool {
    FOLLOW_UP_INDICATORS.iter().any(|p| {
        contains_phrase_by(words, p, |w, n| w == n || w.strip_suffix('s') == Some(n))
    })
}

/// Repair keywords match as word prefixes ("fixing", "replacement").
fn has_repair_keyword(words: &[String]) -> bool {
    words
        .iter()
        .any(|w| REPAIR_KEYWORDS.iter().any(|k| w.starts_with(k)))
}

/// True when the request opens with or contains a plain salutation.
pub fn is_greeting(request: &str) -> bool {
    any_phrase(&words(request), SALUTATIONS)
}

/// Pick the conversational short-circuit or the repair chain.
pub fn route_entry(state: &PipelineState) -> EntryRoute {
    let words = words(&state.request_text);
    let repair_intent = has_repair_keyword(&words);

    if any_phrase(&words, GREETINGS) || any_phrase(&words, COURTESY) || any_phrase(&words, META) {
        return EntryRoute::Conversational;
    }
    if !repair_intent && any_phrase(&words, HELP_REQUESTS) {
        return EntryRoute::Conversational;
    }

    if words.len() <= 3 && !repair_intent {
        return EntryRoute::Conversational;
    }

    let has_repair_context = state
        .conversation_history
        .iter()
        .any(|m| m.role == Role::Assistant && m.content.chars().count() > REPAIR_CONTEXT_CHARS);
    if !has_repair_context {
        return EntryRoute::RepairChain;
    }

    if any_follow_up(&words) {
        EntryRoute::Conversational
    } else {
        EntryRoute::RepairChain
    }
}

/// Fetch when a device, a non-empty guide list, and a chosen guide all exist.
pub fn route_after_selection(state: &PipelineState) -> MidChainRoute {
    let has_guides = state.guide_candidates.as_ref().is_some_and(|g| !g.is_empty());
    if state.resolved_device.is_none() || !has_guides || state.chosen_guide.is_none() {
        MidChainRoute::Fallback
    } else {
        MidChainRoute::Fetch
    }
}
