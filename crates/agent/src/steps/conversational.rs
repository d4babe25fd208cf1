//! Conversational-reply: greetings, thanks and follow-up questions.
//!
//! Terminal. Answers from the recent conversation instead of looking up a
//! new guide.

use super::StepContext;
use crate::routing::is_greeting;
use crate::state::{PipelineState, StatePatch};
use repairkit_core::message::{Message, Role};
use tracing::{info, warn};

const SYSTEM_PROMPT: &str = "You are a friendly and knowledgeable repair assistant. You help users with device repairs by:

1. Responding warmly to greetings and casual conversation
2. Answering follow-up questions about repair procedures
3. Clarifying specific steps in repair guides
4. Explaining tools, parts, and techniques
5. Providing helpful tips and alternatives

When handling greetings:
- Respond warmly and introduce yourself briefly
- Let them know you can help with device repairs
- Suggest they can ask about fixing phones, laptops, tablets, or other devices
- Keep it short and inviting

When answering questions:
- Reference previous repair information when relevant
- Use emojis sparingly (1-2 per response)
- Break down complex topics into simple steps
- Encourage the user to ask for more help if needed

Keep responses focused and not too long. Use Markdown formatting.";

/// Turns of history sent along with the question.
const HISTORY_TURNS: usize = 6;

/// Longer assistant turns are cut to this many characters.
const ASSISTANT_TURN_CHARS: usize = 1000;

const TRUNCATION_MARKER: &str = "\n\n[... repair guide continues ...]";

const GREETING_CLOSING: &str = "🔧 **Ready to help!** Tell me about the device you need to repair (e.g., \"My iPhone 12 screen is cracked\").";

const FOLLOW_UP_CLOSING: &str = "💬 **Still have questions?** Feel free to ask me anything else!";

const CANNED_GREETING: &str = "Hi there! 👋 I'm your repair assistant. I can walk you through fixing phones, laptops, tablets, game consoles and more.";

const APOLOGY: &str = "I'd be happy to help with that! However, I'm having trouble processing your question right now. \
Could you rephrase it, or would you like to start a new repair search? 🔧";

fn truncate_turn(content: &str) -> String {
    if content.chars().count() <= ASSISTANT_TURN_CHARS {
        return content.to_string();
    }
    let mut cut: String = content.chars().take(ASSISTANT_TURN_CHARS).collect();
    cut.push_str(TRUNCATION_MARKER);
    cut
}

/// System prompt, carried-over context summaries, the last turns, then the question.
pub(crate) fn build_messages(state: &PipelineState) -> Vec<Message> {
    let mut messages = vec![Message::system(SYSTEM_PROMPT)];

    messages.extend(
        state
            .conversation_history
            .iter()
            .filter(|m| m.is_system())
            .cloned(),
    );

    let turns: Vec<&Message> = state
        .conversation_history
        .iter()
        .filter(|m| !m.is_system())
        .collect();
    let recent = &turns[turns.len().saturating_sub(HISTORY_TURNS)..];
    for turn in recent {
        match turn.role {
            Role::Assistant => messages.push(Message::assistant(truncate_turn(&turn.content))),
            _ => messages.push(Message::user(turn.content.clone())),
        }
    }

    messages.push(Message::user(state.request_text.clone()));
    messages
}

/// Rewrite `*` and `•` bullets as `-` so every renderer shows a list.
pub(crate) fn normalize_bullets(text: &str) -> String {
    text.lines()
        .map(|line| {
            let body = line.trim_start();
            let indent = &line[..line.len() - body.len()];
            match body
                .strip_prefix("* ")
                .or_else(|| body.strip_prefix("• "))
            {
                Some(rest) => format!("{indent}- {rest}"),
                None => line.to_string(),
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn closing(greeting: bool) -> &'static str {
    if greeting { GREETING_CLOSING } else { FOLLOW_UP_CLOSING }
}

pub async fn run(ctx: &StepContext, state: &PipelineState) -> StatePatch {
    let mut patch = StatePatch::status("Understanding your question...");
    let greeting = is_greeting(&state.request_text);

    let answer = match ctx.generate(build_messages(state)).await {
        Ok(reply) if !reply.trim().is_empty() => {
            patch.progress.push("Generating answer...".into());
            info!(chars = reply.len(), "Generated conversational reply");
            format!("{}\n\n---\n\n{}", normalize_bullets(reply.trim()), closing(greeting))
        }
        Ok(_) => {
            warn!("Empty conversational reply");
            fallback_answer(greeting)
        }
        Err(e) => {
            warn!(error = %e, "Conversational reply failed");
            fallback_answer(greeting)
        }
    };

    StatePatch {
        answer_text: Some(answer),
        ..patch.note("Response ready")
    }
}

fn fallback_answer(greeting: bool) -> String {
    if greeting {
        format!("{CANNED_GREETING}\n\n---\n\n{GREETING_CLOSING}")
    } else {
        APOLOGY.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{FakeCatalog, SequentialMockProvider};
    use std::sync::Arc;

    fn step_ctx(provider: SequentialMockProvider) -> (StepContext, Arc<SequentialMockProvider>) {
        let provider = Arc::new(provider);
        let ctx = StepContext::new(provider.clone(), "mock-model", Arc::new(FakeCatalog::default()));
        (ctx, provider)
    }

    #[test]
    fn long_assistant_turns_are_truncated() {
        let mut history = vec![Message::system("[Context Summary] earlier")];
        for i in 0..5 {
            history.push(Message::user(format!("q{i}")));
            history.push(Message::assistant("g".repeat(1500)));
        }
        let state = PipelineState::new("why step 2?", history);
        let messages = build_messages(&state);

        // system prompt + summary + 6 turns + question
        assert_eq!(messages.len(), 9);
        assert!(messages[1].content.starts_with("[Context Summary]"));
        let assistant = messages.iter().find(|m| m.role == Role::Assistant).unwrap();
        assert!(assistant.content.ends_with(TRUNCATION_MARKER));
        assert_eq!(assistant.content.chars().count(), 1000 + TRUNCATION_MARKER.chars().count());
        assert_eq!(messages.last().unwrap().content, "why step 2?");
    }

    #[test]
    fn bullets_are_normalized() {
        assert_eq!(
            normalize_bullets("Try:\n* one\n  • two\n- three"),
            "Try:\n- one\n  - two\n- three"
        );
    }

    #[tokio::test]
    async fn greeting_gets_repair_prompt() {
        let (ctx, _) = step_ctx(SequentialMockProvider::single_text("Hello! I'm your repair assistant."));
        let patch = run(&ctx, &PipelineState::new("hi", vec![])).await;
        let answer = patch.answer_text.unwrap();
        assert!(answer.starts_with("Hello!"));
        assert!(answer.contains("Ready to help!"));
        assert!(answer.contains("My iPhone 12 screen is cracked"));
    }

    #[tokio::test]
    async fn follow_up_gets_question_closing() {
        let (ctx, _) = step_ctx(SequentialMockProvider::single_text("Use a P2 pentalobe."));
        let patch = run(&ctx, &PipelineState::new("which screwdriver do I need", vec![])).await;
        assert!(patch.answer_text.unwrap().ends_with(FOLLOW_UP_CLOSING));
    }

    #[tokio::test]
    async fn failure_writes_canned_text() {
        let (ctx, _) = step_ctx(SequentialMockProvider::failing(1));
        let patch = run(&ctx, &PipelineState::new("hi", vec![])).await;
        let answer = patch.answer_text.unwrap();
        assert!(answer.contains("Hi there!"));
        assert!(answer.contains("Ready to help!"));

        let (ctx, _) = step_ctx(SequentialMockProvider::failing(1));
        let patch = run(&ctx, &PipelineState::new("what does that part do", vec![])).await;
        assert_eq!(patch.answer_text.unwrap(), APOLOGY);
        assert_eq!(patch.progress.last().unwrap(), "Response ready");
    }
}
