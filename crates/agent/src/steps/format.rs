//! Format-answer: render the resolved content as Markdown.
//!
//! Pure. The same state always renders the same text, and the opener is
//! picked from the request length so it varies between requests without
//! any randomness.

use crate::state::{FallbackHit, PipelineState, ResolvedSteps, StatePatch};
use repairkit_core::catalog::GuideDetail;
use std::fmt::Write;

const OPENERS: &[&str] = &[
    "Here's what I found for your repair.",
    "Good news, I found some repair help for you.",
    "Let's get this fixed. Here's the guide.",
    "I looked into this for you.",
    "Alright, here's a plan for your repair.",
];

const CLOSING: &str = "Good luck with your repair! 🔧";

const APOLOGY: &str = "I couldn't find any repair information for your query. \
Please try rephrasing or providing more specific device details.";

pub fn opener(request_text: &str) -> &'static str {
    OPENERS[request_text.len() % OPENERS.len()]
}

fn or_na(value: &str) -> &str {
    if value.trim().is_empty() { "N/A" } else { value }
}

fn guide_section(out: &mut String, guide: &GuideDetail, device: Option<&str>) {
    let subject = if guide.subject.trim().is_empty() {
        device.unwrap_or("")
    } else {
        guide.subject.as_str()
    };

    let _ = writeln!(out, "# {}\n", guide.title);
    let _ = writeln!(out, "**Device:** {}", or_na(subject));
    let _ = writeln!(out, "**Difficulty:** {}", or_na(&guide.difficulty));
    let _ = writeln!(out, "**Time Required:** {}\n", or_na(&guide.time_required));

    if !guide.introduction.is_empty() {
        let _ = writeln!(out, "## Introduction\n{}\n", guide.introduction);
    }
    if !guide.tools.is_empty() {
        out.push_str("## Tools Needed\n");
        for tool in &guide.tools {
            let _ = writeln!(out, "- {tool}");
        }
        out.push('\n');
    }
    if !guide.parts.is_empty() {
        out.push_str("## Parts\n");
        for part in &guide.parts {
            let _ = writeln!(out, "- {part}");
        }
        out.push('\n');
    }

    out.push_str("## Repair Steps\n\n");
    for step in &guide.steps {
        if step.title.is_empty() {
            let _ = writeln!(out, "### Step {}\n", step.order);
        } else {
            let _ = writeln!(out, "### Step {}: {}\n", step.order, step.title);
        }
        if !step.body.is_empty() {
            let _ = writeln!(out, "{}\n", step.body);
        }
        for image in &step.images {
            let _ = writeln!(out, "![Step {}]({})\n", step.order, image.url);
        }
    }
}

fn community_section(out: &mut String, request: &str, source: &str, results: &[FallbackHit]) {
    out.push_str("## ⚠️ Community Sources (No Official iFixit Guide Found)\n\n");
    let _ = writeln!(out, "**Query:** {request}\n");
    for (i, result) in results.iter().enumerate() {
        let title = if result.title.is_empty() { "Result" } else { result.title.as_str() };
        let _ = writeln!(out, "### {}. {}", i + 1, title);
        if !result.snippet.is_empty() {
            let _ = writeln!(out, "{}", result.snippet);
        }
        let _ = writeln!(out, "[Source]({})\n", result.link);
    }
    let _ = writeln!(out, "_Results from {source}. Community advice is not verified; take care._");
}

fn follow_ups(out: &mut String, steps: Option<&ResolvedSteps>, device: Option<&str>) {
    out.push_str("\n---\n\n");
    match steps {
        Some(ResolvedSteps::Catalog(guide)) => {
            out.push_str("**Need more help?** You can ask me:\n");
            if let Some(step) = guide.steps.get(1).or_else(|| guide.steps.first()) {
                let _ = writeln!(out, "- \"Can you explain step {} in more detail?\"", step.order);
            }
            if !guide.tools.is_empty() {
                out.push_str("- \"Is there an alternative to one of these tools?\"\n");
            }
            if !guide.parts.is_empty() {
                out.push_str("- \"Where can I buy the replacement part?\"\n");
            }
            out.push_str("- \"Is there an easier way to do this?\"\n");
        }
        Some(ResolvedSteps::Fallback { .. }) => {
            out.push_str("**Want an official guide?** Try:\n");
            out.push_str("- Telling me the exact model number (usually on a label or in Settings)\n");
            out.push_str("- Asking me to explain anything in these sources\n");
        }
        None => {
            out.push_str("**Tips for a better search:**\n");
            match device {
                Some(device) => {
                    let _ = writeln!(out, "- Include the exact model of your {device}");
                }
                None => out.push_str("- Name the device and model (e.g. \"iPhone 12 Pro\")\n"),
            }
            out.push_str("- Describe the symptom (e.g. \"won't charge\" or \"cracked screen\")\n");
        }
    }
}

/// Render the answer for `state`.
pub fn render(state: &PipelineState) -> String {
    let device = state.canonical_device.as_deref();
    let mut out = String::new();

    match &state.resolved_steps {
        Some(ResolvedSteps::Catalog(guide)) => {
            let _ = writeln!(out, "{}\n", opener(&state.request_text));
            guide_section(&mut out, guide, device);
        }
        Some(ResolvedSteps::Fallback { source, results }) => {
            let _ = writeln!(out, "{}\n", opener(&state.request_text));
            community_section(&mut out, &state.request_text, source, results);
        }
        None => {
            out.push_str(APOLOGY);
            out.push('\n');
        }
    }

    follow_ups(&mut out, state.resolved_steps.as_ref(), device);

    if matches!(state.resolved_steps, Some(ResolvedSteps::Catalog(_))) && !state.used_fallback {
        let _ = write!(out, "\n{CLOSING}");
    }

    out.trim_end().to_string()
}

pub fn run(state: &PipelineState) -> StatePatch {
    StatePatch {
        answer_text: Some(render(state)),
        ..StatePatch::status("Formatting response...").note("Response ready")
    }
}
