//! Select-guide: pick the candidate that best matches the request wording.
//!
//! Pure scoring, no generation. Each request word longer than three
//! characters scores +2 when it appears in a guide title and +1 when it
//! appears in the subject. Ties go to the earlier candidate, so catalog
//! order decides between equals.

use crate::state::{PipelineState, StatePatch};
use repairkit_core::catalog::GuideSummary;
use tracing::{info, warn};

fn keywords(request: &str) -> Vec<String> {
    request
        .to_lowercase()
        .split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_string())
        .filter(|w| w.chars().count() > 3)
        .collect()
}

fn score(guide: &GuideSummary, keywords: &[String]) -> u32 {
    let title = guide.title.to_lowercase();
    let subject = guide.subject.to_lowercase();
    keywords
        .iter()
        .map(|word| {
            let mut points = 0;
            if title.contains(word.as_str()) {
                points += 2;
            }
            if subject.contains(word.as_str()) {
                points += 1;
            }
            points
        })
        .sum()
}

/// Best match for `request`, or the first candidate when nothing scores.
pub fn best_guide<'a>(request: &str, candidates: &'a [GuideSummary]) -> Option<&'a GuideSummary> {
    let keywords = keywords(request);
    let mut best: Option<(&GuideSummary, u32)> = None;
    for guide in candidates {
        let s = score(guide, &keywords);
        if best.is_none_or(|(_, top)| s > top) {
            best = Some((guide, s));
        }
    }
    best.map(|(guide, _)| guide)
}

pub fn run(state: &PipelineState) -> StatePatch {
    let patch = StatePatch::status("Selecting most relevant guide...");
    let candidates = state.guide_candidates.as_deref().unwrap_or_default();

    match best_guide(&state.request_text, candidates) {
        Some(guide) => {
            info!(guide = %guide.title, id = guide.id, "Selected guide");
            let note = format!("Selected: {}", guide.title);
            StatePatch {
                chosen_guide: Some(guide.clone()),
                ..patch.note(note)
            }
        }
        None => {
            warn!("No guide could be selected");
            patch.note("No suitable guide found")
        }
    }
}
