//! List-guides: every guide the catalog has for the resolved device.

use super::StepContext;
use crate::state::{PipelineState, StatePatch};
use repairkit_core::catalog::GuideSummary;
use tracing::{debug, info, warn};

const GUIDE_SUFFIXES: &[&str] = &[
    "repair",
    "replacement",
    "disassembly",
    "teardown",
    "troubleshooting",
    "guides",
    "guide",
];

/// Drop trailing guide-type words, so "PlayStation 5 Repair" becomes
/// "PlayStation 5". A lone word is kept.
pub(crate) fn strip_guide_suffixes(title: &str) -> String {
    let mut words: Vec<&str> = title.split_whitespace().collect();
    while words.len() > 1 {
        let Some(last) = words.last() else { break };
        if GUIDE_SUFFIXES.iter().any(|s| last.eq_ignore_ascii_case(s)) {
            words.pop();
        } else {
            break;
        }
    }
    words.join(" ")
}

fn mentions(guide: &GuideSummary, device: &str) -> bool {
    guide.subject.to_lowercase().contains(device) || guide.title.to_lowercase().contains(device)
}

pub async fn run(ctx: &StepContext, state: &PipelineState) -> StatePatch {
    let patch = StatePatch::status("Fetching available repair guides...");

    let Some(device) = &state.resolved_device else {
        return patch.note("No repair guides available");
    };
    let title = strip_guide_suffixes(&device.title);

    let mut guides = match ctx
        .catalog_call("list_guides", ctx.catalog.list_guides(&title))
        .await
    {
        Ok(guides) => guides,
        Err(e) => {
            warn!(device = %title, error = %e, "Listing guides failed");
            Vec::new()
        }
    };

    if guides.is_empty() {
        debug!(device = %title, "No category guides; searching guides instead");
        let needle = title.to_lowercase();
        guides = match ctx
            .catalog_call("search_guides", ctx.catalog.search_guides(&title))
            .await
        {
            Ok(found) => found.into_iter().filter(|g| mentions(g, &needle)).collect(),
            Err(e) => {
                warn!(device = %title, error = %e, "Guide search failed");
                Vec::new()
            }
        };
    }

    if guides.is_empty() {
        warn!(device = %title, "No guides found");
        return patch.note("No repair guides available");
    }

    info!(device = %title, count = guides.len(), "Listed guides");
    let note = format!("Found {} repair guides", guides.len());
    StatePatch {
        guide_candidates: Some(guides),
        ..patch.note(note)
    }
}
