//! Fetch-guide: load the chosen guide and normalize it for formatting.

use super::StepContext;
use crate::markup;
use crate::state::{PipelineState, ResolvedSteps, StatePatch};
use repairkit_core::catalog::GuideDetail;
use tracing::{error, info};

/// Rewrite inline catalog links in every free-text field.
fn normalize(mut guide: GuideDetail) -> GuideDetail {
    guide.introduction = markup::to_markdown(guide.introduction.trim());
    for step in &mut guide.steps {
        step.title = markup::to_markdown(step.title.trim());
        step.body = markup::to_markdown(step.body.trim());
    }
    guide.steps.sort_by_key(|step| step.order);
    guide
}

pub async fn run(ctx: &StepContext, state: &PipelineState) -> StatePatch {
    let patch = StatePatch::status("Fetching repair instructions...");

    let Some(chosen) = &state.chosen_guide else {
        return patch.note("No guide selected");
    };

    match ctx
        .catalog_call("fetch_guide", ctx.catalog.fetch_guide(chosen.id))
        .await
    {
        Ok(guide) => {
            let guide = normalize(guide);
            info!(id = chosen.id, steps = guide.steps.len(), "Fetched guide");
            let note = format!("Retrieved {} repair steps", guide.steps.len());
            StatePatch {
                resolved_steps: Some(ResolvedSteps::Catalog(guide)),
                ..patch.note(note)
            }
        }
        Err(e) => {
            error!(id = chosen.id, error = %e, "Failed to fetch guide");
            patch.note("Failed to fetch repair guide")
        }
    }
}
