//! Locate-device: map the canonical name to a catalog device.

use super::StepContext;
use crate::state::{PipelineState, ResolvedDevice, StatePatch};
use repairkit_core::catalog::DeviceHit;
use tracing::{info, warn};

/// Hits whose titles contain these are guides or parts, not devices.
const DISQUALIFYING: &[&str] = &[
    "replacement",
    "disassembly",
    "repair",
    "teardown",
    "battery",
    "screen",
    "troubleshooting",
    "guide",
];

fn is_device(hit: &DeviceHit) -> bool {
    let title = hit.title.to_lowercase();
    !DISQUALIFYING.iter().any(|word| title.contains(word))
}

pub async fn run(ctx: &StepContext, state: &PipelineState) -> StatePatch {
    let patch = StatePatch::status("Searching iFixit for device...");

    let Some(canonical) = state.canonical_device.as_deref() else {
        warn!("No canonical device; skipping catalog lookup");
        return patch.note("No device to search for");
    };

    let hits = ctx
        .catalog_call("search_devices", ctx.catalog.search_devices(canonical))
        .await;

    let device = match hits {
        Ok(hits) => match hits.into_iter().find(is_device) {
            Some(hit) => ResolvedDevice {
                title: hit.title,
                source_type: if hit.data_type.is_empty() {
                    "device".to_string()
                } else {
                    hit.data_type
                },
            },
            None => ResolvedDevice::synthesized(canonical),
        },
        Err(e) => {
            warn!(device = %canonical, error = %e, "Device search failed");
            ResolvedDevice::synthesized(canonical)
        }
    };

    let note = if device.is_synthesized() {
        format!("No exact catalog match; searching guides for {}", device.title)
    } else {
        format!("Found device: {}", device.title)
    };
    info!(title = %device.title, source = %device.source_type, "Resolved device");

    StatePatch {
        resolved_device: Some(device),
        ..patch.note(note)
    }
}
