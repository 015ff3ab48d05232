//! Measurement-protocol wire format
//!
//! The collector expects a flat form of short keys with numbered custom
//! dimension slots. Everything else in the crate uses named fields; this
//! module is the only place the slot numbers appear.

use std::collections::BTreeMap;
use url::form_urlencoded;

use crate::context::{Dimension, EnrichedHit};
use crate::events::Hit;

/// Protocol version
const PROTOCOL_VERSION: &str = "1";

fn dimension_slot(dimension: Dimension) -> &'static str {
    match dimension {
        Dimension::IsDevBuild => "cd1",
        Dimension::Platform => "cd2",
        Dimension::SdkVersion => "cd3",
        Dimension::AnalyzerVersion => "cd4",
        Dimension::HostVersion => "cd5",
        Dimension::DebuggerScope => "cd6",
        Dimension::WorkspaceType => "cd7",
        Dimension::ClosingLabels => "cd8",
        Dimension::HotReloadOnSave => "cd9",
        Dimension::Todos => "cd10",
        Dimension::LanguageProtocol => "cd11",
        Dimension::Formatter => "cd12",
        Dimension::ToolchainSdkVersion => "cd13",
        Dimension::CompanionExtension => "cd14",
        Dimension::DebuggerType => "cd15",
        Dimension::RunType => "cd16",
        Dimension::UiGuides => "cd17",
        Dimension::RemoteName => "cd19",
        Dimension::HostAppName => "cd20",
    }
}

/// Render a duration the way the collector parses it
fn format_duration(ms: f64) -> String {
    if ms.is_nan() {
        "NaN".to_string()
    } else if ms == f64::INFINITY {
        "Infinity".to_string()
    } else if ms == f64::NEG_INFINITY {
        "-Infinity".to_string()
    } else if ms == 0.0 {
        // Also catches -0.0 from rounding small negatives
        "0".to_string()
    } else {
        format!("{}", ms)
    }
}

/// Flatten an enriched hit into wire keys.
///
/// Keys are inserted context first, then hit fields, so a hit field replaces
/// any context value under the same key.
pub fn to_params(enriched: &EnrichedHit) -> BTreeMap<&'static str, String> {
    let mut params = BTreeMap::new();

    params.insert("v", PROTOCOL_VERSION.to_string());
    params.insert("tid", enriched.tracking_id.clone());
    if let Some(cid) = &enriched.client_id {
        params.insert("cid", cid.clone());
    }
    // Anonymize IP
    params.insert("aip", "1".to_string());
    params.insert("an", enriched.app_name.clone());
    params.insert("av", enriched.app_version.clone());
    if let Some(language) = &enriched.language {
        params.insert("ul", language.clone());
    }

    for (dimension, value) in &enriched.dimensions {
        params.insert(dimension_slot(*dimension), value.clone());
    }

    params.insert("t", enriched.hit.hit_type().to_string());
    match &enriched.hit {
        Hit::Event(event) => {
            params.insert("ec", event.category.as_str().to_string());
            params.insert("ea", event.action.as_str().to_string());
            if let Some(control) = event.session_control {
                params.insert("sc", control.as_str().to_string());
            }
            // Custom fields normally move into `dimensions` during enrichment
            for (dimension, value) in &event.custom {
                params.insert(dimension_slot(*dimension), value.clone());
            }
        }
        Hit::Timing(timing) => {
            params.insert("utc", timing.category.as_str().to_string());
            params.insert("utv", timing.variable.as_str().to_string());
            params.insert("utt", format_duration(timing.duration_ms));
            if let Some(label) = &timing.label {
                params.insert("utl", label.clone());
            }
        }
        Hit::Exception(exception) => {
            params.insert("exd", exception.description.clone());
            params.insert("exf", if exception.fatal { "1" } else { "0" }.to_string());
        }
    }

    params
}

/// URL-encoded form body for one hit
pub fn encode(enriched: &EnrichedHit) -> String {
    form_urlencoded::Serializer::new(String::new())
        .extend_pairs(to_params(enriched))
        .finish()
}
