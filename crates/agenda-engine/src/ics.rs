//! ICS text into [`RawComponent`]s, using the `icalendar` crate's parser.
//!
//! Only syntax is handled here. Component semantics (which types are
//! supported, how values are anchored) belong to the normalizer, so every
//! top-level component except VTIMEZONE is passed through.

use icalendar::parser::{read_calendar, unfold, Component};

use crate::error::{AgendaError, Result};
use crate::normalize::{RawComponent, RawProperty};

/// Zone definitions; zones come from the timezone database instead.
const SKIPPED: &[&str] = &["VTIMEZONE"];

/// Parse a whole feed.
///
/// # Errors
/// Returns [`AgendaError::Feed`] when the text is not iCalendar at all. A
/// single malformed event does not fail the feed; it is rejected later by
/// the normalizer.
pub fn read_components(text: &str) -> Result<Vec<RawComponent>> {
    let unfolded = unfold(text);
    let calendar = read_calendar(&unfolded).map_err(|e| AgendaError::Feed(e.to_string()))?;

    let mut out = Vec::new();
    for component in &calendar.components {
        collect(component, &mut out);
    }
    tracing::debug!(components = out.len(), "read feed");
    Ok(out)
}

fn collect(component: &Component<'_>, out: &mut Vec<RawComponent>) {
    let name = component.name.as_ref().to_ascii_uppercase();
    if name == "VCALENDAR" {
        for child in &component.components {
            collect(child, out);
        }
        return;
    }
    if SKIPPED.contains(&name.as_str()) {
        return;
    }

    // Nested components (VALARM) are not carried over.
    out.push(RawComponent {
        name,
        properties: component
            .properties
            .iter()
            .map(|prop| RawProperty {
                name: prop.name.as_ref().to_ascii_uppercase(),
                params: prop
                    .params
                    .iter()
                    .map(|param| {
                        (
                            param.key.as_ref().to_ascii_uppercase(),
                            param
                                .val
                                .as_ref()
                                .map(|v| v.as_ref().trim_matches('"').to_string())
                                .unwrap_or_default(),
                        )
                    })
                    .collect(),
                value: prop.val.to_string(),
            })
            .collect(),
    });
}
