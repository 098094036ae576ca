//! Merging per-event expansions into one ordered occurrence pool.

use std::cmp::Ordering;

use serde::Serialize;

use crate::diagnostic::Diagnostic;
use crate::event::{CalendarEvent, EventStatus, Occurrence, Transparency, Window};
use crate::expander::{expand, ExpandOptions};
use crate::timezone::TimezoneDatabase;

/// Which events take part in the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PoolFilter {
    pub skip_all_day: bool,
    pub skip_transparent: bool,
}

/// Every occurrence of every event inside the window, in selection order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OccurrencePool {
    pub occurrences: Vec<Occurrence>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Expand all `events` over `window`.
///
/// Cancelled events never enter the pool. An event whose rule overflows
/// the iteration ceiling contributes a diagnostic and no occurrences; the
/// rest of the feed is unaffected.
pub fn build_pool(
    events: &[CalendarEvent],
    window: Window,
    db: &TimezoneDatabase,
    options: &ExpandOptions,
    filter: PoolFilter,
) -> OccurrencePool {
    let mut pool = OccurrencePool::default();

    for event in events {
        if event.status == EventStatus::Cancelled
            || (filter.skip_all_day && event.is_all_day())
            || (filter.skip_transparent && event.transparency == Transparency::Transparent)
        {
            tracing::debug!(event = %event.id, "excluded from pool");
            continue;
        }

        match expand(event, window, db, options) {
            Ok(expansion) => {
                pool.occurrences.extend(expansion.occurrences);
                pool.diagnostics.extend(expansion.diagnostics);
            }
            Err(err) => {
                if let Some(diagnostic) = Diagnostic::from_error(&err) {
                    pool.diagnostics.push(diagnostic);
                }
            }
        }
    }

    pool.occurrences.sort_by(occurrence_order);
    pool
}

/// Ascending start, then event id, then original start.
pub fn occurrence_order(a: &Occurrence, b: &Occurrence) -> Ordering {
    a.start
        .cmp(&b.start)
        .then_with(|| a.event_id.cmp(&b.event_id))
        .then_with(|| a.original_start.cmp(&b.original_start))
}
