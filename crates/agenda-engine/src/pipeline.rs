//! The path every surface takes: feed text to a selection snapshot.
//!
//! The CLI and the WebAssembly bindings both call into this module, so the
//! selection a voice request sees is the one the web view sees.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::countdown::{project_held, CountdownProjection};
use crate::diagnostic::Diagnostic;
use crate::error::{AgendaError, Result};
use crate::event::Window;
use crate::ics::read_components;
use crate::normalize::{normalize_feed, NormalizedFeed};
use crate::options::EngineOptions;
use crate::pool::{build_pool, OccurrencePool};
use crate::selection::{select, HiddenSet, SelectionResult};
use crate::timezone::TimezoneDatabase;

/// Read and normalize an ICS feed.
///
/// # Errors
/// Only when the text is not iCalendar at all; rejected components are
/// reported in [`NormalizedFeed::errors`].
pub fn load_feed(
    ics: &str,
    db: &TimezoneDatabase,
    options: &EngineOptions,
) -> Result<NormalizedFeed> {
    let components = read_components(ics)?;
    let feed = normalize_feed(&components, db, options);
    if !feed.errors.is_empty() {
        tracing::debug!(rejected = feed.errors.len(), "components rejected");
    }
    Ok(feed)
}

/// Expand a normalized feed over `window` using the configured policies.
///
/// The pool's diagnostics cover the whole feed: rejected components first,
/// then normalization notes, then expansion notes.
pub fn occurrences(
    feed: &NormalizedFeed,
    window: Window,
    db: &TimezoneDatabase,
    options: &EngineOptions,
) -> OccurrencePool {
    let mut pool = build_pool(
        &feed.events,
        window,
        db,
        &options.expand_options(),
        options.pool_filter(),
    );
    let mut diagnostics: Vec<Diagnostic> = feed.errors.iter().map(Diagnostic::from).collect();
    diagnostics.extend(feed.diagnostics.iter().cloned());
    diagnostics.append(&mut pool.diagnostics);
    pool.diagnostics = diagnostics;
    pool
}

/// Everything a surface needs to render one moment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SnapshotResponse {
    pub selection: SelectionResult,
    pub countdown: Option<CountdownProjection>,
    pub diagnostics: Vec<Diagnostic>,
}

/// JSON input for [`snapshot_json`].
#[derive(Debug, Clone, Deserialize)]
pub struct SnapshotRequest {
    /// Raw ICS text.
    pub ics: String,
    /// UTC reference instant from the shared time source.
    pub reference: DateTime<Utc>,
    #[serde(default)]
    pub hidden: HiddenSet,
    #[serde(default)]
    pub options: EngineOptions,
    /// Last projection shown, for jitter holding.
    #[serde(default)]
    pub previous: Option<CountdownProjection>,
}

/// Select and project at `reference`.
///
/// Diagnostics cover the whole pipeline: rejected components, zone
/// fallbacks, DST adjustments and overflowed rules.
pub fn snapshot(
    feed: &NormalizedFeed,
    hidden: &HiddenSet,
    reference: DateTime<Utc>,
    db: &TimezoneDatabase,
    options: &EngineOptions,
    previous: Option<&CountdownProjection>,
) -> SnapshotResponse {
    let pool = occurrences(feed, options.window_around(reference), db, options);
    let selection = select(&pool.occurrences, hidden, reference, options.display_limit);
    let countdown = selection
        .primary
        .as_ref()
        .map(|primary| project_held(primary, reference, previous, options.jitter_tolerance()));

    SnapshotResponse {
        selection,
        countdown,
        diagnostics: pool.diagnostics,
    }
}

/// [`SnapshotRequest`] JSON in, [`SnapshotResponse`] JSON out.
///
/// # Errors
/// Returns [`AgendaError::InvalidRequest`] for malformed JSON and
/// [`AgendaError::Feed`] when `ics` is not iCalendar.
pub fn snapshot_json(request: &str, db: &TimezoneDatabase) -> Result<String> {
    let request: SnapshotRequest =
        serde_json::from_str(request).map_err(|e| AgendaError::InvalidRequest(e.to_string()))?;
    let feed = load_feed(&request.ics, db, &request.options)?;
    let response = snapshot(
        &feed,
        &request.hidden,
        request.reference,
        db,
        &request.options,
        request.previous.as_ref(),
    );
    serde_json::to_string(&response).map_err(|e| AgendaError::InvalidRequest(e.to_string()))
}
