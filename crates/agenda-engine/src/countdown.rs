//! Countdown projection for the primary occurrence.
//!
//! The projector is a pure function re-invoked on every external tick. It
//! never clamps and never re-selects: once [`CountdownProjection::is_expired`]
//! turns true the caller runs selection again.
//!
//! Two helpers keep the displayed value steady. [`MonotonicAnchor`] derives
//! the reference instant from a monotonic clock reading, so wall-clock steps
//! between syncs do not move the countdown. [`project_held`] swallows small
//! upward corrections when a resync lands slightly behind the last value.

use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::event::Occurrence;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CountdownMode {
    UntilStart,
    UntilEnd,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountdownProjection {
    pub event_id: String,
    pub original_start: DateTime<Utc>,
    pub mode: CountdownMode,
    /// The instant being counted towards (start or end).
    pub target: DateTime<Utc>,
    /// Signed; negative once the target has passed.
    pub remaining_ms: i64,
}

impl CountdownProjection {
    pub fn remaining(&self) -> Duration {
        Duration::milliseconds(self.remaining_ms)
    }

    /// The primary has started (until-start) or ended (until-end); select again.
    pub fn is_expired(&self) -> bool {
        self.remaining_ms <= 0
    }

    fn is_same_target(&self, other: &Self) -> bool {
        self.event_id == other.event_id
            && self.original_start == other.original_start
            && self.mode == other.mode
    }
}

/// Project the remaining time for `primary` at `reference`.
pub fn project(primary: &Occurrence, reference: DateTime<Utc>) -> CountdownProjection {
    let (mode, target) = if primary.start > reference {
        (CountdownMode::UntilStart, primary.start)
    } else {
        (CountdownMode::UntilEnd, primary.end)
    };
    CountdownProjection {
        event_id: primary.event_id.clone(),
        original_start: primary.original_start,
        mode,
        target,
        remaining_ms: (target - reference).num_milliseconds(),
    }
}

/// Like [`project`], but keeps `previous` when the new value would only
/// rise by less than `tolerance` for the same target.
pub fn project_held(
    primary: &Occurrence,
    reference: DateTime<Utc>,
    previous: Option<&CountdownProjection>,
    tolerance: Duration,
) -> CountdownProjection {
    let fresh = project(primary, reference);
    match previous {
        Some(prev)
            if prev.is_same_target(&fresh)
                && fresh.remaining_ms > prev.remaining_ms
                && fresh.remaining() - prev.remaining() < tolerance =>
        {
            tracing::trace!(
                held = prev.remaining_ms,
                fresh = fresh.remaining_ms,
                "countdown jitter held"
            );
            prev.clone()
        }
        _ => fresh,
    }
}

/// A synced UTC instant paired with the monotonic clock reading taken at
/// the same moment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonotonicAnchor {
    synced: DateTime<Utc>,
    monotonic: StdDuration,
}

impl MonotonicAnchor {
    /// `monotonic` is any monotonic reading (e.g. elapsed since process
    /// start) taken when `synced` was received.
    pub fn new(synced: DateTime<Utc>, monotonic: StdDuration) -> Self {
        Self { synced, monotonic }
    }

    pub fn synced(&self) -> DateTime<Utc> {
        self.synced
    }

    /// Reference instant at a later monotonic reading. Readings earlier than
    /// the anchor map to the anchor itself.
    pub fn reference_at(&self, monotonic: StdDuration) -> DateTime<Utc> {
        let elapsed = monotonic.saturating_sub(self.monotonic);
        Duration::from_std(elapsed)
            .ok()
            .and_then(|elapsed| self.synced.checked_add_signed(elapsed))
            .unwrap_or(self.synced)
    }
}
