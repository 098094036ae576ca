//! Canonical event model shared by the normalizer, the generator and selection.

use std::collections::{BTreeMap, BTreeSet};
use std::hash::{Hash, Hasher};

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::rule::RecurrenceRule;

/// Timed events carry a duration; all-day events a number of whole days and
/// never a wall-clock time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Timed { duration: Duration },
    AllDay { days: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    #[default]
    Confirmed,
    Tentative,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transparency {
    #[default]
    Opaque,
    Transparent,
}

/// Changes applied to one instance of a recurring event (a RECURRENCE-ID
/// component). Fields left `None` inherit from the master.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OccurrenceOverride {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub title: Option<String>,
    pub location: Option<String>,
    pub cancelled: bool,
}

/// A normalized VEVENT. All instants are UTC; `zone_id` is the zone the
/// event's wall-clock times were declared in (already validated).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarEvent {
    pub id: String,
    pub title: String,
    pub location: Option<String>,
    pub zone_id: String,
    pub start: DateTime<Utc>,
    pub kind: EventKind,
    pub status: EventStatus,
    pub transparency: Transparency,
    pub rule: Option<RecurrenceRule>,
    pub rdates: Vec<DateTime<Utc>>,
    pub exdates: BTreeSet<DateTime<Utc>>,
    /// EXDATE;VALUE=DATE entries, matched against the instance's local date.
    pub exdate_dates: BTreeSet<NaiveDate>,
    /// Keyed by the original (pre-override) start of the instance.
    pub overrides: BTreeMap<DateTime<Utc>, OccurrenceOverride>,
    pub sequence: u32,
}

impl CalendarEvent {
    /// A confirmed, opaque, non-recurring timed event in UTC.
    pub fn timed(
        id: impl Into<String>,
        title: impl Into<String>,
        start: DateTime<Utc>,
        duration: Duration,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            location: None,
            zone_id: "UTC".to_string(),
            start,
            kind: EventKind::Timed { duration },
            status: EventStatus::default(),
            transparency: Transparency::default(),
            rule: None,
            rdates: Vec::new(),
            exdates: BTreeSet::new(),
            exdate_dates: BTreeSet::new(),
            overrides: BTreeMap::new(),
            sequence: 0,
        }
    }

    pub fn with_zone(mut self, zone_id: impl Into<String>) -> Self {
        self.zone_id = zone_id.into();
        self
    }

    pub fn with_rule(mut self, rule: RecurrenceRule) -> Self {
        self.rule = Some(rule);
        self
    }

    pub fn is_all_day(&self) -> bool {
        matches!(self.kind, EventKind::AllDay { .. })
    }

    pub fn is_recurring(&self) -> bool {
        self.rule.is_some()
    }

    /// Upper bound on how long one instance lasts, ignoring overrides.
    pub(crate) fn span(&self) -> Duration {
        match self.kind {
            EventKind::Timed { duration } => duration,
            // DST can stretch a local day to 25 hours.
            EventKind::AllDay { days } => Duration::days(i64::from(days) + 1),
        }
    }
}

/// One concrete instance of an event.
///
/// Identity is `(event_id, original_start)`: an overridden instance is the
/// same occurrence as the one it replaced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Occurrence {
    pub event_id: String,
    pub original_start: DateTime<Utc>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default)]
    pub all_day: bool,
    #[serde(default)]
    pub transparency: Transparency,
    #[serde(default)]
    pub overridden: bool,
}

impl Occurrence {
    /// `start <= at < end`.
    pub fn is_running_at(&self, at: DateTime<Utc>) -> bool {
        self.start <= at && at < self.end
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }
}

impl PartialEq for Occurrence {
    fn eq(&self, other: &Self) -> bool {
        self.event_id == other.event_id && self.original_start == other.original_start
    }
}

impl Eq for Occurrence {}

impl Hash for Occurrence {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.event_id.hash(state);
        self.original_start.hash(state);
    }
}

/// Half-open query window `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Window {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Window {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// Everything representable. Only safe for rules with their own bound.
    pub fn unbounded() -> Self {
        Self {
            start: DateTime::<Utc>::MIN_UTC,
            end: DateTime::<Utc>::MAX_UTC,
        }
    }

    /// Whether `[start, end)` overlaps the window. A zero-length interval
    /// counts when its instant lies inside the window.
    pub fn intersects(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        if start >= end {
            return self.start <= start && start < self.end;
        }
        start < self.end && end > self.start
    }
}
