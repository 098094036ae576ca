//! Timezone resolution: zone ids to offset data, and local wall-clock times to UTC.
//!
//! A [`TimezoneDatabase`] is built once and never mutated afterwards. The
//! process-wide instance ([`TimezoneDatabase::global`]) is backed by the
//! compiled IANA data shipped with `chrono-tz`; tests build their own
//! database and register stub [`TransitionTable`]s so DST behavior can be
//! pinned to exact transition instants.
//!
//! Mapping a local time to UTC has three outcomes ([`LocalResolution`]):
//! exactly one instant, two instants (fall-back overlap), or none
//! (spring-forward gap). [`LocalResolution::apply`] turns that into a single
//! instant using a [`DstPolicy`] and reports what it did as a [`Diagnostic`].

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use chrono::{
    DateTime, Days, Duration, FixedOffset, LocalResult, NaiveDateTime, NaiveTime, Offset, TimeZone,
    Utc,
};
use chrono_tz::Tz;

use crate::diagnostic::Diagnostic;
use crate::dst::{DstPolicy, GapPolicy, OverlapPolicy};
use crate::error::{AgendaError, Result};

/// Windows zone names as written by Exchange/Outlook feeds, mapped to IANA ids.
const WINDOWS_ZONES: &[(&str, &str)] = &[
    ("Pacific Standard Time", "America/Los_Angeles"),
    ("Mountain Standard Time", "America/Denver"),
    ("Central Standard Time", "America/Chicago"),
    ("Eastern Standard Time", "America/New_York"),
    ("GMT Standard Time", "Europe/London"),
    ("W. Europe Standard Time", "Europe/Berlin"),
    ("Romance Standard Time", "Europe/Paris"),
    ("Central Europe Standard Time", "Europe/Budapest"),
    ("Central European Standard Time", "Europe/Warsaw"),
    ("FLE Standard Time", "Europe/Helsinki"),
    ("Tokyo Standard Time", "Asia/Tokyo"),
    ("India Standard Time", "Asia/Kolkata"),
    ("China Standard Time", "Asia/Shanghai"),
    ("AUS Eastern Standard Time", "Australia/Sydney"),
];

const UTC_IDS: &[&str] = &["UTC", "Etc/UTC", "Z", "GMT", "Etc/GMT", "Zulu"];

static GLOBAL: OnceLock<TimezoneDatabase> = OnceLock::new();

/// An offset change taking effect at a UTC instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub at: DateTime<Utc>,
    pub offset: FixedOffset,
}

/// Explicit transition data for a zone, used for stubs and custom zones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionTable {
    id: String,
    initial: FixedOffset,
    transitions: Vec<Transition>,
}

impl TransitionTable {
    /// A zone that observes `initial` until its first transition.
    pub fn new(id: impl Into<String>, initial: FixedOffset) -> Self {
        Self {
            id: id.into(),
            initial,
            transitions: Vec::new(),
        }
    }

    /// Add a transition; transitions may be added in any order.
    pub fn with_transition(mut self, at: DateTime<Utc>, offset: FixedOffset) -> Self {
        let idx = self.transitions.partition_point(|t| t.at <= at);
        self.transitions.insert(idx, Transition { at, offset });
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn transitions(&self) -> &[Transition] {
        &self.transitions
    }

    fn offset_at(&self, utc: DateTime<Utc>) -> FixedOffset {
        let idx = self.transitions.partition_point(|t| t.at <= utc);
        if idx == 0 {
            self.initial
        } else {
            self.transitions[idx - 1].offset
        }
    }
}

/// A resolved zone. Exhaustively matched wherever offsets are needed.
#[derive(Debug, Clone)]
pub enum Zone {
    Utc,
    Iana(Tz),
    Table(Arc<TransitionTable>),
}

impl Zone {
    pub fn id(&self) -> &str {
        match self {
            Self::Utc => "UTC",
            Self::Iana(tz) => tz.name(),
            Self::Table(table) => table.id(),
        }
    }

    /// The UTC offset in effect at `utc`.
    pub fn offset_at(&self, utc: DateTime<Utc>) -> FixedOffset {
        match self {
            Self::Utc => Utc.fix(),
            Self::Iana(tz) => tz.offset_from_utc_datetime(&utc.naive_utc()).fix(),
            Self::Table(table) => table.offset_at(utc),
        }
    }

    /// The wall-clock time in this zone at `utc`.
    pub fn to_local(&self, utc: DateTime<Utc>) -> NaiveDateTime {
        utc.with_timezone(&self.offset_at(utc)).naive_local()
    }

    /// Local midnight `days` after the local date of `start`, the end of an
    /// all-day span. `None` in the instant when the date runs off the
    /// calendar or the policy skips the time.
    pub fn midnight_after(
        &self,
        start: DateTime<Utc>,
        days: u32,
        policy: DstPolicy,
    ) -> ResolvedTime {
        match self
            .to_local(start)
            .date()
            .checked_add_days(Days::new(u64::from(days)))
        {
            Some(date) => {
                let local = date.and_time(NaiveTime::MIN);
                self.resolve(local).apply(self.id(), local, policy)
            }
            None => ResolvedTime {
                instant: None,
                diagnostic: None,
            },
        }
    }

    /// Classify `local` as exact, ambiguous or non-existent in this zone.
    pub fn resolve(&self, local: NaiveDateTime) -> LocalResolution {
        let candidates = match self {
            Self::Utc => LocalResult::Single(local.and_utc()),
            Self::Iana(tz) => tz.from_local_datetime(&local).map(|dt| dt.with_timezone(&Utc)),
            Self::Table(_) => self.table_candidates(local),
        };

        match candidates {
            LocalResult::Single(instant) => LocalResolution::Exact(instant),
            LocalResult::Ambiguous(a, b) => LocalResolution::Ambiguous {
                earlier: a.min(b),
                later: a.max(b),
            },
            LocalResult::None => {
                let (before, after) = self.bracketing_offsets(local);
                LocalResolution::Nonexistent { before, after }
            }
        }
    }

    /// Offsets in effect comfortably before and after `local`. Transitions
    /// are assumed to be more than a day apart, which holds for real zones.
    fn bracketing_offsets(&self, local: NaiveDateTime) -> (FixedOffset, FixedOffset) {
        let day = Duration::days(1);
        let before = local.checked_sub_signed(day).unwrap_or(local).and_utc();
        let after = local.checked_add_signed(day).unwrap_or(local).and_utc();
        (self.offset_at(before), self.offset_at(after))
    }

    fn table_candidates(&self, local: NaiveDateTime) -> LocalResult<DateTime<Utc>> {
        let (before, after) = self.bracketing_offsets(local);
        let mut found: Vec<DateTime<Utc>> = [before, after]
            .into_iter()
            .filter_map(|offset| {
                let instant = local_with_offset(local, offset)?;
                (self.offset_at(instant) == offset).then_some(instant)
            })
            .collect();
        found.sort();
        found.dedup();

        match found.as_slice() {
            [] => LocalResult::None,
            [one] => LocalResult::Single(*one),
            [first, .., last] => LocalResult::Ambiguous(*first, *last),
        }
    }
}

/// Interpret `local` as a wall-clock time observed at `offset`.
fn local_with_offset(local: NaiveDateTime, offset: FixedOffset) -> Option<DateTime<Utc>> {
    local
        .checked_sub_signed(Duration::seconds(i64::from(offset.local_minus_utc())))
        .map(|naive| naive.and_utc())
}

/// Raw outcome of mapping a local time through a zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalResolution {
    Exact(DateTime<Utc>),
    Ambiguous {
        earlier: DateTime<Utc>,
        later: DateTime<Utc>,
    },
    /// The local time falls in a gap between the `before` and `after` offsets.
    Nonexistent {
        before: FixedOffset,
        after: FixedOffset,
    },
}

/// A local time mapped to UTC under a policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTime {
    /// `None` only when a [`GapPolicy::Skip`] policy dropped the time.
    pub instant: Option<DateTime<Utc>>,
    pub diagnostic: Option<Diagnostic>,
}

impl LocalResolution {
    /// Collapse the resolution into at most one instant.
    pub fn apply(self, zone: &str, local: NaiveDateTime, policy: DstPolicy) -> ResolvedTime {
        match self {
            Self::Exact(instant) => ResolvedTime {
                instant: Some(instant),
                diagnostic: None,
            },
            Self::Ambiguous { earlier, later } => {
                let (chosen, alternative) = match policy.overlap {
                    OverlapPolicy::Earlier => (earlier, later),
                    OverlapPolicy::Later => (later, earlier),
                };
                tracing::trace!(zone, %local, %chosen, "ambiguous local time");
                ResolvedTime {
                    instant: Some(chosen),
                    diagnostic: Some(Diagnostic::AmbiguousLocalTime {
                        zone: zone.to_string(),
                        local,
                        chosen,
                        alternative,
                    }),
                }
            }
            Self::Nonexistent { before, after } => {
                let gap_seconds =
                    i64::from(after.local_minus_utc()) - i64::from(before.local_minus_utc());
                // Reading the wall time with the pre-transition offset lands
                // exactly `gap` later on the post-transition clock.
                let instant = match policy.gap {
                    GapPolicy::ShiftForward => local_with_offset(local, before),
                    GapPolicy::Skip => None,
                };
                tracing::trace!(zone, %local, gap_seconds, "non-existent local time");
                ResolvedTime {
                    instant,
                    diagnostic: Some(Diagnostic::NonexistentLocalTime {
                        zone: zone.to_string(),
                        local,
                        gap_seconds,
                        resolved: instant,
                    }),
                }
            }
        }
    }
}

/// Immutable registry of zones.
#[derive(Debug, Clone, Default)]
pub struct TimezoneDatabase {
    custom: HashMap<String, Zone>,
    compiled: bool,
}

impl TimezoneDatabase {
    /// The full IANA database compiled into `chrono-tz`.
    pub fn compiled() -> Self {
        Self {
            custom: HashMap::new(),
            compiled: true,
        }
    }

    /// Only UTC plus whatever is registered explicitly.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_zone(mut self, id: impl Into<String>, zone: Zone) -> Self {
        self.custom.insert(id.into(), zone);
        self
    }

    /// Register a transition table under its own id.
    pub fn with_table(self, table: TransitionTable) -> Self {
        let id = table.id().to_string();
        self.with_zone(id, Zone::Table(Arc::new(table)))
    }

    /// The process-wide database, initialised on first use.
    pub fn global() -> &'static TimezoneDatabase {
        GLOBAL.get_or_init(TimezoneDatabase::compiled)
    }

    /// Install the process-wide database. Fails (returning `db`) if one is
    /// already in place.
    pub fn install_global(db: TimezoneDatabase) -> std::result::Result<(), TimezoneDatabase> {
        GLOBAL.set(db)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.lookup(id).is_some()
    }

    /// Find a zone by id. Accepts IANA ids, common Windows names and
    /// vendor-prefixed ids such as `/mozilla.org/20050126_1/America/New_York`.
    pub fn lookup(&self, id: &str) -> Option<Zone> {
        let id = id.trim().trim_matches('"');
        if let Some(zone) = self.custom.get(id) {
            return Some(zone.clone());
        }
        if UTC_IDS.iter().any(|utc| utc.eq_ignore_ascii_case(id)) {
            return Some(Zone::Utc);
        }
        if !self.compiled {
            return None;
        }

        let id = WINDOWS_ZONES
            .iter()
            .find(|(windows, _)| *windows == id)
            .map_or(id, |(_, iana)| *iana);
        if let Ok(tz) = id.parse::<Tz>() {
            return Some(Zone::Iana(tz));
        }

        // Vendor prefixes: try every suffix after a '/'.
        id.match_indices('/')
            .filter_map(|(idx, _)| id[idx + 1..].parse::<Tz>().ok())
            .next()
            .map(Zone::Iana)
    }

    /// Classify `local` in the zone named `zone_id`.
    pub fn resolve(&self, zone_id: &str, local: NaiveDateTime) -> Result<LocalResolution> {
        let zone = self
            .lookup(zone_id)
            .ok_or_else(|| AgendaError::InvalidTimezone(zone_id.to_string()))?;
        Ok(zone.resolve(local))
    }

    /// Map `local` in `zone_id` to UTC under `policy`.
    pub fn resolve_with(
        &self,
        zone_id: &str,
        local: NaiveDateTime,
        policy: DstPolicy,
    ) -> Result<ResolvedTime> {
        let zone = self
            .lookup(zone_id)
            .ok_or_else(|| AgendaError::InvalidTimezone(zone_id.to_string()))?;
        Ok(zone.resolve(local).apply(zone.id(), local, policy))
    }
}
