//! Occurrence generation -- turns an event plus a query window into its
//! concrete instances.
//!
//! Generation is lazy: [`generate`] returns an [`OccurrenceIter`] that walks
//! the rule one period at a time, resolving each candidate wall-clock time
//! through the event's zone. Callers that only need the next few instances
//! can stop pulling at any point. [`expand`] drains the iterator and hands
//! back the collected [`Diagnostic`]s alongside the occurrences.
//!
//! Output is ordered by original start and de-duplicated on it. RDATEs are
//! merged into the rule's stream; EXDATEs and overrides are applied to
//! both. An override that moves an instance into the window from a slot
//! outside it is merged the same way, so the instance keeps its identity.

use std::collections::VecDeque;

use chrono::{DateTime, Days, Duration, NaiveDate, NaiveDateTime, NaiveTime, Utc};

use crate::diagnostic::Diagnostic;
use crate::dst::DstPolicy;
use crate::error::{AgendaError, Result};
use crate::event::{CalendarEvent, EventKind, Occurrence, Window};
use crate::rule::{RecurrenceRule, RuleBound};
use crate::timezone::{TimezoneDatabase, Zone};
use crate::value::IcalTime;

/// Default hard ceiling on recurrence periods examined per event.
pub const DEFAULT_MAX_ITERATIONS: usize = 100_000;

/// Knobs for a single expansion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpandOptions {
    pub policy: DstPolicy,
    /// Recurrence periods examined before giving up with
    /// [`AgendaError::RecurrenceOverflow`].
    pub max_iterations: usize,
}

impl Default for ExpandOptions {
    fn default() -> Self {
        Self {
            policy: DstPolicy::default(),
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }
}

impl ExpandOptions {
    pub fn with_policy(mut self, policy: DstPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max;
        self
    }
}

/// A fully drained expansion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Expansion {
    pub occurrences: Vec<Occurrence>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Lazily generate the instances of `event` that intersect `window`.
///
/// The iterator yields `Err(RecurrenceOverflow)` once if the rule runs past
/// the iteration ceiling, and nothing after that.
pub fn generate<'a>(
    event: &'a CalendarEvent,
    window: Window,
    db: &TimezoneDatabase,
    options: &ExpandOptions,
) -> OccurrenceIter<'a> {
    let mut diagnostics = Vec::new();
    let zone = db.lookup(&event.zone_id).unwrap_or_else(|| {
        diagnostics.push(Diagnostic::UnknownTimezone {
            component: event.id.clone(),
            zone: event.zone_id.clone(),
        });
        Zone::Utc
    });
    let anchor = zone.to_local(event.start);

    let mut iter = OccurrenceIter {
        event,
        window,
        zone,
        policy: options.policy,
        cursor: None,
        rdates: VecDeque::new(),
        pending: None,
        last_original: None,
        single: !event.is_recurring(),
        diagnostics,
        done: false,
    };

    if let Some(rule) = &event.rule {
        let until = match rule.bound {
            RuleBound::Until(until) => Some(iter.until_instant(until)),
            _ => None,
        };
        let mut cursor = RuleCursor::new(rule, anchor, until, options.max_iterations);
        // Offsets are under a day, so the UTC date plus one bounds the local one.
        cursor.horizon = window.end.date_naive().checked_add_days(Days::new(1));
        if rule.count().is_none() {
            cursor.fast_forward(event.span(), window.start);
        }
        iter.cursor = Some(cursor);

        let mut rdates = event.rdates.clone();
        rdates.extend(moved_in(event, window, until));
        rdates.sort();
        rdates.dedup();
        iter.rdates = rdates.into();
    }

    iter
}

/// Original starts of overrides that move an instance into `window` from a
/// slot the rule walk does not reach: before the fast-forward point or at or
/// after the window end.
fn moved_in(
    event: &CalendarEvent,
    window: Window,
    until: Option<DateTime<Utc>>,
) -> impl Iterator<Item = DateTime<Utc>> + '_ {
    let span = event.span();
    let walked_from = window.start.checked_sub_signed(span).unwrap_or(window.start);
    event
        .overrides
        .iter()
        .filter(move |(original, ov)| {
            let original = **original;
            if ov.cancelled
                || original < event.start
                || until.is_some_and(|until| original > until)
                || (original >= walked_from && original < window.end)
            {
                return false;
            }
            let start = ov.start.unwrap_or(original);
            let end = ov
                .end
                .unwrap_or_else(|| start.checked_add_signed(span).unwrap_or(start));
            window.intersects(start, end)
        })
        .map(|(original, _)| *original)
}

/// Drain [`generate`] into a vector.
///
/// # Errors
/// Returns [`AgendaError::RecurrenceOverflow`] when the rule exceeds the
/// iteration ceiling; occurrences gathered so far are discarded.
pub fn expand(
    event: &CalendarEvent,
    window: Window,
    db: &TimezoneDatabase,
    options: &ExpandOptions,
) -> Result<Expansion> {
    let mut iter = generate(event, window, db, options);
    let occurrences = iter.by_ref().collect::<Result<Vec<_>>>()?;
    Ok(Expansion {
        occurrences,
        diagnostics: iter.into_diagnostics(),
    })
}

/// Expand an RRULE string into concrete instances, without a feed.
///
/// # Arguments
/// - `rrule` -- RFC 5545 RRULE string (e.g., "FREQ=WEEKLY;BYDAY=TU,TH")
/// - `dtstart` -- Local datetime string (e.g., "2026-02-17T14:00:00")
/// - `duration_minutes` -- Duration of each instance in minutes
/// - `timezone` -- Zone id (IANA or Windows name)
/// - `until` -- Optional inclusive end boundary (local datetime string)
/// - `count` -- Optional maximum number of instances
///
/// A rule with neither COUNT nor UNTIL (in the text or the arguments) runs
/// into the iteration ceiling.
///
/// # Errors
/// Returns `AgendaError::InvalidRule` if the RRULE is empty or unparseable,
/// `AgendaError::InvalidTimezone` for an unknown zone, and
/// `AgendaError::InvalidDatetime` for a malformed `dtstart`/`until`.
pub fn expand_rrule(
    rrule: &str,
    dtstart: &str,
    duration_minutes: u32,
    timezone: &str,
    until: Option<&str>,
    count: Option<u32>,
) -> Result<Vec<Occurrence>> {
    if count == Some(0) {
        return Ok(Vec::new());
    }

    let db = TimezoneDatabase::global();
    let zone = db
        .lookup(timezone)
        .ok_or_else(|| AgendaError::InvalidTimezone(timezone.to_string()))?;

    let mut rule: RecurrenceRule = rrule.parse()?;
    match (rule.bound, until, count) {
        (RuleBound::Open, Some(until), _) => {
            rule.bound = RuleBound::Until(IcalTime::Floating(parse_local(until)?));
        }
        (RuleBound::Open, None, Some(count)) => rule.bound = RuleBound::Count(count),
        _ => {}
    }

    let local = parse_local(dtstart)?;
    let start = zone
        .resolve(local)
        .apply(zone.id(), local, DstPolicy::default())
        .instant
        .ok_or_else(|| AgendaError::InvalidDatetime(dtstart.to_string()))?;

    let event = CalendarEvent::timed(
        "rrule",
        "",
        start,
        Duration::minutes(i64::from(duration_minutes)),
    )
    .with_zone(zone.id())
    .with_rule(rule);

    let mut occurrences = expand(&event, Window::unbounded(), db, &ExpandOptions::default())?
        .occurrences;
    if let Some(count) = count {
        occurrences.truncate(count as usize);
    }
    Ok(occurrences)
}

/// Accepts "2026-02-17T14:00:00" or the iCalendar form "20260217T140000".
fn parse_local(value: &str) -> Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value.trim(), "%Y-%m-%dT%H:%M:%S").or_else(|_| {
        match IcalTime::parse(value, false)? {
            IcalTime::Floating(local) => Ok(local),
            IcalTime::Utc(utc) => Ok(utc.naive_utc()),
            IcalTime::Date(date) => Ok(date.and_time(NaiveTime::MIN)),
        }
    })
}

/// Lazy, ordered occurrence stream for one event.
#[derive(Debug)]
pub struct OccurrenceIter<'a> {
    event: &'a CalendarEvent,
    window: Window,
    zone: Zone,
    policy: DstPolicy,
    cursor: Option<RuleCursor<'a>>,
    rdates: VecDeque<DateTime<Utc>>,
    /// Next rule instant, pulled ahead so it can be merged with RDATEs.
    pending: Option<DateTime<Utc>>,
    last_original: Option<DateTime<Utc>>,
    single: bool,
    diagnostics: Vec<Diagnostic>,
    done: bool,
}

impl OccurrenceIter<'_> {
    /// Diagnostics recorded so far (DST adjustments, zone fallback).
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics
    }

    /// UNTIL as an instant. Floating and date values are read in the event's
    /// zone; a date means the whole day is included.
    fn until_instant(&mut self, until: IcalTime) -> DateTime<Utc> {
        let local = match until {
            IcalTime::Utc(utc) => return utc,
            IcalTime::Floating(local) => local,
            IcalTime::Date(date) => date
                .and_hms_opt(23, 59, 59)
                .unwrap_or_else(|| date.and_time(NaiveTime::MIN)),
        };
        let resolved = self.zone.resolve(local).apply(
            self.zone.id(),
            local,
            DstPolicy::default(),
        );
        resolved.instant.unwrap_or_else(|| local.and_utc())
    }

    fn is_excluded(&self, original: DateTime<Utc>) -> bool {
        self.event.exdates.contains(&original)
            || (!self.event.exdate_dates.is_empty()
                && self
                    .event
                    .exdate_dates
                    .contains(&self.zone.to_local(original).date()))
    }

    fn end_for(&mut self, start: DateTime<Utc>) -> DateTime<Utc> {
        match self.event.kind {
            EventKind::Timed { duration } => start + duration,
            EventKind::AllDay { days } => {
                let resolved = self.zone.midnight_after(start, days, self.policy);
                if let Some(diagnostic) = resolved.diagnostic {
                    self.diagnostics.push(diagnostic);
                }
                resolved
                    .instant
                    .unwrap_or(start + Duration::days(i64::from(days)))
            }
        }
    }

    fn occurrence(&mut self, original: DateTime<Utc>) -> Option<Occurrence> {
        let end = self.end_for(original);
        let mut occurrence = Occurrence {
            event_id: self.event.id.clone(),
            original_start: original,
            start: original,
            end,
            title: self.event.title.clone(),
            location: self.event.location.clone(),
            all_day: self.event.is_all_day(),
            transparency: self.event.transparency,
            overridden: false,
        };

        if !self.single {
            if let Some(ov) = self.event.overrides.get(&original) {
                if ov.cancelled {
                    return None;
                }
                let length = end - original;
                occurrence.start = ov.start.unwrap_or(original);
                occurrence.end = ov.end.unwrap_or(occurrence.start + length);
                if let Some(title) = &ov.title {
                    occurrence.title = title.clone();
                }
                if ov.location.is_some() {
                    occurrence.location = ov.location.clone();
                }
                occurrence.overridden = true;
            }
        }

        Some(occurrence)
    }

    /// Next original start from the merged rule/RDATE streams.
    fn next_original(&mut self) -> Option<Result<DateTime<Utc>>> {
        if self.pending.is_none() {
            if let Some(cursor) = self.cursor.as_mut() {
                match cursor.next_instant(&self.zone, self.policy, &mut self.diagnostics) {
                    Some(Ok(instant)) => self.pending = Some(instant),
                    Some(Err(())) => {
                        let limit = cursor.ceiling;
                        tracing::warn!(event = %self.event.id, limit, "recurrence overflow");
                        return Some(Err(AgendaError::RecurrenceOverflow {
                            event_id: self.event.id.clone(),
                            limit,
                        }));
                    }
                    None => self.cursor = None,
                }
            }
        }

        let take_rdate = match (self.pending, self.rdates.front()) {
            (Some(rule), Some(rdate)) => *rdate < rule,
            (None, Some(_)) => true,
            (_, None) => false,
        };
        if take_rdate {
            self.rdates.pop_front().map(Ok)
        } else {
            self.pending.take().map(Ok)
        }
    }
}

impl Iterator for OccurrenceIter<'_> {
    type Item = Result<Occurrence>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        if self.single {
            self.done = true;
            let occurrence = self.occurrence(self.event.start)?;
            return self
                .window
                .intersects(occurrence.start, occurrence.end)
                .then_some(Ok(occurrence));
        }

        loop {
            let original = match self.next_original() {
                Some(Ok(original)) => original,
                Some(Err(err)) => {
                    self.done = true;
                    return Some(Err(err));
                }
                None => {
                    self.done = true;
                    return None;
                }
            };

            if original >= self.window.end && !self.event.overrides.contains_key(&original) {
                // Only queued dates can still be moved into the window.
                if self.rdates.is_empty() {
                    self.done = true;
                    return None;
                }
                continue;
            }
            if self.last_original == Some(original) {
                continue;
            }
            self.last_original = Some(original);

            if self.is_excluded(original) {
                continue;
            }
            let Some(occurrence) = self.occurrence(original) else {
                continue;
            };
            if self.window.intersects(occurrence.start, occurrence.end) {
                return Some(Ok(occurrence));
            }
        }
    }
}

/// Walks a rule period by period, producing candidate instants in order.
#[derive(Debug)]
struct RuleCursor<'a> {
    rule: &'a RecurrenceRule,
    anchor: NaiveDateTime,
    until: Option<DateTime<Utc>>,
    /// Last local date worth expanding; `None` for an unbounded window.
    horizon: Option<NaiveDate>,
    /// Index of the next period to expand.
    period: u64,
    buffer: VecDeque<DateTime<Utc>>,
    /// Instances produced so far, for COUNT. EXDATE'd ones included.
    produced: u32,
    iterations: usize,
    ceiling: usize,
    anchor_emitted: bool,
    exhausted: bool,
}

impl<'a> RuleCursor<'a> {
    fn new(
        rule: &'a RecurrenceRule,
        anchor: NaiveDateTime,
        until: Option<DateTime<Utc>>,
        ceiling: usize,
    ) -> Self {
        Self {
            rule,
            anchor,
            until,
            horizon: None,
            period: 0,
            buffer: VecDeque::new(),
            produced: 0,
            iterations: 0,
            ceiling,
            anchor_emitted: false,
            exhausted: false,
        }
    }

    /// Jump to the period that could still hold an instance running at
    /// `window_start`.
    fn fast_forward(&mut self, span: Duration, window_start: DateTime<Utc>) {
        let Some(target) = window_start
            .checked_sub_signed(span)
            .map(|t| t.date_naive())
            .and_then(|d| d.checked_sub_days(Days::new(1)))
        else {
            return;
        };
        let skip = self.rule.periods_until(self.anchor.date(), target);
        if skip > 0 {
            // Land one period early so boundary candidates are not lost.
            self.period = skip.saturating_sub(1);
            tracing::trace!(periods = self.period, "fast-forwarded recurrence");
        }
    }

    /// `None` when the rule is exhausted, `Some(Err(()))` on overflow.
    fn next_instant(
        &mut self,
        zone: &Zone,
        policy: DstPolicy,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Option<std::result::Result<DateTime<Utc>, ()>> {
        if self.exhausted {
            return None;
        }
        if let Some(count) = self.rule.count() {
            if self.produced >= count {
                self.exhausted = true;
                return None;
            }
        }

        let instant = if !self.anchor_emitted {
            // DTSTART is always the first instance, whether or not it
            // matches the rule.
            self.anchor_emitted = true;
            let resolved = zone.resolve(self.anchor).apply(zone.id(), self.anchor, policy);
            if let Some(diagnostic) = resolved.diagnostic {
                diagnostics.push(diagnostic);
            }
            match resolved.instant {
                Some(instant) => instant,
                None => return self.next_instant(zone, policy, diagnostics),
            }
        } else {
            loop {
                if let Some(instant) = self.buffer.pop_front() {
                    break instant;
                }
                if self.iterations >= self.ceiling {
                    self.exhausted = true;
                    return Some(Err(()));
                }
                self.iterations += 1;
                if !self.fill_period(zone, policy, diagnostics) {
                    self.exhausted = true;
                    return None;
                }
            }
        };

        if self.until.is_some_and(|until| instant > until) {
            self.exhausted = true;
            return None;
        }
        self.produced += 1;
        Some(Ok(instant))
    }

    /// Expand the next period into the buffer. `false` once the calendar
    /// runs out or the period begins after UNTIL or the window.
    fn fill_period(
        &mut self,
        zone: &Zone,
        policy: DstPolicy,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> bool {
        let anchor_date = self.anchor.date();
        let Some(start) = self.rule.period_start(anchor_date, self.period) else {
            return false;
        };
        self.period += 1;
        let until_date = self
            .until
            .and_then(|until| until.date_naive().checked_add_days(Days::new(1)));
        if [until_date, self.horizon]
            .into_iter()
            .flatten()
            .any(|last| start > last)
        {
            return false;
        }

        let time = self.anchor.time();
        let mut instants: Vec<DateTime<Utc>> = self
            .rule
            .dates_in_period(anchor_date, start)
            .into_iter()
            .map(|date: NaiveDate| date.and_time(time))
            .filter(|local| *local > self.anchor)
            .filter_map(|local| {
                let resolved = zone.resolve(local).apply(zone.id(), local, policy);
                if let Some(diagnostic) = resolved.diagnostic {
                    diagnostics.push(diagnostic);
                }
                resolved.instant
            })
            .collect();
        instants.sort();
        self.buffer.extend(instants);
        true
    }
}
