//! Recurrence rules: RRULE text into a typed rule, and the calendar math that
//! turns one recurrence period into its candidate dates.
//!
//! Parsing is delegated to the `rrule` crate; expansion is not, because the
//! generator needs control over DST resolution, per-instance overrides and
//! an iteration ceiling. The rule keeps only the parts this engine honors;
//! time-of-day parts (BYHOUR and friends) are rejected instead of ignored.

use std::str::FromStr;

use chrono::{Datelike, Days, Months, NaiveDate, Weekday};
use rrule::{Frequency as RuleFrequency, NWeekday, RRule, Unvalidated};
use serde::Serialize;

use crate::error::{AgendaError, Result};
use crate::value::IcalTime;

const UNSUPPORTED_PARTS: &[&str] = &[
    "BYHOUR",
    "BYMINUTE",
    "BYSECOND",
    "BYYEARDAY",
    "BYWEEKNO",
    "BYEASTER",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

/// A BYDAY entry: `TU`, `2TU` or `-1FR`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ByDay {
    pub weekday: Weekday,
    pub ordinal: Option<i16>,
}

/// How a rule terminates. COUNT and UNTIL are mutually exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleBound {
    Count(u32),
    /// UNTIL as written; floating and date values use the event's zone.
    Until(IcalTime),
    /// No bound of its own; the caller's window stops generation.
    Open,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecurrenceRule {
    pub frequency: Frequency,
    pub interval: u32,
    pub bound: RuleBound,
    pub by_day: Vec<ByDay>,
    pub by_month_day: Vec<i8>,
    pub by_month: Vec<u32>,
    pub by_set_pos: Vec<i32>,
    pub week_start: Weekday,
}

impl FromStr for RecurrenceRule {
    type Err = AgendaError;

    fn from_str(text: &str) -> Result<Self> {
        let text = text.trim();
        let body = match text.get(..6) {
            Some(prefix) if prefix.eq_ignore_ascii_case("RRULE:") => &text[6..],
            _ => text,
        };
        if body.trim().is_empty() {
            return Err(AgendaError::InvalidRule("empty RRULE string".to_string()));
        }

        // UNTIL is resolved against the event's zone later, so it is pulled
        // out before the rest goes to the parser.
        let mut until = None;
        let mut parts = Vec::new();
        for part in body.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            let (key, value) = part.split_once('=').unwrap_or((part, ""));
            let key = key.trim().to_ascii_uppercase();
            if key == "UNTIL" {
                until = Some(IcalTime::parse(value, false)?);
            } else if UNSUPPORTED_PARTS.contains(&key.as_str()) {
                return Err(AgendaError::InvalidRule(format!("unsupported rule part {}", key)));
            } else {
                parts.push(format!("{}={}", key, value.trim().to_ascii_uppercase()));
            }
        }

        let parsed = parts
            .join(";")
            .parse::<RRule<Unvalidated>>()
            .map_err(|e| AgendaError::InvalidRule(e.to_string()))?;

        let frequency = match parsed.get_freq() {
            RuleFrequency::Daily => Frequency::Daily,
            RuleFrequency::Weekly => Frequency::Weekly,
            RuleFrequency::Monthly => Frequency::Monthly,
            RuleFrequency::Yearly => Frequency::Yearly,
            other => return Err(AgendaError::UnsupportedFrequency(format!("{:?}", other))),
        };

        let bound = match (parsed.get_count(), until) {
            (Some(_), Some(_)) => {
                return Err(AgendaError::InvalidRule(
                    "COUNT and UNTIL are mutually exclusive".to_string(),
                ))
            }
            (Some(count), None) => RuleBound::Count(count),
            (None, Some(until)) => RuleBound::Until(until),
            (None, None) => RuleBound::Open,
        };

        let by_day = parsed
            .get_by_weekday()
            .iter()
            .map(|nth| match nth {
                NWeekday::Every(weekday) => ByDay {
                    weekday: *weekday,
                    ordinal: None,
                },
                NWeekday::Nth(n, weekday) => ByDay {
                    weekday: *weekday,
                    ordinal: Some(*n),
                },
            })
            .collect();

        let by_month: Vec<u32> = parsed.get_by_month().iter().map(|m| u32::from(*m)).collect();
        if by_month.iter().any(|m| !(1..=12).contains(m)) {
            return Err(AgendaError::InvalidRule("BYMONTH out of range".to_string()));
        }
        let by_month_day = parsed.get_by_month_day().to_vec();
        if by_month_day.iter().any(|d| *d == 0 || !(-31..=31).contains(d)) {
            return Err(AgendaError::InvalidRule("BYMONTHDAY out of range".to_string()));
        }

        Ok(Self {
            frequency,
            interval: u32::from(parsed.get_interval()).max(1),
            bound,
            by_day,
            by_month_day,
            by_month,
            by_set_pos: parsed.get_by_set_pos().to_vec(),
            week_start: parsed.get_week_start(),
        })
    }
}

impl RecurrenceRule {
    pub fn count(&self) -> Option<u32> {
        match self.bound {
            RuleBound::Count(count) => Some(count),
            _ => None,
        }
    }

    /// First day of the period `index` intervals after the anchor's period.
    pub(crate) fn period_start(&self, anchor: NaiveDate, index: u64) -> Option<NaiveDate> {
        let steps = index.checked_mul(u64::from(self.interval))?;
        match self.frequency {
            Frequency::Daily => anchor.checked_add_days(Days::new(steps)),
            Frequency::Weekly => week_start(anchor, self.week_start)
                .checked_add_days(Days::new(steps.checked_mul(7)?)),
            Frequency::Monthly => first_of_month(anchor)
                .checked_add_months(Months::new(u32::try_from(steps).ok()?)),
            Frequency::Yearly => {
                let year = i64::from(anchor.year()).checked_add(i64::try_from(steps).ok()?)?;
                NaiveDate::from_ymd_opt(i32::try_from(year).ok()?, 1, 1)
            }
        }
    }

    /// Number of whole intervals from the anchor's period to the period that
    /// contains `target` (zero when `target` is not after the anchor).
    pub(crate) fn periods_until(&self, anchor: NaiveDate, target: NaiveDate) -> u64 {
        if target <= anchor {
            return 0;
        }
        let units = match self.frequency {
            Frequency::Daily => (target - anchor).num_days(),
            Frequency::Weekly => {
                (week_start(target, self.week_start) - week_start(anchor, self.week_start))
                    .num_days()
                    / 7
            }
            Frequency::Monthly => {
                let months = |d: NaiveDate| i64::from(d.year()) * 12 + i64::from(d.month0());
                months(target) - months(anchor)
            }
            Frequency::Yearly => i64::from(target.year() - anchor.year()),
        };
        u64::try_from(units / i64::from(self.interval)).unwrap_or(0)
    }

    /// Candidate dates of the period beginning at `start`, ascending, with
    /// BYSETPOS applied. `anchor` supplies the implicit weekday, month and
    /// day when the rule does not name them.
    pub(crate) fn dates_in_period(&self, anchor: NaiveDate, start: NaiveDate) -> Vec<NaiveDate> {
        let mut dates = match self.frequency {
            Frequency::Daily => {
                if self.month_allowed(start.month())
                    && self.month_day_allowed(start)
                    && self.weekday_allowed(start.weekday())
                {
                    vec![start]
                } else {
                    Vec::new()
                }
            }
            Frequency::Weekly => (0..7)
                .filter_map(|offset| start.checked_add_days(Days::new(offset)))
                .filter(|day| {
                    if self.by_day.is_empty() {
                        day.weekday() == anchor.weekday()
                    } else {
                        self.weekday_allowed(day.weekday())
                    }
                })
                .filter(|day| self.month_allowed(day.month()) && self.month_day_allowed(*day))
                .collect(),
            Frequency::Monthly => {
                if self.month_allowed(start.month()) {
                    self.month_candidates(start.year(), start.month(), anchor.day())
                } else {
                    Vec::new()
                }
            }
            Frequency::Yearly => self.year_candidates(start.year(), anchor),
        };

        dates.sort();
        dates.dedup();
        self.apply_set_pos(dates)
    }

    fn year_candidates(&self, year: i32, anchor: NaiveDate) -> Vec<NaiveDate> {
        if !self.by_day.is_empty() && self.by_month.is_empty() && self.by_month_day.is_empty() {
            let (Some(first), Some(last)) = (
                NaiveDate::from_ymd_opt(year, 1, 1),
                NaiveDate::from_ymd_opt(year, 12, 31),
            ) else {
                return Vec::new();
            };
            return self
                .by_day
                .iter()
                .flat_map(|by_day| weekdays_in_range(first, last, *by_day))
                .collect();
        }

        let months: Vec<u32> = if !self.by_month.is_empty() {
            self.by_month.clone()
        } else if !self.by_month_day.is_empty() || !self.by_day.is_empty() {
            (1..=12).collect()
        } else {
            vec![anchor.month()]
        };

        months
            .into_iter()
            .flat_map(|month| self.month_candidates(year, month, anchor.day()))
            .collect()
    }

    fn month_candidates(&self, year: i32, month: u32, anchor_day: u32) -> Vec<NaiveDate> {
        if !self.by_month_day.is_empty() {
            return self
                .by_month_day
                .iter()
                .filter_map(|day| resolve_month_day(year, month, *day))
                .filter(|date| self.weekday_allowed(date.weekday()))
                .collect();
        }

        if !self.by_day.is_empty() {
            let Some(first) = NaiveDate::from_ymd_opt(year, month, 1) else {
                return Vec::new();
            };
            let last = last_of_month(first);
            return self
                .by_day
                .iter()
                .flat_map(|by_day| weekdays_in_range(first, last, *by_day))
                .collect();
        }

        // Implicit day from the anchor; a month without that day is skipped.
        NaiveDate::from_ymd_opt(year, month, anchor_day)
            .into_iter()
            .collect()
    }

    fn apply_set_pos(&self, dates: Vec<NaiveDate>) -> Vec<NaiveDate> {
        if self.by_set_pos.is_empty() || dates.is_empty() {
            return dates;
        }
        let len = dates.len() as i64;
        let mut picked: Vec<NaiveDate> = self
            .by_set_pos
            .iter()
            .filter_map(|pos| {
                let idx = match i64::from(*pos) {
                    p if p > 0 => p - 1,
                    p if p < 0 => len + p,
                    _ => return None,
                };
                usize::try_from(idx).ok().and_then(|i| dates.get(i).copied())
            })
            .collect();
        picked.sort();
        picked.dedup();
        picked
    }

    fn month_allowed(&self, month: u32) -> bool {
        self.by_month.is_empty() || self.by_month.contains(&month)
    }

    fn month_day_allowed(&self, date: NaiveDate) -> bool {
        self.by_month_day.is_empty()
            || self
                .by_month_day
                .iter()
                .any(|day| resolve_month_day(date.year(), date.month(), *day) == Some(date))
    }

    fn weekday_allowed(&self, weekday: Weekday) -> bool {
        self.by_day.is_empty() || self.by_day.iter().any(|d| d.weekday == weekday)
    }
}

/// Start of the week containing `date`, for weeks beginning on `week_start`.
pub(crate) fn week_start(date: NaiveDate, week_start: Weekday) -> NaiveDate {
    let back = (7 + date.weekday().num_days_from_monday() - week_start.num_days_from_monday()) % 7;
    date.checked_sub_days(Days::new(u64::from(back)))
        .unwrap_or(date)
}

fn first_of_month(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

fn last_of_month(first: NaiveDate) -> NaiveDate {
    first
        .checked_add_months(Months::new(1))
        .and_then(|next| next.pred_opt())
        .unwrap_or(first)
}

/// Day `day` of the month (negative counts from the end). `None` when the
/// month is too short: such days are skipped, never clamped.
fn resolve_month_day(year: i32, month: u32, day: i8) -> Option<NaiveDate> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let days_in_month = i32::try_from(last_of_month(first).day()).ok()?;
    let day = match i32::from(day) {
        d if d > 0 => d,
        d if d < 0 => days_in_month + d + 1,
        _ => return None,
    };
    if day < 1 || day > days_in_month {
        return None;
    }
    NaiveDate::from_ymd_opt(year, month, u32::try_from(day).ok()?)
}

/// Dates in `[first, last]` falling on `by_day.weekday`, narrowed to the
/// ordinal when one is given.
fn weekdays_in_range(first: NaiveDate, last: NaiveDate, by_day: ByDay) -> Vec<NaiveDate> {
    let lead = (7 + by_day.weekday.num_days_from_monday() - first.weekday().num_days_from_monday())
        % 7;
    let all: Vec<NaiveDate> = first
        .checked_add_days(Days::new(u64::from(lead)))
        .into_iter()
        .flat_map(|start| start.iter_weeks())
        .take_while(|date| *date <= last)
        .collect();

    match by_day.ordinal {
        None => all,
        Some(n) => {
            let idx = if n > 0 {
                i64::from(n) - 1
            } else {
                all.len() as i64 + i64::from(n)
            };
            usize::try_from(idx)
                .ok()
                .and_then(|i| all.get(i).copied())
                .into_iter()
                .collect()
        }
    }
}
