//! Parsing of iCalendar DATE, DATE-TIME and TEXT values.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

use crate::error::{AgendaError, Result};

/// A DATE or DATE-TIME value before any zone is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IcalTime {
    /// `20240101T090000Z`
    Utc(DateTime<Utc>),
    /// `20240101T090000`, interpreted in the property's TZID or the default zone.
    Floating(NaiveDateTime),
    /// `20240101`
    Date(NaiveDate),
}

impl IcalTime {
    /// Parse a single value. `date_only` forces DATE parsing (`VALUE=DATE`).
    pub fn parse(value: &str, date_only: bool) -> Result<Self> {
        let value = value.trim();
        if date_only || (value.len() == 8 && value.bytes().all(|b| b.is_ascii_digit())) {
            return NaiveDate::parse_from_str(value, "%Y%m%d")
                .map(Self::Date)
                .map_err(|e| AgendaError::InvalidDatetime(format!("'{}': {}", value, e)));
        }

        if let Some(utc) = value.strip_suffix('Z').or_else(|| value.strip_suffix('z')) {
            return NaiveDateTime::parse_from_str(utc, "%Y%m%dT%H%M%S")
                .map(|naive| Self::Utc(naive.and_utc()))
                .map_err(|e| AgendaError::InvalidDatetime(format!("'{}': {}", value, e)));
        }

        NaiveDateTime::parse_from_str(value, "%Y%m%dT%H%M%S")
            .map(Self::Floating)
            .map_err(|e| AgendaError::InvalidDatetime(format!("'{}': {}", value, e)))
    }

    /// Parse a comma-separated list such as an EXDATE value.
    pub fn parse_list(value: &str, date_only: bool) -> Result<Vec<Self>> {
        value
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            // RDATE;VALUE=PERIOD entries are `start/end`; only the start matters here.
            .map(|part| Self::parse(part.split('/').next().unwrap_or(part), date_only))
            .collect()
    }

    pub fn is_date(&self) -> bool {
        matches!(self, Self::Date(_))
    }
}

/// Undo RFC 5545 TEXT escaping.
pub fn unescape_text(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') | Some('N') => out.push('\n'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}
