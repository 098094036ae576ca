//! Structured, recoverable conditions reported alongside results.
//!
//! The core never prints. Anything worth telling an operator about (a DST
//! adjustment, a zone that fell back to UTC, a rule that blew through the
//! iteration ceiling) is returned as a [`Diagnostic`] value and left to the
//! caller to log or display.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Serialize;

use crate::error::{AgendaError, ParseError};

/// How loud a diagnostic should be when a surface decides to log it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    /// A wall-clock time occurred twice (fall-back); `chosen` was used.
    AmbiguousLocalTime {
        zone: String,
        local: NaiveDateTime,
        chosen: DateTime<Utc>,
        alternative: DateTime<Utc>,
    },
    /// A wall-clock time was skipped (spring-forward). `resolved` is `None`
    /// when the policy dropped the instance instead of shifting it.
    NonexistentLocalTime {
        zone: String,
        local: NaiveDateTime,
        gap_seconds: i64,
        resolved: Option<DateTime<Utc>>,
    },
    /// A TZID that the database does not know; UTC was used instead.
    UnknownTimezone { component: String, zone: String },
    /// Expansion of one event was abandoned at the iteration ceiling.
    RecurrenceOverflow { event_id: String, limit: usize },
    /// A component was rejected by the normalizer.
    ParseError { component: String, reason: String },
}

impl Diagnostic {
    pub fn severity(&self) -> Severity {
        match self {
            Self::AmbiguousLocalTime { .. } | Self::NonexistentLocalTime { .. } => {
                Severity::Warning
            }
            Self::UnknownTimezone { .. } => Severity::Warning,
            Self::RecurrenceOverflow { .. } | Self::ParseError { .. } => Severity::Error,
        }
    }

    /// Short machine-friendly tag, matching the serialized `kind` field.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::AmbiguousLocalTime { .. } => "ambiguous_local_time",
            Self::NonexistentLocalTime { .. } => "nonexistent_local_time",
            Self::UnknownTimezone { .. } => "unknown_timezone",
            Self::RecurrenceOverflow { .. } => "recurrence_overflow",
            Self::ParseError { .. } => "parse_error",
        }
    }
}

impl From<ParseError> for Diagnostic {
    fn from(err: ParseError) -> Self {
        Self::ParseError {
            component: err.component,
            reason: err.reason,
        }
    }
}

impl From<&ParseError> for Diagnostic {
    fn from(err: &ParseError) -> Self {
        err.clone().into()
    }
}

impl Diagnostic {
    /// Lift a per-event expansion failure into a diagnostic, if it is one of
    /// the recoverable kinds.
    pub fn from_error(err: &AgendaError) -> Option<Self> {
        match err {
            AgendaError::RecurrenceOverflow { event_id, limit } => {
                Some(Self::RecurrenceOverflow {
                    event_id: event_id.clone(),
                    limit: *limit,
                })
            }
            AgendaError::Parse(parse) => Some(parse.into()),
            _ => None,
        }
    }
}
