//! Error types for agenda-engine operations.

use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AgendaError {
    #[error("Invalid RRULE: {0}")]
    InvalidRule(String),

    #[error("Unsupported recurrence frequency: {0}")]
    UnsupportedFrequency(String),

    #[error("Invalid timezone: {0}")]
    InvalidTimezone(String),

    #[error("Invalid datetime: {0}")]
    InvalidDatetime(String),

    /// The rule kept producing candidates past the iteration ceiling.
    #[error("Recurrence of event '{event_id}' exceeded {limit} iterations")]
    RecurrenceOverflow { event_id: String, limit: usize },

    /// The feed as a whole could not be read (not a single bad component).
    #[error("Calendar feed error: {0}")]
    Feed(String),

    /// A JSON request from a surface could not be decoded.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// A single calendar component that was rejected during normalization.
///
/// `component` is the UID when one is present, otherwise a positional
/// identifier such as `VEVENT#3`.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[error("Component '{component}' rejected: {reason}")]
pub struct ParseError {
    pub component: String,
    pub reason: String,
}

impl ParseError {
    pub fn new(component: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, AgendaError>;
