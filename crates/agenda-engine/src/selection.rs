//! Selection -- which occurrence is "the meeting that matters now".
//!
//! One function, [`select`], shared by every surface. Given the same pool,
//! hidden set, reference instant and display limit it returns the same
//! [`SelectionResult`], so a server and a client asking at the same instant
//! always agree.
//!
//! Priority: the next upcoming occurrence beats one already running. A
//! running occurrence is only primary when nothing visible is upcoming, and
//! running occurrences that are not primary are dropped from both lists.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::event::Occurrence;
use crate::pool::occurrence_order;

/// Event ids the presentation layer has hidden. Owned by the caller; the
/// engine never stores it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HiddenSet(BTreeSet<String>);

impl HiddenSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, event_id: impl Into<String>) -> bool {
        self.0.insert(event_id.into())
    }

    pub fn contains(&self, event_id: &str) -> bool {
        self.0.contains(event_id)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl<S: Into<String>> FromIterator<S> for HiddenSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

/// Outcome of one selection. A fresh value per call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionResult {
    pub reference: DateTime<Utc>,
    pub primary: Option<Occurrence>,
    /// Upcoming occurrences after the primary, at most `limit` of them.
    pub upcoming: Vec<Occurrence>,
    /// Upcoming occurrences beyond the display limit.
    pub later: Vec<Occurrence>,
}

impl SelectionResult {
    /// Whether the primary had already started at the reference instant.
    pub fn primary_is_running(&self) -> bool {
        self.primary
            .as_ref()
            .is_some_and(|p| p.is_running_at(self.reference))
    }
}

/// Pick the primary occurrence and the ordered upcoming/later lists.
///
/// Occurrences with identical starts are ordered by event id, then by
/// original start.
pub fn select(
    pool: &[Occurrence],
    hidden: &HiddenSet,
    reference: DateTime<Utc>,
    limit: usize,
) -> SelectionResult {
    let mut visible: Vec<&Occurrence> = pool
        .iter()
        .filter(|occ| !hidden.contains(&occ.event_id))
        .collect();
    visible.sort_by(|a, b| occurrence_order(a, b));

    let (upcoming, running): (Vec<&Occurrence>, Vec<&Occurrence>) = visible
        .into_iter()
        .filter(|occ| occ.start > reference || occ.is_running_at(reference))
        .partition(|occ| occ.start > reference);

    let mut upcoming = upcoming.into_iter().cloned();
    let primary = match upcoming.next() {
        Some(next) => Some(next),
        None => running.first().map(|occ| (*occ).clone()),
    };

    let upcoming_list: Vec<Occurrence> = upcoming.by_ref().take(limit).collect();
    let later: Vec<Occurrence> = upcoming.collect();

    tracing::trace!(
        %reference,
        primary = primary.as_ref().map(|p| p.event_id.as_str()),
        upcoming = upcoming_list.len(),
        later = later.len(),
        "selection"
    );

    SelectionResult {
        reference,
        primary,
        upcoming: upcoming_list,
        later,
    }
}
