//! Engine configuration shared by every surface.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::dst::DstPolicy;
use crate::event::Window;
use crate::expander::{ExpandOptions, DEFAULT_MAX_ITERATIONS};
use crate::pool::PoolFilter;

/// Tunables for normalization, expansion, selection and countdown.
///
/// Every field has a default, so a partial TOML or JSON document is enough:
///
/// ```toml
/// default_timezone = "Europe/Berlin"
/// display_limit = 3
///
/// [dst]
/// gap = "skip"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineOptions {
    /// Zone for floating times and zone-less all-day dates.
    pub default_timezone: String,
    /// Recurrence periods examined per event before `RecurrenceOverflow`.
    pub max_iterations: usize,
    /// Length of the `upcoming` list.
    pub display_limit: usize,
    /// How far before the reference instant the pool window opens, so that
    /// long-running occurrences are still seen.
    pub lookbehind_hours: u32,
    /// How far after the reference instant the pool window closes.
    pub horizon_days: u32,
    pub dst: DstPolicy,
    pub skip_all_day: bool,
    pub skip_transparent: bool,
    /// Countdown resyncs that would raise the remaining time by less than
    /// this are ignored.
    pub jitter_tolerance_seconds: u32,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            default_timezone: "UTC".to_string(),
            max_iterations: DEFAULT_MAX_ITERATIONS,
            display_limit: 5,
            lookbehind_hours: 24,
            horizon_days: 14,
            dst: DstPolicy::default(),
            skip_all_day: false,
            skip_transparent: false,
            jitter_tolerance_seconds: 2,
        }
    }
}

impl EngineOptions {
    pub fn expand_options(&self) -> ExpandOptions {
        ExpandOptions::default()
            .with_policy(self.dst)
            .with_max_iterations(self.max_iterations)
    }

    pub fn pool_filter(&self) -> PoolFilter {
        PoolFilter {
            skip_all_day: self.skip_all_day,
            skip_transparent: self.skip_transparent,
        }
    }

    /// The pool window for a selection at `reference`.
    pub fn window_around(&self, reference: DateTime<Utc>) -> Window {
        let start = reference
            .checked_sub_signed(Duration::hours(i64::from(self.lookbehind_hours)))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        let end = reference
            .checked_add_signed(Duration::days(i64::from(self.horizon_days)))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        Window::new(start, end)
    }

    pub fn jitter_tolerance(&self) -> Duration {
        Duration::seconds(i64::from(self.jitter_tolerance_seconds))
    }
}
