//! DST transition policies for wall-clock times that a zone skips or repeats.

use serde::{Deserialize, Serialize};

/// Policy for local times that fall inside a spring-forward gap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GapPolicy {
    /// Move the time forward by the length of the gap (02:30 → 03:30).
    #[default]
    ShiftForward,
    /// Drop the instance entirely.
    Skip,
}

/// Policy for local times that occur twice during a fall-back overlap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OverlapPolicy {
    /// The first of the two instants (the pre-transition offset).
    #[default]
    Earlier,
    /// The second of the two instants.
    Later,
}

/// Combined policy applied whenever a local time is mapped to UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DstPolicy {
    pub gap: GapPolicy,
    pub overlap: OverlapPolicy,
}

impl DstPolicy {
    pub fn new(gap: GapPolicy, overlap: OverlapPolicy) -> Self {
        Self { gap, overlap }
    }
}
