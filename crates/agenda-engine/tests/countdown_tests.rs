//! Countdown projection, jitter holding and monotonic anchoring.

use std::time::Duration as StdDuration;

use agenda_engine::{
    project, project_held, CountdownMode, MonotonicAnchor, Occurrence, Transparency,
};
use chrono::{DateTime, Duration, TimeZone, Utc};

fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 4, h, m, s).unwrap()
}

fn meeting(id: &str) -> Occurrence {
    Occurrence {
        event_id: id.to_string(),
        original_start: at(10, 0, 0),
        start: at(10, 0, 0),
        end: at(11, 0, 0),
        title: "Planning".to_string(),
        location: None,
        all_day: false,
        transparency: Transparency::Opaque,
        overridden: false,
    }
}

// ── Projection ──────────────────────────────────────────────────────────────

#[test]
fn counts_down_to_start_before_it_begins() {
    let projection = project(&meeting("a"), at(9, 45, 0));

    assert_eq!(projection.mode, CountdownMode::UntilStart);
    assert_eq!(projection.target, at(10, 0, 0));
    assert_eq!(projection.remaining(), Duration::minutes(15));
    assert!(!projection.is_expired());
}

#[test]
fn counts_down_to_end_once_running() {
    let projection = project(&meeting("a"), at(10, 20, 0));

    assert_eq!(projection.mode, CountdownMode::UntilEnd);
    assert_eq!(projection.target, at(11, 0, 0));
    assert_eq!(projection.remaining_ms, 40 * 60 * 1000);
}

#[test]
fn start_instant_switches_to_end() {
    let projection = project(&meeting("a"), at(10, 0, 0));
    assert_eq!(projection.mode, CountdownMode::UntilEnd);
}

#[test]
fn never_clamps_past_the_target() {
    let projection = project(&meeting("a"), at(11, 0, 5));

    assert_eq!(projection.remaining_ms, -5000);
    assert!(projection.is_expired());
}

#[test]
fn expired_exactly_at_target() {
    assert!(project(&meeting("a"), at(11, 0, 0)).is_expired());
}

#[test]
fn mode_serializes_kebab_case() {
    let json = serde_json::to_value(project(&meeting("a"), at(9, 0, 0))).unwrap();
    assert_eq!(json["mode"], "until-start");
    assert_eq!(json["remaining_ms"], 3_600_000);
}

// ── Jitter holding ──────────────────────────────────────────────────────────

#[test]
fn small_upward_correction_is_held() {
    let previous = project(&meeting("a"), at(9, 50, 0));
    // A resync that lands one second behind the last shown value.
    let held = project_held(&meeting("a"), at(9, 49, 59), Some(&previous), Duration::seconds(2));

    assert_eq!(held, previous);
}

#[test]
fn large_upward_correction_is_applied() {
    let previous = project(&meeting("a"), at(9, 50, 0));
    let fresh = project_held(&meeting("a"), at(9, 49, 0), Some(&previous), Duration::seconds(2));

    assert_eq!(fresh.remaining(), Duration::minutes(11));
}

#[test]
fn downward_progress_is_always_applied() {
    let previous = project(&meeting("a"), at(9, 50, 0));
    let next = project_held(&meeting("a"), at(9, 50, 1), Some(&previous), Duration::seconds(2));

    assert_eq!(next.remaining(), Duration::minutes(10) - Duration::seconds(1));
}

#[test]
fn different_event_is_never_held() {
    let previous = project(&meeting("a"), at(9, 50, 0));
    let next = project_held(&meeting("b"), at(9, 49, 59), Some(&previous), Duration::seconds(2));

    assert_eq!(next.event_id, "b");
}

// ── Monotonic anchor ────────────────────────────────────────────────────────

#[test]
fn reference_advances_with_monotonic_clock() {
    let anchor = MonotonicAnchor::new(at(9, 0, 0), StdDuration::from_secs(1_000));

    assert_eq!(anchor.reference_at(StdDuration::from_secs(1_090)), at(9, 1, 30));
    assert_eq!(anchor.synced(), at(9, 0, 0));
}

#[test]
fn earlier_reading_maps_to_anchor() {
    let anchor = MonotonicAnchor::new(at(9, 0, 0), StdDuration::from_secs(1_000));
    assert_eq!(anchor.reference_at(StdDuration::from_secs(10)), at(9, 0, 0));
}
