//! Selection engine: priority, hidden events, lists and tie-breaks.

use agenda_engine::{select, HiddenSet, Occurrence, Transparency};
use chrono::{DateTime, TimeZone, Utc};

fn at(h: u32, m: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 4, h, m, 0).unwrap()
}

fn occ(id: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> Occurrence {
    Occurrence {
        event_id: id.to_string(),
        original_start: start,
        start,
        end,
        title: id.to_uppercase(),
        location: None,
        all_day: false,
        transparency: Transparency::Opaque,
        overridden: false,
    }
}

fn ids(list: &[Occurrence]) -> Vec<&str> {
    list.iter().map(|o| o.event_id.as_str()).collect()
}

// ── Priority ────────────────────────────────────────────────────────────────

#[test]
fn upcoming_beats_running() {
    let pool = vec![occ("running", at(8, 0), at(10, 0)), occ("next", at(11, 0), at(12, 0))];

    let result = select(&pool, &HiddenSet::new(), at(9, 0), 5);

    assert_eq!(result.primary.as_ref().map(|p| p.event_id.as_str()), Some("next"));
    assert!(!result.primary_is_running());
    // The running meeting is in neither list.
    assert!(result.upcoming.is_empty());
    assert!(result.later.is_empty());
    assert_eq!(result.reference, at(9, 0));
}

#[test]
fn hidden_upcoming_falls_back_to_running() {
    let pool = vec![occ("running", at(8, 0), at(10, 0)), occ("next", at(11, 0), at(12, 0))];
    let hidden: HiddenSet = ["next"].into_iter().collect();

    let result = select(&pool, &hidden, at(9, 0), 5);

    assert_eq!(result.primary.as_ref().map(|p| p.event_id.as_str()), Some("running"));
    assert!(result.primary_is_running());
}

#[test]
fn earliest_running_wins_when_nothing_upcoming() {
    let pool = vec![occ("late", at(8, 30), at(10, 0)), occ("early", at(8, 0), at(12, 0))];

    let result = select(&pool, &HiddenSet::new(), at(9, 0), 5);

    assert_eq!(result.primary.map(|p| p.event_id), Some("early".to_string()));
    assert!(result.upcoming.is_empty());
}

#[test]
fn nothing_to_show() {
    let pool = vec![occ("past", at(7, 0), at(8, 0))];

    let result = select(&pool, &HiddenSet::new(), at(9, 0), 5);

    assert!(result.primary.is_none());
    assert!(result.upcoming.is_empty());
    assert!(result.later.is_empty());
}

#[test]
fn boundaries_are_exact() {
    // Starting exactly now is running, not upcoming; ending exactly now is over.
    let pool = vec![occ("starts-now", at(9, 0), at(10, 0)), occ("ends-now", at(8, 0), at(9, 0))];

    let result = select(&pool, &HiddenSet::new(), at(9, 0), 5);

    assert_eq!(
        result.primary.map(|p| p.event_id),
        Some("starts-now".to_string())
    );
}

// ── Lists ───────────────────────────────────────────────────────────────────

#[test]
fn upcoming_truncated_rest_goes_to_later() {
    let pool: Vec<_> = (10..16)
        .rev()
        .map(|h| occ(&format!("m{}", h), at(h, 0), at(h, 30)))
        .collect();

    let result = select(&pool, &HiddenSet::new(), at(9, 0), 2);

    assert_eq!(result.primary.as_ref().unwrap().event_id, "m10");
    assert_eq!(ids(&result.upcoming), vec!["m11", "m12"]);
    assert_eq!(ids(&result.later), vec!["m13", "m14", "m15"]);
}

#[test]
fn zero_limit_puts_everything_in_later() {
    let pool = vec![occ("a", at(10, 0), at(11, 0)), occ("b", at(12, 0), at(13, 0))];

    let result = select(&pool, &HiddenSet::new(), at(9, 0), 0);

    assert_eq!(result.primary.unwrap().event_id, "a");
    assert!(result.upcoming.is_empty());
    assert_eq!(ids(&result.later), vec!["b"]);
}

#[test]
fn hidden_events_excluded_everywhere() {
    let pool = vec![
        occ("a", at(10, 0), at(11, 0)),
        occ("secret", at(10, 30), at(11, 0)),
        occ("b", at(12, 0), at(13, 0)),
    ];
    let hidden: HiddenSet = ["secret"].into_iter().collect();

    let result = select(&pool, &hidden, at(9, 0), 5);

    assert_eq!(ids(&result.upcoming), vec!["b"]);
}

// ── Tie-breaks and determinism ──────────────────────────────────────────────

#[test]
fn identical_starts_order_by_event_id() {
    let pool = vec![
        occ("zulu", at(10, 0), at(11, 0)),
        occ("alpha", at(10, 0), at(10, 30)),
        occ("mike", at(10, 0), at(12, 0)),
    ];

    let result = select(&pool, &HiddenSet::new(), at(9, 0), 5);

    assert_eq!(result.primary.as_ref().unwrap().event_id, "alpha");
    assert_eq!(ids(&result.upcoming), vec!["mike", "zulu"]);
}

#[test]
fn input_order_does_not_matter() {
    let mut pool = vec![
        occ("b", at(10, 0), at(11, 0)),
        occ("a", at(10, 0), at(11, 0)),
        occ("c", at(9, 30), at(10, 0)),
        occ("d", at(13, 0), at(14, 0)),
    ];
    let first = select(&pool, &HiddenSet::new(), at(9, 0), 1);
    pool.reverse();
    let second = select(&pool, &HiddenSet::new(), at(9, 0), 1);

    assert_eq!(first, second);
    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
}

#[test]
fn result_serializes_for_surfaces() {
    let pool = vec![occ("a", at(10, 0), at(11, 0))];
    let result = select(&pool, &HiddenSet::new(), at(9, 0), 5);

    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["primary"]["event_id"], "a");
    assert_eq!(json["reference"], "2024-03-04T09:00:00Z");
    assert!(json["upcoming"].as_array().unwrap().is_empty());
}
