//! End-to-end: ICS text through normalization, expansion and selection.

use agenda_engine::{
    load_feed, snapshot, snapshot_json, AgendaError, CountdownMode, Diagnostic, EngineOptions,
    HiddenSet, TimezoneDatabase,
};
use chrono::{DateTime, TimeZone, Utc};
use serde_json::json;

const TEAM: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/team.ics"));

fn utc(d: u32, h: u32, m: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, d, h, m, 0).unwrap()
}

/// Tuesday 2024-03-05, 09:00 in New York.
fn reference() -> DateTime<Utc> {
    utc(5, 14, 0)
}

#[test]
fn feed_loads_with_rejections_reported() {
    let db = TimezoneDatabase::compiled();
    let feed = load_feed(TEAM, &db, &EngineOptions::default()).unwrap();

    let ids: Vec<_> = feed.events.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(
        ids,
        vec!["standup@example.com", "review@example.com", "offsite@example.com"]
    );
    let rejected: Vec<_> = feed.errors.iter().map(|e| e.component.as_str()).collect();
    assert_eq!(rejected, vec!["broken@example.com", "todo@example.com"]);
    assert_eq!(feed.events[0].overrides.len(), 1);
}

#[test]
fn snapshot_picks_moved_standup() {
    let db = TimezoneDatabase::compiled();
    let options = EngineOptions::default();
    let feed = load_feed(TEAM, &db, &options).unwrap();

    let response = snapshot(&feed, &HiddenSet::new(), reference(), &db, &options, None);
    let selection = &response.selection;

    let primary = selection.primary.as_ref().unwrap();
    assert_eq!(primary.event_id, "standup@example.com");
    assert_eq!(primary.title, "Daily standup (late)");
    assert_eq!(primary.start, utc(5, 16, 0));
    assert_eq!(primary.original_start, utc(5, 14, 30));
    assert!(primary.overridden);

    // Wednesday is excluded; New York switches to EDT on the 10th.
    let upcoming: Vec<_> = selection.upcoming.iter().map(|o| o.start).collect();
    assert_eq!(
        upcoming,
        vec![utc(7, 14, 30), utc(8, 14, 30), utc(11, 13, 30), utc(12, 13, 30), utc(13, 13, 30)]
    );
    let later: Vec<_> = selection.later.iter().map(|o| o.start).collect();
    assert_eq!(later, vec![utc(14, 13, 30), utc(15, 13, 30), utc(18, 13, 30), utc(19, 13, 30)]);

    let countdown = response.countdown.as_ref().unwrap();
    assert_eq!(countdown.mode, CountdownMode::UntilStart);
    assert_eq!(countdown.remaining_ms, 2 * 3600 * 1000);

    let kinds: Vec<_> = response.diagnostics.iter().map(Diagnostic::kind).collect();
    assert_eq!(kinds, vec!["parse_error", "parse_error"]);
}

#[test]
fn hiding_standup_falls_back_to_running_offsite() {
    let db = TimezoneDatabase::compiled();
    let options = EngineOptions::default();
    let feed = load_feed(TEAM, &db, &options).unwrap();
    let hidden: HiddenSet = ["standup@example.com"].into_iter().collect();

    let response = snapshot(&feed, &hidden, reference(), &db, &options, None);

    let primary = response.selection.primary.as_ref().unwrap();
    assert_eq!(primary.event_id, "offsite@example.com");
    assert!(primary.all_day);
    assert!(response.selection.primary_is_running());
    assert_eq!(response.countdown.unwrap().mode, CountdownMode::UntilEnd);
}

#[test]
fn transparent_events_can_be_filtered() {
    let db = TimezoneDatabase::compiled();
    let options = EngineOptions {
        skip_transparent: true,
        ..EngineOptions::default()
    };
    let feed = load_feed(TEAM, &db, &options).unwrap();
    let hidden: HiddenSet = ["standup@example.com"].into_iter().collect();

    let response = snapshot(&feed, &hidden, reference(), &db, &options, None);

    assert!(response.selection.primary.is_none());
    assert!(response.countdown.is_none());
}

#[test]
fn json_round_trip_for_surfaces() {
    let db = TimezoneDatabase::compiled();
    let request = json!({
        "ics": TEAM,
        "reference": "2024-03-05T14:00:00Z",
        "hidden": ["standup@example.com"],
        "options": { "display_limit": 2 },
    });

    let response = snapshot_json(&request.to_string(), &db).unwrap();
    let value: serde_json::Value = serde_json::from_str(&response).unwrap();

    assert_eq!(value["selection"]["primary"]["event_id"], "offsite@example.com");
    assert_eq!(value["countdown"]["mode"], "until-end");
    assert_eq!(value["diagnostics"][0]["kind"], "parse_error");
    assert_eq!(value["diagnostics"][0]["component"], "broken@example.com");
}

#[test]
fn malformed_request_is_rejected() {
    let db = TimezoneDatabase::compiled();

    let err = snapshot_json("{\"ics\": 42}", &db).unwrap_err();
    assert!(matches!(err, AgendaError::InvalidRequest(_)));
}

#[test]
fn same_inputs_same_snapshot() {
    let db = TimezoneDatabase::compiled();
    let options = EngineOptions::default();
    let feed = load_feed(TEAM, &db, &options).unwrap();

    let first = snapshot(&feed, &HiddenSet::new(), reference(), &db, &options, None);
    let second = snapshot(&feed, &HiddenSet::new(), reference(), &db, &options, None);
    assert_eq!(first, second);
}
