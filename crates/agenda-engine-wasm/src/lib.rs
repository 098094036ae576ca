//! WASM bindings for agenda-engine.
//!
//! Exposes feed snapshots, RRULE expansion, selection and countdown
//! projection to JavaScript via `wasm-bindgen`. All complex types cross the
//! boundary as JSON strings, and every call goes through the same engine
//! functions the CLI uses, so a browser and a server asking at the same
//! reference instant get the same answer.
//!
//! ## Build process
//!
//! ```sh
//! cargo build -p agenda-engine-wasm --target wasm32-unknown-unknown --release
//! wasm-bindgen --target web --out-dir packages/agenda-engine-js/wasm/ \
//!   target/wasm32-unknown-unknown/release/agenda_engine_wasm.wasm
//! ```

use agenda_engine::{
    load_feed, occurrences, project_held, select, CountdownProjection, EngineOptions, HiddenSet,
    Occurrence, TimezoneDatabase, Window,
};
use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use wasm_bindgen::prelude::*;

// ---------------------------------------------------------------------------
// Serde-friendly DTOs for crossing the WASM boundary as JSON
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct InstanceDto {
    start: String,
    end: String,
}

impl From<&Occurrence> for InstanceDto {
    fn from(o: &Occurrence) -> Self {
        Self {
            start: o.start.to_rfc3339(),
            end: o.end.to_rfc3339(),
        }
    }
}

/// A pool as `selectPrimary` accepts it: the bare occurrence array, or the
/// object `expandFeed` returns (its diagnostics are ignored).
#[derive(Deserialize)]
#[serde(untagged)]
enum PoolDto {
    Occurrences(Vec<Occurrence>),
    Expanded { occurrences: Vec<Occurrence> },
}

impl From<PoolDto> for Vec<Occurrence> {
    fn from(pool: PoolDto) -> Self {
        match pool {
            PoolDto::Occurrences(occurrences) | PoolDto::Expanded { occurrences } => occurrences,
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Parse an ISO 8601 datetime string into `DateTime<Utc>`.
///
/// Accepts RFC 3339 (e.g., "2026-02-17T14:00:00Z") and naive datetimes
/// (e.g., "2026-02-17T14:00:00"), which are taken as UTC.
fn parse_datetime(s: &str) -> Result<DateTime<Utc>, JsValue> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S")
        .map(|ndt| ndt.and_utc())
        .map_err(|e| JsValue::from_str(&format!("Invalid datetime '{}': {}", s, e)))
}

fn parse_json<T: serde::de::DeserializeOwned>(what: &str, json: &str) -> Result<T, JsValue> {
    serde_json::from_str(json).map_err(|e| JsValue::from_str(&format!("Invalid {} JSON: {}", what, e)))
}

fn parse_options(json: Option<String>) -> Result<EngineOptions, JsValue> {
    match json.as_deref() {
        Some(json) if !json.trim().is_empty() => parse_json("options", json),
        _ => Ok(EngineOptions::default()),
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<String, JsValue> {
    serde_json::to_string(value)
        .map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
}

// ---------------------------------------------------------------------------
// WASM exports
// ---------------------------------------------------------------------------

/// Compute a full snapshot: selection, countdown and diagnostics.
///
/// `request_json` is an object with `ics`, `reference` (RFC 3339 UTC) and
/// optionally `hidden` (array of event ids), `options` and `previous` (the
/// last countdown shown). Returns the snapshot as a JSON string.
#[wasm_bindgen(js_name = "snapshot")]
pub fn snapshot(request_json: &str) -> Result<String, JsValue> {
    agenda_engine::snapshot_json(request_json, TimezoneDatabase::global())
        .map_err(|e| JsValue::from_str(&e.to_string()))
}

/// Expand every event of an ICS feed over `[window_start, window_end)`.
///
/// Returns `{occurrences, diagnostics}` where `diagnostics` includes rejected
/// components.
#[wasm_bindgen(js_name = "expandFeed")]
pub fn expand_feed(
    ics: &str,
    window_start: &str,
    window_end: &str,
    options_json: Option<String>,
) -> Result<String, JsValue> {
    let options = parse_options(options_json)?;
    let window = Window::new(parse_datetime(window_start)?, parse_datetime(window_end)?);
    let db = TimezoneDatabase::global();

    let feed = load_feed(ics, db, &options).map_err(|e| JsValue::from_str(&e.to_string()))?;
    to_json(&occurrences(&feed, window, db, &options))
}

/// Expand an RRULE string into concrete instances.
///
/// Returns a JSON array of `{start, end}` objects with RFC 3339 strings.
///
/// # Arguments
/// - `rrule` -- RFC 5545 RRULE string (e.g., "FREQ=WEEKLY;BYDAY=TU,TH")
/// - `dtstart` -- Local datetime string (e.g., "2026-02-17T14:00:00")
/// - `duration_minutes` -- Duration of each instance in minutes
/// - `timezone` -- IANA or Windows zone name (e.g., "America/Los_Angeles")
/// - `until` -- Optional end boundary (local datetime string)
/// - `max_count` -- Optional maximum number of instances
#[wasm_bindgen(js_name = "expandRRule")]
pub fn expand_rrule(
    rrule: &str,
    dtstart: &str,
    duration_minutes: u32,
    timezone: &str,
    until: Option<String>,
    max_count: Option<u32>,
) -> Result<String, JsValue> {
    let instances = agenda_engine::expand_rrule(
        rrule,
        dtstart,
        duration_minutes,
        timezone,
        until.as_deref(),
        max_count,
    )
    .map_err(|e| JsValue::from_str(&e.to_string()))?;

    let dtos: Vec<InstanceDto> = instances.iter().map(InstanceDto::from).collect();
    to_json(&dtos)
}

/// Run selection over an already expanded pool.
///
/// `pool_json` is either the output of `expandFeed` or just its
/// `occurrences` array; `hidden_json` an array of event ids.
#[wasm_bindgen(js_name = "selectPrimary")]
pub fn select_primary(
    pool_json: &str,
    hidden_json: &str,
    reference: &str,
    limit: u32,
) -> Result<String, JsValue> {
    let pool: Vec<Occurrence> = parse_json::<PoolDto>("pool", pool_json)?.into();
    let hidden: HiddenSet = parse_json("hidden", hidden_json)?;
    let reference = parse_datetime(reference)?;

    to_json(&select(&pool, &hidden, reference, limit as usize))
}

/// Project the countdown for `primary_json` at `reference`.
///
/// Pass the previously displayed projection as `previous_json` to have
/// small upward resync corrections held back.
#[wasm_bindgen(js_name = "projectCountdown")]
pub fn project_countdown(
    primary_json: &str,
    reference: &str,
    previous_json: Option<String>,
    tolerance_seconds: Option<u32>,
) -> Result<String, JsValue> {
    let primary: Occurrence = parse_json("occurrence", primary_json)?;
    let reference = parse_datetime(reference)?;
    let previous: Option<CountdownProjection> = previous_json
        .as_deref()
        .map(|json| parse_json("countdown", json))
        .transpose()?;
    let tolerance = Duration::seconds(i64::from(
        tolerance_seconds.unwrap_or(EngineOptions::default().jitter_tolerance_seconds),
    ));

    to_json(&project_held(&primary, reference, previous.as_ref(), tolerance))
}
