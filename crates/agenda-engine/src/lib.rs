//! # agenda-engine
//!
//! DST-correct recurrence expansion and deterministic "next meeting"
//! selection for iCalendar feeds.
//!
//! The engine turns ICS text into canonical events, expands recurring events
//! into concrete occurrences inside a query window, and picks the single
//! occurrence a display or voice surface should present right now. Every
//! function is pure over its inputs: the reference instant is always passed
//! in, and nothing reads the system clock.
//!
//! ## Modules
//!
//! - [`timezone`] — zone ids to offset data; local wall-clock times to UTC
//! - [`dst`] — policies for skipped and repeated local times
//! - [`rule`] — RRULE text into a typed [`RecurrenceRule`]
//! - [`expander`] — lazy occurrence generation for one event and window
//! - [`pool`] — all events of a feed merged into one ordered pool
//! - [`normalize`] — raw components into [`CalendarEvent`]s
//! - [`ics`] — ICS text into raw components
//! - [`selection`] — primary / upcoming / later selection
//! - [`countdown`] — remaining-time projection for the primary
//! - [`pipeline`] — feed → snapshot, shared by the CLI and WebAssembly surfaces
//! - [`options`] — engine configuration
//! - [`diagnostic`] — structured, recoverable conditions
//! - [`error`] — Error types

pub mod countdown;
pub mod diagnostic;
pub mod dst;
pub mod error;
pub mod event;
pub mod expander;
pub mod ics;
pub mod normalize;
pub mod options;
pub mod pipeline;
pub mod pool;
pub mod rule;
pub mod selection;
pub mod timezone;
pub mod value;

pub use countdown::{project, project_held, CountdownMode, CountdownProjection, MonotonicAnchor};
pub use diagnostic::{Diagnostic, Severity};
pub use dst::{DstPolicy, GapPolicy, OverlapPolicy};
pub use error::{AgendaError, ParseError};
pub use event::{
    CalendarEvent, EventKind, EventStatus, Occurrence, OccurrenceOverride, Transparency, Window,
};
pub use expander::{expand, expand_rrule, generate, ExpandOptions, Expansion, OccurrenceIter};
pub use normalize::{normalize, normalize_feed, NormalizedFeed, RawComponent, RawProperty};
pub use options::EngineOptions;
pub use pipeline::{
    load_feed, occurrences, snapshot, snapshot_json, SnapshotRequest, SnapshotResponse,
};
pub use pool::{build_pool, OccurrencePool, PoolFilter};
pub use rule::{ByDay, Frequency, RecurrenceRule, RuleBound};
pub use selection::{select, HiddenSet, SelectionResult};
pub use timezone::{LocalResolution, TimezoneDatabase, TransitionTable, Zone};
