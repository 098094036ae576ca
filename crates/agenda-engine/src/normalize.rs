//! Event normalization -- raw calendar components into [`CalendarEvent`]s.
//!
//! Input is the flat property list of one component, as produced by the ICS
//! reader or built by hand. Every wall-clock value is anchored to UTC here,
//! through the declared TZID or the configured default zone, so nothing
//! downstream has to deal with floating times.
//!
//! Failures are per component: a [`ParseError`] names the UID (or a
//! positional `VEVENT#n` label) and the rest of the feed is still normalized.

use std::collections::HashMap;

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, Utc};

use crate::diagnostic::Diagnostic;
use crate::error::ParseError;
use crate::event::{
    CalendarEvent, EventKind, EventStatus, OccurrenceOverride, Transparency,
};
use crate::options::EngineOptions;
use crate::rule::RecurrenceRule;
use crate::timezone::{TimezoneDatabase, Zone};
use crate::value::{unescape_text, IcalTime};

/// One content line: `NAME;PARAM=VALUE:value`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawProperty {
    pub name: String,
    pub params: Vec<(String, String)>,
    pub value: String,
}

impl RawProperty {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into().to_ascii_uppercase(),
            params: Vec::new(),
            value: value.into(),
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((key.into().to_ascii_uppercase(), value.into()));
        self
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    fn is_date(&self) -> bool {
        self.param("VALUE")
            .is_some_and(|v| v.eq_ignore_ascii_case("DATE"))
    }
}

/// A calendar component (VEVENT, VTODO, ...) with its properties in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawComponent {
    pub name: String,
    pub properties: Vec<RawProperty>,
}

impl RawComponent {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into().to_ascii_uppercase(),
            properties: Vec::new(),
        }
    }

    pub fn vevent() -> Self {
        Self::new("VEVENT")
    }

    pub fn with(mut self, property: RawProperty) -> Self {
        self.properties.push(property);
        self
    }

    /// Shorthand for a parameterless property.
    pub fn prop(self, name: &str, value: &str) -> Self {
        self.with(RawProperty::new(name, value))
    }

    pub fn property(&self, name: &str) -> Option<&RawProperty> {
        self.properties
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
    }

    pub fn properties_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a RawProperty> {
        self.properties
            .iter()
            .filter(move |p| p.name.eq_ignore_ascii_case(name))
    }

    pub fn uid(&self) -> Option<&str> {
        self.property("UID")
            .map(|p| p.value.trim())
            .filter(|uid| !uid.is_empty())
    }
}

/// A successfully normalized component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedComponent {
    pub event: CalendarEvent,
    /// Set when the component overrides one instance of a recurring master.
    pub recurrence_id: Option<DateTime<Utc>>,
    pub diagnostics: Vec<Diagnostic>,
}

/// The result of normalizing a whole feed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizedFeed {
    pub events: Vec<CalendarEvent>,
    pub errors: Vec<ParseError>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Normalize a single component.
///
/// Errors and diagnostics name the component by its UID. Without one, a
/// lone component is labelled by its name (`VEVENT`); only
/// [`normalize_feed`] knows its position and uses `VEVENT#n`.
///
/// # Errors
/// Returns a [`ParseError`] for unsupported component types, a missing or
/// malformed DTSTART, an unparseable RRULE, or an end before the start.
pub fn normalize(
    raw: &RawComponent,
    db: &TimezoneDatabase,
    options: &EngineOptions,
) -> Result<NormalizedComponent, ParseError> {
    let label = raw.uid().unwrap_or(&raw.name).to_string();
    Normalizer::new(db, options, label).run(raw)
}

/// Normalize every component of a feed, attaching RECURRENCE-ID overrides
/// to their masters.
///
/// Duplicate UIDs keep the master with the highest SEQUENCE (the later one
/// on a tie). An override whose master is missing is kept as a standalone
/// event.
pub fn normalize_feed(
    components: &[RawComponent],
    db: &TimezoneDatabase,
    options: &EngineOptions,
) -> NormalizedFeed {
    let mut feed = NormalizedFeed::default();
    let mut masters: Vec<CalendarEvent> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut overrides: Vec<(DateTime<Utc>, CalendarEvent)> = Vec::new();

    for (n, raw) in components.iter().enumerate() {
        let label = match raw.uid() {
            Some(uid) => uid.to_string(),
            None => format!("{}#{}", raw.name, n + 1),
        };
        let normalized = match Normalizer::new(db, options, label).run(raw) {
            Ok(normalized) => normalized,
            Err(err) => {
                tracing::debug!(component = %err.component, reason = %err.reason, "component rejected");
                feed.errors.push(err);
                continue;
            }
        };
        feed.diagnostics.extend(normalized.diagnostics);

        let event = normalized.event;
        if let Some(recurrence_id) = normalized.recurrence_id {
            overrides.push((recurrence_id, event));
            continue;
        }
        match index.get(&event.id) {
            Some(&i) if masters[i].sequence > event.sequence => {
                tracing::debug!(uid = %event.id, "older duplicate ignored");
            }
            Some(&i) => masters[i] = event,
            None => {
                index.insert(event.id.clone(), masters.len());
                masters.push(event);
            }
        }
    }

    for (recurrence_id, instance) in overrides {
        match index.get(&instance.id) {
            // A later override for the same instance replaces an earlier one.
            Some(&i) => {
                masters[i]
                    .overrides
                    .insert(recurrence_id, override_from(&instance, db, options));
            }
            None => {
                tracing::debug!(uid = %instance.id, "orphan override kept as a single event");
                index.insert(instance.id.clone(), masters.len());
                masters.push(instance);
            }
        }
    }

    feed.events = masters;
    feed
}

fn override_from(
    instance: &CalendarEvent,
    db: &TimezoneDatabase,
    options: &EngineOptions,
) -> OccurrenceOverride {
    let end = match instance.kind {
        EventKind::Timed { duration } => instance.start + duration,
        EventKind::AllDay { days } => db
            .lookup(&instance.zone_id)
            .unwrap_or(Zone::Utc)
            .midnight_after(instance.start, days, options.dst)
            .instant
            .unwrap_or(instance.start + Duration::days(i64::from(days))),
    };
    OccurrenceOverride {
        start: Some(instance.start),
        end: Some(end),
        title: Some(instance.title.clone()),
        location: instance.location.clone(),
        cancelled: instance.status == EventStatus::Cancelled,
    }
}

/// Per-component state: the label for errors and the diagnostics gathered.
struct Normalizer<'a> {
    db: &'a TimezoneDatabase,
    options: &'a EngineOptions,
    label: String,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> Normalizer<'a> {
    fn new(db: &'a TimezoneDatabase, options: &'a EngineOptions, label: String) -> Self {
        Self {
            db,
            options,
            label,
            diagnostics: Vec::new(),
        }
    }

    fn error(&self, reason: impl Into<String>) -> ParseError {
        ParseError::new(self.label.clone(), reason)
    }

    fn run(mut self, raw: &RawComponent) -> Result<NormalizedComponent, ParseError> {
        if raw.name != "VEVENT" {
            return Err(self.error(format!("unsupported component {}", raw.name)));
        }

        let dtstart = raw
            .property("DTSTART")
            .ok_or_else(|| self.error("missing DTSTART"))?;
        let start_value = self.value(dtstart)?;
        let zone = match start_value {
            IcalTime::Utc(_) if dtstart.param("TZID").is_none() => Zone::Utc,
            _ => self.zone_for(dtstart),
        };
        let start = self.instant(&zone, start_value)?;

        let kind = match start_value {
            IcalTime::Date(date) => EventKind::AllDay {
                days: self.all_day_length(raw, date)?,
            },
            _ => EventKind::Timed {
                duration: self.timed_length(raw, start)?,
            },
        };

        let rule = raw
            .property("RRULE")
            .map(|p| p.value.parse::<RecurrenceRule>())
            .transpose()
            .map_err(|e| self.error(e.to_string()))?;

        let mut event = CalendarEvent {
            id: self.label.clone(),
            title: raw
                .property("SUMMARY")
                .map(|p| unescape_text(&p.value))
                .unwrap_or_default(),
            location: raw
                .property("LOCATION")
                .map(|p| unescape_text(&p.value))
                .filter(|l| !l.trim().is_empty()),
            zone_id: zone.id().to_string(),
            start,
            kind,
            status: match raw.property("STATUS").map(|p| p.value.trim().to_ascii_uppercase()) {
                Some(s) if s == "CANCELLED" => EventStatus::Cancelled,
                Some(s) if s == "TENTATIVE" => EventStatus::Tentative,
                _ => EventStatus::Confirmed,
            },
            transparency: match raw.property("TRANSP") {
                Some(p) if p.value.trim().eq_ignore_ascii_case("TRANSPARENT") => {
                    Transparency::Transparent
                }
                _ => Transparency::Opaque,
            },
            rule,
            rdates: Vec::new(),
            exdates: Default::default(),
            exdate_dates: Default::default(),
            overrides: Default::default(),
            sequence: raw
                .property("SEQUENCE")
                .and_then(|p| p.value.trim().parse().ok())
                .unwrap_or(0),
        };

        for prop in raw.properties_named("RDATE") {
            let prop_zone = self.zone_for_or(prop, &zone);
            for value in self.values(prop)? {
                event.rdates.push(self.instant(&prop_zone, value)?);
            }
        }
        for prop in raw.properties_named("EXDATE") {
            let prop_zone = self.zone_for_or(prop, &zone);
            for value in self.values(prop)? {
                match value {
                    IcalTime::Date(date) => {
                        event.exdate_dates.insert(date);
                    }
                    other => {
                        event.exdates.insert(self.instant(&prop_zone, other)?);
                    }
                }
            }
        }

        let recurrence_id = match raw.property("RECURRENCE-ID") {
            Some(prop) => {
                let prop_zone = self.zone_for_or(prop, &zone);
                let value = self.value(prop)?;
                Some(self.instant(&prop_zone, value)?)
            }
            None => None,
        };

        Ok(NormalizedComponent {
            event,
            recurrence_id,
            diagnostics: self.diagnostics,
        })
    }

    fn value(&self, prop: &RawProperty) -> Result<IcalTime, ParseError> {
        IcalTime::parse(&prop.value, prop.is_date())
            .map_err(|e| self.error(format!("{}: {}", prop.name, e)))
    }

    fn values(&self, prop: &RawProperty) -> Result<Vec<IcalTime>, ParseError> {
        IcalTime::parse_list(&prop.value, prop.is_date())
            .map_err(|e| self.error(format!("{}: {}", prop.name, e)))
    }

    /// The zone named by the property's TZID, else the default zone.
    /// Unknown ids fall back to UTC with a diagnostic.
    fn zone_for(&mut self, prop: &RawProperty) -> Zone {
        let id = prop
            .param("TZID")
            .unwrap_or(self.options.default_timezone.as_str())
            .to_string();
        self.lookup(&id)
    }

    /// Like [`Self::zone_for`], but inheriting `fallback` when there is no TZID.
    fn zone_for_or(&mut self, prop: &RawProperty, fallback: &Zone) -> Zone {
        match prop.param("TZID") {
            Some(id) => {
                let id = id.to_string();
                self.lookup(&id)
            }
            None => fallback.clone(),
        }
    }

    fn lookup(&mut self, id: &str) -> Zone {
        self.db.lookup(id).unwrap_or_else(|| {
            tracing::debug!(component = %self.label, zone = id, "unknown timezone, using UTC");
            self.diagnostics.push(Diagnostic::UnknownTimezone {
                component: self.label.clone(),
                zone: id.to_string(),
            });
            Zone::Utc
        })
    }

    /// Anchor a value to UTC. Dates become local midnight.
    fn instant(&mut self, zone: &Zone, value: IcalTime) -> Result<DateTime<Utc>, ParseError> {
        let local = match value {
            IcalTime::Utc(utc) => return Ok(utc),
            IcalTime::Floating(local) => local,
            IcalTime::Date(date) => date.and_time(NaiveTime::MIN),
        };
        self.resolve(zone, local)
    }

    fn resolve(&mut self, zone: &Zone, local: NaiveDateTime) -> Result<DateTime<Utc>, ParseError> {
        let resolved = zone.resolve(local).apply(zone.id(), local, self.options.dst);
        if let Some(diagnostic) = resolved.diagnostic {
            self.diagnostics.push(diagnostic);
        }
        resolved
            .instant
            .ok_or_else(|| self.error(format!("{} does not exist in {}", local, zone.id())))
    }

    fn timed_length(&mut self, raw: &RawComponent, start: DateTime<Utc>) -> Result<Duration, ParseError> {
        match (raw.property("DTEND"), raw.property("DURATION")) {
            (Some(_), Some(_)) => Err(self.error("both DTEND and DURATION present")),
            (Some(dtend), None) => {
                let value = self.value(dtend)?;
                let zone = match value {
                    IcalTime::Utc(_) => Zone::Utc,
                    _ => self.zone_for(dtend),
                };
                let end = self.instant(&zone, value)?;
                if end < start {
                    return Err(self.error("DTEND before DTSTART"));
                }
                Ok(end - start)
            }
            (None, Some(duration)) => self.duration(duration),
            (None, None) => Ok(Duration::zero()),
        }
    }

    fn all_day_length(&mut self, raw: &RawComponent, start: NaiveDate) -> Result<u32, ParseError> {
        let days = match (raw.property("DTEND"), raw.property("DURATION")) {
            (Some(_), Some(_)) => return Err(self.error("both DTEND and DURATION present")),
            (Some(dtend), None) => {
                let end = match self.value(dtend)? {
                    IcalTime::Date(date) => date,
                    IcalTime::Floating(local) => local.date(),
                    IcalTime::Utc(utc) => utc.date_naive(),
                };
                let days = (end - start).num_days();
                if days < 0 {
                    return Err(self.error("DTEND before DTSTART"));
                }
                days
            }
            (None, Some(duration)) => {
                let duration = self.duration(duration)?;
                // Round partial days up.
                (duration.num_seconds() + 86_399) / 86_400
            }
            (None, None) => 1,
        };
        Ok(u32::try_from(days.max(1)).unwrap_or(u32::MAX))
    }

    fn duration(&self, prop: &RawProperty) -> Result<Duration, ParseError> {
        let text = prop.value.trim();
        if text.starts_with('-') {
            return Err(self.error("negative DURATION"));
        }
        let text = text.trim_start_matches('+');
        let parsed = iso8601::duration(text)
            .map_err(|e| self.error(format!("DURATION '{}': {}", text, e)))?;
        let std_duration: std::time::Duration = parsed.into();
        Duration::from_std(std_duration).map_err(|e| self.error(format!("DURATION: {}", e)))
    }
}
