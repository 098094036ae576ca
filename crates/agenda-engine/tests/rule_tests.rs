//! RRULE parsing into the typed rule.

use agenda_engine::{AgendaError, ByDay, Frequency, RecurrenceRule, RuleBound};
use chrono::Weekday;

#[test]
fn parses_prefixed_rule() {
    let rule: RecurrenceRule = "RRULE:FREQ=MONTHLY;INTERVAL=2;BYDAY=-1FR,2TU;COUNT=6"
        .parse()
        .unwrap();

    assert_eq!(rule.frequency, Frequency::Monthly);
    assert_eq!(rule.interval, 2);
    assert_eq!(rule.bound, RuleBound::Count(6));
    assert_eq!(
        rule.by_day,
        vec![
            ByDay { weekday: Weekday::Fri, ordinal: Some(-1) },
            ByDay { weekday: Weekday::Tue, ordinal: Some(2) },
        ]
    );
    assert_eq!(rule.week_start, Weekday::Mon);
}

#[test]
fn lowercase_parts_are_accepted() {
    let rule: RecurrenceRule = "freq=weekly;byday=mo,we;wkst=su".parse().unwrap();

    assert_eq!(rule.frequency, Frequency::Weekly);
    assert_eq!(rule.week_start, Weekday::Sun);
    assert_eq!(rule.bound, RuleBound::Open);
}

#[test]
fn until_is_kept_unresolved() {
    let rule: RecurrenceRule = "FREQ=DAILY;UNTIL=20240310".parse().unwrap();
    assert!(matches!(rule.bound, RuleBound::Until(until) if until.is_date()));
}

#[test]
fn count_with_until_rejected() {
    let err = "FREQ=DAILY;COUNT=3;UNTIL=20240310T000000Z"
        .parse::<RecurrenceRule>()
        .unwrap_err();
    assert!(matches!(err, AgendaError::InvalidRule(_)));
}

#[test]
fn sub_daily_frequency_unsupported() {
    let err = "FREQ=HOURLY;COUNT=3".parse::<RecurrenceRule>().unwrap_err();
    assert!(matches!(err, AgendaError::UnsupportedFrequency(_)));
}

#[test]
fn time_of_day_parts_rejected() {
    for rule in ["FREQ=DAILY;BYHOUR=9", "FREQ=YEARLY;BYWEEKNO=20", "FREQ=YEARLY;BYYEARDAY=100"] {
        assert!(
            matches!(rule.parse::<RecurrenceRule>(), Err(AgendaError::InvalidRule(_))),
            "{} should be rejected",
            rule
        );
    }
}

#[test]
fn empty_and_garbage_rejected() {
    assert!("".parse::<RecurrenceRule>().is_err());
    assert!("RRULE:".parse::<RecurrenceRule>().is_err());
    assert!("FREQ=FORTNIGHTLY".parse::<RecurrenceRule>().is_err());
    assert!("FREQ=MONTHLY;BYMONTHDAY=32".parse::<RecurrenceRule>().is_err());
}
