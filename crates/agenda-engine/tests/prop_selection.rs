//! Property-based tests for selection: determinism and primary minimality.

use agenda_engine::{select, HiddenSet, Occurrence, Transparency};
use chrono::{DateTime, Duration, TimeZone, Utc};
use proptest::prelude::*;

fn base() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 4, 0, 0, 0).unwrap()
}

/// Occurrences within one day: (id, start minute, length in minutes).
fn arb_pool() -> impl Strategy<Value = Vec<Occurrence>> {
    prop::collection::vec(("[a-e]", 0i64..1440, 0i64..240), 0..20).prop_map(|raw| {
        raw.into_iter()
            .map(|(id, start, len)| {
                let start = base() + Duration::minutes(start);
                Occurrence {
                    event_id: id,
                    original_start: start,
                    start,
                    end: start + Duration::minutes(len),
                    title: String::new(),
                    location: None,
                    all_day: false,
                    transparency: Transparency::Opaque,
                    overridden: false,
                }
            })
            .collect()
    })
}

fn arb_hidden() -> impl Strategy<Value = HiddenSet> {
    prop::collection::vec("[a-e]", 0..3).prop_map(|ids| ids.into_iter().collect())
}

fn config() -> ProptestConfig {
    ProptestConfig {
        cases: 256,
        ..ProptestConfig::default()
    }
}

proptest! {
    #![proptest_config(config())]

    #[test]
    fn select_is_idempotent(
        pool in arb_pool(),
        hidden in arb_hidden(),
        minute in 0i64..1440,
        limit in 0usize..6,
    ) {
        let reference = base() + Duration::minutes(minute);
        let first = select(&pool, &hidden, reference, limit);
        let second = select(&pool, &hidden, reference, limit);

        prop_assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[test]
    fn primary_is_earliest_upcoming(
        pool in arb_pool(),
        hidden in arb_hidden(),
        minute in 0i64..1440,
    ) {
        let reference = base() + Duration::minutes(minute);
        let result = select(&pool, &hidden, reference, 3);

        let earliest_upcoming = pool
            .iter()
            .filter(|o| !hidden.contains(&o.event_id) && o.start > reference)
            .map(|o| o.start)
            .min();

        match earliest_upcoming {
            Some(start) => {
                let primary = result.primary.as_ref().expect("primary when something is upcoming");
                prop_assert_eq!(primary.start, start);
                prop_assert!(!result.primary_is_running());
            }
            None => {
                if let Some(primary) = &result.primary {
                    prop_assert!(primary.is_running_at(reference));
                }
            }
        }
    }

    #[test]
    fn lists_are_sorted_and_bounded(
        pool in arb_pool(),
        minute in 0i64..1440,
        limit in 0usize..6,
    ) {
        let reference = base() + Duration::minutes(minute);
        let result = select(&pool, &HiddenSet::new(), reference, limit);

        prop_assert!(result.upcoming.len() <= limit);
        let merged: Vec<_> = result.upcoming.iter().chain(&result.later).collect();
        for pair in merged.windows(2) {
            prop_assert!(
                (pair[0].start, &pair[0].event_id) <= (pair[1].start, &pair[1].event_id)
            );
        }
        prop_assert!(merged.iter().all(|o| o.start > reference));
        if let Some(primary) = &result.primary {
            prop_assert!(merged.iter().all(|o| o.start >= primary.start));
        }
    }
}
