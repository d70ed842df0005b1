//! Forking a counted series keeps its total number of occurrences.
//!
//! Rules combine an interval above one with weekday restrictions and an
//! anchor that need not fall on one of those weekdays, so occurrences land
//! at irregular offsets from the series start.

use almanac_rfc::rfc::ical::core::{
    Calendar, CommonPatch, Event, EventPatch, RecurrenceId, RecurrenceRule, WeekdayNum,
};
use almanac_service::store::{CalendarStores, Range, Store};
use chrono::{DateTime, TimeZone, Utc, Weekday};
use chrono_tz::Tz;
use proptest::prelude::*;

const SERIES: &str = "rota";

const WEEKDAYS: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

fn stamp() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 2, 1, 12, 0, 0).unwrap()
}

fn rota(anchor_day: u32, rule: RecurrenceRule) -> Event {
    let start = Utc.with_ymd_and_hms(2026, 3, anchor_day, 9, 0, 0).unwrap();
    let mut event = Event::new(start.into()).with_summary("rota");
    event.common.uid = Some(SERIES.to_string());
    event.common.rrule = Some(rule);
    event
}

fn starts(store: &Store<'_, Event>) -> Vec<DateTime<Utc>> {
    store
        .timeline(Tz::UTC)
        .expect("timeline")
        .iter()
        .expect("sources")
        .map(|item| {
            item.expect("occurrence")
                .common
                .dtstart
                .expect("dtstart")
                .to_instant(Tz::UTC)
        })
        .collect()
}

fn renamed() -> EventPatch {
    EventPatch {
        common: CommonPatch {
            summary: Some(Some("rota (new)".to_string())),
            ..CommonPatch::default()
        },
        ..EventPatch::default()
    }
}

fn check_fork(rule: RecurrenceRule, anchor_day: u32, pick: prop::sample::Index) {
    let count = rule.count.expect("counted rule");
    let mut calendar = Calendar::new();
    let mut store = calendar.event_store().with_clock(stamp);
    store.add(rota(anchor_day, rule)).expect("added");

    let before = starts(&store);
    assert_eq!(before.len(), usize::try_from(count).unwrap());

    // Any occurrence but the first, which would edit the whole series.
    let position = pick.index(before.len() - 1) + 1;
    let rid = RecurrenceId::from_value(&before[position].into());
    store
        .edit(SERIES, &renamed(), Some(&rid), Range::ThisAndFuture)
        .expect("forked");

    let fork = store
        .items()
        .iter()
        .find(|event| event.common.recurrence_id.is_some())
        .expect("fork");
    let remaining = count - u32::try_from(position).unwrap();
    assert_eq!(
        fork.common.rrule.as_ref().and_then(|rule| rule.count),
        Some(remaining)
    );
    assert_eq!(starts(&store), before);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn weekly_fork_keeps_total(
        anchor_day in 1u32..=14,
        interval in 2u16..=4,
        mask in 1u8..128,
        count in 2u32..=30,
        pick in any::<prop::sample::Index>(),
    ) {
        let by_day: Vec<WeekdayNum> = WEEKDAYS
            .iter()
            .enumerate()
            .filter(|(bit, _)| mask & (1 << bit) != 0)
            .map(|(_, weekday)| WeekdayNum::every(*weekday))
            .collect();
        let rule = RecurrenceRule::weekly()
            .with_interval(interval)
            .with_by_day(by_day)
            .with_count(count);
        check_fork(rule, anchor_day, pick);
    }

    #[test]
    fn monthly_nth_weekday_fork_keeps_total(
        anchor_day in 1u32..=28,
        interval in 2u16..=3,
        ordinal in prop::sample::select(vec![1i8, 2, 3, -1]),
        weekday in prop::sample::select(WEEKDAYS.to_vec()),
        count in 2u32..=12,
        pick in any::<prop::sample::Index>(),
    ) {
        let rule = RecurrenceRule::monthly()
            .with_interval(interval)
            .with_by_day(vec![WeekdayNum::nth(ordinal, weekday)])
            .with_count(count);
        check_fork(rule, anchor_day, pick);
    }
}
