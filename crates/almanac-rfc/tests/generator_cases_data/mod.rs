use almanac_rfc::rfc::ical::core::{CalDateTime, DateOrDateTime, RecurrenceRule, WeekdayNum};
use almanac_rfc::rfc::ical::expand::{RRuleGenerator, RecurrenceGenerator};
use chrono::{DateTime, FixedOffset, NaiveDate, TimeZone, Utc, Weekday};
use chrono_tz::Tz;

pub struct GeneratorCase {
    pub name: &'static str,
    pub anchor: DateOrDateTime,
    pub rule: Option<RecurrenceRule>,
    pub rdate: Vec<DateOrDateTime>,
    pub exdate: Vec<DateOrDateTime>,
    pub expected: Option<&'static [&'static str]>,
    pub expected_len: Option<usize>,
    pub limit: usize,
}

fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateOrDateTime {
    Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap().into()
}

fn zoned(tz: Tz, y: i32, m: u32, d: u32, h: u32) -> DateOrDateTime {
    let local = NaiveDate::from_ymd_opt(y, m, d)
        .unwrap()
        .and_hms_opt(h, 0, 0)
        .unwrap();
    CalDateTime::zoned(local, tz).into()
}

fn date(y: i32, m: u32, d: u32) -> DateOrDateTime {
    NaiveDate::from_ymd_opt(y, m, d).unwrap().into()
}

fn case(name: &'static str, anchor: DateOrDateTime, rule: RecurrenceRule) -> GeneratorCase {
    GeneratorCase {
        name,
        anchor,
        rule: Some(rule),
        rdate: Vec::new(),
        exdate: Vec::new(),
        expected: None,
        expected_len: None,
        limit: 100,
    }
}

#[expect(clippy::too_many_lines)]
pub fn generator_cases() -> Vec<GeneratorCase> {
    let every_day: Vec<WeekdayNum> = [
        Weekday::Sun,
        Weekday::Mon,
        Weekday::Tue,
        Weekday::Wed,
        Weekday::Thu,
        Weekday::Fri,
        Weekday::Sat,
    ]
    .into_iter()
    .map(WeekdayNum::every)
    .collect();

    vec![
        GeneratorCase {
            expected: Some(&[
                "2012-02-01T09:30:00+00:00",
                "2012-02-02T09:30:00+00:00",
                "2012-02-03T09:30:00+00:00",
            ]),
            ..case(
                "daily_basic",
                utc(2012, 2, 1, 9, 30),
                RecurrenceRule::daily().with_count(3),
            )
        },
        GeneratorCase {
            expected: Some(&[
                "1997-09-02T09:00:00+00:00",
                "1997-09-04T09:00:00+00:00",
                "1997-09-09T09:00:00+00:00",
            ]),
            ..case(
                "weekly_basic",
                utc(1997, 9, 2, 9, 0),
                RecurrenceRule::weekly().with_count(3).with_by_day(vec![
                    WeekdayNum::every(Weekday::Tue),
                    WeekdayNum::every(Weekday::Thu),
                ]),
            )
        },
        GeneratorCase {
            expected: Some(&[
                "2012-01-01T09:00:00+00:00",
                "2012-02-01T09:00:00+00:00",
                "2012-03-01T09:00:00+00:00",
            ]),
            ..case(
                "monthly_basic",
                utc(2012, 1, 1, 9, 0),
                RecurrenceRule::monthly()
                    .with_count(3)
                    .with_by_month_day(vec![1]),
            )
        },
        GeneratorCase {
            expected: Some(&[
                "2012-01-01T09:00:00+00:00",
                "2013-01-01T09:00:00+00:00",
                "2014-01-01T09:00:00+00:00",
            ]),
            ..case(
                "yearly_basic",
                utc(2012, 1, 1, 9, 0),
                RecurrenceRule::yearly().with_count(3),
            )
        },
        GeneratorCase {
            expected: Some(&[
                "2026-01-05T08:00:00+00:00",
                "2026-01-07T08:00:00+00:00",
                "2026-01-19T08:00:00+00:00",
                "2026-01-21T08:00:00+00:00",
            ]),
            ..case(
                "biweekly_monday_wednesday",
                utc(2026, 1, 5, 8, 0),
                RecurrenceRule::weekly()
                    .with_interval(2)
                    .with_count(4)
                    .with_by_day(vec![
                        WeekdayNum::every(Weekday::Mon),
                        WeekdayNum::every(Weekday::Wed),
                    ]),
            )
        },
        GeneratorCase {
            expected: Some(&[
                "2026-01-13T17:00:00+00:00",
                "2026-02-10T17:00:00+00:00",
                "2026-03-10T17:00:00+00:00",
            ]),
            ..case(
                "second_tuesday",
                utc(2026, 1, 13, 17, 0),
                RecurrenceRule::monthly()
                    .with_count(3)
                    .with_by_day(vec![WeekdayNum::nth(2, Weekday::Tue)]),
            )
        },
        GeneratorCase {
            expected: Some(&[
                "2026-01-31T00:00:00+00:00",
                "2026-02-28T00:00:00+00:00",
                "2026-03-31T00:00:00+00:00",
                "2026-04-30T00:00:00+00:00",
            ]),
            ..case(
                "all_day_last_of_month",
                date(2026, 1, 31),
                RecurrenceRule::monthly()
                    .with_count(4)
                    .with_by_month_day(vec![-1]),
            )
        },
        GeneratorCase {
            rdate: vec![utc(2012, 2, 10, 9, 30)],
            exdate: vec![utc(2012, 2, 2, 9, 30)],
            expected: Some(&[
                "2012-02-01T09:30:00+00:00",
                "2012-02-03T09:30:00+00:00",
                "2012-02-10T09:30:00+00:00",
            ]),
            ..case(
                "rdate_exdate",
                utc(2012, 2, 1, 9, 30),
                RecurrenceRule::daily().with_count(3),
            )
        },
        GeneratorCase {
            rule: None,
            rdate: vec![utc(2026, 5, 3, 9, 0), utc(2026, 5, 2, 9, 0)],
            expected: Some(&[
                "2026-05-01T09:00:00+00:00",
                "2026-05-02T09:00:00+00:00",
                "2026-05-03T09:00:00+00:00",
            ]),
            ..case(
                "rdate_only",
                utc(2026, 5, 1, 9, 0),
                RecurrenceRule::daily(),
            )
        },
        GeneratorCase {
            expected: Some(&[
                "2021-03-13T09:00:00-05:00",
                "2021-03-14T09:00:00-04:00",
                "2021-03-15T09:00:00-04:00",
            ]),
            ..case(
                "dst_new_york",
                zoned(chrono_tz::America::New_York, 2021, 3, 13, 9),
                RecurrenceRule::daily().with_count(3),
            )
        },
        GeneratorCase {
            expected_len: Some(10),
            limit: 10,
            ..case(
                "unbounded_is_lazy",
                zoned(chrono_tz::Europe::Berlin, 2026, 1, 1, 1),
                RecurrenceRule::daily(),
            )
        },
        GeneratorCase {
            expected_len: Some(93),
            limit: 200,
            ..case(
                "rfc_every_day_in_jan",
                zoned(chrono_tz::America::New_York, 1998, 1, 1, 9),
                RecurrenceRule::yearly()
                    .with_until(utc(2000, 1, 31, 14, 0))
                    .with_by_month(vec![1])
                    .with_by_day(every_day),
            )
        },
    ]
}

pub fn assert_case(case: &GeneratorCase) {
    let generator = RRuleGenerator::new(7);
    let occurrences = generator
        .occurrences(&case.anchor, case.rule.as_ref(), &case.rdate, &case.exdate)
        .unwrap_or_else(|err| panic!("Failed to expand {}: {}", case.name, err));

    let actual: Vec<DateOrDateTime> = occurrences
        .take(case.limit)
        .map(|value| value.unwrap_or_else(|err| panic!("Case {} failed: {}", case.name, err)))
        .collect();
    let actual_timestamps: Vec<i64> = actual
        .iter()
        .map(|value| value.to_instant(Tz::UTC).timestamp())
        .collect();

    if let Some(expected) = case.expected {
        let expected_timestamps: Vec<i64> = expected
            .iter()
            .map(|value| parse_rfc3339(value).timestamp())
            .collect();
        assert_eq!(
            actual_timestamps, expected_timestamps,
            "Case {} did not match",
            case.name
        );
    }

    if let Some(expected_len) = case.expected_len {
        assert_eq!(
            actual.len(),
            expected_len,
            "Case {} expected {} occurrences",
            case.name,
            expected_len
        );
    }

    assert!(
        actual
            .iter()
            .all(|value| value.is_date() == case.anchor.is_date()),
        "Case {} changed value type",
        case.name
    );
}

fn parse_rfc3339(value: &str) -> DateTime<FixedOffset> {
    DateTime::parse_from_rfc3339(value).unwrap_or_else(|err| {
        panic!("Failed to parse rfc3339 value {value}: {err}")
    })
}
