//! Recurrence rule value type (RFC 5545 §3.3.10, §3.8.5.3).

use std::fmt;

use chrono::Weekday;
use serde::{Deserialize, Serialize};

use super::DateOrDateTime;

/// Recurrence frequency.
///
/// Daily is the finest supported unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl Frequency {
    /// Returns the string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Daily => "DAILY",
            Self::Weekly => "WEEKLY",
            Self::Monthly => "MONTHLY",
            Self::Yearly => "YEARLY",
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Weekday with optional occurrence number.
///
/// Used in BYDAY rule part. Examples:
/// - `MO` - every Monday
/// - `1MO` - first Monday of the month/year
/// - `-1FR` - last Friday of the month/year
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WeekdayNum {
    /// Optional occurrence number (-53 to 53, excluding 0).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ordinal: Option<i8>,
    /// The day of the week.
    pub weekday: Weekday,
}

impl WeekdayNum {
    /// Creates a weekday occurrence without an ordinal.
    #[must_use]
    pub const fn every(weekday: Weekday) -> Self {
        Self {
            ordinal: None,
            weekday,
        }
    }

    /// Creates a weekday occurrence with an ordinal.
    #[must_use]
    pub const fn nth(ordinal: i8, weekday: Weekday) -> Self {
        Self {
            ordinal: Some(ordinal),
            weekday,
        }
    }
}

impl fmt::Display for WeekdayNum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(n) = self.ordinal {
            write!(f, "{n}")?;
        }
        f.write_str(weekday_abbrev(self.weekday))
    }
}

/// Two-letter RRULE abbreviation of a weekday.
#[must_use]
pub const fn weekday_abbrev(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Mon => "MO",
        Weekday::Tue => "TU",
        Weekday::Wed => "WE",
        Weekday::Thu => "TH",
        Weekday::Fri => "FR",
        Weekday::Sat => "SA",
        Weekday::Sun => "SU",
    }
}

const fn default_interval() -> u16 {
    1
}

/// Recurrence rule.
///
/// `count` and `until` are alternative bounds. Both may be set; the
/// expansion honours whichever ends the series first.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecurrenceRule {
    pub freq: Frequency,

    /// Defines how often the frequency repeats (at least 1).
    #[serde(default = "default_interval")]
    pub interval: u16,

    /// Number of occurrences.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<u32>,

    /// Inclusive last occurrence boundary.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub until: Option<DateOrDateTime>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub by_day: Vec<WeekdayNum>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub by_month_day: Vec<i8>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub by_month: Vec<u8>,
}

impl RecurrenceRule {
    #[must_use]
    pub const fn new(freq: Frequency) -> Self {
        Self {
            freq,
            interval: 1,
            count: None,
            until: None,
            by_day: Vec::new(),
            by_month_day: Vec::new(),
            by_month: Vec::new(),
        }
    }

    #[must_use]
    pub const fn daily() -> Self {
        Self::new(Frequency::Daily)
    }

    #[must_use]
    pub const fn weekly() -> Self {
        Self::new(Frequency::Weekly)
    }

    #[must_use]
    pub const fn monthly() -> Self {
        Self::new(Frequency::Monthly)
    }

    #[must_use]
    pub const fn yearly() -> Self {
        Self::new(Frequency::Yearly)
    }

    /// Sets the interval; zero is read as 1.
    #[must_use]
    pub fn with_interval(mut self, interval: u16) -> Self {
        self.interval = interval.max(1);
        self
    }

    #[must_use]
    pub const fn with_count(mut self, count: u32) -> Self {
        self.count = Some(count);
        self
    }

    #[must_use]
    pub fn with_until(mut self, until: impl Into<DateOrDateTime>) -> Self {
        self.until = Some(until.into());
        self
    }

    #[must_use]
    pub fn with_by_day(mut self, by_day: Vec<WeekdayNum>) -> Self {
        self.by_day = by_day;
        self
    }

    #[must_use]
    pub fn with_by_month_day(mut self, by_month_day: Vec<i8>) -> Self {
        self.by_month_day = by_month_day;
        self
    }

    #[must_use]
    pub fn with_by_month(mut self, by_month: Vec<u8>) -> Self {
        self.by_month = by_month;
        self
    }

    /// Whether the rule produces a finite number of occurrences.
    #[must_use]
    pub const fn is_bounded(&self) -> bool {
        self.count.is_some() || self.until.is_some()
    }

    /// Rule parts that shape the pattern, without the UNTIL bound.
    ///
    /// This is the text the rule engine is fed; UNTIL is applied by the
    /// expansion itself so it can be compared in the series' own value type.
    #[must_use]
    pub fn pattern_text(&self) -> String {
        self.parts(false).join(";")
    }

    fn parts(&self, with_until: bool) -> Vec<String> {
        let mut parts = vec![format!("FREQ={}", self.freq)];
        if self.interval > 1 {
            parts.push(format!("INTERVAL={}", self.interval));
        }
        if let Some(count) = self.count {
            parts.push(format!("COUNT={count}"));
        }
        if with_until && let Some(until) = &self.until {
            let text = until.to_string();
            let value = text.rsplit(':').next().unwrap_or(&text);
            parts.push(format!("UNTIL={value}"));
        }
        if !self.by_day.is_empty() {
            parts.push(format!("BYDAY={}", join(&self.by_day)));
        }
        if !self.by_month_day.is_empty() {
            parts.push(format!("BYMONTHDAY={}", join(&self.by_month_day)));
        }
        if !self.by_month.is_empty() {
            parts.push(format!("BYMONTH={}", join(&self.by_month)));
        }
        parts
    }
}

fn join<T: fmt::Display>(values: &[T]) -> String {
    values
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

impl fmt::Display for RecurrenceRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.parts(true).join(";"))
    }
}
