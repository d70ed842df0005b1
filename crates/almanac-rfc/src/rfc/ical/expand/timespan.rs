//! Absolute spans used to order and compare occurrences.

use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveTime, TimeDelta, Utc};
use chrono_tz::Tz;

use super::local_to_utc;
use crate::rfc::ical::core::DateOrDateTime;

/// A half-open `[start, end)` interval in UTC.
///
/// Ordering is by start, then end. Back-to-back spans (one ends where the
/// next starts) are adjacent and never intersect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timespan {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Timespan {
    /// Creates a span, swapping the bounds if they are reversed.
    #[must_use]
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        if end < start {
            Self {
                start: end,
                end: start,
            }
        } else {
            Self { start, end }
        }
    }

    /// ## Summary
    /// Anchors a start/end pair to absolute instants.
    ///
    /// Values without an explicit zone, including DATE values read as
    /// midnight, are interpreted in `fallback`.
    #[must_use]
    pub fn of(start: &DateOrDateTime, end: &DateOrDateTime, fallback: Tz) -> Self {
        Self::new(start.to_instant(fallback), end.to_instant(fallback))
    }

    /// The span covering the whole of `date` in `tz`.
    #[must_use]
    pub fn whole_day(date: NaiveDate, tz: Tz) -> Self {
        let start = date.and_time(NaiveTime::MIN);
        Self::new(
            local_to_utc(start, tz),
            local_to_utc(start + TimeDelta::days(1), tz),
        )
    }

    #[must_use]
    pub fn duration(&self) -> TimeDelta {
        self.end - self.start
    }

    /// Whether the two spans share any instant.
    #[must_use]
    pub fn intersects(&self, other: &Self) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Whether `other` lies entirely within this span.
    #[must_use]
    pub fn includes(&self, other: &Self) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    #[must_use]
    pub fn is_included_in(&self, other: &Self) -> bool {
        other.includes(self)
    }

    /// Whether this span starts inside `other`.
    #[must_use]
    pub fn starts_within(&self, other: &Self) -> bool {
        other.start <= self.start && self.start < other.end
    }

    /// Whether this span ends inside `other`.
    #[must_use]
    pub fn ends_within(&self, other: &Self) -> bool {
        other.start < self.end && self.end <= other.end
    }

    /// Whether `instant` falls inside this span.
    ///
    /// A zero-length span includes its own start.
    #[must_use]
    pub fn includes_instant(&self, instant: DateTime<Utc>) -> bool {
        if self.start == self.end {
            return instant == self.start;
        }
        self.start <= instant && instant < self.end
    }
}

impl fmt::Display for Timespan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.start.to_rfc3339(), self.end.to_rfc3339())
    }
}
