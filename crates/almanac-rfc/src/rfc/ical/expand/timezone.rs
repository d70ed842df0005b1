//! Timezone resolution, UTC conversion and the timezone roster collaborator.
//!
//! Uses ICU4X for Windows timezone ID to IANA mapping and timezone
//! canonicalization, and `chrono-tz` for offset data.

use chrono::{
    DateTime, Datelike, LocalResult, NaiveDate, NaiveDateTime, Offset, TimeDelta, TimeZone, Utc,
};
use chrono_tz::{OffsetComponents, OffsetName, Tz};
use icu::time::zone::WindowsParser;
use icu::time::zone::iana::IanaParserExtended;
use std::collections::HashMap;
use std::str::FromStr;

use crate::rfc::ical::core::{Observance, ObservanceKind, Timezone};

/// Error resolving a timezone.
#[derive(Debug, thiserror::Error)]
pub enum TimezoneError {
    /// Unknown or invalid timezone identifier.
    #[error("Unknown timezone: {0}")]
    UnknownTimezone(String),

    /// The zone resolved but no definition could be derived for it.
    #[error("Cannot build timezone definition for {tzid}: {reason}")]
    Definition { tzid: String, reason: String },
}

/// Resolver for timezone identifiers.
///
/// Maintains a cache of resolved timezones keyed by the identifier as given.
#[derive(Debug, Default)]
pub struct TimeZoneResolver {
    cache: HashMap<String, Tz>,
}

impl TimeZoneResolver {
    /// Creates a new timezone resolver.
    #[must_use]
    pub fn new() -> Self {
        Self {
            cache: HashMap::new(),
        }
    }

    /// ## Summary
    /// Resolves a timezone identifier to a `chrono_tz::Tz`.
    ///
    /// Accepts IANA names and aliases, Windows names, and the legacy
    /// `/mozilla.org/` and `/softwarestudio.org/` prefixes.
    ///
    /// ## Errors
    ///
    /// Returns `TimezoneError::UnknownTimezone` if the TZID cannot be resolved.
    ///
    /// ## Side Effects
    ///
    /// Caches successful resolutions to avoid repeated parsing.
    pub fn resolve(&mut self, tzid: &str) -> Result<Tz, TimezoneError> {
        if let Some(tz) = self.cache.get(tzid) {
            return Ok(*tz);
        }

        let normalized = normalize_tzid(tzid);
        let tz = Tz::from_str(&normalized)
            .map_err(|_e| TimezoneError::UnknownTimezone(tzid.to_string()))?;

        tracing::trace!(tzid, resolved = %tz.name(), "Resolved timezone");
        self.cache.insert(tzid.to_string(), tz);

        Ok(tz)
    }
}

/// Normalizes common calendar-client timezone identifiers to IANA names.
///
/// Many clients use non-standard TZID values that need to be mapped to
/// standard IANA timezone names.
fn normalize_tzid(tzid: &str) -> String {
    let stripped = tzid
        .strip_prefix("/mozilla.org/")
        .or_else(|| tzid.strip_prefix("/softwarestudio.org/"))
        .unwrap_or(tzid);

    let windows_parser = WindowsParser::new();
    if let Some(tz) = windows_parser.parse(stripped, None) {
        let iana_parser = IanaParserExtended::new();
        for entry in iana_parser.iter() {
            if entry.time_zone == tz {
                return entry.canonical.to_string();
            }
        }
    }

    // Aliases such as Europe/Kiev -> Europe/Kyiv
    let iana_parser = IanaParserExtended::new();
    let parsed = iana_parser.parse(stripped);
    if parsed.time_zone != icu::time::TimeZone::UNKNOWN {
        return parsed.canonical.to_string();
    }

    stripped.to_string()
}

/// ## Summary
/// Converts a wall-clock time in `tz` to an absolute instant.
///
/// DST folds resolve to the earlier instant. Times inside a DST gap do not
/// exist and are shifted forward by one hour.
#[must_use]
pub fn local_to_utc(local: NaiveDateTime, tz: Tz) -> DateTime<Utc> {
    match tz.from_local_datetime(&local) {
        LocalResult::Single(dt) | LocalResult::Ambiguous(dt, _) => dt.with_timezone(&Utc),
        LocalResult::None => {
            let shifted = local + TimeDelta::hours(1);
            match tz.from_local_datetime(&shifted) {
                LocalResult::Single(dt) | LocalResult::Ambiguous(dt, _) => dt.with_timezone(&Utc),
                LocalResult::None => Utc.from_utc_datetime(&local),
            }
        }
    }
}

/// Supplies timezone definitions for a calendar's roster.
pub trait TimezoneProvider {
    /// ## Summary
    /// Builds a self-contained definition for the zone named `key`.
    ///
    /// ## Errors
    /// Returns a `TimezoneError` when the zone is unknown or its offsets
    /// cannot be described.
    fn timezone(&mut self, key: &str) -> Result<Timezone, TimezoneError>;
}

/// Builds definitions from the IANA database compiled into `chrono-tz`.
///
/// Observances describe the offset transitions of one calendar year,
/// which defaults to the current one.
#[derive(Debug)]
pub struct IanaTimezoneProvider {
    resolver: TimeZoneResolver,
    year: i32,
}

impl IanaTimezoneProvider {
    #[must_use]
    pub fn new() -> Self {
        Self::for_year(Utc::now().year())
    }

    #[must_use]
    pub fn for_year(year: i32) -> Self {
        Self {
            resolver: TimeZoneResolver::new(),
            year,
        }
    }
}

impl Default for IanaTimezoneProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl TimezoneProvider for IanaTimezoneProvider {
    #[tracing::instrument(skip(self), fields(year = self.year))]
    fn timezone(&mut self, key: &str) -> Result<Timezone, TimezoneError> {
        let tz = self.resolver.resolve(key)?;
        let observances = year_observances(tz, self.year).ok_or_else(|| {
            TimezoneError::Definition {
                tzid: key.to_string(),
                reason: format!("year {} is out of range", self.year),
            }
        })?;

        tracing::debug!(count = observances.len(), "Built timezone definition");
        Ok(Timezone {
            tzid: key.to_string(),
            observances,
        })
    }
}

const SCAN_STEP: TimeDelta = TimeDelta::minutes(15);

fn offset_at(tz: Tz, instant: NaiveDateTime) -> i32 {
    tz.offset_from_utc_datetime(&instant).fix().local_minus_utc()
}

fn observance_at(tz: Tz, instant: NaiveDateTime, offset_from: i32) -> Observance {
    let offset = tz.offset_from_utc_datetime(&instant);
    let offset_to = offset.fix().local_minus_utc();
    let kind = if offset.dst_offset().is_zero() {
        ObservanceKind::Standard
    } else {
        ObservanceKind::Daylight
    };
    Observance {
        kind,
        name: offset.abbreviation().map(str::to_string),
        start: instant + TimeDelta::seconds(i64::from(offset_from)),
        offset_from,
        offset_to,
    }
}

/// Scans `year` day by day for offset changes, then narrows each change
/// down to the quarter hour it happens in.
fn year_observances(tz: Tz, year: i32) -> Option<Vec<Observance>> {
    let first = NaiveDate::from_ymd_opt(year, 1, 1)?.and_hms_opt(0, 0, 0)?;
    let last = NaiveDate::from_ymd_opt(year + 1, 1, 1)?.and_hms_opt(0, 0, 0)?;

    let mut observances = Vec::new();
    let mut day = first;
    let mut offset = offset_at(tz, day);
    while day < last {
        let next_day = day + TimeDelta::days(1);
        if offset_at(tz, next_day) != offset {
            let mut instant = day;
            while offset_at(tz, instant) == offset {
                instant += SCAN_STEP;
            }
            observances.push(observance_at(tz, instant, offset));
            offset = offset_at(tz, instant);
            // A second change within the same day is picked up next round.
            day = instant;
            continue;
        }
        day = next_day;
    }

    if observances.is_empty() {
        observances.push(observance_at(tz, first, offset));
    }
    Some(observances)
}
