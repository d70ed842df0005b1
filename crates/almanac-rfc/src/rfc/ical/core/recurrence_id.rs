//! RECURRENCE-ID identity keys (RFC 5545 §3.8.4.4).

use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use super::{CalDateTime, DateOrDateTime};
use crate::error::{RfcError, RfcResult};

const DATE_FORMAT: &str = "%Y%m%d";
const DATE_TIME_FORMAT: &str = "%Y%m%dT%H%M%S";

/// Identifies one occurrence of a series.
///
/// The key is the occurrence's start with any zone stripped, so it compares
/// equal across items regardless of how each expresses its timezone. It is
/// an identity key only and must never be used for ordering.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecurrenceId(String);

impl RecurrenceId {
    /// Derives the key for an occurrence starting at `value`.
    #[must_use]
    pub fn from_value(value: &DateOrDateTime) -> Self {
        match value {
            DateOrDateTime::Date(date) => Self(date.format(DATE_FORMAT).to_string()),
            DateOrDateTime::DateTime(dt) => Self(dt.local.format(DATE_TIME_FORMAT).to_string()),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// ## Summary
    /// Parses the key back into a floating DATE-TIME or a DATE.
    ///
    /// ## Errors
    /// Returns `RfcError::InvalidRecurrenceId` if the key is malformed.
    pub fn to_value(&self) -> RfcResult<DateOrDateTime> {
        parse_key(&self.0)
    }

    /// ## Summary
    /// Parses the key into the value type of `anchor`.
    ///
    /// Used to turn an identity key back into an EXDATE that the series'
    /// expansion can compare against its own occurrences.
    ///
    /// ## Errors
    /// Returns `RfcError::InvalidRecurrenceId` if the key is malformed.
    pub fn to_value_like(&self, anchor: &DateOrDateTime) -> RfcResult<DateOrDateTime> {
        Ok(self.to_value()?.realign(anchor))
    }

    /// Whether this key names the occurrence starting at `value`.
    #[must_use]
    pub fn matches(&self, value: &DateOrDateTime) -> bool {
        *self == Self::from_value(value)
    }
}

fn parse_key(key: &str) -> RfcResult<DateOrDateTime> {
    if key.len() == 8 {
        NaiveDate::parse_from_str(key, DATE_FORMAT)
            .map(DateOrDateTime::Date)
            .map_err(|e| RfcError::InvalidRecurrenceId(format!("{key}: {e}")))
    } else {
        NaiveDateTime::parse_from_str(key, DATE_TIME_FORMAT)
            .map(|local| DateOrDateTime::DateTime(CalDateTime::floating(local)))
            .map_err(|e| RfcError::InvalidRecurrenceId(format!("{key}: {e}")))
    }
}

impl FromStr for RecurrenceId {
    type Err = RfcError;

    /// Accepts `YYYYMMDD` or `YYYYMMDDTHHMMSS`, with an optional trailing `Z`
    /// which is dropped.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let key = trimmed.strip_suffix('Z').unwrap_or(trimmed);
        parse_key(key)?;
        Ok(Self(key.to_string()))
    }
}

impl From<&DateOrDateTime> for RecurrenceId {
    fn from(value: &DateOrDateTime) -> Self {
        Self::from_value(value)
    }
}

impl fmt::Display for RecurrenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
