//! DATE and DATE-TIME values as carried by calendar items (RFC 5545 §3.3.4, §3.3.5).

use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::{RfcError, RfcResult};
use crate::rfc::ical::expand::local_to_utc;

/// Form of DATE-TIME value (RFC 5545 §3.3.5).
///
/// iCalendar DATE-TIME values come in three mutually exclusive forms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateTimeForm {
    /// Floating time - same wall-clock time in any timezone.
    Floating,
    /// UTC time - absolute instant.
    Utc,
    /// Zoned time - local wall-clock time in a named zone.
    Zoned(Tz),
}

/// DATE-TIME value: a wall-clock reading plus the form that anchors it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CalDateTime {
    pub local: NaiveDateTime,
    pub form: DateTimeForm,
}

impl CalDateTime {
    #[must_use]
    pub const fn floating(local: NaiveDateTime) -> Self {
        Self {
            local,
            form: DateTimeForm::Floating,
        }
    }

    #[must_use]
    pub fn utc(instant: DateTime<Utc>) -> Self {
        Self {
            local: instant.naive_utc(),
            form: DateTimeForm::Utc,
        }
    }

    #[must_use]
    pub const fn zoned(local: NaiveDateTime, tz: Tz) -> Self {
        Self {
            local,
            form: DateTimeForm::Zoned(tz),
        }
    }

    /// Whether the value identifies an absolute instant on its own.
    #[must_use]
    pub const fn is_aware(&self) -> bool {
        !matches!(self.form, DateTimeForm::Floating)
    }

    /// ## Summary
    /// Resolves this value to an absolute instant.
    ///
    /// Floating values are read in `fallback`.
    #[must_use]
    pub fn to_instant(&self, fallback: Tz) -> DateTime<Utc> {
        match self.form {
            DateTimeForm::Utc => Utc.from_utc_datetime(&self.local),
            DateTimeForm::Floating => local_to_utc(self.local, fallback),
            DateTimeForm::Zoned(tz) => local_to_utc(self.local, tz),
        }
    }
}

/// A DATE or a DATE-TIME, the two value types DTSTART and friends accept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateOrDateTime {
    Date(NaiveDate),
    DateTime(CalDateTime),
}

impl DateOrDateTime {
    #[must_use]
    pub const fn is_date(&self) -> bool {
        matches!(self, Self::Date(_))
    }

    /// Whether the value carries an explicit UTC or zone anchor.
    #[must_use]
    pub const fn is_aware(&self) -> bool {
        match self {
            Self::Date(_) => false,
            Self::DateTime(dt) => dt.is_aware(),
        }
    }

    /// Named zone this value is expressed in, if any.
    ///
    /// UTC is not reported since it never needs a timezone definition.
    #[must_use]
    pub fn tz_key(&self) -> Option<&'static str> {
        match self {
            Self::DateTime(CalDateTime {
                form: DateTimeForm::Zoned(tz),
                ..
            }) if !is_utc_zone(*tz) => Some(tz.name()),
            _ => None,
        }
    }

    /// Calendar date of the wall-clock reading.
    #[must_use]
    pub fn date(&self) -> NaiveDate {
        match self {
            Self::Date(date) => *date,
            Self::DateTime(dt) => dt.local.date(),
        }
    }

    /// Wall-clock reading, with dates read as midnight.
    #[must_use]
    pub fn naive(&self) -> NaiveDateTime {
        match self {
            Self::Date(date) => date.and_time(NaiveTime::MIN),
            Self::DateTime(dt) => dt.local,
        }
    }

    /// ## Summary
    /// Resolves this value to an absolute instant.
    ///
    /// Dates are read as midnight and, like floating values, anchored in
    /// `fallback`.
    #[must_use]
    pub fn to_instant(&self, fallback: Tz) -> DateTime<Utc> {
        match self {
            Self::Date(date) => local_to_utc(date.and_time(NaiveTime::MIN), fallback),
            Self::DateTime(dt) => dt.to_instant(fallback),
        }
    }

    /// ## Summary
    /// Adds a duration using wall-clock arithmetic.
    ///
    /// Dates only move by whole days. Returns `None` on overflow.
    #[must_use]
    pub fn checked_add(&self, delta: TimeDelta) -> Option<Self> {
        match self {
            Self::Date(date) => date
                .checked_add_signed(TimeDelta::days(delta.num_days()))
                .map(Self::Date),
            Self::DateTime(dt) => dt.local.checked_add_signed(delta).map(|local| {
                Self::DateTime(CalDateTime {
                    local,
                    form: dt.form,
                })
            }),
        }
    }

    /// ## Summary
    /// Returns the signed duration from `earlier` to `self`.
    ///
    /// ## Errors
    /// Returns `RfcError::InvalidDuration` when the two values are not
    /// comparable: a DATE against a DATE-TIME, or a floating DATE-TIME
    /// against an anchored one.
    pub fn duration_since(&self, earlier: &Self) -> RfcResult<TimeDelta> {
        match (self, earlier) {
            (Self::Date(end), Self::Date(start)) => Ok(end.signed_duration_since(*start)),
            (Self::DateTime(end), Self::DateTime(start)) if end.is_aware() && start.is_aware() => {
                Ok(end.to_instant(Tz::UTC) - start.to_instant(Tz::UTC))
            }
            (Self::DateTime(end), Self::DateTime(start))
                if !end.is_aware() && !start.is_aware() =>
            {
                Ok(end.local - start.local)
            }
            _ => Err(RfcError::InvalidDuration(format!(
                "cannot measure from {earlier} to {self}"
            ))),
        }
    }

    /// ## Summary
    /// Re-expresses this wall-clock reading in the value type of `anchor`.
    ///
    /// A DATE anchor yields the date; a DATE-TIME anchor contributes its form.
    #[must_use]
    pub fn realign(&self, anchor: &Self) -> Self {
        match anchor {
            Self::Date(_) => Self::Date(self.date()),
            Self::DateTime(anchor) => Self::DateTime(CalDateTime {
                local: self.naive(),
                form: anchor.form,
            }),
        }
    }

    /// Key that orders values of one series.
    ///
    /// Anchored values compare by instant, everything else by wall clock.
    #[must_use]
    pub fn ordering_key(&self) -> NaiveDateTime {
        match self {
            Self::DateTime(dt) if dt.is_aware() => dt.to_instant(Tz::UTC).naive_utc(),
            _ => self.naive(),
        }
    }
}

impl From<NaiveDate> for DateOrDateTime {
    fn from(date: NaiveDate) -> Self {
        Self::Date(date)
    }
}

impl From<DateTime<Utc>> for DateOrDateTime {
    fn from(instant: DateTime<Utc>) -> Self {
        Self::DateTime(CalDateTime::utc(instant))
    }
}

impl From<CalDateTime> for DateOrDateTime {
    fn from(dt: CalDateTime) -> Self {
        Self::DateTime(dt)
    }
}

impl fmt::Display for DateOrDateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Date(date) => write!(f, "{}", date.format("%Y%m%d")),
            Self::DateTime(dt) => match dt.form {
                DateTimeForm::Floating => write!(f, "{}", dt.local.format("%Y%m%dT%H%M%S")),
                DateTimeForm::Utc => write!(f, "{}", dt.local.format("%Y%m%dT%H%M%SZ")),
                DateTimeForm::Zoned(tz) => {
                    write!(f, "TZID={}:{}", tz.name(), dt.local.format("%Y%m%dT%H%M%S"))
                }
            },
        }
    }
}

fn is_utc_zone(tz: Tz) -> bool {
    matches!(tz, Tz::UTC | Tz::Etc__UTC)
}

/// Serde adapter storing an optional duration as whole seconds.
pub(crate) mod duration_seconds {
    use chrono::TimeDelta;
    use serde::{Deserialize, Deserializer, Serializer};

    #[expect(
        clippy::ref_option,
        reason = "serde `with` adapters receive the field by reference"
    )]
    pub fn serialize<S: Serializer>(
        value: &Option<TimeDelta>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(delta) => serializer.serialize_some(&delta.num_seconds()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<TimeDelta>, D::Error> {
        Ok(Option::<i64>::deserialize(deserializer)?.map(TimeDelta::seconds))
    }
}
