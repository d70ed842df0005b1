//! Shared capability surface of the recurring component kinds.
//!
//! `VEVENT`, `VTODO` and `VJOURNAL` share every property that takes part in
//! recurrence (RFC 5545 §3.8.5) and differ only in how they express their
//! end. The recurrence machinery works against [`CalendarItem`] and never
//! needs to know which kind it holds.

use std::fmt;

use chrono::{DateTime, TimeDelta, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use super::{DateOrDateTime, ItemKind, RecurrenceId, RecurrenceRule};
use crate::error::{RfcError, RfcResult};
use crate::rfc::ical::expand::Timespan;

/// RELTYPE parameter of a RELATED-TO property (RFC 5545 §3.2.15).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RelationshipType {
    #[default]
    Parent,
    Child,
    Sibling,
    #[serde(untagged)]
    Other(String),
}

impl RelationshipType {
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Parent => "PARENT",
            Self::Child => "CHILD",
            Self::Sibling => "SIBLING",
            Self::Other(name) => name,
        }
    }
}

impl fmt::Display for RelationshipType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// RELATED-TO property: a link to another item by uid.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RelatedTo {
    pub uid: String,
    #[serde(default)]
    pub reltype: RelationshipType,
}

impl RelatedTo {
    #[must_use]
    pub fn parent(uid: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            reltype: RelationshipType::Parent,
        }
    }

    #[must_use]
    pub fn new(uid: impl Into<String>, reltype: RelationshipType) -> Self {
        Self {
            uid: uid.into(),
            reltype,
        }
    }
}

/// Properties every recurring component kind carries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommonProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,

    pub dtstamp: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dtstart: Option<DateOrDateTime>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rrule: Option<RecurrenceRule>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rdate: Vec<DateOrDateTime>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exdate: Vec<DateOrDateTime>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recurrence_id: Option<RecurrenceId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub related_to: Vec<RelatedTo>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl CommonProperties {
    /// Fresh properties with a generated uid, stamped at `now`.
    #[must_use]
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            uid: Some(uuid::Uuid::new_v4().to_string()),
            dtstamp: now,
            dtstart: None,
            rrule: None,
            rdate: Vec::new(),
            exdate: Vec::new(),
            recurrence_id: None,
            sequence: None,
            created: None,
            last_modified: None,
            related_to: Vec::new(),
            summary: None,
            description: None,
        }
    }

    /// Whether the item expands into more than its own dtstart.
    #[must_use]
    pub fn is_recurring(&self) -> bool {
        self.rrule.is_some() || !self.rdate.is_empty()
    }

    /// Uids this item names as its parent.
    pub fn parent_uids(&self) -> impl Iterator<Item = &str> {
        self.related_to
            .iter()
            .filter(|rel| rel.reltype == RelationshipType::Parent)
            .map(|rel| rel.uid.as_str())
    }

    pub(crate) fn apply(&mut self, patch: &CommonPatch) {
        if let Some(dtstamp) = patch.dtstamp {
            self.dtstamp = dtstamp;
        }
        if let Some(dtstart) = patch.dtstart {
            self.dtstart = Some(dtstart);
        }
        if let Some(rrule) = &patch.rrule {
            self.rrule.clone_from(rrule);
        }
        if let Some(rdate) = &patch.rdate {
            self.rdate.clone_from(rdate);
        }
        if let Some(exdate) = &patch.exdate {
            self.exdate.clone_from(exdate);
        }
        if let Some(related_to) = &patch.related_to {
            self.related_to.clone_from(related_to);
        }
        if let Some(summary) = &patch.summary {
            self.summary.clone_from(summary);
        }
        if let Some(description) = &patch.description {
            self.description.clone_from(description);
        }
    }
}

/// Sparse update of [`CommonProperties`].
///
/// `None` leaves a field untouched. Fields that may be cleared are doubly
/// optional: `Some(None)` clears them.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommonPatch {
    pub dtstamp: Option<DateTime<Utc>>,
    pub dtstart: Option<DateOrDateTime>,
    pub rrule: Option<Option<RecurrenceRule>>,
    pub rdate: Option<Vec<DateOrDateTime>>,
    pub exdate: Option<Vec<DateOrDateTime>>,
    pub related_to: Option<Vec<RelatedTo>>,
    pub summary: Option<Option<String>>,
    pub description: Option<Option<String>>,
}

/// Default length of an item that states neither an end nor a duration
/// (RFC 5545 §3.6.1): one day for DATE starts, zero for DATE-TIME starts.
#[must_use]
pub fn default_duration(start: &DateOrDateTime) -> TimeDelta {
    if start.is_date() {
        TimeDelta::days(1)
    } else {
        TimeDelta::zero()
    }
}

/// Uniform view over events, to-dos and journal entries.
///
/// Kind-specific behaviour is limited to the end property, sparse patching
/// and the defaults applied when an item is first stored.
pub trait CalendarItem: Clone + fmt::Debug + 'static {
    type Patch: Clone + Default + fmt::Debug;

    const KIND: ItemKind;

    fn common(&self) -> &CommonProperties;

    fn common_mut(&mut self) -> &mut CommonProperties;

    /// The explicit end (DTEND or DUE), if any.
    fn end(&self) -> Option<&DateOrDateTime>;

    /// Replaces the explicit end. Kinds without one ignore the call.
    fn set_end(&mut self, end: Option<DateOrDateTime>);

    /// The explicit DURATION, if any.
    fn duration(&self) -> Option<TimeDelta>;

    /// Properties of `patch` shared by all kinds.
    fn patch_common(patch: &Self::Patch) -> &CommonPatch;

    /// Applies every field set in `patch`, leaving the rest untouched.
    fn apply_patch(&mut self, patch: &Self::Patch);

    /// ## Summary
    /// Fills in the kind-specific defaults an item needs before it is stored.
    ///
    /// ## Errors
    /// Returns `RfcError::MissingDtstart` when the kind cannot derive a start.
    fn prepare_for_add(&mut self, now: DateTime<Utc>) -> RfcResult<()>;

    fn uid(&self) -> Option<&str> {
        self.common().uid.as_deref()
    }

    fn dtstart(&self) -> Option<&DateOrDateTime> {
        self.common().dtstart.as_ref()
    }

    fn rrule(&self) -> Option<&RecurrenceRule> {
        self.common().rrule.as_ref()
    }

    fn recurrence_id(&self) -> Option<&RecurrenceId> {
        self.common().recurrence_id.as_ref()
    }

    /// ## Summary
    /// Length shared by every occurrence of this item.
    ///
    /// Uses DURATION when present, else the distance from dtstart to the
    /// explicit end, else the kind-independent default.
    ///
    /// ## Errors
    /// Returns `RfcError::InvalidDuration` if dtstart and end cannot be
    /// compared.
    fn computed_duration(&self) -> RfcResult<TimeDelta> {
        if let Some(duration) = self.duration() {
            return Ok(duration);
        }
        let Some(start) = self.dtstart() else {
            return Ok(TimeDelta::zero());
        };
        match self.end() {
            Some(end) => end.duration_since(start),
            None => Ok(default_duration(start)),
        }
    }

    /// ## Summary
    /// Copy of this item standing in for the occurrence at `start`.
    ///
    /// The explicit end is only rewritten when the item carries one;
    /// items expressed with DURATION keep it.
    #[must_use]
    fn with_occurrence(
        &self,
        start: DateOrDateTime,
        end: DateOrDateTime,
        recurrence_id: RecurrenceId,
    ) -> Self {
        let mut occurrence = self.clone();
        let common = occurrence.common_mut();
        common.dtstart = Some(start);
        common.recurrence_id = Some(recurrence_id);
        if occurrence.end().is_some() {
            occurrence.set_end(Some(end));
        }
        occurrence
    }

    /// ## Summary
    /// The absolute span this item covers, with floating and DATE values
    /// anchored in `fallback`.
    ///
    /// Returns `None` when the item has neither a start nor an end.
    ///
    /// ## Errors
    /// Returns `RfcError::InvalidDuration` if the end cannot be derived.
    fn timespan(&self, fallback: Tz) -> RfcResult<Option<Timespan>> {
        let Some(start) = self.dtstart() else {
            return Ok(self.end().map(|end| Timespan::of(end, end, fallback)));
        };
        let end = match self.end() {
            Some(end) => *end,
            None => {
                let duration = self.computed_duration()?;
                start.checked_add(duration).ok_or_else(|| {
                    RfcError::InvalidDuration(format!("{start} plus {duration} overflows"))
                })?
            }
        };
        Ok(Some(Timespan::of(start, &end, fallback)))
    }
}
