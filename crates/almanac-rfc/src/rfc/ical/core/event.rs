//! VEVENT (RFC 5545 §3.6.1).

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use super::item::{CalendarItem, CommonPatch, CommonProperties};
use super::value::duration_seconds;
use super::{DateOrDateTime, ItemKind};
use crate::error::{RfcError, RfcResult};

/// STATUS values allowed on a VEVENT.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EventStatus {
    Tentative,
    Confirmed,
    Cancelled,
}

/// A scheduled event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    #[serde(flatten)]
    pub common: CommonProperties,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dtend: Option<DateOrDateTime>,

    #[serde(
        default,
        with = "duration_seconds",
        skip_serializing_if = "Option::is_none"
    )]
    pub duration: Option<TimeDelta>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<EventStatus>,
}

impl Event {
    /// Creates an event starting at `dtstart` with a generated uid.
    #[must_use]
    pub fn new(dtstart: DateOrDateTime) -> Self {
        let mut common = CommonProperties::new(Utc::now());
        common.dtstart = Some(dtstart);
        Self {
            common,
            dtend: None,
            duration: None,
            location: None,
            status: None,
        }
    }

    #[must_use]
    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.common.summary = Some(summary.into());
        self
    }
}

/// Sparse update of an [`Event`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EventPatch {
    pub common: CommonPatch,
    pub dtend: Option<Option<DateOrDateTime>>,
    pub duration: Option<Option<TimeDelta>>,
    pub location: Option<Option<String>>,
    pub status: Option<Option<EventStatus>>,
}

impl CalendarItem for Event {
    type Patch = EventPatch;

    const KIND: ItemKind = ItemKind::Event;

    fn common(&self) -> &CommonProperties {
        &self.common
    }

    fn common_mut(&mut self) -> &mut CommonProperties {
        &mut self.common
    }

    fn end(&self) -> Option<&DateOrDateTime> {
        self.dtend.as_ref()
    }

    fn set_end(&mut self, end: Option<DateOrDateTime>) {
        self.dtend = end;
    }

    fn duration(&self) -> Option<TimeDelta> {
        self.duration
    }

    fn patch_common(patch: &EventPatch) -> &CommonPatch {
        &patch.common
    }

    fn apply_patch(&mut self, patch: &EventPatch) {
        self.common.apply(&patch.common);
        if let Some(dtend) = patch.dtend {
            self.dtend = dtend;
        }
        if let Some(duration) = patch.duration {
            self.duration = duration;
        }
        if let Some(location) = &patch.location {
            self.location.clone_from(location);
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
    }

    fn prepare_for_add(&mut self, _now: DateTime<Utc>) -> RfcResult<()> {
        if self.common.dtstart.is_none() {
            return Err(RfcError::MissingDtstart(
                self.common.uid.clone().unwrap_or_default(),
            ));
        }
        Ok(())
    }
}
