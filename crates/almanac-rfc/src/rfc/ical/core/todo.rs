//! VTODO (RFC 5545 §3.6.2).

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use super::item::{CalendarItem, CommonPatch, CommonProperties};
use super::value::duration_seconds;
use super::{DateOrDateTime, ItemKind};
use crate::error::RfcResult;

/// STATUS values allowed on a VTODO.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING-KEBAB-CASE")]
pub enum TodoStatus {
    NeedsAction,
    Completed,
    InProcess,
    Cancelled,
}

/// An action item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Todo {
    #[serde(flatten)]
    pub common: CommonProperties,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due: Option<DateOrDateTime>,

    #[serde(
        default,
        with = "duration_seconds",
        skip_serializing_if = "Option::is_none"
    )]
    pub duration: Option<TimeDelta>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed: Option<DateTime<Utc>>,

    /// 0 is undefined, 1 highest, 9 lowest.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<u8>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub percent_complete: Option<u8>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TodoStatus>,
}

impl Todo {
    /// Creates an unscheduled to-do with a generated uid.
    #[must_use]
    pub fn new() -> Self {
        Self {
            common: CommonProperties::new(Utc::now()),
            due: None,
            duration: None,
            completed: None,
            priority: None,
            percent_complete: None,
            status: None,
        }
    }

    #[must_use]
    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.common.summary = Some(summary.into());
        self
    }

    #[must_use]
    pub fn with_due(mut self, due: impl Into<DateOrDateTime>) -> Self {
        self.due = Some(due.into());
        self
    }
}

impl Default for Todo {
    fn default() -> Self {
        Self::new()
    }
}

/// Sparse update of a [`Todo`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TodoPatch {
    pub common: CommonPatch,
    pub due: Option<Option<DateOrDateTime>>,
    pub duration: Option<Option<TimeDelta>>,
    pub completed: Option<Option<DateTime<Utc>>>,
    pub priority: Option<Option<u8>>,
    pub percent_complete: Option<Option<u8>>,
    pub status: Option<Option<TodoStatus>>,
}

impl CalendarItem for Todo {
    type Patch = TodoPatch;

    const KIND: ItemKind = ItemKind::Todo;

    fn common(&self) -> &CommonProperties {
        &self.common
    }

    fn common_mut(&mut self) -> &mut CommonProperties {
        &mut self.common
    }

    fn end(&self) -> Option<&DateOrDateTime> {
        self.due.as_ref()
    }

    fn set_end(&mut self, end: Option<DateOrDateTime>) {
        self.due = end;
    }

    fn duration(&self) -> Option<TimeDelta> {
        self.duration
    }

    fn patch_common(patch: &TodoPatch) -> &CommonPatch {
        &patch.common
    }

    fn apply_patch(&mut self, patch: &TodoPatch) {
        self.common.apply(&patch.common);
        if let Some(due) = patch.due {
            self.due = due;
        }
        if let Some(duration) = patch.duration {
            self.duration = duration;
        }
        if let Some(completed) = patch.completed {
            self.completed = completed;
        }
        if let Some(priority) = patch.priority {
            self.priority = priority;
        }
        if let Some(percent_complete) = patch.percent_complete {
            self.percent_complete = percent_complete;
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
    }

    /// A to-do without a start is scheduled one day before it is due, or
    /// at `now` when it has no due date either.
    fn prepare_for_add(&mut self, now: DateTime<Utc>) -> RfcResult<()> {
        if self.common.dtstart.is_none() {
            let derived = self
                .due
                .and_then(|due| due.checked_add(TimeDelta::days(-1)))
                .unwrap_or_else(|| now.into());
            tracing::trace!(dtstart = %derived, "Derived to-do start");
            self.common.dtstart = Some(derived);
        }
        Ok(())
    }
}
