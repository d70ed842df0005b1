//! VJOURNAL (RFC 5545 §3.6.3).

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use super::item::{CalendarItem, CommonPatch, CommonProperties};
use super::{DateOrDateTime, ItemKind};
use crate::error::RfcResult;

/// A journal entry. It has no end; dated entries cover their whole day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Journal {
    #[serde(flatten)]
    pub common: CommonProperties,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub categories: Vec<String>,
}

impl Journal {
    #[must_use]
    pub fn new() -> Self {
        Self {
            common: CommonProperties::new(Utc::now()),
            categories: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.common.summary = Some(summary.into());
        self
    }

    #[must_use]
    pub fn with_dtstart(mut self, dtstart: impl Into<DateOrDateTime>) -> Self {
        self.common.dtstart = Some(dtstart.into());
        self
    }
}

impl Default for Journal {
    fn default() -> Self {
        Self::new()
    }
}

/// Sparse update of a [`Journal`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct JournalPatch {
    pub common: CommonPatch,
    pub categories: Option<Vec<String>>,
}

impl CalendarItem for Journal {
    type Patch = JournalPatch;

    const KIND: ItemKind = ItemKind::Journal;

    fn common(&self) -> &CommonProperties {
        &self.common
    }

    fn common_mut(&mut self) -> &mut CommonProperties {
        &mut self.common
    }

    fn end(&self) -> Option<&DateOrDateTime> {
        None
    }

    fn set_end(&mut self, _end: Option<DateOrDateTime>) {}

    fn duration(&self) -> Option<TimeDelta> {
        None
    }

    fn patch_common(patch: &JournalPatch) -> &CommonPatch {
        &patch.common
    }

    fn apply_patch(&mut self, patch: &JournalPatch) {
        self.common.apply(&patch.common);
        if let Some(categories) = &patch.categories {
            self.categories.clone_from(categories);
        }
    }

    fn prepare_for_add(&mut self, now: DateTime<Utc>) -> RfcResult<()> {
        if self.common.dtstart.is_none() {
            self.common.dtstart = Some(now.into());
        }
        Ok(())
    }
}
