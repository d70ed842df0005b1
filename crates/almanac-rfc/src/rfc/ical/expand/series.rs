//! Grouping items into series and turning each series into sorted sources.

use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use chrono_tz::Tz;

use super::{
    LazySortableItem, OccurrenceItem, RecurIterable, RecurrenceAdapter, SharedGenerator,
    SortedSource,
};
use crate::error::{RfcError, RfcResult};
use crate::rfc::ical::core::{CalendarItem, RecurrenceId};

/// The part an item plays within its series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SeriesRole {
    /// Recurs and names no occurrence: the series itself.
    Parent,
    /// Names one occurrence and replaces it.
    Exception,
    /// Recurs from one occurrence onward, independent of the parent.
    Fork,
    /// Neither recurs nor names an occurrence.
    Single,
}

impl SeriesRole {
    #[must_use]
    pub fn of<T: CalendarItem>(item: &T) -> Self {
        let common = item.common();
        match (common.is_recurring(), common.recurrence_id.is_some()) {
            (true, false) => Self::Parent,
            (false, true) => Self::Exception,
            (true, true) => Self::Fork,
            (false, false) => Self::Single,
        }
    }
}

/// All items sharing a uid, in document order.
#[derive(Debug, Clone)]
pub struct SeriesGroup<T> {
    pub uid: String,
    pub members: Vec<Rc<T>>,
}

impl<T: CalendarItem> SeriesGroup<T> {
    /// Recurrence ids of the group's exceptions.
    #[must_use]
    pub fn overridden(&self) -> HashSet<RecurrenceId> {
        self.members
            .iter()
            .filter(|member| SeriesRole::of(member.as_ref()) == SeriesRole::Exception)
            .filter_map(|member| member.recurrence_id().cloned())
            .collect()
    }

    /// ## Summary
    /// One ascending source per member.
    ///
    /// Members that do not recur become a single prebuilt item. Recurring
    /// members expand through `generator`, skipping occurrences that one of
    /// the group's exceptions replaces.
    ///
    /// ## Errors
    /// Returns an error if a recurring member has no start or an
    /// indeterminate duration, or a single member's span cannot be derived.
    pub fn sources(
        &self,
        fallback: Tz,
        generator: &SharedGenerator,
    ) -> RfcResult<Vec<SortedSource<OccurrenceItem<T>, RfcError>>> {
        let overridden = self.overridden();
        let mut sources: Vec<SortedSource<OccurrenceItem<T>, RfcError>> =
            Vec::with_capacity(self.members.len());

        for member in &self.members {
            match SeriesRole::of(member.as_ref()) {
                SeriesRole::Parent | SeriesRole::Fork => {
                    if member.dtstart().is_none() {
                        return Err(RfcError::MissingDtstart(self.uid.clone()));
                    }
                    let adapter = RecurrenceAdapter::new(Rc::clone(member), fallback)?;
                    sources.push(Box::new(
                        RecurIterable::new(adapter, Rc::clone(generator))
                            .with_overrides(overridden.clone()),
                    ));
                }
                SeriesRole::Exception | SeriesRole::Single => {
                    let Some(span) = member.timespan(fallback)? else {
                        tracing::trace!(uid = %self.uid, "Skipping item without start or end");
                        continue;
                    };
                    let item = member.as_ref().clone();
                    sources.push(Box::new(std::iter::once(Ok(LazySortableItem::ready(
                        span, item,
                    )))));
                }
            }
        }
        Ok(sources)
    }
}

/// ## Summary
/// Partitions `items` by uid, keeping groups in order of first appearance.
///
/// ## Errors
/// Returns `RfcError::MissingUid` if any item has no uid.
pub fn group_by_uid<T: CalendarItem>(items: &[T]) -> RfcResult<Vec<SeriesGroup<T>>> {
    let mut groups: Vec<SeriesGroup<T>> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for item in items {
        let uid = item.uid().ok_or(RfcError::MissingUid)?;
        if let Some(&at) = index.get(uid) {
            groups[at].members.push(Rc::new(item.clone()));
        } else {
            index.insert(uid.to_string(), groups.len());
            groups.push(SeriesGroup {
                uid: uid.to_string(),
                members: vec![Rc::new(item.clone())],
            });
        }
    }
    Ok(groups)
}
