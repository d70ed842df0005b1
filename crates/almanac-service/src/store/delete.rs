//! Whole-series and per-occurrence removal.

use std::collections::{BTreeSet, HashSet};

use chrono::{DateTime, TimeDelta, Utc};

use almanac_rfc::error::RfcError;
use almanac_rfc::rfc::ical::core::{CalendarItem, DateOrDateTime, RecurrenceId};
use almanac_rfc::rfc::ical::expand::{SeriesRole, TimezoneProvider};

use super::{Range, Store, describe};
use crate::error::{ServiceError, ServiceResult};

/// What happens to one stored item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Removal {
    /// The item leaves the list.
    Remove,
    /// The occurrence at this start is excluded from the item's series.
    Exclude(DateOrDateTime),
    /// The series ends before `target`, last allowed start `until`.
    Truncate {
        target: DateOrDateTime,
        until: DateOrDateTime,
    },
}

impl<T: CalendarItem, P: TimezoneProvider> Store<'_, T, P> {
    /// ## Summary
    /// Deletes a series, one occurrence of it, or an occurrence and every
    /// later one.
    ///
    /// Items naming a deleted item as their parent are removed as well,
    /// recursively.
    ///
    /// ## Side Effects
    /// - Removes matched items and their descendants
    /// - For a single occurrence, adds it to the series' EXDATE list
    /// - For an occurrence and its successors, bounds the series' rule to
    ///   end the day before and drops later exceptions and forks
    ///
    /// ## Errors
    /// Returns `ServiceError::NotFound` if nothing matches. Nothing is
    /// changed on error.
    #[tracing::instrument(skip(self), fields(kind = %T::KIND))]
    pub fn delete(
        &mut self,
        uid: &str,
        recurrence_id: Option<&RecurrenceId>,
        range: Range,
    ) -> ServiceResult<()> {
        let matched = self.matching(uid, recurrence_id)?;
        if matched.is_empty() {
            tracing::warn!("Nothing to delete");
            return Err(ServiceError::NotFound(describe(uid, recurrence_id)));
        }

        let mut plan = self.plan_removal(uid, &matched, recurrence_id, range)?;
        if let (Some(rid), Range::ThisAndFuture) = (recurrence_id, range) {
            for index in self.later_members(uid, rid, SeriesRole::Fork)? {
                mark_removed(&mut plan, index);
            }
        }
        let descendants = self.descendants(uid);
        let now = (self.clock)();
        let removed = self.apply_removal(&plan, &descendants, now);
        tracing::debug!(
            matched = matched.len(),
            removed = removed.len(),
            cascaded = descendants.len(),
            "Deleted"
        );
        Ok(())
    }

    /// ## Summary
    /// Decides what happens to each matched item, without changing anything.
    ///
    /// Naming the first occurrence of a series with [`Range::ThisAndFuture`]
    /// removes the series outright. With that range, exceptions of the
    /// series at or after the target are removed as well.
    ///
    /// ## Errors
    /// Returns an error if the recurrence id cannot be read in the series'
    /// value type or the day before it does not exist.
    pub(super) fn plan_removal(
        &self,
        uid: &str,
        matched: &[usize],
        recurrence_id: Option<&RecurrenceId>,
        range: Range,
    ) -> ServiceResult<Vec<(usize, Removal)>> {
        let mut plan = Vec::with_capacity(matched.len());
        for &index in matched {
            let item = &self.items[index];
            let (Some(rid), Some(anchor), true) = (
                recurrence_id,
                item.dtstart().copied(),
                item.common().is_recurring(),
            ) else {
                plan.push((index, Removal::Remove));
                continue;
            };

            if range == Range::ThisAndFuture && RecurrenceId::from_value(&anchor) == *rid {
                tracing::trace!(index, "Recurrence id is the series start, removing series");
                plan.push((index, Removal::Remove));
                continue;
            }

            let target = rid.to_value_like(&anchor)?;
            let removal = match range {
                Range::This => Removal::Exclude(target),
                Range::ThisAndFuture => {
                    let until = target.checked_add(TimeDelta::days(-1)).ok_or_else(|| {
                        RfcError::InvalidRecurrenceId(format!("{rid}: no preceding day"))
                    })?;
                    Removal::Truncate { target, until }
                }
            };
            plan.push((index, removal));
        }

        if let (Some(rid), Range::ThisAndFuture) = (recurrence_id, range) {
            for index in self.later_members(uid, rid, SeriesRole::Exception)? {
                mark_removed(&mut plan, index);
            }
        }
        Ok(plan)
    }

    /// ## Summary
    /// Indices of the members of `uid` playing `role` whose own recurrence
    /// id is at or after `recurrence_id`.
    ///
    /// ## Errors
    /// Returns an error if `recurrence_id` cannot be read as a value.
    fn later_members(
        &self,
        uid: &str,
        recurrence_id: &RecurrenceId,
        role: SeriesRole,
    ) -> ServiceResult<Vec<usize>> {
        let cutoff = recurrence_id.to_value()?.ordering_key();
        Ok(self
            .items
            .iter()
            .enumerate()
            .filter(|(_, item)| item.uid() == Some(uid) && SeriesRole::of(*item) == role)
            .filter(|(_, item)| {
                item.recurrence_id()
                    .and_then(|own| own.to_value().ok())
                    .is_some_and(|own| own.ordering_key() >= cutoff)
            })
            .map(|(index, _)| index)
            .collect())
    }

    /// Indices of every item descending from `uid` through PARENT
    /// relationships, excluding members of the series itself.
    pub(super) fn descendants(&self, uid: &str) -> BTreeSet<usize> {
        let mut visited: HashSet<&str> = HashSet::from([uid]);
        let mut frontier = vec![uid];
        let mut found = BTreeSet::new();

        while let Some(parent) = frontier.pop() {
            for (index, item) in self.items.iter().enumerate() {
                if !item.common().parent_uids().any(|named| named == parent) {
                    continue;
                }
                match item.uid() {
                    Some(child) if child == uid => {}
                    Some(child) => {
                        found.insert(index);
                        if visited.insert(child) {
                            frontier.push(child);
                        }
                    }
                    None => {
                        found.insert(index);
                    }
                }
            }
        }
        found
    }

    /// ## Summary
    /// Carries out `plan` and removes `cascade` as well.
    ///
    /// Returns the original indices of every removed item.
    pub(super) fn apply_removal(
        &mut self,
        plan: &[(usize, Removal)],
        cascade: &BTreeSet<usize>,
        now: DateTime<Utc>,
    ) -> BTreeSet<usize> {
        let mut removed = cascade.clone();
        for &(index, removal) in plan {
            let common = self.items[index].common_mut();
            match removal {
                Removal::Remove => {
                    removed.insert(index);
                }
                Removal::Exclude(date) => {
                    let key = date.ordering_key();
                    if !common.exdate.iter().any(|excluded| excluded.ordering_key() == key) {
                        common.exdate.push(date);
                    }
                }
                Removal::Truncate { target, until } => {
                    if let Some(rule) = &mut common.rrule {
                        rule.count = None;
                        rule.until = Some(until);
                    }
                    let cutoff = target.ordering_key();
                    common.rdate.retain(|date| date.ordering_key() < cutoff);
                    common.dtstamp = now;
                    common.last_modified = Some(now);
                }
            }
        }

        let mut position = 0;
        self.items.retain(|_| {
            let keep = !removed.contains(&position);
            position += 1;
            keep
        });
        removed
    }
}

/// Plans `index` for outright removal, overriding any milder plan for it.
fn mark_removed(plan: &mut Vec<(usize, Removal)>, index: usize) {
    match plan.iter_mut().find(|(planned, _)| *planned == index) {
        Some((_, removal)) => *removal = Removal::Remove,
        None => plan.push((index, Removal::Remove)),
    }
}
