//! Replacing a series, one occurrence of it, or an occurrence and its
//! successors.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};

use almanac_rfc::error::RfcError;
use almanac_rfc::rfc::ical::core::{CalendarItem, DateOrDateTime, RecurrenceId};
use almanac_rfc::rfc::ical::expand::{SeriesRole, TimezoneProvider, occurrences_before};

use super::{Range, Store, describe, primary_match, validate_relationships};
use crate::error::{ServiceError, ServiceResult};

impl<T: CalendarItem, P: TimezoneProvider> Store<'_, T, P> {
    /// ## Summary
    /// Applies the sparse `patch` to a series or to part of it.
    ///
    /// Without a recurrence id the whole series is replaced and its
    /// exceptions and forks are dropped. With one, the occurrence is split
    /// off: [`Range::This`] produces a single-instance exception,
    /// [`Range::ThisAndFuture`] a forked series starting at the occurrence
    /// whose count keeps the overall number of occurrences. Naming the
    /// first occurrence with [`Range::ThisAndFuture`] edits the whole series.
    ///
    /// Every update, forks included, bumps `sequence`, carries the stored
    /// `dtstamp` over as `created` and stamps `dtstamp` and `last_modified` with the patch's
    /// `dtstamp`, or the current time when the patch has none.
    ///
    /// ## Side Effects
    /// - Removes or bounds the original as [`Store::delete`] would, without
    ///   touching related items or forks that start later
    /// - Inserts the update at the original's position
    /// - May append a timezone definition to the roster
    ///
    /// ## Errors
    /// Returns an error if:
    /// - nothing matches
    /// - the patch changes the rule of a single occurrence
    /// - the update carries a relationship other than PARENT
    /// - the update's timezone cannot be resolved
    /// - the original series cannot be expanded
    ///
    /// Nothing is changed on error.
    #[tracing::instrument(skip(self, patch), fields(kind = %T::KIND))]
    pub fn edit(
        &mut self,
        uid: &str,
        patch: &T::Patch,
        recurrence_id: Option<&RecurrenceId>,
        range: Range,
    ) -> ServiceResult<()> {
        let now = (self.clock)();
        let mut target = recurrence_id;
        let mut matched = self.matching(uid, target)?;
        let Some(mut primary) = primary_match(self.items.as_slice(), &matched, target) else {
            tracing::warn!("Nothing to edit");
            return Err(ServiceError::NotFound(describe(uid, recurrence_id)));
        };

        if range == Range::ThisAndFuture
            && let Some(rid) = target
            && let Some(parent) = series_parent(self.items.as_slice(), uid)
            && starts_series(&self.items[parent], rid)
        {
            tracing::debug!("Recurrence id is the series start, editing whole series");
            target = None;
            matched = self.matching(uid, None)?;
            primary = parent;
        }

        let mut update = self.build_update(&self.items[primary], patch, target, range, now)?;
        if target.is_none() && T::patch_common(patch).exdate.is_none() {
            release_overridden(&mut update, self.items.as_slice(), &matched);
        }
        validate_relationships(&update)?;
        let plan = self.plan_removal(uid, &matched, target, range)?;
        self.ensure_timezone(update.dtstart().and_then(DateOrDateTime::tz_key))?;

        let removed = self.apply_removal(&plan, &BTreeSet::new(), now);
        let shift = removed.range(..primary).count();
        let position = (primary - shift).min(self.items.len());
        self.items.insert(position, update);

        tracing::debug!(
            position,
            removed = removed.len(),
            forked = target.is_some(),
            "Edited"
        );
        Ok(())
    }

    /// ## Summary
    /// The item that replaces `stored`.
    ///
    /// ## Errors
    /// Returns `ServiceError::IncompatibleRuleEdit` when a single occurrence
    /// would get a different rule, or an expansion error while counting the
    /// occurrences before a fork.
    fn build_update(
        &self,
        stored: &T,
        patch: &T::Patch,
        recurrence_id: Option<&RecurrenceId>,
        range: Range,
        now: DateTime<Utc>,
    ) -> ServiceResult<T> {
        let common_patch = T::patch_common(patch);
        let stamp = common_patch.dtstamp.unwrap_or(now);

        let mut update = stored.clone();
        update.apply_patch(patch);
        let common = update.common_mut();
        common.created = Some(stored.common().dtstamp);
        common.sequence = Some(stored.common().sequence.unwrap_or(0).saturating_add(1));
        common.last_modified = Some(stamp);
        common.dtstamp = stamp;

        let (Some(rid), Some(anchor), true) = (
            recurrence_id,
            stored.dtstart().copied(),
            stored.common().is_recurring(),
        ) else {
            return Ok(update);
        };
        let occurrence = rid.to_value_like(&anchor)?;
        let cutoff = occurrence.ordering_key();

        match range {
            Range::This => {
                if let Some(Some(rule)) = &common_patch.rrule
                    && stored.rrule() != Some(rule)
                {
                    tracing::warn!(rule = %rule, "Rejected rule change on a single occurrence");
                    return Err(ServiceError::IncompatibleRuleEdit(describe(
                        stored.uid().unwrap_or_default(),
                        Some(rid),
                    )));
                }
                let common = update.common_mut();
                common.rrule = None;
                common.rdate.clear();
                common.exdate.clear();
            }
            Range::ThisAndFuture => {
                let before = match stored.rrule() {
                    Some(original) => {
                        occurrences_before(self.generator.as_ref(), &anchor, original, &occurrence)?
                    }
                    None => 0,
                };
                let common = update.common_mut();
                if let Some(rule) = &mut common.rrule
                    && let Some(count) = rule.count
                {
                    rule.count = Some(count.saturating_sub(before).max(1));
                    tracing::trace!(count, before, "Carried count over to fork");
                }
                common.rdate.retain(|date| date.ordering_key() >= cutoff);
                common.exdate.retain(|date| date.ordering_key() >= cutoff);
            }
        }

        let start = common_patch.dtstart.unwrap_or(occurrence);
        if stored.end().is_some() && update.end() == stored.end() {
            let duration = stored.computed_duration()?;
            let end = start.checked_add(duration).ok_or_else(|| {
                RfcError::InvalidDuration(format!("{start} + {duration} is out of range"))
            })?;
            update.set_end(Some(end));
        }
        let common = update.common_mut();
        common.dtstart = Some(start);
        common.recurrence_id = Some(rid.clone());
        Ok(update)
    }
}

/// Drops the exclusions a whole-series update inherited from the
/// exceptions it replaces, so their occurrences are generated again.
fn release_overridden<T: CalendarItem>(update: &mut T, items: &[T], matched: &[usize]) {
    let overridden: Vec<&RecurrenceId> = matched
        .iter()
        .map(|&index| &items[index])
        .filter(|item| SeriesRole::of(*item) == SeriesRole::Exception)
        .filter_map(CalendarItem::recurrence_id)
        .collect();
    if overridden.is_empty() {
        return;
    }
    update
        .common_mut()
        .exdate
        .retain(|date| !overridden.iter().any(|rid| rid.matches(date)));
    tracing::trace!(released = overridden.len(), "Released exclusions of replaced exceptions");
}

/// Index of the recurring item heading the series `uid`.
///
/// The first occurrence may already be overridden by an exception, so the
/// parent is looked up directly rather than through the matches.
fn series_parent<T: CalendarItem>(items: &[T], uid: &str) -> Option<usize> {
    items
        .iter()
        .position(|item| item.uid() == Some(uid) && SeriesRole::of(item) == SeriesRole::Parent)
}

/// Whether `rid` names the first occurrence of the series `item` heads.
fn starts_series<T: CalendarItem>(item: &T, rid: &RecurrenceId) -> bool {
    item.recurrence_id().is_none()
        && item
            .dtstart()
            .is_some_and(|start| RecurrenceId::from_value(start) == *rid)
}
