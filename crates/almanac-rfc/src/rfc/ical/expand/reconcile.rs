//! Load-time folding of exceptions into their parent's exclusions.
//!
//! Once every exception's occurrence is listed in the parent's EXDATE, plain
//! expansion of the parent no longer produces the overridden occurrences and
//! read paths need no override awareness.

use std::collections::HashMap;

use super::SeriesRole;
use crate::rfc::ical::core::{CalendarItem, RecurrenceId};

/// ## Summary
/// Adds each exception's occurrence to its parent's EXDATE list.
///
/// Items are grouped by uid. Forks are independent series and contribute
/// nothing. Exclusions already present are not added again, so running
/// this more than once is harmless. Returns the number of exclusions added.
#[tracing::instrument(skip(items), fields(kind = %T::KIND, count = items.len()))]
pub fn reconcile_recurrences<T: CalendarItem>(items: &mut [T]) -> usize {
    let folds = exception_folds(items);

    let mut added = 0;
    for (parent, rid) in folds {
        let common = items[parent].common_mut();
        let Some(anchor) = common.dtstart else {
            continue;
        };
        if common.exdate.iter().any(|date| rid.matches(date)) {
            continue;
        }
        match rid.to_value_like(&anchor) {
            Ok(date) => {
                tracing::trace!(recurrence_id = %rid, "Excluding overridden occurrence");
                common.exdate.push(date);
                added += 1;
            }
            Err(err) => {
                tracing::warn!(
                    recurrence_id = %rid,
                    error = %err,
                    "Ignoring malformed recurrence id"
                );
            }
        }
    }
    added
}

/// Pairs each exception's recurrence id with the index of its parent.
fn exception_folds<T: CalendarItem>(items: &[T]) -> Vec<(usize, RecurrenceId)> {
    let mut groups: HashMap<&str, Vec<usize>> = HashMap::new();
    for (index, item) in items.iter().enumerate() {
        if let Some(uid) = item.uid() {
            groups.entry(uid).or_default().push(index);
        }
    }

    let mut folds = Vec::new();
    for members in groups.values() {
        let Some(&parent) = members
            .iter()
            .find(|&&index| SeriesRole::of(&items[index]) == SeriesRole::Parent)
        else {
            continue;
        };
        folds.extend(
            members
                .iter()
                .filter(|&&index| SeriesRole::of(&items[index]) == SeriesRole::Exception)
                .filter_map(|&index| items[index].recurrence_id().cloned())
                .map(|rid| (parent, rid)),
        );
    }
    folds
}
