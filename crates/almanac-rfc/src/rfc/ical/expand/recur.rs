//! Turning one recurring item into a stream of lazily built occurrences.

use std::collections::HashSet;
use std::fmt;
use std::rc::Rc;

use chrono::TimeDelta;
use chrono_tz::Tz;

use super::{LazySortableItem, OccurrenceIter, RecurrenceGenerator, Timespan, check_compatible};
use crate::error::{RfcError, RfcResult};
use crate::rfc::ical::core::{CalendarItem, DateOrDateTime, RecurrenceId, RecurrenceRule};

/// An occurrence keyed by its span, built on demand.
pub type OccurrenceItem<T> = LazySortableItem<Timespan, T>;

/// Shared handle to the generator collaborator.
pub type SharedGenerator = Rc<dyn RecurrenceGenerator>;

/// Builds occurrences of one recurring item.
///
/// The item's duration is computed once and reused for every occurrence.
pub struct RecurrenceAdapter<T> {
    item: Rc<T>,
    duration: TimeDelta,
    fallback: Tz,
}

impl<T: CalendarItem> RecurrenceAdapter<T> {
    /// ## Summary
    /// Prepares `item` for expansion.
    ///
    /// ## Errors
    /// Returns `RfcError::InvalidDuration` if the item's duration cannot be
    /// derived from its start and end.
    pub fn new(item: Rc<T>, fallback: Tz) -> RfcResult<Self> {
        let duration = item.computed_duration()?;
        Ok(Self {
            item,
            duration,
            fallback,
        })
    }

    #[must_use]
    pub fn item(&self) -> &T {
        &self.item
    }

    /// ## Summary
    /// The occurrence starting at `start`.
    ///
    /// Only the span is computed here; the copy of the item is made when
    /// the returned value is consumed.
    ///
    /// ## Errors
    /// Returns `RfcError::InvalidDuration` if the end overflows.
    pub fn occurrence(&self, start: DateOrDateTime) -> RfcResult<OccurrenceItem<T>> {
        let end = start.checked_add(self.duration).ok_or_else(|| {
            RfcError::InvalidDuration(format!("{start} plus {} overflows", self.duration))
        })?;
        let span = Timespan::of(&start, &end, self.fallback);
        let item = Rc::clone(&self.item);
        Ok(LazySortableItem::new(span, move || {
            item.with_occurrence(start, end, RecurrenceId::from_value(&start))
        }))
    }
}

impl<T: fmt::Debug> fmt::Debug for RecurrenceAdapter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecurrenceAdapter")
            .field("item", &self.item)
            .field("duration", &self.duration)
            .field("fallback", &self.fallback)
            .finish()
    }
}

/// Drops candidate starts that an exception item overrides.
pub struct OverrideFilter {
    inner: OccurrenceIter,
    overridden: HashSet<RecurrenceId>,
}

impl OverrideFilter {
    #[must_use]
    pub fn new(inner: OccurrenceIter, overridden: HashSet<RecurrenceId>) -> Self {
        Self { inner, overridden }
    }
}

impl Iterator for OverrideFilter {
    type Item = RfcResult<DateOrDateTime>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let candidate = self.inner.next()?;
            if let Ok(start) = &candidate
                && self.overridden.contains(&RecurrenceId::from_value(start))
            {
                tracing::trace!(occurrence = %start, "Skipping overridden occurrence");
                continue;
            }
            return Some(candidate);
        }
    }
}

/// Occurrences of one recurring item, ascending by span.
///
/// The generator is not consulted until the first element is requested.
pub struct RecurIterable<T> {
    adapter: RecurrenceAdapter<T>,
    generator: SharedGenerator,
    overridden: HashSet<RecurrenceId>,
    dates: Option<OccurrenceIter>,
    done: bool,
}

impl<T: CalendarItem> RecurIterable<T> {
    #[must_use]
    pub fn new(adapter: RecurrenceAdapter<T>, generator: SharedGenerator) -> Self {
        Self {
            adapter,
            generator,
            overridden: HashSet::new(),
            dates: None,
            done: false,
        }
    }

    /// Skips the occurrences named in `overridden`.
    #[must_use]
    pub fn with_overrides(mut self, overridden: HashSet<RecurrenceId>) -> Self {
        self.overridden = overridden;
        self
    }

    fn start(&self) -> RfcResult<OccurrenceIter> {
        let item = self.adapter.item();
        let common = item.common();
        let anchor = common
            .dtstart
            .ok_or_else(|| RfcError::MissingDtstart(common.uid.clone().unwrap_or_default()))?;
        let dates = self.generator.occurrences(
            &anchor,
            common.rrule.as_ref(),
            &common.rdate,
            &common.exdate,
        )?;
        if self.overridden.is_empty() {
            Ok(dates)
        } else {
            Ok(Box::new(OverrideFilter::new(dates, self.overridden.clone())))
        }
    }
}

impl<T: CalendarItem> Iterator for RecurIterable<T> {
    type Item = RfcResult<OccurrenceItem<T>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        if self.dates.is_none() {
            match self.start() {
                Ok(dates) => self.dates = Some(dates),
                Err(err) => {
                    self.done = true;
                    return Some(Err(err));
                }
            }
        }
        match self.dates.as_mut()?.next()? {
            Ok(start) => Some(self.adapter.occurrence(start)),
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}

/// ## Summary
/// Whether the series of `item` (rule, rdates and exdates applied)
/// produces the occurrence named by `recurrence_id`.
///
/// ## Errors
/// Propagates generator failures and malformed recurrence ids.
pub fn occurs_at<T: CalendarItem>(
    generator: &dyn RecurrenceGenerator,
    item: &T,
    recurrence_id: &RecurrenceId,
) -> RfcResult<bool> {
    let common = item.common();
    let Some(anchor) = common.dtstart else {
        return Ok(false);
    };
    let target = recurrence_id.to_value_like(&anchor)?.ordering_key();
    let starts =
        generator.occurrences(&anchor, common.rrule.as_ref(), &common.rdate, &common.exdate)?;
    for start in starts {
        let start = start?;
        if start.ordering_key() > target {
            break;
        }
        if recurrence_id.matches(&start) {
            return Ok(true);
        }
    }
    Ok(false)
}

/// ## Summary
/// Counts the occurrences `anchor` and `rule` alone produce strictly before
/// `before`, ignoring any rdates and exdates.
///
/// ## Errors
/// Propagates generator failures.
pub fn occurrences_before(
    generator: &dyn RecurrenceGenerator,
    anchor: &DateOrDateTime,
    rule: &RecurrenceRule,
    before: &DateOrDateTime,
) -> RfcResult<u32> {
    let limit = if check_compatible(anchor, before).is_ok() {
        before.ordering_key()
    } else {
        before.realign(anchor).ordering_key()
    };
    let mut count = 0_u32;
    for start in generator.occurrences(anchor, Some(rule), &[], &[])? {
        if start?.ordering_key() >= limit {
            break;
        }
        count = count.saturating_add(1);
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rfc::ical::core::Event;
    use crate::rfc::ical::expand::{RRuleGenerator, SortableItem};
    use chrono::{NaiveDate, TimeZone, Utc};

    fn day(d: u32) -> DateOrDateTime {
        NaiveDate::from_ymd_opt(2026, 1, d).unwrap().into()
    }

    fn generator() -> SharedGenerator {
        Rc::new(RRuleGenerator::default())
    }

    fn daily_event(count: u32) -> Event {
        let mut event = Event::new(Utc.with_ymd_and_hms(2026, 1, 1, 9, 0, 0).unwrap().into());
        event.dtend = Some(Utc.with_ymd_and_hms(2026, 1, 1, 10, 0, 0).unwrap().into());
        event.common.rrule = Some(RecurrenceRule::daily().with_count(count));
        event
    }

    #[test]
    fn occurrences_carry_shifted_end_and_recurrence_id() {
        let adapter = RecurrenceAdapter::new(Rc::new(daily_event(3)), Tz::UTC).unwrap();
        let items: Vec<Event> = RecurIterable::new(adapter, generator())
            .map(|item| item.unwrap().into_value())
            .collect();

        assert_eq!(items.len(), 3);
        assert_eq!(
            items[2].dtend,
            Some(Utc.with_ymd_and_hms(2026, 1, 3, 10, 0, 0).unwrap().into())
        );
        assert_eq!(
            items[2].common.recurrence_id.as_ref().map(RecurrenceId::as_str),
            Some("20260103T090000")
        );
    }

    #[test]
    fn keys_are_available_before_building() {
        let adapter = RecurrenceAdapter::new(Rc::new(daily_event(2)), Tz::UTC).unwrap();
        let first = RecurIterable::new(adapter, generator()).next().unwrap().unwrap();
        assert_eq!(first.key().end - first.key().start, TimeDelta::hours(1));
    }

    #[test]
    fn override_filter_skips_named_occurrences() {
        let adapter = RecurrenceAdapter::new(Rc::new(daily_event(3)), Tz::UTC).unwrap();
        let overridden = HashSet::from(["20260102T090000".parse::<RecurrenceId>().unwrap()]);
        let starts: Vec<String> = RecurIterable::new(adapter, generator())
            .with_overrides(overridden)
            .map(|item| item.unwrap().into_value().common.dtstart.unwrap().to_string())
            .collect();
        assert_eq!(starts, vec!["20260101T090000Z", "20260103T090000Z"]);
    }

    #[test]
    fn indeterminate_duration_fails_up_front() {
        let mut event = daily_event(3);
        event.dtend = Some(day(2));
        assert!(RecurrenceAdapter::new(Rc::new(event), Tz::UTC).is_err());
    }

    #[test]
    fn generator_errors_surface_while_iterating() {
        let mut event = daily_event(3);
        event.common.exdate = vec![day(2)];
        let adapter = RecurrenceAdapter::new(Rc::new(event), Tz::UTC).unwrap();
        let mut iter = RecurIterable::new(adapter, generator());
        assert!(matches!(iter.next(), Some(Err(RfcError::Generator(_)))));
        assert!(iter.next().is_none());
    }

    #[test]
    fn occurs_at_respects_exdates() {
        let mut event = daily_event(5);
        let rid: RecurrenceId = "20260103T090000".parse().unwrap();
        assert!(occurs_at(&RRuleGenerator::default(), &event, &rid).unwrap());

        event.common.exdate = vec![Utc.with_ymd_and_hms(2026, 1, 3, 9, 0, 0).unwrap().into()];
        assert!(!occurs_at(&RRuleGenerator::default(), &event, &rid).unwrap());

        let outside: RecurrenceId = "20260110T090000".parse().unwrap();
        assert!(!occurs_at(&RRuleGenerator::default(), &event, &outside).unwrap());
    }

    #[test]
    fn counts_occurrences_before_a_start() {
        let rule = RecurrenceRule::daily().with_count(10);
        let count =
            occurrences_before(&RRuleGenerator::default(), &day(1), &rule, &day(4)).unwrap();
        assert_eq!(count, 3);
    }
}
