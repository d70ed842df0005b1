//! Time-ordered views over a list of calendar items.

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;

use super::{
    MergedIterable, OccurrenceItem, SeriesGroup, SharedGenerator, SortableItem, Timespan,
    group_by_uid,
};
use crate::error::{RfcError, RfcResult};
use crate::rfc::ical::core::CalendarItem;

/// Finite cut-off for materialising a timeline that may be unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimelineBound {
    /// Stop before the first occurrence starting at or after the instant.
    Until(DateTime<Utc>),
    /// Stop after this many occurrences.
    MaxItems(usize),
    /// Whichever of the two comes first.
    Both {
        until: DateTime<Utc>,
        max_items: usize,
    },
}

impl TimelineBound {
    const fn until(self) -> Option<DateTime<Utc>> {
        match self {
            Self::Until(until) | Self::Both { until, .. } => Some(until),
            Self::MaxItems(_) => None,
        }
    }

    const fn max_items(self) -> Option<usize> {
        match self {
            Self::MaxItems(max_items) | Self::Both { max_items, .. } => Some(max_items),
            Self::Until(_) => None,
        }
    }
}

/// All occurrences of a set of items in one global order.
///
/// Occurrences are generated on demand: every query builds a fresh merge
/// over the series and only materialises what it hands out.
pub struct Timeline<T> {
    groups: Vec<SeriesGroup<T>>,
    fallback: Tz,
    generator: SharedGenerator,
}

/// Ordered occurrences, each built when reached.
pub type TimelineIter<T> = MergedIterable<OccurrenceItem<T>, RfcError>;

impl<T: CalendarItem> Timeline<T> {
    /// ## Summary
    /// Builds a timeline over a snapshot of `items`.
    ///
    /// Floating and DATE values are placed using `fallback`.
    ///
    /// ## Errors
    /// Returns `RfcError::MissingUid` if any item has no uid.
    pub fn new(items: &[T], fallback: Tz, generator: SharedGenerator) -> RfcResult<Self> {
        let groups = group_by_uid(items)?;
        tracing::debug!(
            kind = %T::KIND,
            items = items.len(),
            series = groups.len(),
            "Built timeline"
        );
        Ok(Self {
            groups,
            fallback,
            generator,
        })
    }

    #[must_use]
    pub const fn fallback(&self) -> Tz {
        self.fallback
    }

    /// ## Summary
    /// Every occurrence, keyed by its span.
    ///
    /// Unbounded series make this infinite.
    ///
    /// ## Errors
    /// Returns an error if a recurring item cannot be expanded. Generator
    /// failures surface as items of the stream.
    pub fn spans(&self) -> RfcResult<TimelineIter<T>> {
        let mut sources = Vec::new();
        for group in &self.groups {
            sources.extend(group.sources(self.fallback, &self.generator)?);
        }
        Ok(MergedIterable::new(sources))
    }

    /// ## Summary
    /// Every occurrence in order.
    ///
    /// ## Errors
    /// See [`Timeline::spans`].
    pub fn iter(&self) -> RfcResult<impl Iterator<Item = RfcResult<T>> + use<T>> {
        Ok(self.spans()?.values())
    }

    /// ## Summary
    /// Occurrences lying entirely within `[start, end)`.
    ///
    /// ## Errors
    /// See [`Timeline::spans`].
    pub fn included(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> RfcResult<Window<T>> {
        let window = Timespan::new(start, end);
        self.window(
            move |span| span.start >= window.end,
            move |span| span.is_included_in(&window),
        )
    }

    /// ## Summary
    /// Occurrences sharing any instant with `[start, end)`.
    ///
    /// ## Errors
    /// See [`Timeline::spans`].
    pub fn overlapping(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> RfcResult<Window<T>> {
        let window = Timespan::new(start, end);
        self.window(
            move |span| span.start >= window.end,
            move |span| {
                span.intersects(&window)
                    || (span.start == span.end && window.includes_instant(span.start))
            },
        )
    }

    /// ## Summary
    /// Occurrences starting after `instant`.
    ///
    /// ## Errors
    /// See [`Timeline::spans`].
    pub fn start_after(&self, instant: DateTime<Utc>) -> RfcResult<Window<T>> {
        self.window(|_| false, move |span| span.start > instant)
    }

    /// ## Summary
    /// Occurrences still running, or yet to start, after `instant`.
    ///
    /// ## Errors
    /// See [`Timeline::spans`].
    pub fn active_after(&self, instant: DateTime<Utc>) -> RfcResult<Window<T>> {
        self.window(
            |_| false,
            move |span| span.start > instant || span.end > instant,
        )
    }

    /// ## Summary
    /// Occurrences in progress at `instant`.
    ///
    /// ## Errors
    /// See [`Timeline::spans`].
    pub fn at_instant(&self, instant: DateTime<Utc>) -> RfcResult<Window<T>> {
        self.window(
            move |span| span.start > instant,
            move |span| span.includes_instant(instant),
        )
    }

    /// ## Summary
    /// Occurrences overlapping `date` as observed in the fallback timezone.
    ///
    /// ## Errors
    /// See [`Timeline::spans`].
    pub fn on_date(&self, date: NaiveDate) -> RfcResult<Window<T>> {
        let day = Timespan::whole_day(date, self.fallback);
        self.overlapping(day.start, day.end)
    }

    /// ## Summary
    /// Materialises occurrences up to `bound`.
    ///
    /// ## Errors
    /// Returns the first expansion error encountered.
    pub fn collect_bounded(&self, bound: TimelineBound) -> RfcResult<Vec<T>> {
        let until = bound.until();
        let mut window = self.window(
            move |span| until.is_some_and(|until| span.start >= until),
            |_| true,
        )?;
        let max_items = bound.max_items().unwrap_or(usize::MAX);

        let mut collected = Vec::new();
        while collected.len() < max_items {
            match window.next() {
                Some(item) => collected.push(item?),
                None => break,
            }
        }
        tracing::debug!(count = collected.len(), ?bound, "Collected timeline");
        Ok(collected)
    }

    fn window(
        &self,
        stop: impl Fn(&Timespan) -> bool + 'static,
        keep: impl Fn(&Timespan) -> bool + 'static,
    ) -> RfcResult<Window<T>> {
        Ok(Window {
            merged: self.spans()?,
            stop: Box::new(stop),
            keep: Box::new(keep),
        })
    }
}

impl<T> fmt::Debug for Timeline<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Timeline")
            .field("series", &self.groups.len())
            .field("fallback", &self.fallback)
            .finish_non_exhaustive()
    }
}

/// Occurrences of a timeline query.
///
/// Stops pulling from the series as soon as an occurrence lies past the
/// query, so bounded queries terminate over unbounded series.
pub struct Window<T> {
    merged: TimelineIter<T>,
    stop: Box<dyn Fn(&Timespan) -> bool>,
    keep: Box<dyn Fn(&Timespan) -> bool>,
}

impl<T: CalendarItem> Iterator for Window<T> {
    type Item = RfcResult<T>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if !self.merged.has_pending_error()
                && let Some(span) = self.merged.peek_key()
                && (self.stop)(span)
            {
                return None;
            }
            match self.merged.next()? {
                Ok(item) if (self.keep)(item.key()) => return Some(Ok(item.into_value())),
                Ok(_) => {}
                Err(err) => return Some(Err(err)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rfc::ical::core::{DateOrDateTime, Event, RecurrenceRule};
    use crate::rfc::ical::expand::{
        GeneratorError, OccurrenceIter, RRuleGenerator, RecurrenceGenerator,
    };
    use chrono::{TimeDelta, TimeZone};
    use std::rc::Rc;

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, day, hour, 0, 0).unwrap()
    }

    fn hourly_meeting(uid: &str, start: DateTime<Utc>, rule: Option<RecurrenceRule>) -> Event {
        let mut event = Event::new(start.into()).with_summary(uid);
        event.common.uid = Some(uid.to_string());
        event.duration = Some(TimeDelta::hours(1));
        event.common.rrule = rule;
        event
    }

    fn timeline(items: &[Event]) -> Timeline<Event> {
        Timeline::new(items, Tz::UTC, Rc::new(RRuleGenerator::default())).unwrap()
    }

    fn starts(items: impl Iterator<Item = RfcResult<Event>>) -> Vec<DateOrDateTime> {
        items
            .map(|item| item.unwrap().common.dtstart.unwrap())
            .collect()
    }

    #[test]
    fn series_interleave_in_time_order() {
        let items = vec![
            hourly_meeting("daily", at(1, 9), Some(RecurrenceRule::daily().with_count(3))),
            hourly_meeting("once", at(2, 8), None),
        ];
        let order: Vec<String> = timeline(&items)
            .iter()
            .unwrap()
            .map(|item| item.unwrap().common.summary.unwrap())
            .collect();
        assert_eq!(order, vec!["daily", "once", "daily", "daily"]);
    }

    #[test]
    fn windowed_queries_terminate_on_unbounded_series() {
        let items = vec![hourly_meeting("daily", at(1, 9), Some(RecurrenceRule::daily()))];
        let timeline = timeline(&items);

        let overlapping = starts(timeline.overlapping(at(3, 0), at(5, 0)).unwrap());
        assert_eq!(overlapping, vec![at(3, 9).into(), at(4, 9).into()]);

        let included = starts(timeline.included(at(3, 9), at(4, 9)).unwrap());
        assert_eq!(included, vec![at(3, 9).into()]);

        let now = starts(timeline.at_instant(at(2, 9) + TimeDelta::minutes(30)).unwrap());
        assert_eq!(now, vec![at(2, 9).into()]);

        let on_day = starts(timeline.on_date(NaiveDate::from_ymd_opt(2026, 1, 7).unwrap()).unwrap());
        assert_eq!(on_day, vec![at(7, 9).into()]);
    }

    #[test]
    fn after_queries() {
        let items = vec![hourly_meeting("daily", at(1, 9), Some(RecurrenceRule::daily().with_count(3)))];
        let timeline = timeline(&items);

        let after = starts(timeline.start_after(at(2, 9)).unwrap());
        assert_eq!(after, vec![at(3, 9).into()]);

        let active = starts(timeline.active_after(at(2, 9) + TimeDelta::minutes(10)).unwrap());
        assert_eq!(active, vec![at(2, 9).into(), at(3, 9).into()]);
    }

    #[test]
    fn collect_bounded_honours_both_limits() {
        let items = vec![hourly_meeting("daily", at(1, 9), Some(RecurrenceRule::daily()))];
        let timeline = timeline(&items);

        assert_eq!(timeline.collect_bounded(TimelineBound::MaxItems(5)).unwrap().len(), 5);
        assert_eq!(timeline.collect_bounded(TimelineBound::Until(at(4, 0))).unwrap().len(), 3);
        assert_eq!(
            timeline
                .collect_bounded(TimelineBound::Both {
                    until: at(20, 0),
                    max_items: 2
                })
                .unwrap()
                .len(),
            2
        );
    }

    /// Yields the anchor, then fails.
    struct FailsAfterAnchor;

    impl RecurrenceGenerator for FailsAfterAnchor {
        fn occurrences(
            &self,
            anchor: &DateOrDateTime,
            _rule: Option<&RecurrenceRule>,
            _rdate: &[DateOrDateTime],
            _exdate: &[DateOrDateTime],
        ) -> RfcResult<OccurrenceIter> {
            let failure: RfcError = GeneratorError::Rule("boom".to_string()).into();
            Ok(Box::new(vec![Ok(*anchor), Err(failure)].into_iter()))
        }
    }

    #[test_log::test]
    fn generator_failure_surfaces_before_window_stops() {
        let items = vec![
            hourly_meeting("failing", at(1, 9), Some(RecurrenceRule::daily())),
            hourly_meeting("later", at(20, 9), None),
        ];
        let timeline = Timeline::new(&items, Tz::UTC, Rc::new(FailsAfterAnchor)).unwrap();

        let results: Vec<RfcResult<Event>> = timeline.included(at(1, 0), at(15, 0)).unwrap().collect();
        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        assert!(matches!(
            results[1],
            Err(RfcError::Generator(GeneratorError::Rule(_)))
        ));

        let bounded = timeline.collect_bounded(TimelineBound::Until(at(15, 0)));
        assert!(matches!(bounded, Err(RfcError::Generator(_))));
    }
}
