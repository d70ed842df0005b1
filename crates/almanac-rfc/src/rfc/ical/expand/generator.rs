//! Recurrence generation: turning an anchor and a rule into occurrence starts.
//!
//! The [`RecurrenceGenerator`] trait is the seam the rest of the expansion
//! depends on. [`RRuleGenerator`] implements it on top of the `rrule` crate,
//! pulling results a page at a time so unbounded rules stay lazy.

use std::collections::{HashSet, VecDeque};
use std::iter::Peekable;

use chrono::{DateTime, NaiveDateTime, NaiveTime, TimeZone, Utc};
use rrule::{RRule, RRuleSetIter, Unvalidated};

use super::local_to_utc;
use crate::error::RfcResult;
use crate::rfc::ical::core::{CalDateTime, DateOrDateTime, DateTimeForm, RecurrenceRule};

/// Errors raised while expanding a recurrence.
#[derive(Debug, thiserror::Error)]
pub enum GeneratorError {
    /// A DATE was combined with a DATE-TIME.
    #[error("Cannot mix DATE and DATE-TIME values: {0}")]
    MismatchedValueType(String),

    /// A floating DATE-TIME was combined with a UTC or zoned one.
    #[error("Cannot mix floating and timezone-aware values: {0}")]
    MismatchedTimezoneAwareness(String),

    /// The rule engine rejected the rule.
    #[error("Invalid recurrence rule: {0}")]
    Rule(String),
}

/// Owned, lazily evaluated sequence of occurrence starts.
pub type OccurrenceIter = Box<dyn Iterator<Item = RfcResult<DateOrDateTime>>>;

/// Produces the occurrence starts of a recurring item.
pub trait RecurrenceGenerator {
    /// ## Summary
    /// Expands `anchor` and `rule` into an ascending, duplicate-free
    /// sequence of starts, merged with `rdate` and minus `exdate`.
    ///
    /// Every value has the anchor's value type. Without a rule the
    /// sequence is the anchor plus `rdate`.
    ///
    /// ## Errors
    /// Returns `GeneratorError` when the rule is invalid or the extra dates
    /// do not share the anchor's value type. Errors may also surface while
    /// iterating.
    fn occurrences(
        &self,
        anchor: &DateOrDateTime,
        rule: Option<&RecurrenceRule>,
        rdate: &[DateOrDateTime],
        exdate: &[DateOrDateTime],
    ) -> RfcResult<OccurrenceIter>;
}

/// ## Summary
/// Checks that `value` can be compared with `anchor`.
///
/// ## Errors
/// Returns the matching `GeneratorError` variant on a mismatch.
pub fn check_compatible(
    anchor: &DateOrDateTime,
    value: &DateOrDateTime,
) -> Result<(), GeneratorError> {
    if anchor.is_date() != value.is_date() {
        return Err(GeneratorError::MismatchedValueType(format!(
            "{value} against {anchor}"
        )));
    }
    if anchor.is_aware() != value.is_aware() {
        return Err(GeneratorError::MismatchedTimezoneAwareness(format!(
            "{value} against {anchor}"
        )));
    }
    Ok(())
}

/// `rrule`-backed generator.
#[derive(Debug, Clone, Copy)]
pub struct RRuleGenerator {
    page_size: u16,
}

impl RRuleGenerator {
    pub const DEFAULT_PAGE_SIZE: u16 = 128;

    /// Creates a generator that pulls `page_size` occurrences per call into
    /// the rule engine. Sizes below 2 are raised to 2.
    #[must_use]
    pub fn new(page_size: u16) -> Self {
        Self {
            page_size: page_size.max(2),
        }
    }

    #[must_use]
    pub const fn page_size(&self) -> u16 {
        self.page_size
    }
}

impl Default for RRuleGenerator {
    fn default() -> Self {
        Self::new(Self::DEFAULT_PAGE_SIZE)
    }
}

impl RecurrenceGenerator for RRuleGenerator {
    fn occurrences(
        &self,
        anchor: &DateOrDateTime,
        rule: Option<&RecurrenceRule>,
        rdate: &[DateOrDateTime],
        exdate: &[DateOrDateTime],
    ) -> RfcResult<OccurrenceIter> {
        for value in rdate.iter().chain(exdate) {
            check_compatible(anchor, value)?;
        }

        let base: OccurrenceIter = match rule {
            Some(rule) => Box::new(RulePages::new(anchor, rule, self.page_size)?),
            None => Box::new(std::iter::once(Ok(*anchor))),
        };

        let mut extra: Vec<DateOrDateTime> = rdate.to_vec();
        extra.sort_by_key(DateOrDateTime::ordering_key);

        tracing::trace!(
            anchor = %anchor,
            rule = ?rule.map(ToString::to_string),
            rdates = extra.len(),
            exdates = exdate.len(),
            "Expanding recurrence"
        );

        Ok(Box::new(Occurrences {
            base: base.peekable(),
            rdates: extra.into(),
            exdates: exdate.iter().map(DateOrDateTime::ordering_key).collect(),
            last: None,
        }))
    }
}

/// Merges the rule output with RDATEs, drops EXDATEs and duplicates.
struct Occurrences {
    base: Peekable<OccurrenceIter>,
    rdates: VecDeque<DateOrDateTime>,
    exdates: HashSet<NaiveDateTime>,
    last: Option<NaiveDateTime>,
}

impl Iterator for Occurrences {
    type Item = RfcResult<DateOrDateTime>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let base_key = match self.base.peek() {
                Some(Ok(value)) => Some(value.ordering_key()),
                Some(Err(_)) => return self.base.next(),
                None => None,
            };
            let rdate_key = self.rdates.front().map(DateOrDateTime::ordering_key);

            let candidate = match (base_key, rdate_key) {
                (Some(base), Some(rdate)) if rdate < base => self.rdates.pop_front(),
                (Some(_), _) => self.base.next().and_then(Result::ok),
                (None, Some(_)) => self.rdates.pop_front(),
                (None, None) => return None,
            }?;

            let key = candidate.ordering_key();
            if self.last.is_some_and(|last| key <= last) {
                continue;
            }
            self.last = Some(key);
            if self.exdates.contains(&key) {
                tracing::trace!(occurrence = %candidate, "Skipping excluded occurrence");
                continue;
            }
            return Some(Ok(candidate));
        }
    }
}

/// Pulls an `RRuleSet` iterator a page at a time so only a bounded window
/// is materialised. The iterator lives across pages, so deep pages cost the
/// same as the first.
///
/// UNTIL is applied here rather than by the rule engine so that it is
/// compared in the anchor's own value type.
struct RulePages {
    dates: RRuleSetIter,
    anchor: DateOrDateTime,
    until: Option<NaiveDateTime>,
    limit: u16,
    buffer: VecDeque<DateTime<rrule::Tz>>,
    exhausted: bool,
}

impl RulePages {
    fn new(anchor: &DateOrDateTime, rule: &RecurrenceRule, limit: u16) -> RfcResult<Self> {
        if let Some(until) = &rule.until {
            check_compatible(anchor, until)?;
        }

        let text = rule.pattern_text();
        let parsed = text
            .parse::<RRule<Unvalidated>>()
            .map_err(|err| GeneratorError::Rule(format!("{text}: {err}")))?;
        let set = parsed
            .build(to_rule_time(anchor))
            .map_err(|err| GeneratorError::Rule(format!("{text}: {err}")))?;

        Ok(Self {
            dates: (&set).into_iter(),
            anchor: *anchor,
            until: rule.until.as_ref().map(DateOrDateTime::ordering_key),
            limit,
            buffer: VecDeque::with_capacity(usize::from(limit)),
            exhausted: false,
        })
    }

    fn fill(&mut self) {
        let before = self.buffer.len();
        self.buffer
            .extend(self.dates.by_ref().take(usize::from(self.limit)));
        if self.buffer.len() - before < usize::from(self.limit) {
            self.exhausted = true;
        }
        tracing::trace!(
            buffered = self.buffer.len(),
            exhausted = self.exhausted,
            "Fetched occurrence page"
        );
    }
}

impl Iterator for RulePages {
    type Item = RfcResult<DateOrDateTime>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.buffer.is_empty() && !self.exhausted {
            self.fill();
        }
        let date = self.buffer.pop_front()?;
        let value = from_rule_time(date, &self.anchor);
        if self.until.is_some_and(|until| value.ordering_key() > until) {
            self.buffer.clear();
            self.exhausted = true;
            return None;
        }
        Some(Ok(value))
    }
}

/// DATE anchors run at UTC midnight and floating anchors as UTC, so the
/// rule engine never applies an offset to them.
fn to_rule_time(anchor: &DateOrDateTime) -> DateTime<rrule::Tz> {
    match anchor {
        DateOrDateTime::Date(date) => rrule::Tz::UTC.from_utc_datetime(&date.and_time(NaiveTime::MIN)),
        DateOrDateTime::DateTime(dt) => match dt.form {
            DateTimeForm::Floating | DateTimeForm::Utc => rrule::Tz::UTC.from_utc_datetime(&dt.local),
            DateTimeForm::Zoned(tz) => {
                local_to_utc(dt.local, tz).with_timezone(&rrule::Tz::Tz(tz))
            }
        },
    }
}

fn from_rule_time(date: DateTime<rrule::Tz>, anchor: &DateOrDateTime) -> DateOrDateTime {
    match anchor {
        DateOrDateTime::Date(_) => DateOrDateTime::Date(date.naive_utc().date()),
        DateOrDateTime::DateTime(dt) => DateOrDateTime::DateTime(match dt.form {
            DateTimeForm::Floating => CalDateTime::floating(date.naive_utc()),
            DateTimeForm::Utc => CalDateTime::utc(date.with_timezone(&Utc)),
            DateTimeForm::Zoned(tz) => CalDateTime::zoned(date.naive_local(), tz),
        }),
    }
}
