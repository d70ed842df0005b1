//! Mutation API over one kind of calendar item.
//!
//! A [`Store`] borrows a calendar's item list together with its timezone
//! roster and applies add, edit and delete operations to them in place.
//! Series state is never stored explicitly; it is read off each item's
//! shape (see [`SeriesRole`]).

mod calendar;
mod delete;
mod edit;

use std::fmt;
use std::rc::Rc;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;

use almanac_rfc::error::RfcResult;
use almanac_rfc::rfc::ical::core::{
    CalendarItem, DateOrDateTime, RecurrenceId, RelationshipType, Timezone,
};
use almanac_rfc::rfc::ical::expand::{
    IanaTimezoneProvider, RRuleGenerator, SeriesRole, SharedGenerator, Timeline, TimezoneProvider,
    occurs_at,
};

use crate::error::{ServiceError, ServiceResult};

pub use calendar::CalendarStores;

/// Scope of an edit or delete that names one occurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Range {
    /// Only the named occurrence.
    #[default]
    This,
    /// The named occurrence and every later one.
    ThisAndFuture,
}

/// Clock used to stamp modifications.
pub type Clock = Box<dyn Fn() -> DateTime<Utc>>;

/// Add, edit and delete over a borrowed item list and timezone roster.
///
/// Operations are not synchronized; the borrow makes the store the only
/// writer for as long as it lives.
pub struct Store<'a, T, P = IanaTimezoneProvider> {
    items: &'a mut Vec<T>,
    timezones: &'a mut Vec<Timezone>,
    provider: P,
    generator: SharedGenerator,
    clock: Clock,
}

impl<'a, T: CalendarItem> Store<'a, T> {
    /// Store resolving zones from the bundled IANA database.
    #[must_use]
    pub fn new(items: &'a mut Vec<T>, timezones: &'a mut Vec<Timezone>) -> Self {
        Self {
            items,
            timezones,
            provider: IanaTimezoneProvider::new(),
            generator: Rc::new(RRuleGenerator::default()),
            clock: Box::new(Utc::now),
        }
    }
}

impl<'a, T: CalendarItem, P: TimezoneProvider> Store<'a, T, P> {
    /// Replaces the collaborator that builds timezone definitions.
    #[must_use]
    pub fn with_provider<Q: TimezoneProvider>(self, provider: Q) -> Store<'a, T, Q> {
        Store {
            items: self.items,
            timezones: self.timezones,
            provider,
            generator: self.generator,
            clock: self.clock,
        }
    }

    #[must_use]
    pub fn with_generator(mut self, generator: SharedGenerator) -> Self {
        self.generator = generator;
        self
    }

    /// Replaces the clock used for `dtstamp` and `last_modified`.
    #[must_use]
    pub fn with_clock(mut self, clock: impl Fn() -> DateTime<Utc> + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    /// Current contents, in document order.
    #[must_use]
    pub fn items(&self) -> &[T] {
        self.items.as_slice()
    }

    /// The timezone roster as maintained by this store.
    #[must_use]
    pub fn timezones(&self) -> &[Timezone] {
        self.timezones.as_slice()
    }

    /// ## Summary
    /// Ordered view over the current contents, exceptions replacing the
    /// occurrences they override.
    ///
    /// The timeline works on a snapshot: later mutations are not visible
    /// through it.
    ///
    /// ## Errors
    /// Returns `RfcError::MissingUid` if a stored item has no uid.
    pub fn timeline(&self, fallback: Tz) -> RfcResult<Timeline<T>> {
        Timeline::new(self.items.as_slice(), fallback, Rc::clone(&self.generator))
    }

    /// ## Summary
    /// Stores a new item.
    ///
    /// A missing uid is generated. The revision counter starts at zero and
    /// `created` takes the item's `dtstamp`. Kind-specific defaults are
    /// applied before the item is validated.
    ///
    /// ## Side Effects
    /// - Appends the item to the list
    /// - Appends a timezone definition to the roster when the item's start
    ///   names a zone the roster does not know yet
    ///
    /// ## Errors
    /// Returns an error if:
    /// - the kind cannot derive a start
    /// - a relationship other than PARENT is present
    /// - the start's timezone cannot be resolved
    ///
    /// Nothing is stored on error.
    #[tracing::instrument(skip(self, item), fields(kind = %T::KIND, uid = ?item.uid()))]
    pub fn add(&mut self, mut item: T) -> ServiceResult<String> {
        let now = (self.clock)();
        let common = item.common_mut();
        let uid = common
            .uid
            .get_or_insert_with(|| uuid::Uuid::new_v4().to_string())
            .clone();
        common.sequence = Some(0);
        common.created = Some(common.dtstamp);

        item.prepare_for_add(now)?;
        validate_relationships(&item)?;
        self.ensure_timezone(item.dtstart().and_then(DateOrDateTime::tz_key))?;

        self.items.push(item);
        tracing::debug!(uid = %uid, count = self.items.len(), "Added item");
        Ok(uid)
    }

    /// ## Summary
    /// Makes sure the roster carries a definition for `key`.
    ///
    /// ## Errors
    /// Returns `ServiceError::Timezone` if the provider cannot build one.
    fn ensure_timezone(&mut self, key: Option<&'static str>) -> ServiceResult<()> {
        let Some(key) = key else {
            return Ok(());
        };
        if self.timezones.iter().any(|tz| tz.tzid == key) {
            return Ok(());
        }

        let timezone = self.provider.timezone(key).inspect_err(|err| {
            tracing::warn!(tzid = key, error = %err, "Rejected item with unresolvable timezone");
        })?;
        tracing::debug!(
            tzid = key,
            observances = timezone.observances.len(),
            "Added timezone to roster"
        );
        self.timezones.push(timezone);
        Ok(())
    }

    /// ## Summary
    /// Indices of the stored items an operation on `uid` and
    /// `recurrence_id` applies to.
    ///
    /// Without a recurrence id every item of the series matches. With one,
    /// an item matches when it carries that id itself or when it recurs and
    /// produces that occurrence.
    ///
    /// ## Errors
    /// Propagates expansion failures.
    fn matching(
        &self,
        uid: &str,
        recurrence_id: Option<&RecurrenceId>,
    ) -> ServiceResult<Vec<usize>> {
        let mut matched = Vec::new();
        for (index, item) in self.items.iter().enumerate() {
            if item.uid() != Some(uid) {
                continue;
            }
            let is_match = match recurrence_id {
                None => true,
                Some(rid) if item.recurrence_id() == Some(rid) => true,
                Some(rid) => {
                    item.common().is_recurring() && occurs_at(self.generator.as_ref(), item, rid)?
                }
            };
            if is_match {
                matched.push(index);
            }
        }
        tracing::trace!(uid, matched = matched.len(), "Resolved matching items");
        Ok(matched)
    }
}

impl<T, P> fmt::Debug for Store<'_, T, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("items", &self.items.len())
            .field("timezones", &self.timezones.len())
            .finish_non_exhaustive()
    }
}

/// ## Summary
/// Rejects any relationship kind other than PARENT.
///
/// ## Errors
/// Returns `ServiceError::UnsupportedRelationship` naming the first
/// offending kind.
fn validate_relationships<T: CalendarItem>(item: &T) -> ServiceResult<()> {
    if let Some(relation) = item
        .common()
        .related_to
        .iter()
        .find(|relation| relation.reltype != RelationshipType::Parent)
    {
        tracing::warn!(
            reltype = %relation.reltype,
            related = %relation.uid,
            "Rejected unsupported relationship"
        );
        return Err(ServiceError::UnsupportedRelationship(
            relation.reltype.to_string(),
        ));
    }
    Ok(())
}

/// The match an edit is based on.
///
/// With a recurrence id this is the item carrying that id, else the
/// recurring item producing it. Without one it is the series parent.
fn primary_match<T: CalendarItem>(
    items: &[T],
    matched: &[usize],
    recurrence_id: Option<&RecurrenceId>,
) -> Option<usize> {
    let preferred = match recurrence_id {
        Some(rid) => matched
            .iter()
            .find(|&&index| items[index].recurrence_id() == Some(rid))
            .or_else(|| {
                matched
                    .iter()
                    .find(|&&index| items[index].common().is_recurring())
            }),
        None => matched
            .iter()
            .find(|&&index| SeriesRole::of(&items[index]) == SeriesRole::Parent),
    };
    preferred.or_else(|| matched.first()).copied()
}

fn describe(uid: &str, recurrence_id: Option<&RecurrenceId>) -> String {
    match recurrence_id {
        Some(rid) => format!("{uid} (recurrence {rid})"),
        None => uid.to_string(),
    }
}
