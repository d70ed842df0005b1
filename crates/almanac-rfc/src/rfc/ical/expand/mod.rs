//! Recurrence expansion (RFC 5545 §3.8.5).
//!
//! Read path from stored items to one ordered stream of occurrences:
//! - `generator`: occurrence starts of one series
//! - `recur`: lazily built occurrences, minus overridden ones
//! - `series`: grouping by uid into per-member sources
//! - `iter`: the k-way merge of those sources
//! - `timeline`: ordered and windowed views
//! - `reconcile`: load-time folding of exceptions into exclusions

mod generator;
mod iter;
mod recur;
mod reconcile;
mod series;
mod timeline;
mod timespan;
mod timezone;

pub use generator::{
    GeneratorError, OccurrenceIter, RRuleGenerator, RecurrenceGenerator, check_compatible,
};
pub use iter::{LazySortableItem, MergedIterable, SortableItem, SortableItemValue, SortedSource};
pub use recur::{
    OccurrenceItem, OverrideFilter, RecurIterable, RecurrenceAdapter, SharedGenerator,
    occurrences_before, occurs_at,
};
pub use reconcile::reconcile_recurrences;
pub use series::{SeriesGroup, SeriesRole, group_by_uid};
pub use timeline::{Timeline, TimelineBound, TimelineIter, Window};
pub use timespan::Timespan;
pub use timezone::{
    IanaTimezoneProvider, TimeZoneResolver, TimezoneError, TimezoneProvider, local_to_utc,
};
