//! iCalendar object model (RFC 5545).
//!
//! These types are the typed, already-validated form of calendar data:
//! - Values: DATE / DATE-TIME with their floating, UTC or zoned form
//! - Recurrence: rules and the identity keys of single occurrences
//! - Items: events, to-dos and journal entries behind one trait
//! - Container: the calendar and its timezone roster

mod calendar;
mod event;
mod item;
mod journal;
mod recurrence_id;
mod rrule;
mod timezone;
mod todo;
mod value;

pub use calendar::{Calendar, DEFAULT_PRODID, ItemKind};
pub use event::{Event, EventPatch, EventStatus};
pub use item::{
    CalendarItem, CommonPatch, CommonProperties, RelatedTo, RelationshipType, default_duration,
};
pub use journal::{Journal, JournalPatch};
pub use recurrence_id::RecurrenceId;
pub use rrule::{Frequency, RecurrenceRule, WeekdayNum, weekday_abbrev};
pub use timezone::{Observance, ObservanceKind, Timezone};
pub use todo::{Todo, TodoPatch, TodoStatus};
pub use value::{CalDateTime, DateOrDateTime, DateTimeForm};
