use almanac_rfc::rfc::ical::core::{Calendar, Event, Journal, Todo};

use super::Store;

/// Per-kind stores over a [`Calendar`], sharing its timezone roster.
pub trait CalendarStores {
    fn event_store(&mut self) -> Store<'_, Event>;

    fn todo_store(&mut self) -> Store<'_, Todo>;

    fn journal_store(&mut self) -> Store<'_, Journal>;
}

impl CalendarStores for Calendar {
    fn event_store(&mut self) -> Store<'_, Event> {
        Store::new(&mut self.events, &mut self.timezones)
    }

    fn todo_store(&mut self) -> Store<'_, Todo> {
        Store::new(&mut self.todos, &mut self.timezones)
    }

    fn journal_store(&mut self) -> Store<'_, Journal> {
        Store::new(&mut self.journals, &mut self.timezones)
    }
}
