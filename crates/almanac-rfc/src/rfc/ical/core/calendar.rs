//! The VCALENDAR object graph (RFC 5545 §3.4).

use serde::{Deserialize, Serialize};

use super::{Event, Journal, Timezone, Todo};
use crate::rfc::ical::expand::reconcile_recurrences;

/// Default PRODID stamped on calendars created here.
pub const DEFAULT_PRODID: &str = "-//Almanac//Almanac Recurrence Engine//EN";

/// Component kinds a calendar holds as items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemKind {
    Event,
    Todo,
    Journal,
}

impl ItemKind {
    /// Returns the component name for this kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Event => "VEVENT",
            Self::Todo => "VTODO",
            Self::Journal => "VJOURNAL",
        }
    }
}

impl std::fmt::Display for ItemKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

fn default_prodid() -> String {
    DEFAULT_PRODID.to_string()
}

fn default_version() -> String {
    "2.0".to_string()
}

/// A calendar: items of each kind plus the timezones they reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Calendar {
    #[serde(default = "default_prodid")]
    pub prodid: String,

    #[serde(default = "default_version")]
    pub version: String,

    #[serde(default)]
    pub events: Vec<Event>,

    #[serde(default)]
    pub todos: Vec<Todo>,

    #[serde(default)]
    pub journals: Vec<Journal>,

    #[serde(default)]
    pub timezones: Vec<Timezone>,
}

impl Default for Calendar {
    fn default() -> Self {
        Self {
            prodid: default_prodid(),
            version: default_version(),
            events: Vec::new(),
            todos: Vec::new(),
            journals: Vec::new(),
            timezones: Vec::new(),
        }
    }
}

impl Calendar {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the roster entry for `tzid`, if present.
    #[must_use]
    pub fn timezone(&self, tzid: &str) -> Option<&Timezone> {
        self.timezones.iter().find(|tz| tz.tzid == tzid)
    }

    /// ## Summary
    /// Folds every exception's occurrence into its parent's EXDATE list,
    /// for each item kind independently.
    ///
    /// Run once after the graph is assembled; running it again adds nothing.
    /// Returns the number of exclusions added.
    #[tracing::instrument(skip(self), fields(prodid = %self.prodid))]
    pub fn reconcile(&mut self) -> usize {
        let added = reconcile_recurrences(&mut self.events)
            + reconcile_recurrences(&mut self.todos)
            + reconcile_recurrences(&mut self.journals);
        tracing::debug!(added, "Reconciled calendar recurrences");
        added
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_gets_defaults() {
        let calendar: Calendar = serde_json::from_str("{}").expect("valid calendar");
        assert_eq!(calendar.prodid, DEFAULT_PRODID);
        assert_eq!(calendar.version, "2.0");
        assert!(calendar.events.is_empty());
    }

    #[test]
    fn item_kind_names() {
        assert_eq!(ItemKind::Event.to_string(), "VEVENT");
        assert_eq!(ItemKind::Journal.as_str(), "VJOURNAL");
    }
}
