//! Self-contained timezone definitions kept in a calendar's roster
//! (RFC 5545 §3.6.5).

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Whether an observance describes standard or daylight time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ObservanceKind {
    Standard,
    Daylight,
}

/// One STANDARD or DAYLIGHT sub-component.
///
/// Offsets are seconds east of UTC.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Observance {
    pub kind: ObservanceKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Local wall-clock time at which the observance takes effect.
    pub start: NaiveDateTime,
    pub offset_from: i32,
    pub offset_to: i32,
}

/// A VTIMEZONE definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timezone {
    pub tzid: String,
    #[serde(default)]
    pub observances: Vec<Observance>,
}

impl Timezone {
    #[must_use]
    pub fn new(tzid: impl Into<String>) -> Self {
        Self {
            tzid: tzid.into(),
            observances: Vec::new(),
        }
    }
}
