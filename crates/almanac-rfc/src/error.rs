use thiserror::Error;

use crate::rfc::ical::expand::GeneratorError;

/// Object model and expansion errors
#[derive(Error, Debug)]
pub enum RfcError {
    #[error("Invalid recurrence id: {0}")]
    InvalidRecurrenceId(String),

    #[error("Invalid duration: {0}")]
    InvalidDuration(String),

    #[error("Item has no DTSTART: {0}")]
    MissingDtstart(String),

    #[error("Item has no UID and cannot be grouped into a series")]
    MissingUid,

    #[error(transparent)]
    Generator(#[from] GeneratorError),
}

pub type RfcResult<T> = std::result::Result<T, RfcError>;
