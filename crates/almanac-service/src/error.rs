use thiserror::Error;

/// Service layer errors - combines all error types
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unsupported relationship type: {0}")]
    UnsupportedRelationship(String),

    #[error("Cannot change the recurrence rule of a single instance of {0}")]
    IncompatibleRuleEdit(String),

    #[error(transparent)]
    Timezone(#[from] almanac_rfc::rfc::ical::expand::TimezoneError),

    #[error(transparent)]
    RfcError(#[from] almanac_rfc::error::RfcError),
}

pub type ServiceResult<T> = std::result::Result<T, ServiceError>;
