//! Error types for calendar resolution.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TimelineError {
    #[error("Invalid calendar document: {0}")]
    InvalidCalendarDocument(String),

    #[error("Invalid UTC offset: '{0}'")]
    InvalidOffsetFormat(String),

    #[error("Unsupported recurrence form: {0}")]
    UnsupportedRecurrenceForm(String),

    #[error("{component} is missing required property {property}")]
    MissingRequiredProperty {
        component: &'static str,
        property: &'static str,
    },

    #[error("Unknown timezone: '{0}'")]
    UnknownTimezone(String),

    #[error("Timezone '{0}' has no STANDARD or DAYLIGHT observance")]
    EmptyTimezone(String),

    #[error("Invalid {property} value: '{value}'")]
    InvalidValue { property: String, value: String },

    #[error("Invalid RRULE: {0}")]
    InvalidRule(String),
}

pub type Result<T> = std::result::Result<T, TimelineError>;
