//! # ics-timeline
//!
//! Resolves iCalendar (ICS) documents into a flat, deduplicated timeline of
//! event occurrences for a time window.
//!
//! Given ICS text, the crate repairs common exporter quirks, builds each
//! VCALENDAR's timezones and events, expands RRULE series (minus EXDATEs),
//! applies RECURRENCE-ID overrides, and returns plain records with ISO-8601
//! timestamps. Everything is synchronous and side-effect free: a loaded
//! [`CalendarSet`] can be queried any number of times.
//!
//! ## Modules
//!
//! - [`values`] — Property lookup and DATE / DATE-TIME / DURATION / TEXT values
//! - [`preprocess`] — Parsing entry point and input repair
//! - [`offset`] — `TZOFFSETFROM` / `TZOFFSETTO` parsing
//! - [`recurrence`] — RRULE + EXDATE occurrence sequences
//! - [`timezone`] — VTIMEZONE resolution to UTC
//! - [`event`] — VEVENT definitions and occurrence materialization
//! - [`calendar`] — Per-calendar merge, multi-calendar union, output records
//! - [`error`] — Error types
//!
//! ## Time basis
//!
//! Timestamps are carried as their wall-clock digits. Zoned values are only
//! resolved to UTC when rendered. Floating values (no `Z`, no TZID) are
//! treated as if their digits were UTC; true floating time would depend on
//! the viewer's zone, which is not modeled.
//!
//! RRULE expansion runs on the same local digits. A UTC `UNTIL` on a zoned
//! series is therefore compared against local digits, which in zones east of
//! UTC can drop the final occurrence.

pub mod calendar;
pub mod error;
pub mod event;
pub mod offset;
pub mod preprocess;
pub mod recurrence;
pub mod timezone;
pub mod values;

pub use calendar::{
    format_timestamp, Calendar, CalendarOptions, CalendarSet, ErrorPolicy, EventRecord,
    MergePolicy,
};
pub use error::{Result, TimelineError};
pub use event::{Event, EventEnd, EventInstance};
pub use offset::parse_offset;
pub use preprocess::{clean_calendar, parse_document};
pub use recurrence::RecurrenceSet;
pub use timezone::{Timezone, TimezoneMap, TimezoneTransition};
pub use values::{find_param, find_property, parse_duration, property_value, DateTimeValue};
