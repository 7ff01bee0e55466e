//! VEVENT definitions and their materialized occurrences.
//!
//! An [`Event`] is built once from a VEVENT component and never mutated.
//! [`Event::between`] turns it into [`EventInstance`] values, each a fresh
//! copy anchored at one occurrence start.

use chrono::{Duration, NaiveDateTime};
use ical::parser::ical::component::IcalEvent;

use crate::error::{Result, TimelineError};
use crate::recurrence::RecurrenceSet;
use crate::timezone::TimezoneMap;
use crate::values::{
    find_properties, find_property, parse_duration, parse_sequence, property_value,
    unescape_text, DateTimeValue,
};

// ── EventEnd ────────────────────────────────────────────────────────────────

/// How an event's end is derived from its start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventEnd {
    /// From DTEND: `DTEND - DTSTART`, applied in the start's own zone.
    FixedOffset(Duration),
    /// From DURATION: an absolute span, applied after resolving to UTC.
    Duration(Duration),
}

impl EventEnd {
    pub fn delta(&self) -> Duration {
        match self {
            EventEnd::FixedOffset(delta) | EventEnd::Duration(delta) => *delta,
        }
    }

    /// The error for an end that falls outside the representable range.
    fn out_of_range(&self) -> TimelineError {
        let property = match self {
            EventEnd::FixedOffset(_) => "DTEND",
            EventEnd::Duration(_) => "DURATION",
        };
        TimelineError::InvalidValue {
            property: property.to_string(),
            value: format!("{}s span is out of range", self.delta().num_seconds()),
        }
    }
}

// ── Event ───────────────────────────────────────────────────────────────────

/// One VEVENT: a single event, a recurring series, or an override of one
/// occurrence of a series (when `recurrence_id` is set).
#[derive(Debug, Clone)]
pub struct Event {
    pub title: String,
    pub description: Option<String>,
    pub start: DateTimeValue,
    pub end: EventEnd,
    pub all_day: bool,
    pub uid: String,
    /// Revision counter; `-1` when absent.
    pub sequence: i64,
    pub recurrence_id: Option<DateTimeValue>,
    recurrence: Option<RecurrenceSet>,
}

impl Event {
    /// Builds an event from a parsed VEVENT.
    ///
    /// EXDATE values are folded into the recurrence as exclusions. EXDATE
    /// without RRULE is ignored.
    ///
    /// # Errors
    ///
    /// - [`TimelineError::MissingRequiredProperty`] without SUMMARY, DTSTART,
    ///   UID, or both DTEND and DURATION
    /// - [`TimelineError::UnsupportedRecurrenceForm`] if RDATE is present
    /// - [`TimelineError::InvalidValue`] / [`TimelineError::InvalidRule`] for
    ///   malformed values
    pub fn from_component(component: &IcalEvent) -> Result<Self> {
        let properties = component.properties.as_slice();
        let required = |property: &'static str| {
            find_property(properties, property).ok_or(TimelineError::MissingRequiredProperty {
                component: "VEVENT",
                property,
            })
        };

        let title = unescape_text(property_value(required("SUMMARY")?));
        let description =
            find_property(properties, "DESCRIPTION").map(|p| unescape_text(property_value(p)));

        let start = DateTimeValue::from_property(required("DTSTART")?)?;

        let end = if let Some(dtend) = find_property(properties, "DTEND") {
            let dtend = DateTimeValue::from_property(dtend)?;
            EventEnd::FixedOffset(dtend.instant - start.instant)
        } else if let Some(duration) = find_property(properties, "DURATION") {
            EventEnd::Duration(parse_duration(property_value(duration))?)
        } else {
            return Err(TimelineError::MissingRequiredProperty {
                component: "VEVENT",
                property: "DTEND",
            });
        };

        if find_property(properties, "RDATE").is_some() {
            return Err(TimelineError::UnsupportedRecurrenceForm(
                "RDATE in VEVENT".to_string(),
            ));
        }

        let recurrence = match find_property(properties, "RRULE") {
            Some(rrule) => {
                let mut exdates = Vec::new();
                for property in find_properties(properties, "EXDATE") {
                    exdates.extend(
                        DateTimeValue::list_from_property(property)?
                            .into_iter()
                            .map(|v| v.instant),
                    );
                }
                Some(RecurrenceSet::new(
                    property_value(rrule),
                    start.instant,
                    &exdates,
                )?)
            }
            None => None,
        };

        let uid = property_value(required("UID")?).to_string();
        let sequence = parse_sequence(find_property(properties, "SEQUENCE").map(property_value));
        let recurrence_id = find_property(properties, "RECURRENCE-ID")
            .map(DateTimeValue::from_property)
            .transpose()?;

        Ok(Self {
            title,
            description,
            all_day: start.is_date_only,
            start,
            end,
            uid,
            sequence,
            recurrence_id,
            recurrence,
        })
    }

    pub fn is_recurring(&self) -> bool {
        self.recurrence.is_some()
    }

    /// Occurrences starting within `[start, end]`, in the event's own
    /// unresolved basis.
    ///
    /// A recurring event is queried over a window widened by its length and
    /// one day on either side, so occurrences that begin before `start` but
    /// may still overlap it are included. The widened window is clamped to
    /// the representable range.
    pub fn between(&self, start: NaiveDateTime, end: NaiveDateTime) -> Vec<EventInstance> {
        let Some(recurrence) = &self.recurrence else {
            if start <= self.start.instant && self.start.instant <= end {
                return vec![self.instance_at(self.start.instant)];
            }
            return Vec::new();
        };

        let from = start
            .checked_sub_signed(self.end.delta())
            .and_then(|t| t.checked_sub_signed(Duration::days(1)))
            .unwrap_or(NaiveDateTime::MIN);
        let to = end
            .checked_add_signed(Duration::days(1))
            .unwrap_or(NaiveDateTime::MAX);

        let instances: Vec<EventInstance> = recurrence
            .between(from, to)
            .into_iter()
            .map(|occurrence| self.instance_at(occurrence))
            .collect();

        tracing::trace!(uid = %self.uid, count = instances.len(), "Expanded recurring event");

        instances
    }

    /// A standalone occurrence of this event starting at `instant`.
    pub fn instance_at(&self, instant: NaiveDateTime) -> EventInstance {
        EventInstance {
            title: self.title.clone(),
            description: self.description.clone().unwrap_or_default(),
            start: self.start.with_instant(instant),
            end: self.end,
            all_day: self.all_day,
            uid: self.uid.clone(),
            sequence: self.sequence,
            recurrence_id: self.recurrence_id.clone(),
        }
    }
}

// ── EventInstance ───────────────────────────────────────────────────────────

/// One concrete occurrence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventInstance {
    pub title: String,
    pub description: String,
    pub start: DateTimeValue,
    pub end: EventEnd,
    pub all_day: bool,
    pub uid: String,
    pub sequence: i64,
    pub recurrence_id: Option<DateTimeValue>,
}

impl EventInstance {
    /// The end of this occurrence.
    ///
    /// A fixed offset is added in the start's own basis and keeps its zone.
    /// A duration on a zoned start is added after resolving the start to
    /// UTC, and the result is UTC.
    ///
    /// # Errors
    ///
    /// - [`TimelineError::UnknownTimezone`] or [`TimelineError::EmptyTimezone`]
    ///   if a zoned start cannot be resolved
    /// - [`TimelineError::InvalidValue`] if the end is out of range
    pub fn end_time(&self, zones: &TimezoneMap) -> Result<DateTimeValue> {
        match (self.end, &self.start.tzid) {
            (EventEnd::Duration(delta), Some(_)) => {
                let utc = zones
                    .resolve(&self.start)?
                    .checked_add_signed(delta)
                    .ok_or_else(|| self.end.out_of_range())?;
                Ok(DateTimeValue {
                    is_date_only: self.start.is_date_only,
                    ..DateTimeValue::utc(utc)
                })
            }
            (end, _) => {
                let instant = self
                    .start
                    .instant
                    .checked_add_signed(end.delta())
                    .ok_or_else(|| end.out_of_range())?;
                Ok(self.start.with_instant(instant))
            }
        }
    }

    pub fn is_override(&self) -> bool {
        self.recurrence_id.is_some()
    }
}
