//! Calendars, calendar sets, and the flattened event records they produce.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use ical::parser::ical::component::IcalCalendar;
use serde::Serialize;

use crate::error::{Result, TimelineError};
use crate::event::{Event, EventInstance};
use crate::preprocess::parse_document;
use crate::timezone::{Timezone, TimezoneMap};
use crate::values::{find_property, property_value, DateTimeValue};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f";

// ── Options ─────────────────────────────────────────────────────────────────

/// How two records for the same occurrence are reconciled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MergePolicy {
    /// The record seen last replaces the earlier one, whatever its SEQUENCE.
    #[default]
    LastWriteWins,
    /// An override (a record with a recurrence id) is never replaced by a
    /// generated occurrence. Between records of the same kind the higher
    /// SEQUENCE wins; on equal SEQUENCE the later record wins.
    PreferOverride,
}

impl MergePolicy {
    fn replaces(self, existing: &EventRecord, incoming: &EventRecord) -> bool {
        match self {
            MergePolicy::LastWriteWins => true,
            MergePolicy::PreferOverride => {
                match (existing.is_override(), incoming.is_override()) {
                    (true, false) => false,
                    (false, true) => true,
                    _ => incoming.sequence >= existing.sequence,
                }
            }
        }
    }
}

/// What to do when a single VEVENT cannot be loaded or resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorPolicy {
    /// Fail the whole document.
    #[default]
    AbortDocument,
    /// Log a warning and drop the event. VTIMEZONE errors still abort.
    SkipEvent,
}

/// Options for loading and querying calendars.
#[derive(Debug, Clone, Default)]
pub struct CalendarOptions {
    pub merge_policy: MergePolicy,
    pub error_policy: ErrorPolicy,
    /// Resolve TZIDs with no VTIMEZONE as IANA zone names.
    pub iana_fallback: bool,
}

// ── EventRecord ─────────────────────────────────────────────────────────────

/// One occurrence, flattened for callers.
///
/// Timestamps are ISO-8601 with milliseconds. UTC and zoned values are
/// rendered in UTC with a `Z` suffix; floating values carry no suffix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRecord {
    pub title: String,
    pub description: String,
    pub start: String,
    pub end: String,
    pub all_day: bool,
    pub uid: String,
    pub sequence: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recurrence_id: Option<String>,
}

impl EventRecord {
    /// Flattens an occurrence, resolving zoned timestamps through `zones`.
    ///
    /// # Errors
    ///
    /// Returns [`TimelineError::UnknownTimezone`] or
    /// [`TimelineError::EmptyTimezone`] if a zoned value cannot be resolved.
    pub fn from_instance(instance: &EventInstance, zones: &TimezoneMap) -> Result<Self> {
        Ok(Self {
            title: instance.title.clone(),
            description: instance.description.clone(),
            start: format_timestamp(&instance.start, zones)?,
            end: format_timestamp(&instance.end_time(zones)?, zones)?,
            all_day: instance.all_day,
            uid: instance.uid.clone(),
            sequence: instance.sequence,
            recurrence_id: instance
                .recurrence_id
                .as_ref()
                .map(|id| format_timestamp(id, zones))
                .transpose()?,
        })
    }

    /// Identifies the occurrence slot this record fills: the UID plus the
    /// recurrence id for overrides, or the start for everything else.
    pub fn dedup_key(&self) -> String {
        format!(
            "{}{}",
            self.uid,
            self.recurrence_id.as_deref().unwrap_or(&self.start)
        )
    }

    pub fn is_override(&self) -> bool {
        self.recurrence_id.is_some()
    }
}

/// Renders a value as an ISO-8601 timestamp with millisecond precision.
///
/// # Errors
///
/// Returns an error if a zoned value cannot be resolved.
pub fn format_timestamp(value: &DateTimeValue, zones: &TimezoneMap) -> Result<String> {
    if value.is_floating() {
        return Ok(value.instant.format(TIMESTAMP_FORMAT).to_string());
    }
    let utc = zones.resolve(value)?;
    Ok(format!("{}Z", utc.format(TIMESTAMP_FORMAT)))
}

/// Records keyed by [`EventRecord::dedup_key`], kept in first-seen order.
struct RecordMap {
    policy: MergePolicy,
    index: HashMap<String, usize>,
    records: Vec<EventRecord>,
}

impl RecordMap {
    fn new(policy: MergePolicy) -> Self {
        Self {
            policy,
            index: HashMap::new(),
            records: Vec::new(),
        }
    }

    fn upsert(&mut self, record: EventRecord) {
        let key = record.dedup_key();
        match self.index.get(&key) {
            Some(&i) => {
                if self.policy.replaces(&self.records[i], &record) {
                    self.records[i] = record;
                }
            }
            None => {
                self.index.insert(key, self.records.len());
                self.records.push(record);
            }
        }
    }
}

// ── Calendar ────────────────────────────────────────────────────────────────

/// The timezones and events of one VCALENDAR block.
#[derive(Debug, Clone)]
pub struct Calendar {
    pub timezones: TimezoneMap,
    pub events: Vec<Event>,
    options: CalendarOptions,
}

impl Calendar {
    /// Loads a parsed VCALENDAR with default options.
    ///
    /// # Errors
    ///
    /// Returns the first VTIMEZONE or VEVENT construction error.
    pub fn from_component(component: &IcalCalendar) -> Result<Self> {
        Self::from_component_with_options(component, &CalendarOptions::default())
    }

    /// Loads a parsed VCALENDAR.
    ///
    /// # Errors
    ///
    /// Returns the first VTIMEZONE construction error, and the first VEVENT
    /// construction error unless `options.error_policy` is
    /// [`ErrorPolicy::SkipEvent`].
    pub fn from_component_with_options(
        component: &IcalCalendar,
        options: &CalendarOptions,
    ) -> Result<Self> {
        let mut timezones = TimezoneMap::new().with_iana_fallback(options.iana_fallback);
        for vtimezone in &component.timezones {
            timezones.insert(Timezone::from_component(vtimezone)?);
        }

        let mut events = Vec::new();
        for vevent in &component.events {
            match Event::from_component(vevent) {
                Ok(event) => events.push(event),
                Err(err) if options.error_policy == ErrorPolicy::SkipEvent => {
                    tracing::warn!(
                        uid = find_property(&vevent.properties, "UID").map(property_value),
                        error = %err,
                        "Skipping VEVENT that failed to load"
                    );
                }
                Err(err) => return Err(err),
            }
        }

        tracing::debug!(
            timezones = timezones.len(),
            events = events.len(),
            "Loaded VCALENDAR"
        );

        Ok(Self {
            timezones,
            events,
            options: options.clone(),
        })
    }

    /// All occurrences starting within `[start, end]`, merged per occurrence
    /// slot.
    ///
    /// Records come out in the order their slot was first seen, walking
    /// events in document order.
    ///
    /// # Errors
    ///
    /// Returns a resolution error for an event with an unresolvable TZID,
    /// unless the calendar was loaded with [`ErrorPolicy::SkipEvent`], in
    /// which case that event is left out.
    #[tracing::instrument(skip(self), fields(events = self.events.len()))]
    pub fn between(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<EventRecord>> {
        let (from, to) = (start.naive_utc(), end.naive_utc());
        let mut merged = RecordMap::new(self.options.merge_policy);

        for event in &self.events {
            let records = event
                .between(from, to)
                .iter()
                .map(|instance| EventRecord::from_instance(instance, &self.timezones))
                .collect::<Result<Vec<_>>>();

            match records {
                Ok(records) => records.into_iter().for_each(|r| merged.upsert(r)),
                Err(err) if self.options.error_policy == ErrorPolicy::SkipEvent => {
                    tracing::warn!(uid = %event.uid, error = %err, "Skipping unresolvable event");
                }
                Err(err) => return Err(err),
            }
        }

        tracing::debug!(records = merged.records.len(), "Resolved calendar window");
        Ok(merged.records)
    }
}

// ── CalendarSet ─────────────────────────────────────────────────────────────

/// Several calendars queried as one feed.
#[derive(Debug, Clone, Default)]
pub struct CalendarSet {
    pub calendars: Vec<Calendar>,
}

impl CalendarSet {
    /// Cleans, parses and loads ICS text with default options.
    ///
    /// # Errors
    ///
    /// Returns [`TimelineError::InvalidCalendarDocument`] for unparseable
    /// text, or the first construction error.
    ///
    /// # Examples
    ///
    /// ```
    /// use chrono::{TimeZone, Utc};
    /// use ics_timeline::CalendarSet;
    ///
    /// let ics = "BEGIN:VCALENDAR\r\n\
    /// BEGIN:VEVENT\r\n\
    /// UID:launch\r\n\
    /// SUMMARY:Launch\r\n\
    /// DTSTART:20260301T120000Z\r\n\
    /// DURATION:PT1H\r\n\
    /// END:VEVENT\r\n\
    /// END:VCALENDAR\r\n";
    ///
    /// let set = CalendarSet::from_ics(ics).unwrap();
    /// let start = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap();
    /// let end = Utc.with_ymd_and_hms(2026, 3, 2, 0, 0, 0).unwrap();
    /// let records = set.between(start, end).unwrap();
    ///
    /// assert_eq!(records.len(), 1);
    /// assert_eq!(records[0].start, "2026-03-01T12:00:00.000Z");
    /// assert_eq!(records[0].end, "2026-03-01T13:00:00.000Z");
    /// ```
    pub fn from_ics(input: &str) -> Result<Self> {
        Self::from_ics_with_options(input, &CalendarOptions::default())
    }

    /// Cleans, parses and loads ICS text.
    ///
    /// # Errors
    ///
    /// See [`CalendarSet::from_ics`] and
    /// [`Calendar::from_component_with_options`].
    #[tracing::instrument(skip(input), fields(input_len = input.len()))]
    pub fn from_ics_with_options(input: &str, options: &CalendarOptions) -> Result<Self> {
        Self::from_calendars_with_options(&parse_document(input)?, options)
    }

    /// Loads parsed VCALENDARs, in order.
    ///
    /// # Errors
    ///
    /// Returns the first construction error.
    pub fn from_calendars(calendars: &[IcalCalendar]) -> Result<Self> {
        Self::from_calendars_with_options(calendars, &CalendarOptions::default())
    }

    /// Loads parsed VCALENDARs, in order.
    ///
    /// # Errors
    ///
    /// See [`Calendar::from_component_with_options`].
    pub fn from_calendars_with_options(
        calendars: &[IcalCalendar],
        options: &CalendarOptions,
    ) -> Result<Self> {
        let calendars = calendars
            .iter()
            .map(|c| Calendar::from_component_with_options(c, options))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { calendars })
    }

    /// Every calendar's [`Calendar::between`], concatenated. Records are not
    /// deduplicated across calendars.
    ///
    /// # Errors
    ///
    /// Returns the first calendar's error.
    pub fn between(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<EventRecord>> {
        let mut records = Vec::new();
        for calendar in &self.calendars {
            records.extend(calendar.between(start, end)?);
        }
        Ok(records)
    }
}

impl TryFrom<&str> for CalendarSet {
    type Error = TimelineError;

    fn try_from(input: &str) -> Result<Self> {
        Self::from_ics(input)
    }
}
