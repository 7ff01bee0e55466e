//! VTIMEZONE resolution.
//!
//! A [`Timezone`] is built from the STANDARD and DAYLIGHT observances of a
//! VTIMEZONE component. Given a local wall-clock instant it finds the
//! observance whose most recent onset is latest, and applies that
//! observance's `TZOFFSETTO`.

use std::collections::HashMap;

use chrono::{Duration, NaiveDateTime, TimeZone};
use chrono_tz::Tz;
use ical::parser::ical::component::{
    IcalTimeZone, IcalTimeZoneTransition, IcalTimeZoneTransitionType,
};

use crate::error::{Result, TimelineError};
use crate::offset::parse_offset;
use crate::recurrence::RecurrenceSet;
use crate::values::{find_property, property_value, DateTimeValue};

// ── TimezoneTransition ──────────────────────────────────────────────────────

/// One STANDARD or DAYLIGHT observance.
#[derive(Debug, Clone)]
pub struct TimezoneTransition {
    pub offset_from: Duration,
    pub offset_to: Duration,
    /// First onset, in the zone's own local digits.
    pub start: NaiveDateTime,
    recurrence: Option<RecurrenceSet>,
}

impl TimezoneTransition {
    /// Builds an observance from a parsed STANDARD or DAYLIGHT block.
    ///
    /// # Errors
    ///
    /// - [`TimelineError::MissingRequiredProperty`] without DTSTART,
    ///   TZOFFSETFROM or TZOFFSETTO
    /// - [`TimelineError::InvalidOffsetFormat`] for a malformed offset
    /// - [`TimelineError::UnsupportedRecurrenceForm`] for RDATE without RRULE
    pub fn from_component(component: &IcalTimeZoneTransition) -> Result<Self> {
        let kind = match component.transition {
            IcalTimeZoneTransitionType::DAYLIGHT => "DAYLIGHT",
            IcalTimeZoneTransitionType::STANDARD => "STANDARD",
        };
        let properties = component.properties.as_slice();
        let required = |property: &'static str| {
            find_property(properties, property).ok_or(TimelineError::MissingRequiredProperty {
                component: kind,
                property,
            })
        };

        let offset_from = parse_offset(property_value(required("TZOFFSETFROM")?).trim())?;
        let offset_to = parse_offset(property_value(required("TZOFFSETTO")?).trim())?;
        let start = DateTimeValue::from_property(required("DTSTART")?)?.instant;

        let recurrence = match find_property(properties, "RRULE") {
            Some(rrule) => Some(RecurrenceSet::new(property_value(rrule), start, &[])?),
            None if find_property(properties, "RDATE").is_some() => {
                return Err(TimelineError::UnsupportedRecurrenceForm(format!(
                    "RDATE in {kind} observance"
                )));
            }
            None => None,
        };

        Ok(Self {
            offset_from,
            offset_to,
            start,
            recurrence,
        })
    }

    /// A fixed observance that never repeats.
    pub fn fixed(offset_from: Duration, offset_to: Duration, start: NaiveDateTime) -> Self {
        Self {
            offset_from,
            offset_to,
            start,
            recurrence: None,
        }
    }

    /// The latest onset at or before `at`, falling back to the first onset.
    pub fn latest_start(&self, at: NaiveDateTime) -> NaiveDateTime {
        self.recurrence
            .as_ref()
            .and_then(|r| r.latest_at_or_before(at))
            .unwrap_or(self.start)
    }
}

// ── Timezone ────────────────────────────────────────────────────────────────

/// A named set of observances.
#[derive(Debug, Clone)]
pub struct Timezone {
    pub tzid: String,
    pub standard: Vec<TimezoneTransition>,
    pub daylight: Vec<TimezoneTransition>,
}

impl Timezone {
    /// Builds a timezone from a parsed VTIMEZONE.
    ///
    /// # Errors
    ///
    /// Returns [`TimelineError::MissingRequiredProperty`] without TZID, or
    /// any error from [`TimezoneTransition::from_component`].
    pub fn from_component(component: &IcalTimeZone) -> Result<Self> {
        let tzid = find_property(&component.properties, "TZID")
            .map(|p| property_value(p).to_string())
            .ok_or(TimelineError::MissingRequiredProperty {
                component: "VTIMEZONE",
                property: "TZID",
            })?;

        let mut standard = Vec::new();
        let mut daylight = Vec::new();
        for transition in &component.transitions {
            let observance = TimezoneTransition::from_component(transition)?;
            match transition.transition {
                IcalTimeZoneTransitionType::STANDARD => standard.push(observance),
                IcalTimeZoneTransitionType::DAYLIGHT => daylight.push(observance),
            }
        }

        tracing::debug!(
            tzid = %tzid,
            standard = standard.len(),
            daylight = daylight.len(),
            "Loaded VTIMEZONE"
        );

        Ok(Self {
            tzid,
            standard,
            daylight,
        })
    }

    /// The observance in effect at `local`: the one whose latest onset is
    /// greatest. On equal onsets the first in STANDARD-then-DAYLIGHT order
    /// wins.
    ///
    /// # Errors
    ///
    /// Returns [`TimelineError::EmptyTimezone`] if there are no observances.
    pub fn observance_at(&self, local: NaiveDateTime) -> Result<&TimezoneTransition> {
        let mut best: Option<(NaiveDateTime, &TimezoneTransition)> = None;

        for transition in self.standard.iter().chain(&self.daylight) {
            let onset = transition.latest_start(local);
            if best.is_none_or(|(latest, _)| onset > latest) {
                best = Some((onset, transition));
            }
        }

        best.map(|(_, transition)| transition)
            .ok_or_else(|| TimelineError::EmptyTimezone(self.tzid.clone()))
    }

    /// Converts local wall-clock digits in this zone to UTC digits.
    ///
    /// # Errors
    ///
    /// Returns [`TimelineError::EmptyTimezone`] if there are no observances.
    pub fn to_utc(&self, local: NaiveDateTime) -> Result<NaiveDateTime> {
        Ok(local - self.observance_at(local)?.offset_to)
    }
}

// ── TimezoneMap ─────────────────────────────────────────────────────────────

/// All VTIMEZONEs of one calendar, keyed by TZID.
#[derive(Debug, Clone, Default)]
pub struct TimezoneMap {
    zones: HashMap<String, Timezone>,
    iana_fallback: bool,
}

impl TimezoneMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve TZIDs missing from the map as IANA names via `chrono-tz`.
    #[must_use]
    pub fn with_iana_fallback(mut self, enabled: bool) -> Self {
        self.iana_fallback = enabled;
        self
    }

    /// Adds a timezone; a later definition of the same TZID replaces the
    /// earlier one.
    pub fn insert(&mut self, timezone: Timezone) {
        self.zones.insert(timezone.tzid.clone(), timezone);
    }

    pub fn get(&self, tzid: &str) -> Option<&Timezone> {
        self.zones.get(tzid)
    }

    pub fn len(&self) -> usize {
        self.zones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }

    /// Converts local digits in the named zone to UTC digits.
    ///
    /// # Errors
    ///
    /// Returns [`TimelineError::UnknownTimezone`] if the TZID is neither in
    /// the map nor (with fallback enabled) a known IANA zone, and
    /// [`TimelineError::EmptyTimezone`] for a zone without observances.
    pub fn to_utc(&self, tzid: &str, local: NaiveDateTime) -> Result<NaiveDateTime> {
        if let Some(zone) = self.zones.get(tzid) {
            return zone.to_utc(local);
        }

        if self.iana_fallback {
            if let Some(utc) = iana_to_utc(tzid, local) {
                return Ok(utc);
            }
        }

        Err(TimelineError::UnknownTimezone(tzid.to_string()))
    }

    /// UTC digits for a date-time value. UTC and floating values pass
    /// through unchanged (floating digits are treated as UTC digits).
    ///
    /// # Errors
    ///
    /// See [`TimezoneMap::to_utc`].
    pub fn resolve(&self, value: &DateTimeValue) -> Result<NaiveDateTime> {
        match &value.tzid {
            Some(tzid) => self.to_utc(tzid, value.instant),
            None => Ok(value.instant),
        }
    }
}

/// IANA resolution for TZIDs without a VTIMEZONE.
///
/// Ambiguous local times take the earlier instant; times inside a DST gap
/// are shifted forward one hour.
fn iana_to_utc(tzid: &str, local: NaiveDateTime) -> Option<NaiveDateTime> {
    let name = tzid
        .strip_prefix("/mozilla.org/")
        .or_else(|| tzid.strip_prefix("/softwarestudio.org/"))
        .unwrap_or(tzid);
    let tz: Tz = name.parse().ok()?;

    tz.from_local_datetime(&local)
        .earliest()
        .or_else(|| tz.from_local_datetime(&(local + Duration::hours(1))).earliest())
        .map(|dt| dt.naive_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ical::IcalParser;

    fn naive(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    fn vtimezone(body: &str) -> IcalTimeZone {
        let ics = format!("BEGIN:VCALENDAR\r\n{body}END:VCALENDAR\r\n");
        let mut calendar = IcalParser::new(ics.as_bytes()).next().unwrap().unwrap();
        calendar.timezones.remove(0)
    }

    const EUROPEAN: &str = "\
BEGIN:VTIMEZONE\r\n\
TZID:Europe/London\r\n\
BEGIN:DAYLIGHT\r\n\
TZOFFSETFROM:+0000\r\n\
TZOFFSETTO:+0100\r\n\
DTSTART:19700329T020000\r\n\
RRULE:FREQ=YEARLY;BYMONTH=3;BYDAY=-1SU\r\n\
END:DAYLIGHT\r\n\
BEGIN:STANDARD\r\n\
TZOFFSETFROM:+0100\r\n\
TZOFFSETTO:+0000\r\n\
DTSTART:19701025T030000\r\n\
RRULE:FREQ=YEARLY;BYMONTH=10;BYDAY=-1SU\r\n\
END:STANDARD\r\n\
END:VTIMEZONE\r\n";

    // ── observance selection ────────────────────────────────────────────

    #[test]
    fn test_summer_uses_daylight_offset() {
        let tz = Timezone::from_component(&vtimezone(EUROPEAN)).unwrap();
        assert_eq!(
            tz.to_utc(naive("2026-07-15 12:00:00")).unwrap(),
            naive("2026-07-15 11:00:00")
        );
    }

    #[test]
    fn test_winter_uses_standard_offset() {
        let tz = Timezone::from_component(&vtimezone(EUROPEAN)).unwrap();
        assert_eq!(
            tz.to_utc(naive("2026-01-15 12:00:00")).unwrap(),
            naive("2026-01-15 12:00:00")
        );
    }

    #[test]
    fn test_onset_boundary_switches_observance() {
        let tz = Timezone::from_component(&vtimezone(EUROPEAN)).unwrap();
        let before = tz.observance_at(naive("2026-03-29 01:59:59")).unwrap();
        let at = tz.observance_at(naive("2026-03-29 02:00:00")).unwrap();
        assert_eq!(before.offset_to, Duration::zero());
        assert_eq!(at.offset_to, Duration::hours(1));
    }

    #[test]
    fn test_fixed_observance() {
        let body = "\
BEGIN:VTIMEZONE\r\n\
TZID:Asia/Kolkata\r\n\
BEGIN:STANDARD\r\n\
TZOFFSETFROM:+0530\r\n\
TZOFFSETTO:+0530\r\n\
DTSTART:19700101T000000\r\n\
END:STANDARD\r\n\
END:VTIMEZONE\r\n";
        let tz = Timezone::from_component(&vtimezone(body)).unwrap();
        assert_eq!(
            tz.to_utc(naive("2026-05-01 09:00:00")).unwrap(),
            naive("2026-05-01 03:30:00")
        );
    }

    #[test]
    fn test_equal_onsets_prefer_first_encountered() {
        let onset = naive("2000-01-01 00:00:00");
        let tz = Timezone {
            tzid: "Test/Tie".to_string(),
            standard: vec![TimezoneTransition::fixed(
                Duration::zero(),
                Duration::hours(2),
                onset,
            )],
            daylight: vec![TimezoneTransition::fixed(
                Duration::zero(),
                Duration::hours(5),
                onset,
            )],
        };
        assert_eq!(
            tz.observance_at(naive("2026-01-01 00:00:00"))
                .unwrap()
                .offset_to,
            Duration::hours(2)
        );
    }

    #[test]
    fn test_instant_before_every_onset_uses_latest_anchor() {
        let tz = Timezone::from_component(&vtimezone(EUROPEAN)).unwrap();
        // Neither rule has started; the October anchor is the later one.
        let observance = tz.observance_at(naive("1960-06-01 00:00:00")).unwrap();
        assert_eq!(observance.offset_to, Duration::zero());
    }

    // ── construction errors ─────────────────────────────────────────────

    #[test]
    fn test_rdate_without_rrule_is_unsupported() {
        let body = "\
BEGIN:VTIMEZONE\r\n\
TZID:Test/Rdate\r\n\
BEGIN:STANDARD\r\n\
TZOFFSETFROM:+0100\r\n\
TZOFFSETTO:+0000\r\n\
DTSTART:19701025T030000\r\n\
RDATE:19711031T030000\r\n\
END:STANDARD\r\n\
END:VTIMEZONE\r\n";
        let err = Timezone::from_component(&vtimezone(body)).unwrap_err();
        assert!(matches!(err, TimelineError::UnsupportedRecurrenceForm(_)));
    }

    #[test]
    fn test_malformed_offset_fails_construction() {
        let body = "\
BEGIN:VTIMEZONE\r\n\
TZID:Test/Bad\r\n\
BEGIN:STANDARD\r\n\
TZOFFSETFROM:+01:00\r\n\
TZOFFSETTO:+0000\r\n\
DTSTART:19701025T030000\r\n\
END:STANDARD\r\n\
END:VTIMEZONE\r\n";
        let err = Timezone::from_component(&vtimezone(body)).unwrap_err();
        assert_eq!(err, TimelineError::InvalidOffsetFormat("+01:00".to_string()));
    }

    #[test]
    fn test_missing_tzid() {
        let body = "BEGIN:VTIMEZONE\r\nEND:VTIMEZONE\r\n";
        let err = Timezone::from_component(&vtimezone(body)).unwrap_err();
        assert!(matches!(
            err,
            TimelineError::MissingRequiredProperty {
                property: "TZID",
                ..
            }
        ));
    }

    #[test]
    fn test_empty_timezone_errors_on_resolution() {
        let tz = Timezone::from_component(&vtimezone(
            "BEGIN:VTIMEZONE\r\nTZID:Test/Empty\r\nEND:VTIMEZONE\r\n",
        ))
        .unwrap();
        assert!(matches!(
            tz.to_utc(naive("2026-01-01 00:00:00")),
            Err(TimelineError::EmptyTimezone(_))
        ));
    }

    // ── TimezoneMap ─────────────────────────────────────────────────────

    #[test]
    fn test_map_unknown_timezone() {
        let map = TimezoneMap::new();
        let err = map
            .to_utc("Nowhere/Special", naive("2026-01-01 00:00:00"))
            .unwrap_err();
        assert_eq!(err, TimelineError::UnknownTimezone("Nowhere/Special".into()));
    }

    #[test]
    fn test_map_prefers_vtimezone_over_iana() {
        let mut map = TimezoneMap::new().with_iana_fallback(true);
        map.insert(Timezone::from_component(&vtimezone(EUROPEAN)).unwrap());
        assert_eq!(map.len(), 1);
        assert_eq!(
            map.to_utc("Europe/London", naive("2026-07-15 12:00:00"))
                .unwrap(),
            naive("2026-07-15 11:00:00")
        );
    }

    #[test]
    fn test_map_iana_fallback() {
        let map = TimezoneMap::new().with_iana_fallback(true);
        // January in New York is EST (UTC-5).
        assert_eq!(
            map.to_utc("America/New_York", naive("2026-01-15 10:00:00"))
                .unwrap(),
            naive("2026-01-15 15:00:00")
        );
        assert_eq!(
            map.to_utc("/mozilla.org/America/New_York", naive("2026-07-15 10:00:00"))
                .unwrap(),
            naive("2026-07-15 14:00:00")
        );
        assert!(map.to_utc("Not/AZone", naive("2026-01-15 10:00:00")).is_err());
    }

    #[test]
    fn test_map_resolve_passes_utc_and_floating_through() {
        let map = TimezoneMap::new();
        let t = naive("2026-01-15 10:00:00");
        assert_eq!(map.resolve(&DateTimeValue::utc(t)).unwrap(), t);
        assert_eq!(map.resolve(&DateTimeValue::floating(t)).unwrap(), t);
        assert!(map.resolve(&DateTimeValue::zoned(t, "Missing/Zone")).is_err());
    }
}
