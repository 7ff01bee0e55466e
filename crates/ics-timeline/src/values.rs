//! Typed interpretation of raw property values.
//!
//! Every date-time is kept as its wall-clock digits ([`NaiveDateTime`]) plus
//! the metadata needed to interpret them later: UTC, date-only, or a TZID
//! naming a VTIMEZONE of the same calendar. Values with neither a `Z` suffix
//! nor a TZID are *floating*; this crate compares them as if their digits
//! were UTC digits. That is an approximation: true floating time depends on
//! the viewer's zone, which is not modeled here.
//!
//! Recurrence expansion shares that basis: RRULE occurrences are generated
//! on the local digits, so a UTC `UNTIL` on a zoned series is compared
//! against local digits too. In zones east of UTC this can drop the final
//! occurrence of an UNTIL-bounded series.

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use ical::property::Property;

use crate::error::{Result, TimelineError};

// ── Property access ─────────────────────────────────────────────────────────

/// First property with the given name.
pub fn find_property<'a>(properties: &'a [Property], name: &str) -> Option<&'a Property> {
    properties.iter().find(|p| p.name.eq_ignore_ascii_case(name))
}

/// Every property with the given name, in document order.
pub fn find_properties<'a>(
    properties: &'a [Property],
    name: &'a str,
) -> impl Iterator<Item = &'a Property> {
    properties
        .iter()
        .filter(move |p| p.name.eq_ignore_ascii_case(name))
}

/// The raw value of a property; an empty value reads as `""`.
pub fn property_value(property: &Property) -> &str {
    property.value.as_deref().unwrap_or_default()
}

/// First value of the named parameter, with surrounding quotes removed.
pub fn find_param<'a>(property: &'a Property, name: &str) -> Option<&'a str> {
    property
        .params
        .as_ref()?
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .and_then(|(_, values)| values.first())
        .map(|v| v.trim_matches('"'))
}

// ── DateTimeValue ───────────────────────────────────────────────────────────

/// A timestamp paired with how it should be interpreted.
///
/// Invariant: when `tzid` is set, `is_utc` is false.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DateTimeValue {
    /// Wall-clock digits. For UTC values these are UTC digits; for zoned and
    /// floating values they are local digits in the unresolved basis.
    pub instant: NaiveDateTime,
    pub is_utc: bool,
    pub is_date_only: bool,
    pub tzid: Option<String>,
}

impl DateTimeValue {
    pub fn utc(instant: NaiveDateTime) -> Self {
        Self {
            instant,
            is_utc: true,
            is_date_only: false,
            tzid: None,
        }
    }

    pub fn floating(instant: NaiveDateTime) -> Self {
        Self {
            instant,
            is_utc: false,
            is_date_only: false,
            tzid: None,
        }
    }

    pub fn zoned(instant: NaiveDateTime, tzid: impl Into<String>) -> Self {
        Self {
            instant,
            is_utc: false,
            is_date_only: false,
            tzid: Some(tzid.into()),
        }
    }

    /// A whole-day value at local midnight.
    pub fn date(date: NaiveDate) -> Self {
        Self {
            instant: date.and_time(NaiveTime::MIN),
            is_utc: false,
            is_date_only: true,
            tzid: None,
        }
    }

    /// Neither UTC nor bound to a timezone.
    pub fn is_floating(&self) -> bool {
        !self.is_utc && self.tzid.is_none()
    }

    /// The same interpretation metadata anchored at a different instant.
    #[must_use]
    pub fn with_instant(&self, instant: NaiveDateTime) -> Self {
        Self {
            instant,
            ..self.clone()
        }
    }

    /// Parses the value of a DATE or DATE-TIME property.
    ///
    /// A `VALUE=DATE` parameter or a bare 8-digit value selects the date
    /// form. A trailing `Z` marks UTC and takes precedence over any TZID.
    ///
    /// # Errors
    ///
    /// Returns [`TimelineError::InvalidValue`] if the value is not a valid
    /// DATE or DATE-TIME.
    pub fn from_property(property: &Property) -> Result<Self> {
        Self::parse(&property.name, property_value(property), property)
    }

    /// Parses every comma-separated value of a list property such as EXDATE.
    ///
    /// # Errors
    ///
    /// Returns [`TimelineError::InvalidValue`] if any entry is malformed.
    pub fn list_from_property(property: &Property) -> Result<Vec<Self>> {
        property_value(property)
            .split(',')
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(|v| Self::parse(&property.name, v, property))
            .collect()
    }

    fn parse(name: &str, raw: &str, property: &Property) -> Result<Self> {
        let invalid = || TimelineError::InvalidValue {
            property: name.to_string(),
            value: raw.to_string(),
        };

        let is_date = find_param(property, "VALUE")
            .is_some_and(|t| t.eq_ignore_ascii_case("DATE"))
            || (raw.len() == 8 && raw.bytes().all(|b| b.is_ascii_digit()));

        if is_date {
            let date = NaiveDate::parse_from_str(raw, "%Y%m%d").map_err(|_| invalid())?;
            let mut value = Self::date(date);
            value.tzid = find_param(property, "TZID").map(str::to_string);
            return Ok(value);
        }

        if let Some(digits) = raw.strip_suffix(['Z', 'z']) {
            let instant =
                NaiveDateTime::parse_from_str(digits, "%Y%m%dT%H%M%S").map_err(|_| invalid())?;
            return Ok(Self::utc(instant));
        }

        let instant = NaiveDateTime::parse_from_str(raw, "%Y%m%dT%H%M%S").map_err(|_| invalid())?;
        Ok(match find_param(property, "TZID") {
            Some(tzid) => Self::zoned(instant, tzid),
            None => Self::floating(instant),
        })
    }
}

// ── DURATION ────────────────────────────────────────────────────────────────

/// Parses an RFC 5545 duration (`P1W`, `PT1H30M`, `-P1DT12H`) into a signed
/// span.
///
/// # Errors
///
/// Returns [`TimelineError::InvalidValue`] if the value is not a duration or
/// overflows.
pub fn parse_duration(raw: &str) -> Result<Duration> {
    let invalid = || TimelineError::InvalidValue {
        property: "DURATION".to_string(),
        value: raw.to_string(),
    };

    let s = raw.trim();
    let (sign, rest) = match s.as_bytes().first() {
        Some(b'-') => (-1i64, &s[1..]),
        Some(b'+') => (1i64, &s[1..]),
        _ => (1i64, s),
    };
    let rest = rest.strip_prefix(['P', 'p']).ok_or_else(invalid)?;

    let mut seconds: i64 = 0;
    let mut num_buf = String::new();
    let mut in_time = false;
    let mut found_any = false;

    for ch in rest.chars() {
        if ch.is_ascii_digit() {
            num_buf.push(ch);
            continue;
        }

        if matches!(ch, 'T' | 't') && !in_time && num_buf.is_empty() {
            in_time = true;
            continue;
        }

        let n: i64 = num_buf.parse().map_err(|_| invalid())?;
        num_buf.clear();

        let unit = match (ch.to_ascii_uppercase(), in_time) {
            ('W', false) => 7 * 86_400,
            ('D', false) => 86_400,
            ('H', true) => 3_600,
            ('M', true) => 60,
            ('S', true) => 1,
            _ => return Err(invalid()),
        };

        seconds = n
            .checked_mul(unit)
            .and_then(|v| seconds.checked_add(v))
            .ok_or_else(invalid)?;
        found_any = true;
    }

    if !num_buf.is_empty() || !found_any {
        return Err(invalid());
    }

    Duration::try_seconds(sign * seconds).ok_or_else(invalid)
}

// ── TEXT / INTEGER ──────────────────────────────────────────────────────────

/// Reverses RFC 5545 §3.3.11 text escaping.
pub fn unescape_text(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            result.push(c);
            continue;
        }
        match chars.next() {
            Some('n' | 'N') => result.push('\n'),
            Some(',') => result.push(','),
            Some(';') => result.push(';'),
            Some('\\') | None => result.push('\\'),
            Some(other) => {
                result.push('\\');
                result.push(other);
            }
        }
    }

    result
}

/// Parses a SEQUENCE value; absent or unparseable values become `-1`.
///
/// An explicit `SEQUENCE:0` stays `0` rather than collapsing into the
/// absent case.
pub fn parse_sequence(raw: Option<&str>) -> i64 {
    raw.and_then(|v| v.trim().parse().ok()).unwrap_or(-1)
}
