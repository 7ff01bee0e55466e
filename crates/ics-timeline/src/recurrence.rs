//! Recurrence sequences backed by the `rrule` crate.
//!
//! Occurrences are generated in the same "wall-clock digits" basis as
//! [`crate::values::DateTimeValue::instant`]: the anchor is handed to `rrule`
//! as if it were UTC, so generated digits line up with the local digits of
//! the anchor regardless of the zone the event is later resolved in.

use chrono::NaiveDateTime;
use rrule::RRuleSet;

use crate::error::{Result, TimelineError};

const ICAL_FORMAT: &str = "%Y%m%dT%H%M%S";

/// A repeating rule anchored at a start, minus a set of excluded starts.
#[derive(Debug, Clone)]
pub struct RecurrenceSet {
    /// `None` when the rule ends before its anchor and yields nothing.
    set: Option<RRuleSet>,
}

impl RecurrenceSet {
    /// Build a sequence from an RRULE value (`FREQ=WEEKLY;BYDAY=MO`), its
    /// anchor, and the starts to exclude.
    ///
    /// A rule whose `UNTIL` falls before the anchor is an empty sequence.
    ///
    /// # Errors
    ///
    /// Returns [`TimelineError::InvalidRule`] if `rrule` rejects the rule.
    pub fn new(rule: &str, anchor: NaiveDateTime, exdates: &[NaiveDateTime]) -> Result<Self> {
        let rule = normalize_until(&rule.trim().to_ascii_uppercase());
        if until_of(&rule).is_some_and(|until| until < anchor) {
            tracing::debug!(rule = %rule, "UNTIL precedes DTSTART, sequence is empty");
            return Ok(Self { set: None });
        }

        let mut text = format!("DTSTART:{}Z\nRRULE:{}", anchor.format(ICAL_FORMAT), rule);

        if !exdates.is_empty() {
            let list: Vec<String> = exdates
                .iter()
                .map(|d| format!("{}Z", d.format(ICAL_FORMAT)))
                .collect();
            text.push_str("\nEXDATE:");
            text.push_str(&list.join(","));
        }

        let set = text
            .parse::<RRuleSet>()
            .map_err(|e| TimelineError::InvalidRule(format!("'{rule}': {e}")))?;

        Ok(Self { set: Some(set) })
    }

    /// Occurrences `t` with `from <= t <= to`, ascending.
    pub fn between(&self, from: NaiveDateTime, to: NaiveDateTime) -> Vec<NaiveDateTime> {
        let mut occurrences = Vec::new();
        let Some(set) = &self.set else {
            return occurrences;
        };
        for occurrence in set {
            let t = occurrence.naive_utc();
            if t > to {
                break;
            }
            if t >= from {
                occurrences.push(t);
            }
        }
        occurrences
    }

    /// The latest occurrence at or before `at`, if the sequence has started.
    pub fn latest_at_or_before(&self, at: NaiveDateTime) -> Option<NaiveDateTime> {
        self.set
            .as_ref()?
            .into_iter()
            .map(|occurrence| occurrence.naive_utc())
            .take_while(|t| *t <= at)
            .last()
    }
}

/// Rewrite `UNTIL` into UTC form.
///
/// The anchor is always handed to `rrule` as UTC, and `rrule` insists that
/// UNTIL shares DTSTART's zone. Dates become midnight, and local date-times
/// get a `Z` suffix.
///
/// A UTC `UNTIL` is kept as written and compared against local digits, so on
/// a zoned series east of UTC the last occurrence can be cut off.
fn normalize_until(rule: &str) -> String {
    rule.split(';')
        .map(|part| match part.strip_prefix("UNTIL=") {
            Some(until) if until.ends_with('Z') => part.to_string(),
            Some(until) if until.len() == 8 && until.bytes().all(|b| b.is_ascii_digit()) => {
                format!("UNTIL={until}T000000Z")
            }
            Some(until) if until.len() == 15 && until.as_bytes().get(8) == Some(&b'T') => {
                format!("UNTIL={until}Z")
            }
            _ => part.to_string(),
        })
        .collect::<Vec<_>>()
        .join(";")
}

/// The `UNTIL` bound of a normalized rule, if it has a parseable one.
fn until_of(rule: &str) -> Option<NaiveDateTime> {
    rule.split(';')
        .find_map(|part| part.strip_prefix("UNTIL="))
        .and_then(|until| NaiveDateTime::parse_from_str(until, "%Y%m%dT%H%M%SZ").ok())
}
