//! Repairs applied to raw ICS text before it is interpreted.

use ical::generator::Emitter;
use ical::parser::ical::component::IcalCalendar;
use ical::property::Property;
use ical::IcalParser;

use crate::error::{Result, TimelineError};
use crate::values::find_property;

/// Parses ICS text into its VCALENDAR blocks, repairing exporter quirks on
/// the way.
///
/// - `;FILENAME=` parameters (emitted by some exporters) become
///   `;X-FILENAME=`.
/// - Every VEVENT without a SUMMARY gets an empty one.
///
/// # Errors
///
/// Returns [`TimelineError::InvalidCalendarDocument`] if the text is not
/// well-formed ICS or holds no VCALENDAR.
#[tracing::instrument(skip(input), fields(input_len = input.len()))]
pub fn parse_document(input: &str) -> Result<Vec<IcalCalendar>> {
    let input = input.replace(";FILENAME=", ";X-FILENAME=");

    let mut calendars = IcalParser::new(input.as_bytes())
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| TimelineError::InvalidCalendarDocument(e.to_string()))?;

    if calendars.is_empty() {
        return Err(TimelineError::InvalidCalendarDocument(
            "no VCALENDAR component found".to_string(),
        ));
    }

    let mut repaired = 0usize;
    for event in calendars.iter_mut().flat_map(|c| c.events.iter_mut()) {
        if find_property(&event.properties, "SUMMARY").is_none() {
            event.properties.push(Property {
                name: "SUMMARY".to_string(),
                params: None,
                value: Some(String::new()),
            });
            repaired += 1;
        }
    }

    if repaired > 0 {
        tracing::debug!(repaired, "Added empty SUMMARY to VEVENTs");
    }
    tracing::debug!(calendars = calendars.len(), "Parsed ICS document");

    Ok(calendars)
}

/// Repairs ICS text and serializes it back.
///
/// # Errors
///
/// See [`parse_document`].
///
/// # Examples
///
/// ```
/// use ics_timeline::clean_calendar;
///
/// let ics = "BEGIN:VCALENDAR\r\nBEGIN:VEVENT\r\nUID:1\r\nEND:VEVENT\r\nEND:VCALENDAR\r\n";
/// let cleaned = clean_calendar(ics).unwrap();
/// assert!(cleaned.contains("SUMMARY:"));
/// ```
pub fn clean_calendar(input: &str) -> Result<String> {
    Ok(parse_document(input)?
        .iter()
        .map(|calendar| calendar.generate())
        .collect())
}
