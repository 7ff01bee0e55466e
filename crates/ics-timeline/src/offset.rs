//! UTC offset tokens (`TZOFFSETFROM` / `TZOFFSETTO`, RFC 5545 §3.3.14).

use chrono::Duration;

use crate::error::{Result, TimelineError};

/// Parse a `[+|-]HHMM[SS]` offset token into a signed span.
///
/// A missing sign means positive. Exactly four or six digits are accepted.
///
/// # Errors
///
/// Returns [`TimelineError::InvalidOffsetFormat`] for any other shape.
///
/// # Examples
///
/// ```
/// use ics_timeline::offset::parse_offset;
///
/// assert_eq!(parse_offset("+0530").unwrap().num_milliseconds(), 19_800_000);
/// assert_eq!(parse_offset("-0800").unwrap().num_milliseconds(), -28_800_000);
/// assert!(parse_offset("+5:30").is_err());
/// ```
pub fn parse_offset(token: &str) -> Result<Duration> {
    let invalid = || TimelineError::InvalidOffsetFormat(token.to_string());

    let (sign, digits) = match token.as_bytes().first() {
        Some(b'-') => (-1i64, &token[1..]),
        Some(b'+') => (1i64, &token[1..]),
        _ => (1i64, token),
    };

    if !matches!(digits.len(), 4 | 6) || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }

    let field = |range: std::ops::Range<usize>| -> Result<i64> {
        digits
            .get(range)
            .map_or(Ok(0), |s| s.parse::<i64>().map_err(|_| invalid()))
    };

    let hours = field(0..2)?;
    let minutes = field(2..4)?;
    let seconds = field(4..6)?;

    Ok(Duration::seconds(sign * ((hours * 60 + minutes) * 60 + seconds)))
}
