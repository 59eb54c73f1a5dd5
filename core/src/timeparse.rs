//! Free-text time expression parsing
//!
//! Accepts a relative offset (`10s`, `5m`, `1h`) or one of a fixed list of
//! absolute layouts. All absolute results are interpreted as UTC.

use crate::error::TimeError;
use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use regex::Regex;
use std::sync::LazyLock;

static RELATIVE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)\s*([smh])$").expect("relative time pattern"));

/// Absolute layouts, tried in priority order. First parse wins.
const ABSOLUTE_LAYOUTS: &[&str] = &[
    "%Y-%m-%d %H:%M",    // 2025-03-10 15:30
    "%m/%d/%Y %I:%M %p", // 03/10/2025 03:30 pm
    "%d/%m/%Y %H:%M",    // 10/03/2025 15:30
    "%B %d %Y %I:%M %p", // march 10 2025 03:30 pm
    "%B %d %Y %H:%M",    // march 10 2025 15:30
];

/// Human-readable list of accepted patterns, surfaced verbatim to users
/// when parsing fails.
pub const ACCEPTED_PATTERNS: &str = "`10s`, `5m`, `1h`, `YYYY-MM-DD HH:MM`, \
`MM/DD/YYYY hh:mm AM/PM`, `DD/MM/YYYY HH:MM`, `March 10 2025 03:30 PM`, \
`March 10 2025 15:30`";

/// Parse a free-text time expression into an absolute UTC instant.
pub fn parse_time(text: &str) -> Result<DateTime<Utc>, TimeError> {
    parse_time_at(text, Utc::now())
}

/// Like [`parse_time`], with an explicit reference instant for relative
/// offsets. Tests pin `now` here.
pub fn parse_time_at(text: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>, TimeError> {
    let cleaned = text.trim().to_lowercase();

    if let Some(caps) = RELATIVE.captures(&cleaned) {
        let amount: i64 = caps[1]
            .parse()
            .map_err(|_| TimeError::InvalidFormat(text.to_string()))?;
        let offset = match &caps[2] {
            "s" => Duration::seconds(amount),
            "m" => Duration::minutes(amount),
            _ => Duration::hours(amount),
        };
        return Ok(now + offset);
    }

    for layout in ABSOLUTE_LAYOUTS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(&cleaned, layout) {
            return Ok(naive.and_utc());
        }
    }

    Err(TimeError::InvalidFormat(text.to_string()))
}
