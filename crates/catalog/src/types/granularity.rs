//! Datestamp granularity and request date normalization.
//!
//! Datestamps are compared as strings, so every date entering a query is
//! first rewritten to the repository's finest supported granularity. Lexical
//! order of two normalized dates then equals chronological order.

use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::OaiError;

/// The finest datestamp granularity a repository supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Granularity {
    /// `YYYY-MM-DD`
    #[default]
    #[serde(rename = "YYYY-MM-DD")]
    Day,
    /// `YYYY-MM-DDThh:mm:ssZ`
    #[serde(rename = "YYYY-MM-DDThh:mm:ssZ")]
    Seconds,
}

const DAY_LEN: usize = 10;
const SECONDS_LEN: usize = 20;

impl Granularity {
    /// Returns the pattern string used in Identify responses and configuration.
    pub fn pattern(&self) -> &'static str {
        match self {
            Granularity::Day => "YYYY-MM-DD",
            Granularity::Seconds => "YYYY-MM-DDThh:mm:ssZ",
        }
    }

    /// Returns the length of a datestamp at this granularity.
    pub fn width(&self) -> usize {
        match self {
            Granularity::Day => DAY_LEN,
            Granularity::Seconds => SECONDS_LEN,
        }
    }

    /// Returns the granularity implied by a normalized date's length.
    pub fn of(date: &str) -> Granularity {
        if date.len() > DAY_LEN {
            Granularity::Seconds
        } else {
            Granularity::Day
        }
    }

    /// The earliest representable date, used when `from` is omitted.
    pub fn earliest(&self) -> &'static str {
        match self {
            Granularity::Day => "0000-01-01",
            Granularity::Seconds => "0000-01-01T00:00:00Z",
        }
    }

    /// The latest representable date, used when `until` is omitted.
    pub fn latest(&self) -> &'static str {
        match self {
            Granularity::Day => "9999-12-31",
            Granularity::Seconds => "9999-12-31T23:59:59Z",
        }
    }

    /// Converts a request `from` argument to this granularity.
    ///
    /// Partial dates are padded towards the start of the period. A date finer
    /// than the repository supports is rejected.
    pub fn normalize_from(&self, from: &str) -> Result<String, OaiError> {
        self.pad(from, self.earliest())
    }

    /// Converts a request `until` argument to this granularity.
    ///
    /// Partial dates are padded towards the end of the period so the range
    /// stays inclusive.
    pub fn normalize_until(&self, until: &str) -> Result<String, OaiError> {
        self.pad(until, self.latest())
    }

    fn pad(&self, date: &str, filler: &str) -> Result<String, OaiError> {
        let date = date.trim();
        if date.len() > self.width() {
            return Err(OaiError::bad_argument(format!(
                "date {date} is finer than the repository granularity {}",
                self.pattern()
            )));
        }
        let mut padded = date.strip_suffix('Z').unwrap_or(date).to_string();
        if matches!(padded.len(), 0..=3 | 6 | 9 | 12 | 15 | 18) {
            return Err(OaiError::bad_argument(format!("malformed date: {date}")));
        }
        if padded.len() < self.width() {
            padded.push_str(&filler[padded.len()..]);
        }
        if !is_well_formed(&padded) {
            return Err(OaiError::bad_argument(format!("malformed date: {date}")));
        }
        Ok(padded)
    }

    /// Rewrites a stored datestamp to this granularity for comparison and display.
    ///
    /// Longer datestamps are truncated; a day-only datestamp in a seconds
    /// repository is taken as midnight.
    pub fn normalize_datestamp<'a>(&self, datestamp: &'a str) -> Cow<'a, str> {
        match self {
            Granularity::Day if datestamp.len() > DAY_LEN => {
                Cow::Borrowed(datestamp.get(..DAY_LEN).unwrap_or(datestamp))
            }
            Granularity::Seconds if datestamp.len() == DAY_LEN => {
                Cow::Owned(format!("{datestamp}T00:00:00Z"))
            }
            _ => Cow::Borrowed(datestamp),
        }
    }

    /// Formats a UTC timestamp at this granularity.
    pub fn format(&self, at: &chrono::DateTime<chrono::Utc>) -> String {
        match self {
            Granularity::Day => at.format("%Y-%m-%d").to_string(),
            Granularity::Seconds => at.format("%Y-%m-%dT%H:%M:%SZ").to_string(),
        }
    }
}

/// Checks the digit/separator layout and field ranges of a normalized date.
fn is_well_formed(date: &str) -> bool {
    let bytes = date.as_bytes();
    let digits = |range: std::ops::Range<usize>| bytes[range].iter().all(u8::is_ascii_digit);
    let field = |range: std::ops::Range<usize>| date[range].parse::<u32>().unwrap_or(u32::MAX);

    match bytes.len() {
        DAY_LEN | SECONDS_LEN => {}
        _ => return false,
    }
    if !(digits(0..4) && bytes[4] == b'-' && digits(5..7) && bytes[7] == b'-' && digits(8..10)) {
        return false;
    }
    if !(1..=12).contains(&field(5..7)) || !(1..=31).contains(&field(8..10)) {
        return false;
    }
    if bytes.len() == DAY_LEN {
        return true;
    }
    bytes[10] == b'T'
        && digits(11..13)
        && bytes[13] == b':'
        && digits(14..16)
        && bytes[16] == b':'
        && digits(17..19)
        && bytes[19] == b'Z'
        && field(11..13) < 24
        && field(14..16) < 60
        && field(17..19) < 61
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.pattern())
    }
}

impl FromStr for Granularity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "YYYY-MM-DD" => Ok(Granularity::Day),
            "YYYY-MM-DDThh:mm:ssZ" => Ok(Granularity::Seconds),
            _ => Err(format!("unknown granularity: {s}")),
        }
    }
}
