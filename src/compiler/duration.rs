use crate::{Error, Result};
use lazy_static::lazy_static;
use regex::Regex;
use std::time::Duration;

lazy_static! {
    static ref LARGE_UNIT: Regex = Regex::new(r"^(\d+)(d|w|M|y)$").unwrap();
}

/// Rewrite day/week/month/year intervals as hours.
///
/// Anything else is returned unchanged and left for the duration parser.
/// Months are 30 days and years are 365 days.
pub fn normalize(raw: &str) -> String {
    let Some(captures) = LARGE_UNIT.captures(raw) else {
        return raw.to_string();
    };

    let days: u64 = match &captures[2] {
        "d" => 1,
        "w" => 7,
        "M" => 30,
        _ => 365,
    };

    match captures[1].parse::<u64>() {
        Ok(value) => match value.checked_mul(days * 24) {
            Some(hours) => format!("{hours}h"),
            None => raw.to_string(),
        },
        // too many digits, let the parser reject it
        Err(_) => raw.to_string(),
    }
}

/// Parse a user supplied interval such as `30s`, `5m` or `2w`.
pub fn parse_interval(raw: &str) -> Result<Duration> {
    humantime::parse_duration(&normalize(raw)).map_err(|_| Error::DurationParse(raw.to_string()))
}
