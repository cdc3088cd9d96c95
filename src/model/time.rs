use crate::compiler::parse_interval;
use crate::heroic::HeroicRange;
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::Deserialize;

/// The dashboard time range. Bounds may be absolute or relative to now.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TimeRange {
    pub from: TimeBound,
    pub to: TimeBound,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum TimeBound {
    /// Milliseconds since the epoch
    Millis(i64),
    /// `now`, `now-6h`, an RFC 3339 timestamp, or a millisecond string
    Expr(String),
}

impl TimeRange {
    pub fn absolute(from: i64, to: i64) -> Self {
        Self {
            from: TimeBound::Millis(from),
            to: TimeBound::Millis(to),
        }
    }

    /// Resolve both bounds against the same instant.
    pub fn resolve(&self, now: DateTime<Utc>) -> Result<HeroicRange> {
        let start = self.from.resolve(now)?;
        let end = self.to.resolve(now)?;

        if start > end {
            return Err(Error::InvalidRequest(format!(
                "range start {start} is after range end {end}"
            )));
        }

        Ok(HeroicRange::absolute(start, end))
    }
}

impl TimeBound {
    pub fn resolve(&self, now: DateTime<Utc>) -> Result<i64> {
        let expr = match self {
            TimeBound::Millis(ms) => return Ok(*ms),
            TimeBound::Expr(expr) => expr.trim(),
        };

        if expr == "now" {
            return Ok(now.timestamp_millis());
        }

        if let Some(offset) = expr.strip_prefix("now-") {
            let offset = parse_interval(offset.trim())?;
            let offset = i64::try_from(offset.as_millis())
                .map_err(|_| Error::InvalidRequest(format!("time offset too large: {expr}")))?;
            return Ok(now.timestamp_millis().saturating_sub(offset));
        }

        if let Ok(ms) = expr.parse::<i64>() {
            return Ok(ms);
        }

        DateTime::parse_from_rfc3339(expr)
            .map(|t| t.timestamp_millis())
            .map_err(|_| Error::InvalidRequest(format!("unrecognized time: {expr:?}")))
    }
}
