//! Decoding of `/query/batch` responses into named time series.

use crate::heroic::{HeroicResponse, QueryBatch, RawPoint, ResultGroup};
use crate::stats::*;
use crate::{Error, Result};
use ringlog::*;
use serde::Serialize;
use std::collections::BTreeMap;

mod alias;

pub use alias::{format_name, Template};

/// A single sample. `value` is `None` where the backend had no data.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Point {
    pub timestamp: i64,
    pub value: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Series {
    /// Display name after applying the panel's legend template
    pub name: String,
    /// Dotted metric name as returned by the backend
    pub raw_name: String,
    pub tags: BTreeMap<String, String>,
    pub points: Vec<Point>,
}

/// All series returned for one panel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultSet {
    pub ref_id: String,
    /// Identifier the backend assigned to the query
    pub query_id: String,
    pub series: Vec<Series>,
}

/// Decode a raw response for `batch`, keyed by panel ref id.
///
/// A non-2xx status or a malformed body fails the whole response.
pub fn decode(status: u16, body: &[u8], batch: &QueryBatch) -> Result<BTreeMap<String, ResultSet>> {
    if !(200..300).contains(&status) {
        let body = String::from_utf8_lossy(body).into_owned();
        error!("request failed status: {status} body: {body}");
        return Err(Error::BackendRequest { status, body });
    }

    let response: HeroicResponse = serde_json::from_slice(body).map_err(|e| {
        error!(
            "failed to unmarshal heroic response: {e} status: {status} body: {}",
            String::from_utf8_lossy(body)
        );
        Error::ResponseDecode(e.to_string())
    })?;

    let mut results = BTreeMap::new();

    for (key, result) in response.results {
        let Some(query) = batch.get(&key) else {
            warn!("ignoring result for unknown batch key: {key}");
            continue;
        };

        let series: Vec<Series> = result
            .result
            .into_iter()
            .map(|group| decode_series(group, &query.alias))
            .collect();

        SERIES_DECODED.add(series.len() as u64);

        let set = ResultSet {
            ref_id: query.ref_id.clone(),
            query_id: result.query_id,
            series,
        };
        if results.insert(query.ref_id.clone(), set).is_some() {
            warn!("batch key {key} replaced earlier results for ref id {}", query.ref_id);
        }
    }

    Ok(results)
}

fn decode_series(group: ResultGroup, alias: &str) -> Series {
    let tags: BTreeMap<String, String> = group.tags.into_iter().collect();
    let name = format_name(alias, &group.name, &tags);

    let points: Vec<Point> = group.values.iter().filter_map(decode_point).collect();
    POINTS_DECODED.add(points.len() as u64);

    Series {
        name,
        raw_name: group.name,
        tags,
        points,
    }
}

/// Timestamps are epoch milliseconds. Null, absent, and non-finite values
/// all mean no data.
fn decode_point(raw: &RawPoint) -> Option<Point> {
    let Some(Some(timestamp)) = raw.0.first().copied() else {
        debug!("skipping point without timestamp: {:?}", raw.0);
        return None;
    };

    let value = raw.0.get(1).copied().flatten().filter(|v| v.is_finite());
    if value.is_none() {
        POINTS_MISSING.increment();
    }

    Some(Point {
        timestamp: timestamp as i64,
        value,
    })
}
