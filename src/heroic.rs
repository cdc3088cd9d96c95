//! Wire types for the Heroic `/query/batch` endpoint.

use serde::ser::SerializeSeq;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::{BTreeMap, HashMap};

/// Feature flag enabling distributed aggregations on the backend.
pub const DISTRIBUTED_AGGREGATIONS: &str = "com.spotify.heroic.distributed_aggregations";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeroicRange {
    pub start: i64,
    pub end: i64,
    #[serde(rename = "type")]
    pub kind: String,
}

impl HeroicRange {
    pub fn absolute(start: i64, end: i64) -> Self {
        Self {
            start,
            end,
            kind: "absolute".to_string(),
        }
    }
}

/// The outbound payload: every panel query of one request, keyed by batch key.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryBatch {
    pub queries: BTreeMap<String, HeroicQuery>,
    pub range: HeroicRange,
}

impl QueryBatch {
    pub fn get(&self, key: &str) -> Option<&HeroicQuery> {
        self.queries.get(key)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeroicQuery {
    pub features: Vec<String>,
    pub filter: Filter,
    pub aggregators: Vec<Aggregator>,
    /// Legend template, applied to series names after decoding
    #[serde(skip)]
    pub alias: String,
    /// Panel this query was compiled from
    #[serde(skip)]
    pub ref_id: String,
}

/// A node of the prefix-notation filter tree.
///
/// Serializes as nested JSON arrays, e.g. `["and", ["key", "cpu"]]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    And(Vec<Filter>),
    Key(String),
    Not(Box<Filter>),
    /// `[operator, key]`, a predicate on the tag name alone
    Custom { operator: String, key: String },
    /// `[operator, key, value]`
    Match {
        operator: String,
        key: String,
        value: String,
    },
}

impl Serialize for Filter {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Filter::And(children) => {
                let mut seq = serializer.serialize_seq(Some(children.len() + 1))?;
                seq.serialize_element("and")?;
                for child in children {
                    seq.serialize_element(child)?;
                }
                seq.end()
            }
            Filter::Key(value) => ("key", value).serialize(serializer),
            Filter::Not(inner) => ("not", inner).serialize(serializer),
            Filter::Custom { operator, key } => (operator, key).serialize(serializer),
            Filter::Match {
                operator,
                key,
                value,
            } => (operator, key, value).serialize(serializer),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Sampling {
    pub unit: String,
    pub value: i64,
}

impl Sampling {
    pub fn seconds(value: i64) -> Self {
        Self {
            unit: "seconds".to_string(),
            value,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Aggregator {
    Filter(FilterAggregator),
    Group(GroupAggregator),
}

/// A top/bottom-k style stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilterAggregator {
    #[serde(rename = "type")]
    pub kind: String,
    pub k: i64,
    pub of: EmptyOf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmptyOf {
    #[serde(rename = "type")]
    pub kind: &'static str,
}

impl Default for EmptyOf {
    fn default() -> Self {
        Self { kind: "empty" }
    }
}

/// A grouping stage. `of: None` aggregates each series on its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupAggregator {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub of: Option<Vec<String>>,
    pub each: Vec<AggregatorEach>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AggregatorEach {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sampling: Option<Sampling>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HeroicResponse {
    #[serde(default, deserialize_with = "null_as_default")]
    pub results: HashMap<String, HeroicResult>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeroicResult {
    #[serde(default, deserialize_with = "null_as_default")]
    pub query_id: String,
    #[serde(default)]
    pub range: Option<ResultRange>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub result: Vec<ResultGroup>,
}

/// Range echoed back by the backend. Any field may be missing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ResultRange {
    #[serde(default, deserialize_with = "null_as_default")]
    pub start: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub end: i64,
    #[serde(default, rename = "type", deserialize_with = "null_as_default")]
    pub kind: String,
}

/// One series as returned by the backend.
#[derive(Debug, Clone, Deserialize)]
pub struct ResultGroup {
    #[serde(default, rename = "type", deserialize_with = "null_as_default")]
    pub kind: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub hash: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub values: Vec<RawPoint>,
    #[serde(default, rename = "key", deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tags: HashMap<String, String>,
}

/// Explicit `null` reads as the field's default, same as an absent field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// A `[timestamp, value]` pair. Either element may be null or absent.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawPoint(pub Vec<Option<f64>>);
