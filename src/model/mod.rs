//! The dashboard's query model, parsed once at the boundary.
//!
//! The panel editor produces loosely shaped JSON: fields go missing, the
//! select list is nested one level deeper than it needs to be, and filter
//! parameters arrive as either numbers or strings. Everything here absorbs
//! that looseness so the compiler only sees typed clauses.

use crate::{Error, Result};
use serde::Deserialize;
use serde_json::Value;

mod time;

pub use time::{TimeBound, TimeRange};

/// Category name the editor assigns to top/bottom-k clauses.
pub const FILTERS_CATEGORY: &str = "Filters";

/// Category name for per-series aggregations.
pub const FOR_EACH_CATEGORY: &str = "For Each";

/// Reserved tag key matching on the series key instead of a tag.
pub const KEY_TAG: &str = "$key";

/// A full request from the dashboard: one time range shared by all panels.
#[derive(Debug, Clone, Deserialize)]
pub struct QueryRequest {
    pub range: TimeRange,
    #[serde(default)]
    pub queries: Vec<QueryModel>,
}

impl QueryRequest {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::InvalidRequest(e.to_string()))
    }
}

/// A single panel query.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryModel {
    #[serde(default)]
    pub ref_id: Option<String>,
    #[serde(default)]
    pub tags: Vec<TagFilter>,
    #[serde(default)]
    pub select: SelectList,
    #[serde(default)]
    pub group_by: GroupBy,
    #[serde(default)]
    pub alias: String,
    #[serde(default)]
    pub global_aggregation: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TagFilter {
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub operator: String,
    #[serde(default)]
    pub value: String,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
}

impl TagFilter {
    pub fn new(key: &str, operator: &str, value: &str) -> Self {
        Self {
            key: key.to_string(),
            operator: operator.to_string(),
            value: value.to_string(),
            kind: None,
        }
    }

    pub fn is_custom(&self) -> bool {
        self.kind.as_deref() == Some("custom")
    }
}

/// The select clauses of a panel, flattened from the editor's nested rows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectList(pub Vec<SelectClause>);

impl<'de> Deserialize<'de> for SelectList {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Shape {
            Nested(Vec<Vec<SelectClause>>),
            Flat(Vec<SelectClause>),
        }

        Ok(match Shape::deserialize(deserializer)? {
            // only the first row is compiled
            Shape::Nested(rows) => SelectList(rows.into_iter().next().unwrap_or_default()),
            Shape::Flat(clauses) => SelectList(clauses),
        })
    }
}

impl From<Vec<SelectClause>> for SelectList {
    fn from(clauses: Vec<SelectClause>) -> Self {
        Self(clauses)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Category {
    ForEach,
    Named(String),
}

impl From<String> for Category {
    fn from(name: String) -> Self {
        if name == FOR_EACH_CATEGORY {
            Category::ForEach
        } else {
            Category::Named(name)
        }
    }
}

/// A select clause is either an aggregation or a top/bottom-k filter.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "RawSelectClause")]
pub enum SelectClause {
    Aggregation {
        category: Category,
        kind: String,
        params: Vec<String>,
    },
    Filter {
        kind: String,
        params: Vec<Param>,
    },
}

impl SelectClause {
    pub fn aggregation(category: &str, kind: &str, params: &[&str]) -> Self {
        Self::Aggregation {
            category: Category::from(category.to_string()),
            kind: kind.to_string(),
            params: params.iter().map(|p| p.to_string()).collect(),
        }
    }

    pub fn filter(kind: &str, params: Vec<Param>) -> Self {
        Self::Filter {
            kind: kind.to_string(),
            params,
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSelectClause {
    #[serde(default)]
    category_name: String,
    #[serde(default, rename = "type")]
    kind: String,
    #[serde(default)]
    params: Vec<Value>,
}

impl From<RawSelectClause> for SelectClause {
    fn from(raw: RawSelectClause) -> Self {
        if raw.category_name == FILTERS_CATEGORY {
            return SelectClause::Filter {
                kind: raw.kind,
                params: raw.params.into_iter().map(Param::from).collect(),
            };
        }

        // a single non-string param voids the whole list
        let params = raw
            .params
            .iter()
            .map(|p| p.as_str().map(str::to_string))
            .collect::<Option<Vec<String>>>()
            .unwrap_or_default();

        SelectClause::Aggregation {
            category: Category::from(raw.category_name),
            kind: raw.kind,
            params,
        }
    }
}

/// A filter clause parameter as the editor sent it.
#[derive(Debug, Clone, PartialEq)]
pub enum Param {
    Int(i64),
    Text(String),
    Other(Value),
}

impl From<Value> for Param {
    fn from(value: Value) -> Self {
        match value {
            Value::Number(n) => match n.as_i64() {
                Some(i) => Param::Int(i),
                None => Param::Other(Value::Number(n)),
            },
            Value::String(s) => Param::Text(s),
            other => Param::Other(other),
        }
    }
}

impl Param {
    /// Coerce to an integer, accepting integer strings.
    pub fn as_int(&self) -> Result<i64> {
        match self {
            Param::Int(i) => Ok(*i),
            Param::Text(s) => s
                .trim()
                .parse()
                .map_err(|_| Error::ParamParse(format!("{s:?} is not an integer"))),
            Param::Other(v) => Err(Error::ParamParse(format!("{v} is not an integer"))),
        }
    }
}

/// The group-by clause. Only the interval is meaningful to the backend.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupBy {
    pub interval: Option<String>,
}

impl GroupBy {
    pub fn interval(interval: &str) -> Self {
        Self {
            interval: Some(interval.to_string()),
        }
    }
}

impl<'de> Deserialize<'de> for GroupBy {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct Entry {
            #[serde(default)]
            params: Vec<Value>,
        }

        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Shape {
            List(Vec<Entry>),
            Single(Entry),
        }

        let entry = match Shape::deserialize(deserializer)? {
            Shape::List(entries) => entries.into_iter().next(),
            Shape::Single(entry) => Some(entry),
        };

        let interval = entry
            .and_then(|e| e.params.into_iter().next())
            .map(|p| match p {
                Value::String(s) => s,
                other => other.to_string(),
            });

        Ok(GroupBy { interval })
    }
}
