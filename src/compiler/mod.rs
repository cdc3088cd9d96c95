//! Translation of dashboard query models into Heroic batch queries.

use crate::heroic::{Aggregator, Filter, HeroicQuery, QueryBatch, Sampling, DISTRIBUTED_AGGREGATIONS};
use crate::model::{GroupBy, QueryModel, QueryRequest};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use ringlog::*;
use std::collections::{BTreeMap, HashSet};

mod aggregator;
mod duration;
mod filter;

pub use aggregator::compile_aggregators;
pub use duration::{normalize, parse_interval};
pub use filter::compile_filters;

/// Compiles panel queries. Holds the only tunable: the feature flag sent
/// when a panel asks for global aggregation.
#[derive(Debug, Clone)]
pub struct QueryCompiler {
    distributed_feature: String,
}

impl Default for QueryCompiler {
    fn default() -> Self {
        Self::new(DISTRIBUTED_AGGREGATIONS)
    }
}

impl QueryCompiler {
    pub fn new(distributed_feature: &str) -> Self {
        Self {
            distributed_feature: distributed_feature.to_string(),
        }
    }

    /// Compile every panel of a request into one batch.
    ///
    /// Batch keys are the panel positions. Any panel failing to compile
    /// fails the whole batch, since all panels share one request. Results
    /// are returned per ref id, so two panels resolving to the same ref id
    /// are rejected.
    pub fn compile_batch(&self, request: &QueryRequest, now: DateTime<Utc>) -> Result<QueryBatch> {
        let range = request.range.resolve(now)?;
        let mut queries = BTreeMap::new();
        let mut ref_ids = HashSet::new();

        for (index, model) in request.queries.iter().enumerate() {
            let key = index.to_string();
            let ref_id = model.ref_id.clone().unwrap_or_else(|| key.clone());

            if !ref_ids.insert(ref_id.clone()) {
                return Err(Error::InvalidRequest(format!(
                    "panel {key} reuses ref id {ref_id:?}"
                )));
            }

            let mut query = self.compile_query(model).map_err(|e| e.in_panel(&ref_id))?;
            query.ref_id = ref_id;

            queries.insert(key, query);
        }

        debug!("compiled {} queries for range {}..{}", queries.len(), range.start, range.end);

        Ok(QueryBatch { queries, range })
    }

    /// Compile a single panel. The returned query has an empty `ref_id`.
    pub fn compile_query(&self, model: &QueryModel) -> Result<HeroicQuery> {
        let sampling = sampling(&model.group_by)?;
        let filter = compile_filters(&model.tags);
        let aggregators = compile_aggregators(&model.select.0, &sampling)?;

        Ok(self.assemble(filter, aggregators, &model.alias, model.global_aggregation))
    }

    pub fn assemble(
        &self,
        filter: Filter,
        aggregators: Vec<Aggregator>,
        alias: &str,
        global_aggregation: bool,
    ) -> HeroicQuery {
        let features = if global_aggregation {
            vec![self.distributed_feature.clone()]
        } else {
            Vec::new()
        };

        HeroicQuery {
            features,
            filter,
            aggregators,
            alias: alias.to_string(),
            ref_id: String::new(),
        }
    }
}

/// Resolve the group-by interval to whole seconds.
fn sampling(group_by: &GroupBy) -> Result<Sampling> {
    let raw = group_by
        .interval
        .as_deref()
        .ok_or_else(|| Error::DurationParse(String::new()))?;

    let interval = parse_interval(raw)?;
    let seconds = i64::try_from(interval.as_secs()).map_err(|_| Error::DurationParse(raw.to_string()))?;
    Ok(Sampling::seconds(seconds))
}
