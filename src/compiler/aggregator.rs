use crate::heroic::{Aggregator, AggregatorEach, EmptyOf, FilterAggregator, GroupAggregator, Sampling};
use crate::model::{Category, Param, SelectClause};
use crate::{Error, Result};

/// Aggregations that operate on raw points and reject a sampling window.
const UNSAMPLED: &[&str] = &["delta", "deltaPerSecond", "notNegative", "stddev"];

/// Build the aggregator pipeline for a panel's select clauses.
///
/// An empty select list yields an empty pipeline.
pub fn compile_aggregators(selects: &[SelectClause], sampling: &Sampling) -> Result<Vec<Aggregator>> {
    selects
        .iter()
        .map(|clause| compile_select(clause, sampling))
        .collect()
}

fn compile_select(clause: &SelectClause, sampling: &Sampling) -> Result<Aggregator> {
    match clause {
        SelectClause::Filter { kind, params } => {
            let k = params
                .first()
                .ok_or_else(|| Error::ParamParse(format!("{kind} requires a parameter")))
                .and_then(Param::as_int)?;

            Ok(Aggregator::Filter(FilterAggregator {
                kind: kind.clone(),
                k,
                of: EmptyOf::default(),
            }))
        }
        SelectClause::Aggregation {
            category,
            kind,
            params,
        } => {
            let of = match category {
                Category::ForEach => None,
                Category::Named(_) => Some(params.clone()),
            };

            let sampling = if UNSAMPLED.contains(&kind.as_str()) {
                None
            } else {
                Some(sampling.clone())
            };

            Ok(Aggregator::Group(GroupAggregator {
                kind: "group",
                of,
                each: vec![AggregatorEach {
                    kind: kind.clone(),
                    sampling,
                }],
            }))
        }
    }
}
