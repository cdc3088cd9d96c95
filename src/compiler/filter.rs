use crate::heroic::Filter;
use crate::model::{TagFilter, KEY_TAG};

/// Build the filter tree for a panel's tag clauses.
///
/// The result is always an `and` node, even with no clauses. Operators are
/// passed through as-is, the backend decides what they mean.
pub fn compile_filters(clauses: &[TagFilter]) -> Filter {
    Filter::And(clauses.iter().map(compile_clause).collect())
}

fn compile_clause(clause: &TagFilter) -> Filter {
    if clause.key == KEY_TAG {
        return Filter::Key(clause.value.clone());
    }

    if clause.is_custom() {
        return Filter::Custom {
            operator: clause.operator.clone(),
            key: clause.key.clone(),
        };
    }

    match clause.operator.strip_prefix('!') {
        Some(operator) => Filter::Not(Box::new(Filter::Match {
            operator: operator.to_string(),
            key: clause.key.clone(),
            value: clause.value.clone(),
        })),
        None => Filter::Match {
            operator: clause.operator.clone(),
            key: clause.key.clone(),
            value: clause.value.clone(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn compile(clauses: &[TagFilter]) -> serde_json::Value {
        serde_json::to_value(compile_filters(clauses)).unwrap()
    }

    #[test]
    fn empty() {
        assert_eq!(compile(&[]), json!(["and"]));
    }

    #[test]
    fn key_clause_ignores_operator() {
        assert_eq!(
            compile(&[TagFilter::new("$key", "!=", "cpu.load")]),
            json!(["and", ["key", "cpu.load"]])
        );
    }

    #[test]
    fn negation_strips_one_bang() {
        assert_eq!(
            compile(&[
                TagFilter::new("host", "!=x", "a"),
                TagFilter::new("site", "!!^", "lon"),
            ]),
            json!([
                "and",
                ["not", ["=x", "host", "a"]],
                ["not", ["!^", "site", "lon"]]
            ])
        );
    }

    #[test]
    fn custom_clause_drops_value() {
        let mut clause = TagFilter::new("role", "+", "ignored");
        clause.kind = Some("custom".into());

        assert_eq!(compile(&[clause]), json!(["and", ["+", "role"]]));
    }

    #[test]
    fn preserves_order_and_unknown_operators() {
        assert_eq!(
            compile(&[
                TagFilter::new("b", "=", "2"),
                TagFilter::new("a", "~~", "1"),
                TagFilter::new("$key", "=", "disk"),
            ]),
            json!(["and", ["=", "b", "2"], ["~~", "a", "1"], ["key", "disk"]])
        );
    }
}
