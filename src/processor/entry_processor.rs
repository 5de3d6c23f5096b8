use serde_json::Value;
use std::collections::HashSet;
use tracing::warn;

use crate::models::{Counters, NodepointMode, NodepointSpec};

/// Compute the counters of a fetched entry list according to the nodepoint mode.
pub fn process_entries(spec: &NodepointSpec, entries: &[Value]) -> Counters {
    match &spec.mode {
        NodepointMode::Raw { equality_key } => process_raw_entries(equality_key, entries),
        NodepointMode::Aggregation {
            aggregation_key,
            subkey,
        } => process_aggregated_entries(&spec.name, aggregation_key, subkey.as_deref(), entries),
    }
}

/// Counters of a raw nodepoint:
/// - number of entries
/// - number of distinct `equality_key` values
/// - number of entries lacking `equality_key`
pub fn process_raw_entries(equality_key: &str, entries: &[Value]) -> Counters {
    let identities: Vec<String> = entries
        .iter()
        .filter_map(|entry| entry.get(equality_key))
        .map(identity_key)
        .collect();

    let distinct: HashSet<&String> = identities.iter().collect();
    let count = entries.len() as u64;
    let malformed = count - identities.len() as u64;

    Counters::new(count, distinct.len() as f64, malformed)
}

/// Textual identity of a JSON value, independent of object key order.
///
/// Integral floats share the identity of the equal integer, so `1` and `1.0` collapse.
fn identity_key(value: &Value) -> String {
    match value {
        Value::Object(map) => {
            let mut fields: Vec<(&String, &Value)> = map.iter().collect();
            fields.sort_by(|a, b| a.0.cmp(b.0));
            let inner: Vec<String> = fields
                .into_iter()
                .map(|(key, value)| format!("{}:{}", Value::String(key.clone()), identity_key(value)))
                .collect();
            format!("{{{}}}", inner.join(","))
        }
        Value::Array(items) => {
            let inner: Vec<String> = items.iter().map(identity_key).collect();
            format!("[{}]", inner.join(","))
        }
        Value::Number(number) => match number.as_f64() {
            Some(float) if number.is_f64() && float.fract() == 0.0 && float.abs() < 9.0e15 => {
                format!("{}", float as i64)
            }
            _ => number.to_string(),
        },
        other => other.to_string(),
    }
}

/// Counters of an aggregation nodepoint:
/// - number of entries carrying `aggregation_key`
/// - sum of their `aggregation_key` values
/// - number of malformed entries, at subkey level plus at aggregation level
pub fn process_aggregated_entries(
    nodepoint: &str,
    aggregation_key: &str,
    subkey: Option<&str>,
    entries: &[Value],
) -> Counters {
    let mut count = 0;
    let mut aggregation = 0.0;
    let mut malformed = 0;

    let subentries: Vec<&Value> = match subkey {
        Some(subkey) => {
            let mut subentries = Vec::new();
            for entry in entries {
                match entry.get(subkey) {
                    Some(Value::Array(nested)) => subentries.extend(nested.iter()),
                    Some(other) => {
                        warn!(
                            "Entry for nodepoint {} has non-list subkey {}: {}",
                            nodepoint, subkey, other
                        );
                        malformed += 1;
                    }
                    None => {
                        warn!(
                            "Entry for nodepoint {} doesn't contain expected subkey {}: {}",
                            nodepoint, subkey, entry
                        );
                        malformed += 1;
                    }
                }
            }
            subentries
        }
        None => entries.iter().collect(),
    };

    for entry in subentries {
        match entry.get(aggregation_key).and_then(Value::as_f64) {
            Some(value) => {
                aggregation += value;
                count += 1;
            }
            None => {
                warn!(
                    "Entry for nodepoint {} doesn't contain numeric aggregation key {}: {}",
                    nodepoint, aggregation_key, entry
                );
                malformed += 1;
            }
        }
    }

    Counters::new(count, aggregation, malformed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entries(value: Value) -> Vec<Value> {
        value.as_array().cloned().unwrap()
    }

    #[test]
    fn test_raw_entries_with_duplicates_and_malformed() {
        let spec = NodepointSpec::raw("products", "originalId");
        let entries = entries(json!([
            {"originalId": "oid1"},
            {"originalId": "oid1"},
            {"id": "badentry"},
            {"originalId": "oid2"}
        ]));

        assert_eq!(process_entries(&spec, &entries), Counters::new(4, 2.0, 1));
    }

    #[test]
    fn test_raw_entries_empty() {
        let spec = NodepointSpec::raw("sellers", "originalId");
        assert_eq!(process_entries(&spec, &[]), Counters::new(0, 0.0, 0));
    }

    #[test]
    fn test_raw_entries_all_malformed() {
        let entries = entries(json!([{"id": 1}, {"id": 2}, "not an object"]));
        assert_eq!(process_raw_entries("originalId", &entries), Counters::new(3, 0.0, 3));
    }

    #[test]
    fn test_raw_distinct_uses_exact_value_equality() {
        let entries = entries(json!([
            {"originalId": 1},
            {"originalId": "1"},
            {"originalId": {"a": 1, "b": 2}},
            {"originalId": {"b": 2, "a": 1}},
            {"originalId": null}
        ]));

        let counters = process_raw_entries("originalId", &entries);
        assert_eq!(counters.count, 5);
        assert_eq!(counters.measure, 4.0);
        assert_eq!(counters.malformed, 0);
    }

    #[test]
    fn test_raw_distinct_collapses_integral_floats() {
        let entries = entries(json!([
            {"originalId": 1},
            {"originalId": 1.0},
            {"originalId": [2, {"n": 2.0}]},
            {"originalId": [2.0, {"n": 2}]},
            {"originalId": 1.5}
        ]));

        let counters = process_raw_entries("originalId", &entries);
        assert_eq!(counters.count, 5);
        assert_eq!(counters.measure, 3.0);
        assert_eq!(counters.malformed, 0);
    }

    #[test]
    fn test_aggregation_without_subkey() {
        let spec = NodepointSpec::aggregation("sales", "billing", None);
        let entries = entries(json!([{"billing": 111}, {"billing": 222}]));

        assert_eq!(process_entries(&spec, &entries), Counters::new(2, 333.0, 0));
    }

    #[test]
    fn test_aggregation_without_subkey_counts_missing_key() {
        let spec = NodepointSpec::aggregation("sales", "billing", None);
        let entries = entries(json!([{"billing": 1.5}, {"amount": 3}, {"billing": 2.5}]));

        assert_eq!(process_entries(&spec, &entries), Counters::new(2, 4.0, 1));
    }

    #[test]
    fn test_aggregation_empty_is_zero_not_missing() {
        let spec = NodepointSpec::aggregation("customers/sales", "billing", Some("sales"));
        assert_eq!(process_entries(&spec, &[]), Counters::new(0, 0.0, 0));
    }

    #[test]
    fn test_aggregation_with_subkey_skips_entries_without_subkey() {
        let spec = NodepointSpec::aggregation("customers/sales", "billing", Some("sales"));
        let entries = entries(json!([
            {"id": "no-sales", "billing": 1000},
            {"id": "c1", "sales": [{"billing": 10}]},
            {"id": "c2", "sales": [{"billing": 100}]}
        ]));

        assert_eq!(process_entries(&spec, &entries), Counters::new(2, 110.0, 1));
    }

    #[test]
    fn test_aggregation_with_subkey_adds_both_malformed_layers() {
        let spec = NodepointSpec::aggregation("products/sales", "billing", Some("productSales"));
        let entries = entries(json!([
            {"productSales": [{"billing": 10}, {"units": 2}, {"billing": 5}]},
            {"other": []},
            {"productSales": []},
            {"productSales": [{"billing": 1}]}
        ]));

        assert_eq!(process_entries(&spec, &entries), Counters::new(3, 16.0, 2));
    }

    #[test]
    fn test_aggregation_non_list_subkey_is_malformed() {
        let entries = entries(json!([
            {"sales": {"billing": 10}},
            {"sales": [{"billing": 7}]}
        ]));

        let counters = process_aggregated_entries("sellers/sales", "billing", Some("sales"), &entries);
        assert_eq!(counters, Counters::new(1, 7.0, 1));
    }

    #[test]
    fn test_aggregation_non_numeric_value_is_malformed() {
        let entries = entries(json!([{"billing": "12.0"}, {"billing": 3}]));

        let counters = process_aggregated_entries("sales", "billing", None, &entries);
        assert_eq!(counters, Counters::new(1, 3.0, 1));
    }

    #[test]
    fn test_processing_is_idempotent() {
        let spec = NodepointSpec::aggregation("sellers/sales", "billing", Some("sales"));
        let entries = entries(json!([
            {"sales": [{"billing": 10.25}, {"billing": 4}]},
            {"nosales": true}
        ]));

        let first = process_entries(&spec, &entries);
        let second = process_entries(&spec, &entries);
        assert_eq!(first, second);
        assert_eq!(first, Counters::new(2, 14.25, 1));
    }
}
