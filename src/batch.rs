// 📦 Batch Reconciliation Orchestrator
// Fans a `{query_id: query}` batch out to the candidate search.

use crate::config::ReconcileConfig;
use crate::error::{ReconcileError, Result};
use crate::query::{find_candidates, ReconciliationCandidate, ReconciliationQuery};
use crate::store::EntityStore;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResult {
    pub result: Vec<ReconciliationCandidate>,
}

/// Results keyed by the client's query ids
pub type BatchResults = BTreeMap<String, QueryResult>;

/// Validate a `queries` payload into (id, query) pairs
pub fn parse_batch(value: &Value) -> Result<Vec<(String, ReconciliationQuery)>> {
    let obj = value
        .as_object()
        .ok_or_else(|| ReconcileError::bad_query("queries must be a JSON object"))?;

    obj.iter()
        .map(|(id, q)| Ok((id.clone(), ReconciliationQuery::from_value(q)?)))
        .collect()
}

/// Evaluate every query independently. The first failing query fails
/// the whole batch.
pub fn reconcile_batch<S: EntityStore + ?Sized>(
    store: &S,
    config: &ReconcileConfig,
    table: &str,
    queries: &[(String, ReconciliationQuery)],
) -> Result<BatchResults> {
    let mut results = BatchResults::new();

    for (query_id, query) in queries {
        let result = find_candidates(store, config, table, query)?;
        tracing::debug!(query_id = %query_id, candidates = result.len(), "batch entry done");
        results.insert(query_id.clone(), QueryResult { result });
    }

    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::check_config;
    use crate::store::fixtures::dogs_store;
    use serde_json::json;

    #[test]
    fn test_batch_preserves_query_ids() {
        let store = dogs_store();
        let config = check_config(json!({"name_field": "name"}).as_object(), &store, "dogs").unwrap();
        let queries = parse_batch(&json!({
            "q0": {"query": "fido"},
            "q1": {"query": "cleo"},
            "zz": {"query": "nobody"}
        }))
        .unwrap();

        let results = reconcile_batch(&store, &config, "dogs", &queries).unwrap();

        assert_eq!(results.len(), 3);
        assert_eq!(results["q0"].result[0].name, "Fido");
        assert_eq!(results["q1"].result[0].name, "Cleo");
        assert!(results["zz"].result.is_empty());
    }

    #[test]
    fn test_batch_json_shape() {
        let store = dogs_store();
        let config = check_config(json!({"name_field": "name"}).as_object(), &store, "dogs").unwrap();
        let queries = parse_batch(&json!({"q0": {"query": "fido"}})).unwrap();

        let results = reconcile_batch(&store, &config, "dogs", &queries).unwrap();
        assert_eq!(
            serde_json::to_value(&results).unwrap(),
            json!({"q0": {"result": [{
                "id": "3",
                "name": "Fido",
                "score": 100,
                "match": true,
                "type": [{"id": "object", "name": "Object"}]
            }]}})
        );
    }

    #[test]
    fn test_one_bad_query_fails_the_batch() {
        let err = parse_batch(&json!({
            "q0": {"query": "fido"},
            "q1": {"query": 42}
        }))
        .unwrap_err();
        assert!(matches!(err, ReconcileError::BadQuery(_)));

        assert!(parse_batch(&json!(["fido"])).is_err());
    }

    #[test]
    fn test_batch_idempotent() {
        let store = dogs_store();
        let config = check_config(json!({"name_field": "name"}).as_object(), &store, "dogs").unwrap();
        let queries = parse_batch(&json!({"a": {"query": "a"}, "b": {"query": "o", "limit": 2}})).unwrap();

        let first = reconcile_batch(&store, &config, "dogs", &queries).unwrap();
        let second = reconcile_batch(&store, &config, "dogs", &queries).unwrap();
        assert_eq!(first, second);
    }
}
