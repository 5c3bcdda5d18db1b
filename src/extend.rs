// ➕ Property Extension Resolver
// Fetch typed property values for entities that are already identified.

use crate::config::ReconcileConfig;
use crate::error::{ReconcileError, Result};
use crate::store::{escape_sqlite, ColumnInfo, EntityStore, SqlValue};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq)]
pub struct ExtendRequest {
    pub ids: Vec<String>,
    pub properties: Vec<String>,
}

impl ExtendRequest {
    /// Parse `{ids: [...], properties: [{id}, ...]}`
    pub fn from_value(value: &Value) -> Result<Self> {
        let obj = value
            .as_object()
            .ok_or_else(|| ReconcileError::bad_query("extend must be a JSON object"))?;

        let ids = obj
            .get("ids")
            .and_then(Value::as_array)
            .ok_or_else(|| ReconcileError::bad_query("extend 'ids' must be a list"))?
            .iter()
            .map(|id| match id {
                Value::String(s) => Ok(s.clone()),
                Value::Number(n) => Ok(n.to_string()),
                _ => Err(ReconcileError::bad_query("extend 'ids' must be strings")),
            })
            .collect::<Result<Vec<_>>>()?;

        let properties = obj
            .get("properties")
            .and_then(Value::as_array)
            .ok_or_else(|| ReconcileError::bad_query("extend 'properties' must be a list"))?
            .iter()
            .map(|p| {
                p.get("id")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .ok_or_else(|| ReconcileError::bad_query("extend properties need a string 'id'"))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(ExtendRequest { ids, properties })
    }
}

/// A property value tagged with its kind: `{"int": 5}`, `{"float": 1.5}`, `{"str": "x"}`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TypedValue {
    Int(i64),
    Float(f64),
    Str(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Integer,
    Float,
    Text,
}

impl ValueKind {
    /// SQLite affinity rules applied to a declared column type
    pub fn from_declared_type(declared: &str) -> Self {
        let upper = declared.to_ascii_uppercase();
        if upper.contains("INT") {
            ValueKind::Integer
        } else if upper.contains("REAL") || upper.contains("FLOA") || upper.contains("DOUB") {
            ValueKind::Float
        } else {
            ValueKind::Text
        }
    }

    fn convert(self, value: &SqlValue) -> Option<TypedValue> {
        match (self, value) {
            (_, SqlValue::Null) => None,
            (ValueKind::Integer, SqlValue::Integer(i)) => Some(TypedValue::Int(*i)),
            (ValueKind::Float, SqlValue::Real(f)) => Some(TypedValue::Float(*f)),
            (ValueKind::Float, SqlValue::Integer(i)) => Some(TypedValue::Float(*i as f64)),
            (_, other) => Some(TypedValue::Str(other.to_text())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PropertyMeta {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtendResponse {
    pub meta: Vec<PropertyMeta>,
    pub rows: BTreeMap<String, BTreeMap<String, Vec<TypedValue>>>,
}

pub fn extend<S: EntityStore + ?Sized>(
    store: &S,
    config: &ReconcileConfig,
    table: &str,
    request: &ExtendRequest,
) -> Result<ExtendResponse> {
    let meta = request
        .properties
        .iter()
        .map(|id| {
            config
                .property(id)
                .map(|p| PropertyMeta {
                    id: id.clone(),
                    name: p.label.clone(),
                })
                .ok_or_else(|| ReconcileError::UnknownProperty(id.clone()))
        })
        .collect::<Result<Vec<_>>>()?;

    let mut rows: BTreeMap<String, BTreeMap<String, Vec<TypedValue>>> = BTreeMap::new();
    if request.ids.is_empty() {
        return Ok(ExtendResponse { meta, rows });
    }

    let columns = store.columns(table)?;
    let kinds: Vec<ValueKind> = request
        .properties
        .iter()
        .map(|p| column_kind(&columns, p))
        .collect();

    let mut fields = vec![config.id_field.clone()];
    for p in &request.properties {
        if !fields.contains(p) {
            fields.push(p.clone());
        }
    }

    let sql = format!(
        "SELECT {} FROM {} WHERE {} IN ({})",
        fields
            .iter()
            .map(|f| format!("{} AS {}", escape_sqlite(f), escape_sqlite(f)))
            .collect::<Vec<_>>()
            .join(", "),
        escape_sqlite(table),
        escape_sqlite(&config.id_field),
        vec!["?"; request.ids.len()].join(", ")
    );
    let params: Vec<SqlValue> = request.ids.iter().map(|id| SqlValue::Text(id.clone())).collect();

    for row in store.query(&sql, &params)? {
        let entity_id = row
            .get(&config.id_field)
            .map(SqlValue::to_text)
            .unwrap_or_default();

        let values: BTreeMap<String, Vec<TypedValue>> = request
            .properties
            .iter()
            .zip(&kinds)
            .map(|(p, kind)| {
                let value = row.get(p).and_then(|v| kind.convert(v));
                (p.clone(), value.into_iter().collect::<Vec<_>>())
            })
            .collect();

        rows.insert(entity_id, values);
    }

    tracing::debug!(table, requested = request.ids.len(), found = rows.len(), "extended entities");

    Ok(ExtendResponse { meta, rows })
}

fn column_kind(columns: &[ColumnInfo], name: &str) -> ValueKind {
    columns
        .iter()
        .find(|c| c.name == name)
        .map(|c| ValueKind::from_declared_type(&c.declared_type))
        .unwrap_or(ValueKind::Text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::check_config;
    use crate::store::fixtures::dogs_store;
    use serde_json::json;

    fn dogs_request(properties: &[&str]) -> ExtendRequest {
        ExtendRequest {
            ids: vec!["1".into(), "2".into(), "3".into(), "4".into()],
            properties: properties.iter().map(|p| p.to_string()).collect(),
        }
    }

    #[test]
    fn test_extend_request_from_value() {
        let request = ExtendRequest::from_value(&json!({
            "ids": ["1", 2],
            "properties": [{"id": "status"}, {"id": "age"}]
        }))
        .unwrap();
        assert_eq!(request.ids, vec!["1", "2"]);
        assert_eq!(request.properties, vec!["status", "age"]);

        assert!(ExtendRequest::from_value(&json!({"ids": "1", "properties": []})).is_err());
        assert!(ExtendRequest::from_value(&json!({"ids": [], "properties": ["age"]})).is_err());
    }

    #[test]
    fn test_extend_dogs() {
        let store = dogs_store();
        let config = check_config(json!({"name_field": "name"}).as_object(), &store, "dogs").unwrap();

        let response = extend(&store, &config, "dogs", &dogs_request(&["status", "age"])).unwrap();

        assert_eq!(response.rows.len(), 4);
        assert_eq!(response.rows["1"]["status"], vec![TypedValue::Str("good dog".into())]);
        assert_eq!(response.rows["1"]["age"], vec![TypedValue::Int(5)]);
        assert_eq!(
            response.meta,
            vec![
                PropertyMeta { id: "status".into(), name: "status".into() },
                PropertyMeta { id: "age".into(), name: "age".into() },
            ]
        );

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["rows"]["1"]["age"], json!([{"int": 5}]));
        assert_eq!(json["rows"]["1"]["status"], json!([{"str": "good dog"}]));
    }

    #[test]
    fn test_extend_float_and_missing_ids() {
        let store = dogs_store();
        store
            .connection()
            .execute_batch("ALTER TABLE dogs ADD COLUMN weight REAL; UPDATE dogs SET weight = 12.5 WHERE id = 2;")
            .unwrap();
        let config = check_config(json!({"name_field": "name"}).as_object(), &store, "dogs").unwrap();

        let request = ExtendRequest {
            ids: vec!["2".into(), "99".into()],
            properties: vec!["weight".into()],
        };
        let response = extend(&store, &config, "dogs", &request).unwrap();

        assert_eq!(response.rows.len(), 1);
        assert_eq!(response.rows["2"]["weight"], vec![TypedValue::Float(12.5)]);
    }

    #[test]
    fn test_extend_null_cell_is_empty_list() {
        let store = dogs_store();
        store
            .connection()
            .execute("UPDATE dogs SET status = NULL WHERE id = 1", [])
            .unwrap();
        let config = check_config(json!({"name_field": "name"}).as_object(), &store, "dogs").unwrap();

        let response = extend(&store, &config, "dogs", &dogs_request(&["status"])).unwrap();
        assert!(response.rows["1"]["status"].is_empty());
        assert_eq!(response.rows["2"]["status"], vec![TypedValue::Str("bad dog".into())]);

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["rows"]["1"]["status"], json!([]));
    }

    #[test]
    fn test_extend_unknown_property() {
        let store = dogs_store();
        let config = check_config(
            json!({"name_field": "name", "properties": [{"name": "age", "label": "Age"}]}).as_object(),
            &store,
            "dogs",
        )
        .unwrap();

        let err = extend(&store, &config, "dogs", &dogs_request(&["status"])).unwrap_err();
        assert!(matches!(err, ReconcileError::UnknownProperty(ref p) if p == "status"));

        let response = extend(&store, &config, "dogs", &dogs_request(&["age"])).unwrap();
        assert_eq!(response.meta[0].name, "Age");
    }

    #[test]
    fn test_value_kind_from_declared_type() {
        assert_eq!(ValueKind::from_declared_type("INTEGER"), ValueKind::Integer);
        assert_eq!(ValueKind::from_declared_type("bigint"), ValueKind::Integer);
        assert_eq!(ValueKind::from_declared_type("DOUBLE PRECISION"), ValueKind::Float);
        assert_eq!(ValueKind::from_declared_type("REAL"), ValueKind::Float);
        assert_eq!(ValueKind::from_declared_type("TEXT"), ValueKind::Text);
        assert_eq!(ValueKind::from_declared_type(""), ValueKind::Text);
    }
}
