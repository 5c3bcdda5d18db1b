// 💡 Suggestion Resolvers - prefix autocomplete for entities, properties and types

use crate::config::ReconcileConfig;
use crate::defaults::DEFAULT_LIMIT;
use crate::error::Result;
use crate::store::{escape_sqlite, EntityStore, SqlValue};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Suggestion {
    pub id: String,
    pub name: String,
}

impl Suggestion {
    fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Suggestion {
            id: id.into(),
            name: name.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SuggestResponse {
    pub result: Vec<Suggestion>,
}

impl From<Vec<Suggestion>> for SuggestResponse {
    fn from(result: Vec<Suggestion>) -> Self {
        SuggestResponse { result }
    }
}

// ============================================================================
// ENTITY
// ============================================================================

/// Entities whose name starts with `prefix` (case-sensitive), in store order
pub fn suggest_entity<S: EntityStore + ?Sized>(
    store: &S,
    config: &ReconcileConfig,
    table: &str,
    prefix: &str,
    cursor: usize,
) -> Result<Vec<Suggestion>> {
    let id_sql = escape_sqlite(&config.id_field);
    let name_sql = escape_sqlite(&config.name_field);

    // instr() compares bytes, unlike LIKE which folds ASCII case
    let sql = format!(
        "SELECT {id} AS {id}, {name} AS {name} FROM {table}
         WHERE instr(CAST({name} AS TEXT), ?) = 1
         LIMIT {limit} OFFSET {offset}",
        id = id_sql,
        name = name_sql,
        table = escape_sqlite(table),
        limit = DEFAULT_LIMIT,
        offset = cursor,
    );

    let rows = store.query(&sql, &[SqlValue::from(prefix)])?;

    Ok(rows
        .iter()
        .map(|row| {
            Suggestion::new(
                row.get(&config.id_field).map(SqlValue::to_text).unwrap_or_default(),
                row.get(&config.name_field).map(SqlValue::to_text).unwrap_or_default(),
            )
        })
        .collect())
}

// ============================================================================
// PROPERTY
// ============================================================================

/// Declared properties whose id or label starts with `prefix` (any case)
pub fn suggest_property(config: &ReconcileConfig, prefix: &str, cursor: usize) -> Vec<Suggestion> {
    let prefix = prefix.to_lowercase();

    config
        .properties
        .iter()
        .filter(|p| {
            p.name.to_lowercase().starts_with(&prefix) || p.label.to_lowercase().starts_with(&prefix)
        })
        .skip(cursor)
        .take(DEFAULT_LIMIT)
        .map(|p| Suggestion::new(p.name.as_str(), p.label.as_str()))
        .collect()
}

// ============================================================================
// TYPE
// ============================================================================

/// Types containing `prefix` (any case) in their id or name
///
/// With a `type_field` the types are the distinct values observed in that
/// column, rows without one counting as the default type.
pub fn suggest_type<S: EntityStore + ?Sized>(
    store: &S,
    config: &ReconcileConfig,
    table: &str,
    prefix: &str,
) -> Result<Vec<Suggestion>> {
    let candidates: Vec<Suggestion> = match &config.type_field {
        Some(type_field) => {
            let type_sql = escape_sqlite(type_field);
            let sql = format!(
                "SELECT DISTINCT {t} AS {t} FROM {table}",
                t = type_sql,
                table = escape_sqlite(table)
            );
            let fallback = config.default_types().remove(0);

            let mut observed: Vec<Suggestion> = Vec::new();
            for row in store.query(&sql, &[])? {
                let suggestion = match row.get(type_field) {
                    Some(value) if !value.is_null() => {
                        let text = value.to_text();
                        Suggestion::new(text.clone(), text)
                    }
                    _ => Suggestion::new(fallback.id.as_str(), fallback.name.as_str()),
                };
                if !observed.contains(&suggestion) {
                    observed.push(suggestion);
                }
            }
            observed
        }
        None => config
            .default_types()
            .into_iter()
            .map(|t| Suggestion::new(t.id, t.name))
            .collect(),
    };

    let needle = prefix.to_lowercase();
    Ok(candidates
        .into_iter()
        .filter(|s| s.id.to_lowercase().contains(&needle) || s.name.to_lowercase().contains(&needle))
        .take(DEFAULT_LIMIT)
        .collect())
}
