// ⚙️ Configuration Resolver
// Turns the raw per-table settings plus live store facts into a validated,
// immutable `ReconcileConfig`. Every violated rule fails fast with its own
// error kind.

use crate::defaults::{
    default_type, DEFAULT_IDENTIFIER_SPACE, DEFAULT_LIMIT, DEFAULT_PROPERTY_TYPE,
    DEFAULT_SCHEMA_SPACE, FTS_VERSION_WARNING,
};
use crate::error::{ReconcileError, Result};
use crate::store::{ColumnInfo, EntityStore, FtsIndex};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ============================================================================
// CONFIG TYPES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityType {
    pub id: String,
    pub name: String,
}

/// A property that can be extended or suggested
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PropertySetting {
    pub name: String,
    pub label: String,
    #[serde(rename = "type")]
    pub type_: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReconcileConfig {
    pub id_field: String,
    pub name_field: String,
    pub type_field: Option<String>,
    /// Empty only when `type_field` is set and no default was given
    pub type_default: Vec<EntityType>,
    pub description_field: Option<String>,
    pub additional_fields: Vec<String>,
    pub max_limit: usize,
    pub properties: Vec<PropertySetting>,
    pub view_url: Option<String>,
    pub fts_table: Option<FtsIndex>,
    #[serde(rename = "identifierSpace")]
    pub identifier_space: String,
    #[serde(rename = "schemaSpace")]
    pub schema_space: String,
    pub service_name: Option<String>,
}

/// What the store knows about the table right now
#[derive(Debug, Clone, Default)]
pub struct TableFacts {
    pub table_exists: bool,
    pub is_view: bool,
    pub primary_keys: Vec<String>,
    pub fts_table: Option<FtsIndex>,
    pub columns: Vec<ColumnInfo>,
}

impl TableFacts {
    /// Probe the store. Nothing beyond existence is read for missing tables.
    pub fn probe<S: EntityStore + ?Sized>(store: &S, table: &str) -> Result<Self> {
        let is_view = store.is_view(table)?;
        let table_exists = store.table_exists(table)?;
        if !is_view && !table_exists {
            return Ok(TableFacts::default());
        }

        Ok(TableFacts {
            table_exists,
            is_view,
            primary_keys: store.primary_keys(table)?,
            fts_table: store.fts_table(table)?,
            columns: store.columns(table)?,
        })
    }
}

// ============================================================================
// RESOLUTION
// ============================================================================

/// Probe the store and resolve the configuration for `table`
pub fn check_config<S: EntityStore + ?Sized>(
    raw: Option<&Map<String, Value>>,
    store: &S,
    table: &str,
) -> Result<ReconcileConfig> {
    let facts = TableFacts::probe(store, table)?;
    ReconcileConfig::resolve(raw, table, &facts)
}

impl ReconcileConfig {
    pub fn resolve(
        raw: Option<&Map<String, Value>>,
        table: &str,
        facts: &TableFacts,
    ) -> Result<Self> {
        if !facts.is_view && !facts.table_exists {
            return Err(ReconcileError::NotConfigured(format!(
                "Table not found: {}",
                table
            )));
        }

        let raw = match raw {
            Some(raw) if !raw.is_empty() => raw,
            _ => {
                return Err(ReconcileError::NotConfigured(format!(
                    "Reconciliation not configured for table {}",
                    table
                )))
            }
        };

        // Tables without a declared key still have rowid; views have nothing
        let mut primary_keys = facts.primary_keys.clone();
        if primary_keys.is_empty() && !facts.is_view {
            primary_keys.push("rowid".to_string());
        }

        let id_field = match optional_string(raw, "id_field")? {
            Some(field) => field,
            None if primary_keys.len() == 1 => primary_keys.remove(0),
            None => {
                return Err(ReconcileError::configuration(
                    "Could not determine an ID field to use",
                ))
            }
        };

        let name_field = optional_string(raw, "name_field")?.ok_or_else(|| {
            ReconcileError::configuration("Name field must be defined to activate reconciliation")
        })?;

        let type_field = optional_string(raw, "type_field")?;

        let max_limit = match raw.get("max_limit") {
            None => DEFAULT_LIMIT,
            Some(value) => parse_max_limit(value)?,
        };

        let type_default = match raw.get("type_default") {
            Some(value) => parse_type_default(value)?,
            None if type_field.is_none() => vec![default_type()],
            None => Vec::new(),
        };

        let view_url = optional_string(raw, "view_url")?;
        if let Some(url) = &view_url {
            if !url.contains("{id}") {
                return Err(ReconcileError::configuration(
                    "view_url must contain the {id} placeholder",
                ));
            }
        }

        let additional_fields = match raw.get("additional_fields") {
            None => Vec::new(),
            Some(value) => string_list(value).ok_or_else(|| {
                ReconcileError::configuration("additional_fields should be a list of strings")
            })?,
        };

        let properties = match raw.get("properties") {
            None => default_properties(&facts.columns),
            Some(value) => parse_properties(value)?,
        };

        let config = ReconcileConfig {
            id_field,
            name_field,
            type_field,
            type_default,
            description_field: optional_string(raw, "description_field")?,
            additional_fields,
            max_limit,
            properties,
            view_url,
            fts_table: facts.fts_table.clone(),
            identifier_space: optional_string(raw, "identifierSpace")?
                .unwrap_or_else(|| DEFAULT_IDENTIFIER_SPACE.to_string()),
            schema_space: optional_string(raw, "schemaSpace")?
                .unwrap_or_else(|| DEFAULT_SCHEMA_SPACE.to_string()),
            service_name: optional_string(raw, "service_name")?,
        };

        if config.fts_table.is_some() && rusqlite::version_number() < FTS_VERSION_WARNING {
            tracing::warn!(
                sqlite_version = rusqlite::version(),
                table,
                "Full text search queries for SQLite < 3.30.0 fail if the table name contains special characters"
            );
        }

        Ok(config)
    }

    /// `type_default`, falling back to the generic Object type
    pub fn default_types(&self) -> Vec<EntityType> {
        if self.type_default.is_empty() {
            vec![default_type()]
        } else {
            self.type_default.clone()
        }
    }

    pub fn property(&self, name: &str) -> Option<&PropertySetting> {
        self.properties.iter().find(|p| p.name == name)
    }
}

// ============================================================================
// FIELD VALIDATION HELPERS
// ============================================================================

fn optional_string(raw: &Map<String, Value>, key: &str) -> Result<Option<String>> {
    match raw.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(ReconcileError::configuration(format!(
            "{} in reconciliation config must be a string",
            key
        ))),
    }
}

fn parse_max_limit(value: &Value) -> Result<usize> {
    let limit = match value {
        Value::Number(n) if n.is_i64() || n.is_u64() => n.as_i64().unwrap_or(i64::MAX),
        _ => {
            return Err(ReconcileError::InvalidSettingType(
                "max_limit in reconciliation config must be an integer".to_string(),
            ))
        }
    };

    if limit < 1 {
        return Err(ReconcileError::configuration(
            "max_limit in reconciliation config must be at least 1",
        ));
    }

    Ok(usize::try_from(limit).unwrap_or(usize::MAX))
}

fn parse_type_default(value: &Value) -> Result<Vec<EntityType>> {
    let items = value
        .as_array()
        .ok_or_else(|| ReconcileError::configuration("type_default should be a list of objects"))?;

    if items.is_empty() {
        return Err(ReconcileError::configuration(
            "type_default should contain at least one type",
        ));
    }

    items
        .iter()
        .map(|item| {
            let obj = item.as_object().ok_or_else(|| {
                ReconcileError::configuration("type_default values should be objects")
            })?;
            let id = obj.get("id").and_then(Value::as_str).ok_or_else(|| {
                ReconcileError::configuration("type_default 'id' values should be strings")
            })?;
            let name = obj.get("name").and_then(Value::as_str).ok_or_else(|| {
                ReconcileError::configuration("type_default 'name' values should be strings")
            })?;
            Ok(EntityType {
                id: id.to_string(),
                name: name.to_string(),
            })
        })
        .collect()
}

fn parse_properties(value: &Value) -> Result<Vec<PropertySetting>> {
    let items = value
        .as_array()
        .ok_or_else(|| ReconcileError::configuration("properties should be a list of objects"))?;

    items
        .iter()
        .map(|item| {
            let obj = item
                .as_object()
                .ok_or_else(|| ReconcileError::configuration("properties values should be objects"))?;
            let name = obj.get("name").and_then(Value::as_str).ok_or_else(|| {
                ReconcileError::configuration("properties 'name' values should be strings")
            })?;
            let label = match obj.get("label") {
                None => name,
                Some(label) => label.as_str().ok_or_else(|| {
                    ReconcileError::configuration("properties 'label' values should be strings")
                })?,
            };
            let type_ = match obj.get("type") {
                None => DEFAULT_PROPERTY_TYPE,
                Some(t) => t.as_str().ok_or_else(|| {
                    ReconcileError::configuration("properties 'type' values should be strings")
                })?,
            };
            Ok(PropertySetting {
                name: name.to_string(),
                label: label.to_string(),
                type_: type_.to_string(),
            })
        })
        .collect()
}

fn default_properties(columns: &[ColumnInfo]) -> Vec<PropertySetting> {
    columns
        .iter()
        .map(|c| PropertySetting {
            name: c.name.clone(),
            label: c.name.clone(),
            type_: DEFAULT_PROPERTY_TYPE.to_string(),
        })
        .collect()
}

fn string_list(value: &Value) -> Option<Vec<String>> {
    value
        .as_array()?
        .iter()
        .map(|v| v.as_str().map(str::to_string))
        .collect()
}

// ============================================================================
// TESTS
// ============================================================================
