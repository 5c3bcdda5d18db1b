// 🔍 Candidate Query Builder & Scorer
// One reconciliation query -> SQL over the entity store -> scored,
// ranked candidates.

use crate::config::{EntityType, ReconcileConfig};
use crate::error::{ReconcileError, Result};
use crate::scoring;
use crate::store::{escape_sqlite, EntityStore, Row, SqlValue};
use serde::Serialize;
use serde_json::Value;

// ============================================================================
// QUERY
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeStrict {
    Should,
    All,
    Any,
}

/// A property constraint sent with a query (`{pid, v}`)
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyValue {
    pub pid: String,
    pub v: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReconciliationQuery {
    pub query: String,
    pub limit: Option<usize>,
    pub types: Vec<String>,
    pub properties: Vec<PropertyValue>,
    pub type_strict: Option<TypeStrict>,
}

impl ReconciliationQuery {
    pub fn new(query: impl Into<String>) -> Self {
        ReconciliationQuery {
            query: query.into(),
            limit: None,
            types: Vec::new(),
            properties: Vec::new(),
            type_strict: None,
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_types(mut self, types: &[&str]) -> Self {
        self.types = types.iter().map(|t| t.to_string()).collect();
        self
    }

    /// Validate one entry of a client batch
    pub fn from_value(value: &Value) -> Result<Self> {
        let obj = value
            .as_object()
            .ok_or_else(|| ReconcileError::bad_query("Query must be an object"))?;

        let query = obj
            .get("query")
            .and_then(Value::as_str)
            .ok_or_else(|| ReconcileError::bad_query("Query must be a string"))?;

        let limit = match obj.get("limit") {
            None | Some(Value::Null) => None,
            Some(v) => {
                let limit = v
                    .as_u64()
                    .ok_or_else(|| ReconcileError::bad_query("Limit must be an integer"))?;
                Some(usize::try_from(limit).unwrap_or(usize::MAX))
            }
        };

        let types = match obj.get("type") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::String(t)) => vec![t.clone()],
            Some(Value::Array(items)) => items
                .iter()
                .map(|t| t.as_str().map(str::to_string))
                .collect::<Option<Vec<_>>>()
                .ok_or_else(|| ReconcileError::bad_query("Type must be a string or a list of strings"))?,
            Some(_) => {
                return Err(ReconcileError::bad_query(
                    "Type must be a string or a list of strings",
                ))
            }
        };

        let properties = match obj.get("properties") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items
                .iter()
                .map(parse_property_value)
                .collect::<Result<Vec<_>>>()?,
            Some(_) => return Err(ReconcileError::bad_query("Properties must be a list")),
        };

        let type_strict = match obj.get("type_strict") {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) if s == "should" => Some(TypeStrict::Should),
            Some(Value::String(s)) if s == "all" => Some(TypeStrict::All),
            Some(Value::String(s)) if s == "any" => Some(TypeStrict::Any),
            Some(_) => {
                return Err(ReconcileError::bad_query(
                    "Type Strict should be 'should', 'all' or 'any'",
                ))
            }
        };

        Ok(ReconciliationQuery {
            query: query.to_string(),
            limit,
            types,
            properties,
            type_strict,
        })
    }

    /// Requested limit, capped at the server-side maximum
    pub fn effective_limit(&self, max_limit: usize) -> usize {
        self.limit.unwrap_or(max_limit).min(max_limit)
    }
}

fn parse_property_value(value: &Value) -> Result<PropertyValue> {
    let obj = value
        .as_object()
        .ok_or_else(|| ReconcileError::bad_query("Property values must be objects"))?;
    let pid = obj
        .get("pid")
        .and_then(Value::as_str)
        .ok_or_else(|| ReconcileError::bad_query("Property 'pid' must be a string"))?;
    let v = obj
        .get("v")
        .cloned()
        .ok_or_else(|| ReconcileError::bad_query("Property 'v' is required"))?;

    Ok(PropertyValue {
        pid: pid.to_string(),
        v,
    })
}

// ============================================================================
// CANDIDATE
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReconciliationCandidate {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub types: Vec<EntityType>,
    pub score: u32,
    #[serde(rename = "match")]
    pub matched: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

// ============================================================================
// SQL BUILDING
// ============================================================================

/// Columns fetched for each candidate row, without duplicates
pub fn select_fields(config: &ReconcileConfig) -> Vec<String> {
    let mut fields = vec![config.id_field.clone(), config.name_field.clone()];
    fields.extend(config.additional_fields.iter().cloned());
    if let Some(type_field) = &config.type_field {
        fields.push(type_field.clone());
    }
    if let Some(description_field) = &config.description_field {
        fields.push(description_field.clone());
    }

    let mut seen = std::collections::HashSet::new();
    fields.retain(|f| seen.insert(f.clone()));
    fields
}

/// Escape free text for an FTS MATCH expression
///
/// Balances a trailing quote, keeps "quoted phrases" intact and wraps every
/// other whitespace-separated token in double quotes.
pub fn escape_fts(query: &str) -> String {
    let mut query = query.to_string();
    if query.matches('"').count() % 2 == 1 {
        query.push('"');
    }

    let mut bits: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut chars = query.chars();
    while let Some(c) = chars.next() {
        if c == '"' {
            if !current.is_empty() {
                bits.push(std::mem::take(&mut current));
            }
            let mut phrase = String::from('"');
            for next in chars.by_ref() {
                phrase.push(next);
                if next == '"' {
                    break;
                }
            }
            bits.push(phrase);
        } else if c.is_whitespace() {
            if !current.is_empty() {
                bits.push(std::mem::take(&mut current));
            }
        } else {
            current.push(c);
        }
    }
    if !current.is_empty() {
        bits.push(current);
    }

    bits.into_iter()
        .filter(|bit| !bit.is_empty() && bit != "\"\"")
        .map(|bit| {
            if bit.starts_with('"') {
                bit
            } else {
                format!("\"{}\"", bit)
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// SQL text and positional parameters for one candidate search
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateSql {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

pub fn build_candidate_sql(
    config: &ReconcileConfig,
    table: &str,
    query: &ReconciliationQuery,
    limit: usize,
) -> CandidateSql {
    let table_sql = escape_sqlite(table);
    let fields = select_fields(config)
        .iter()
        .map(|f| format!("{}.{} AS {}", table_sql, escape_sqlite(f), escape_sqlite(f)))
        .collect::<Vec<_>>()
        .join(", ");

    let mut params = Vec::new();
    let mut where_clauses = vec!["1".to_string()];
    let mut order_by = String::new();

    let from_clause = match &config.fts_table {
        Some(fts) => {
            let fts_sql = escape_sqlite(&fts.name);
            let rank = if fts.ranked { ", rank" } else { "" };
            if fts.ranked {
                order_by = " ORDER BY a.rank".to_string();
            }
            params.push(SqlValue::Text(escape_fts(&query.query)));
            format!(
                "{table} INNER JOIN (SELECT rowid{rank} FROM {fts} WHERE {fts} MATCH ?) AS a ON {table}.rowid = a.rowid",
                table = table_sql,
                fts = fts_sql,
                rank = rank,
            )
        }
        None => {
            where_clauses.push(format!("{}.{} LIKE ?", table_sql, escape_sqlite(&config.name_field)));
            params.push(SqlValue::Text(format!("%{}%", query.query)));
            table_sql.clone()
        }
    };

    if !query.types.is_empty() {
        match &config.type_field {
            Some(type_field) => {
                let placeholders = vec!["?"; query.types.len()].join(", ");
                where_clauses.push(format!(
                    "{}.{} IN ({})",
                    table_sql,
                    escape_sqlite(type_field),
                    placeholders
                ));
                params.extend(query.types.iter().map(|t| SqlValue::Text(t.clone())));
            }
            None => {
                tracing::warn!(
                    table,
                    types = ?query.types,
                    "query has a type filter but no type_field is configured; ignoring it"
                );
            }
        }
    }

    CandidateSql {
        sql: format!(
            "SELECT {} FROM {} WHERE {}{} LIMIT {}",
            fields,
            from_clause,
            where_clauses.join(" AND "),
            order_by,
            limit
        ),
        params,
    }
}

// ============================================================================
// EVALUATION
// ============================================================================

/// Run one query and return candidates ranked by descending score
pub fn find_candidates<S: EntityStore + ?Sized>(
    store: &S,
    config: &ReconcileConfig,
    table: &str,
    query: &ReconciliationQuery,
) -> Result<Vec<ReconciliationCandidate>> {
    let limit = query.effective_limit(config.max_limit);

    // An empty MATCH expression is a syntax error in FTS
    if limit == 0 || (config.fts_table.is_some() && escape_fts(&query.query).is_empty()) {
        return Ok(Vec::new());
    }

    let CandidateSql { sql, params } = build_candidate_sql(config, table, query, limit);
    let rows = store.query(&sql, &params)?;

    let mut candidates: Vec<ReconciliationCandidate> = rows
        .iter()
        .map(|row| candidate_from_row(config, row, &query.query))
        .collect();

    // Stable: store relevance order breaks ties
    candidates.sort_by(|a, b| b.score.cmp(&a.score));

    tracing::debug!(table, query = %query.query, limit, found = candidates.len(), "reconciled query");

    Ok(candidates)
}

fn candidate_from_row(config: &ReconcileConfig, row: &Row, query: &str) -> ReconciliationCandidate {
    let name = row
        .get(&config.name_field)
        .map(SqlValue::to_text)
        .unwrap_or_default();
    let id = row
        .get(&config.id_field)
        .map(SqlValue::to_text)
        .unwrap_or_default();

    let types = match config.type_field.as_deref().and_then(|f| row.get(f)) {
        Some(value) if !value.is_null() => {
            let type_name = value.to_text();
            vec![EntityType {
                id: type_name.clone(),
                name: type_name,
            }]
        }
        _ => config.default_types(),
    };

    let description = config
        .description_field
        .as_deref()
        .map(|f| row.get(f).map(SqlValue::to_text).unwrap_or_default());

    ReconciliationCandidate {
        score: scoring::score(query, &name),
        matched: scoring::is_exact_match(query, &name),
        id,
        name,
        types,
        description,
    }
}

// ============================================================================
// TESTS
// ============================================================================
