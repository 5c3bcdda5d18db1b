// 🗄️ Entity Store - read access to the table being reconciled
// The core only talks to the store through `EntityStore`; `SqliteStore`
// is the rusqlite-backed implementation used by the CLI and the server.

use crate::error::Result;
use rusqlite::types::{ToSqlOutput, ValueRef};
use rusqlite::{params_from_iter, Connection, ToSql};
use serde::Serialize;
use std::path::Path;

// ============================================================================
// VALUES & ROWS
// ============================================================================

/// One cell as returned by the store
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl SqlValue {
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    /// String form used for candidate ids and names
    pub fn to_text(&self) -> String {
        match self {
            SqlValue::Null => String::new(),
            SqlValue::Integer(i) => i.to_string(),
            SqlValue::Real(f) => f.to_string(),
            SqlValue::Text(s) => s.clone(),
            SqlValue::Blob(b) => String::from_utf8_lossy(b).into_owned(),
        }
    }
}

impl From<&str> for SqlValue {
    fn from(s: &str) -> Self {
        SqlValue::Text(s.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(s: String) -> Self {
        SqlValue::Text(s)
    }
}

impl From<i64> for SqlValue {
    fn from(i: i64) -> Self {
        SqlValue::Integer(i)
    }
}

impl From<ValueRef<'_>> for SqlValue {
    fn from(value: ValueRef<'_>) -> Self {
        match value {
            ValueRef::Null => SqlValue::Null,
            ValueRef::Integer(i) => SqlValue::Integer(i),
            ValueRef::Real(f) => SqlValue::Real(f),
            ValueRef::Text(t) => SqlValue::Text(String::from_utf8_lossy(t).into_owned()),
            ValueRef::Blob(b) => SqlValue::Blob(b.to_vec()),
        }
    }
}

impl ToSql for SqlValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            SqlValue::Null => ToSqlOutput::Borrowed(ValueRef::Null),
            SqlValue::Integer(i) => ToSqlOutput::Borrowed(ValueRef::Integer(*i)),
            SqlValue::Real(f) => ToSqlOutput::Borrowed(ValueRef::Real(*f)),
            SqlValue::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            SqlValue::Blob(b) => ToSqlOutput::Borrowed(ValueRef::Blob(b)),
        })
    }
}

/// A result row addressable by column name
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    cells: Vec<(String, SqlValue)>,
}

impl Row {
    pub fn new(cells: Vec<(String, SqlValue)>) -> Self {
        Row { cells }
    }

    pub fn get(&self, column: &str) -> Option<&SqlValue> {
        self.cells
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    pub fn contains(&self, column: &str) -> bool {
        self.get(column).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SqlValue)> {
        self.cells.iter().map(|(name, value)| (name.as_str(), value))
    }
}

// ============================================================================
// TABLE METADATA
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnInfo {
    pub name: String,
    /// Declared SQL type, empty when the column has none
    pub declared_type: String,
}

/// Full-text index attached to a table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FtsIndex {
    pub name: String,
    /// FTS5 indexes expose a `rank` column usable for ordering
    pub ranked: bool,
}

// ============================================================================
// STORE TRAIT
// ============================================================================

pub trait EntityStore {
    fn table_exists(&self, table: &str) -> Result<bool>;

    fn is_view(&self, table: &str) -> Result<bool>;

    /// Declared primary key columns, in key order
    fn primary_keys(&self, table: &str) -> Result<Vec<String>>;

    fn fts_table(&self, table: &str) -> Result<Option<FtsIndex>>;

    fn columns(&self, table: &str) -> Result<Vec<ColumnInfo>>;

    /// Execute a parameterized read query (positional `?` placeholders)
    fn query(&self, sql: &str, params: &[SqlValue]) -> Result<Vec<Row>>;
}

// ============================================================================
// IDENTIFIER ESCAPING
// ============================================================================

const RESERVED_WORDS: &[&str] = &[
    "abort", "action", "add", "after", "all", "alter", "analyze", "and", "as", "asc",
    "attach", "autoincrement", "before", "begin", "between", "by", "cascade", "case",
    "cast", "check", "collate", "column", "commit", "conflict", "constraint", "create",
    "cross", "current_date", "current_time", "current_timestamp", "database", "default",
    "deferrable", "deferred", "delete", "desc", "detach", "distinct", "drop", "each",
    "else", "end", "escape", "except", "exclusive", "exists", "explain", "fail", "for",
    "foreign", "from", "full", "glob", "group", "having", "if", "ignore", "immediate",
    "in", "index", "indexed", "initially", "inner", "insert", "instead", "intersect",
    "into", "is", "isnull", "join", "key", "left", "like", "limit", "match", "natural",
    "no", "not", "notnull", "null", "of", "offset", "on", "or", "order", "outer", "plan",
    "pragma", "primary", "query", "raise", "recursive", "references", "regexp", "reindex",
    "release", "rename", "replace", "restrict", "right", "rollback", "row", "savepoint",
    "select", "set", "table", "temp", "temporary", "then", "to", "transaction", "trigger",
    "union", "unique", "update", "using", "vacuum", "values", "view", "virtual", "when",
    "where", "with", "without",
];

/// Quote a table or column name unless it is a plain, non-reserved word
pub fn escape_sqlite(name: &str) -> String {
    let mut chars = name.chars();
    let plain = match chars.next() {
        Some(first) => {
            (first.is_ascii_alphabetic() || first == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        None => false,
    };

    if plain && !RESERVED_WORDS.contains(&name.to_ascii_lowercase().as_str()) {
        name.to_string()
    } else {
        format!("[{}]", name)
    }
}

/// Make `value` match itself literally in a `LIKE ... ESCAPE '\'` pattern
fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

// ============================================================================
// SQLITE IMPLEMENTATION
// ============================================================================

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        Ok(SqliteStore { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        Ok(SqliteStore {
            conn: Connection::open_in_memory()?,
        })
    }

    pub fn from_connection(conn: Connection) -> Self {
        SqliteStore { conn }
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn connection_mut(&mut self) -> &mut Connection {
        &mut self.conn
    }

    fn master_entry_exists(&self, kind: &str, name: &str) -> Result<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = ?1 AND name = ?2",
            [kind, name],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }
}

impl EntityStore for SqliteStore {
    fn table_exists(&self, table: &str) -> Result<bool> {
        self.master_entry_exists("table", table)
    }

    fn is_view(&self, table: &str) -> Result<bool> {
        self.master_entry_exists("view", table)
    }

    fn primary_keys(&self, table: &str) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT name FROM pragma_table_info(?1) WHERE pk > 0 ORDER BY pk")?;

        let keys = stmt
            .query_map([table], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;

        Ok(keys)
    }

    fn fts_table(&self, table: &str) -> Result<Option<FtsIndex>> {
        // External-content FTS tables point back at their source via content=
        let mut stmt = self.conn.prepare(
            "SELECT name, sql FROM sqlite_master
             WHERE rootpage = 0
               AND (
                    sql LIKE '%VIRTUAL TABLE%USING FTS%content=' || quote(?1) || '%' ESCAPE '\\'
                 OR sql LIKE '%VIRTUAL TABLE%USING FTS%content=\"' || ?1 || '\"%' ESCAPE '\\'
                 OR sql LIKE '%VIRTUAL TABLE%USING FTS%content=[' || ?1 || ']%' ESCAPE '\\'
               )
             ORDER BY name",
        )?;

        let mut rows = stmt.query([escape_like(table)])?;
        match rows.next()? {
            Some(row) => {
                let name: String = row.get(0)?;
                let sql: String = row.get(1)?;
                Ok(Some(FtsIndex {
                    name,
                    ranked: sql.to_ascii_lowercase().contains("fts5"),
                }))
            }
            None => Ok(None),
        }
    }

    fn columns(&self, table: &str) -> Result<Vec<ColumnInfo>> {
        let mut stmt = self
            .conn
            .prepare("SELECT name, type FROM pragma_table_info(?1) ORDER BY cid")?;

        let columns = stmt
            .query_map([table], |row| {
                Ok(ColumnInfo {
                    name: row.get(0)?,
                    declared_type: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(columns)
    }

    fn query(&self, sql: &str, params: &[SqlValue]) -> Result<Vec<Row>> {
        let mut stmt = self.conn.prepare(sql)?;
        let names: Vec<String> = stmt.column_names().iter().map(|n| n.to_string()).collect();

        let mut rows = stmt.query(params_from_iter(params.iter()))?;
        let mut result = Vec::new();
        while let Some(row) = rows.next()? {
            let mut cells = Vec::with_capacity(names.len());
            for (i, name) in names.iter().enumerate() {
                cells.push((name.clone(), SqlValue::from(row.get_ref(i)?)));
            }
            result.push(Row::new(cells));
        }

        Ok(result)
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    /// The `dogs` table used throughout the tests
    pub fn dogs_store() -> SqliteStore {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .connection()
            .execute_batch(
                "CREATE TABLE dogs (
                    id INTEGER PRIMARY KEY,
                    name TEXT,
                    age INTEGER,
                    status TEXT
                );
                INSERT INTO dogs VALUES (1, 'Cleo', 5, 'good dog');
                INSERT INTO dogs VALUES (2, 'Pancakes', 4, 'bad dog');
                INSERT INTO dogs VALUES (3, 'Fido', 3, 'bad dog');
                INSERT INTO dogs VALUES (4, 'Scratch', 3, 'good dog');",
            )
            .unwrap();
        store
    }

    /// `dogs` plus an FTS5 index over `name`
    pub fn dogs_store_with_fts() -> SqliteStore {
        let store = dogs_store();
        store
            .connection()
            .execute_batch(
                "CREATE VIRTUAL TABLE dogs_fts USING FTS5 (name, content=[dogs]);
                 INSERT INTO dogs_fts (rowid, name) SELECT rowid, name FROM dogs;",
            )
            .unwrap();
        store
    }
}
