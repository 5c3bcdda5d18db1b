// 📥 CSV Import - load a CSV file into a table the service can reconcile against

use crate::error::{ReconcileError, Result};
use crate::store::{escape_sqlite, SqlValue};
use rusqlite::{params_from_iter, Connection};
use std::io::Read;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Integer,
    Real,
    Text,
}

impl ColumnType {
    fn sql(self) -> &'static str {
        match self {
            ColumnType::Integer => "INTEGER",
            ColumnType::Real => "REAL",
            ColumnType::Text => "TEXT",
        }
    }

    /// Empty cells become NULL
    fn value(self, raw: &str) -> SqlValue {
        if raw.is_empty() {
            return SqlValue::Null;
        }
        match self {
            ColumnType::Integer => raw
                .parse::<i64>()
                .map(SqlValue::Integer)
                .unwrap_or_else(|_| SqlValue::from(raw)),
            ColumnType::Real => raw
                .parse::<f64>()
                .map(SqlValue::Real)
                .unwrap_or_else(|_| SqlValue::from(raw)),
            ColumnType::Text => SqlValue::from(raw),
        }
    }
}

/// Narrowest type every non-empty value fits; all-empty columns are TEXT
pub fn infer_column_type<'a>(values: impl IntoIterator<Item = &'a str>) -> ColumnType {
    let mut seen = false;
    let mut integer = true;
    let mut real = true;

    for value in values.into_iter().filter(|v| !v.is_empty()) {
        seen = true;
        integer = integer && value.parse::<i64>().is_ok();
        real = real && value.parse::<f64>().is_ok();
        if !real {
            break;
        }
    }

    match (seen, integer, real) {
        (false, _, _) => ColumnType::Text,
        (true, true, _) => ColumnType::Integer,
        (true, false, true) => ColumnType::Real,
        _ => ColumnType::Text,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CsvTable {
    pub headers: Vec<String>,
    pub records: Vec<Vec<String>>,
}

impl CsvTable {
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = csv::Reader::from_reader(reader);
        let headers = rdr.headers()?.iter().map(|h| h.trim().to_string()).collect();

        let mut records = Vec::new();
        for record in rdr.records() {
            records.push(record?.iter().map(str::to_string).collect());
        }

        Ok(CsvTable { headers, records })
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file)
    }

    pub fn column_types(&self) -> Vec<ColumnType> {
        (0..self.headers.len())
            .map(|i| infer_column_type(self.records.iter().map(|r| r.get(i).map(String::as_str).unwrap_or(""))))
            .collect()
    }
}

/// Create `table` from the CSV and insert every record in one transaction
pub fn import_table(
    conn: &mut Connection,
    table: &str,
    csv: &CsvTable,
    primary_key: Option<&str>,
) -> Result<usize> {
    if let Some(pk) = primary_key {
        if !csv.headers.iter().any(|h| h == pk) {
            return Err(ReconcileError::configuration(format!(
                "Primary key column not found in CSV: {}",
                pk
            )));
        }
    }

    let types = csv.column_types();
    let column_defs: Vec<String> = csv
        .headers
        .iter()
        .zip(&types)
        .map(|(name, ty)| {
            let pk = if Some(name.as_str()) == primary_key { " PRIMARY KEY" } else { "" };
            format!("{} {}{}", escape_sqlite(name), ty.sql(), pk)
        })
        .collect();

    let tx = conn.transaction()?;
    tx.execute(
        &format!("CREATE TABLE {} ({})", escape_sqlite(table), column_defs.join(", ")),
        [],
    )?;

    let insert = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        escape_sqlite(table),
        csv.headers.iter().map(|h| escape_sqlite(h)).collect::<Vec<_>>().join(", "),
        vec!["?"; csv.headers.len()].join(", ")
    );

    let mut inserted = 0;
    {
        let mut stmt = tx.prepare(&insert)?;
        for record in &csv.records {
            let values: Vec<SqlValue> = types
                .iter()
                .enumerate()
                .map(|(i, ty)| ty.value(record.get(i).map(String::as_str).unwrap_or("")))
                .collect();
            stmt.execute(params_from_iter(values.iter()))?;
            inserted += 1;
        }
    }
    tx.commit()?;

    tracing::info!(table, rows = inserted, columns = csv.headers.len(), "imported CSV");
    Ok(inserted)
}

/// Build an FTS5 index `<table>_fts` over `columns`, backed by `table`
pub fn create_fts_index(conn: &Connection, table: &str, columns: &[String]) -> Result<String> {
    if columns.is_empty() {
        return Err(ReconcileError::configuration("FTS index needs at least one column"));
    }

    let fts_name = format!("{}_fts", table);
    let cols = columns.iter().map(|c| escape_sqlite(c)).collect::<Vec<_>>().join(", ");

    conn.execute_batch(&format!(
        "CREATE VIRTUAL TABLE {fts} USING FTS5 ({cols}, content=[{table}]);
         INSERT INTO {fts} (rowid, {cols}) SELECT rowid, {cols} FROM {table_sql};",
        fts = escape_sqlite(&fts_name),
        cols = cols,
        table = table,
        table_sql = escape_sqlite(table),
    ))?;

    tracing::info!(table, fts_table = %fts_name, "created full-text index");
    Ok(fts_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{EntityStore, SqliteStore};

    const DOGS_CSV: &str = "id,name,age,weight,status\n\
                            1,Cleo,5,12.5,good dog\n\
                            2,Pancakes,4,,bad dog\n\
                            3,Fido,3,30,bad dog\n";

    #[test]
    fn test_infer_column_type() {
        assert_eq!(infer_column_type(["1", "2", ""]), ColumnType::Integer);
        assert_eq!(infer_column_type(["1", "2.5"]), ColumnType::Real);
        assert_eq!(infer_column_type(["1", "two"]), ColumnType::Text);
        assert_eq!(infer_column_type(["", ""]), ColumnType::Text);
    }

    #[test]
    fn test_import_table() {
        let csv = CsvTable::from_reader(DOGS_CSV.as_bytes()).unwrap();
        assert_eq!(
            csv.column_types(),
            vec![ColumnType::Integer, ColumnType::Text, ColumnType::Integer, ColumnType::Real, ColumnType::Text]
        );

        let mut store = SqliteStore::open_in_memory().unwrap();
        let inserted = import_table(store.connection_mut(), "dogs", &csv, Some("id")).unwrap();
        assert_eq!(inserted, 3);

        assert_eq!(store.primary_keys("dogs").unwrap(), vec!["id"]);
        let rows = store
            .query("SELECT name, weight FROM dogs WHERE id = ?", &[SqlValue::Integer(2)])
            .unwrap();
        assert_eq!(rows[0].get("name"), Some(&SqlValue::from("Pancakes")));
        assert_eq!(rows[0].get("weight"), Some(&SqlValue::Null));
    }

    #[test]
    fn test_csv_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dogs.csv");
        std::fs::write(&path, DOGS_CSV).unwrap();

        let csv = CsvTable::from_path(&path).unwrap();
        assert_eq!(csv.headers, vec!["id", "name", "age", "weight", "status"]);
        assert_eq!(csv.records.len(), 3);

        let err = CsvTable::from_path(&dir.path().join("missing.csv")).unwrap_err();
        assert!(matches!(err, ReconcileError::Io(_)));
        assert_eq!(err.error_code(), "IO_ERROR");
    }

    #[test]
    fn test_import_rejects_unknown_pk() {
        let csv = CsvTable::from_reader(DOGS_CSV.as_bytes()).unwrap();
        let mut store = SqliteStore::open_in_memory().unwrap();
        let err = import_table(store.connection_mut(), "dogs", &csv, Some("uuid")).unwrap_err();
        assert!(matches!(err, ReconcileError::Configuration(_)));
        assert!(!store.table_exists("dogs").unwrap());
    }

    #[test]
    fn test_create_fts_index_is_discovered() {
        let csv = CsvTable::from_reader(DOGS_CSV.as_bytes()).unwrap();
        let mut store = SqliteStore::open_in_memory().unwrap();
        import_table(store.connection_mut(), "dogs", &csv, None).unwrap();

        let name = create_fts_index(store.connection(), "dogs", &["name".to_string()]).unwrap();
        assert_eq!(name, "dogs_fts");

        let fts = store.fts_table("dogs").unwrap().unwrap();
        assert_eq!(fts.name, "dogs_fts");
        assert!(fts.ranked);

        let hits = store
            .query("SELECT rowid FROM dogs_fts WHERE dogs_fts MATCH ?", &[SqlValue::from("fido")])
            .unwrap();
        assert_eq!(hits.len(), 1);
    }
}
