//! SQLite store access.
//!
//! The executor is a generic statement runner: it opens a connection for
//! the duration of one call, executes the generated statement verbatim, and
//! reports either the ordered rows or a structured execution failure. It is
//! deliberately not schema-aware and never retries.

use std::path::{Path, PathBuf};

use rusqlite::types::ValueRef;
use rusqlite::Connection;
use serde_json::Value;

/// One result row. Keys are the statement's column names, shared across all
/// rows of one result.
pub type Row = serde_json::Map<String, Value>;

/// Outcome of executing one generated statement. The variants are mutually
/// exclusive: a statement either produced rows (possibly none) or was
/// rejected by the engine.
#[derive(Debug, Clone)]
pub enum ExecutionResult {
    Rows(Vec<Row>),
    /// Engine rejection — malformed SQL, unknown column or table, syntax
    /// error. Carries the engine message and the statement that produced it.
    Failure { message: String, sql: String },
}

/// Infrastructure errors, distinct from statement rejection.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Cannot open database at {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: rusqlite::Error,
    },
    #[error("Query failed: {0}")]
    Query(#[from] rusqlite::Error),
}

/// Runs generated SQL against the hospital database.
///
/// Holds only the path; each call opens its own connection so that every
/// exit path, success or failure, releases the connection.
#[derive(Debug, Clone)]
pub struct QueryExecutor {
    db_path: PathBuf,
}

impl QueryExecutor {
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
        }
    }

    /// Execute a single literal statement.
    ///
    /// Statement-level errors become `ExecutionResult::Failure`; only
    /// connection trouble is a `StoreError`.
    pub fn run(&self, sql: &str) -> Result<ExecutionResult, StoreError> {
        let conn = open(&self.db_path)?;

        match collect_rows(&conn, sql) {
            Ok(rows) => {
                tracing::debug!(rows = rows.len(), "SQL execution succeeded");
                Ok(ExecutionResult::Rows(rows))
            }
            Err(e) => {
                tracing::warn!(error = %e, "SQL execution failed");
                Ok(ExecutionResult::Failure {
                    message: e.to_string(),
                    sql: sql.to_string(),
                })
            }
        }
    }
}

fn open(path: &Path) -> Result<Connection, StoreError> {
    Connection::open(path).map_err(|source| StoreError::Open {
        path: path.display().to_string(),
        source,
    })
}

fn collect_rows(conn: &Connection, sql: &str) -> Result<Vec<Row>, rusqlite::Error> {
    let mut stmt = conn.prepare(sql)?;
    let names: Vec<String> = stmt.column_names().iter().map(|n| n.to_string()).collect();

    let mut raw = stmt.query([])?;
    let mut rows = Vec::new();
    while let Some(row) = raw.next()? {
        let mut map = Row::new();
        for (i, name) in names.iter().enumerate() {
            map.insert(name.clone(), json_value(row.get_ref(i)?));
        }
        rows.push(map);
    }
    Ok(rows)
}

/// Convert a SQLite value to JSON. Blobs have no JSON shape the formatter
/// can use, so they become a placeholder string.
fn json_value(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        ValueRef::Text(t) => Value::String(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Value::String(format!("<blob {} bytes>", b.len())),
    }
}

/// Fetch discharge records for a patient from the reference database.
///
/// Unlike the executor this query is parameterized — the identifiers come
/// from the caller, not from generated SQL.
pub fn fetch_reference_records(
    db_path: &Path,
    subject_id: &str,
    admission_id: Option<&str>,
) -> Result<Vec<Row>, StoreError> {
    let conn = open(db_path)?;

    let (sql, params): (&str, Vec<&str>) = match admission_id {
        Some(adm) => (
            "SELECT * FROM discharge WHERE subject_id = ?1 AND admission_id = ?2",
            vec![subject_id, adm],
        ),
        None => (
            "SELECT * FROM discharge WHERE subject_id = ?1",
            vec![subject_id],
        ),
    };

    let mut stmt = conn.prepare(sql)?;
    let names: Vec<String> = stmt.column_names().iter().map(|n| n.to_string()).collect();

    let mut raw = stmt.query(rusqlite::params_from_iter(params))?;
    let mut rows = Vec::new();
    while let Some(row) = raw.next()? {
        let mut map = Row::new();
        for (i, name) in names.iter().enumerate() {
            map.insert(name.clone(), json_value(row.get_ref(i)?));
        }
        rows.push(map);
    }

    tracing::info!(
        count = rows.len(),
        subject_id,
        "Fetched reference discharge records"
    );
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded_db() -> tempfile::NamedTempFile {
        let file = tempfile::NamedTempFile::new().unwrap();
        let conn = Connection::open(file.path()).unwrap();
        conn.execute_batch(
            "CREATE TABLE admissions (
                subject_id INTEGER, hadm_id INTEGER,
                admittime TEXT, dischtime TEXT, los REAL
             );
             INSERT INTO admissions VALUES (10009628, 25926192, '2153-09-17', '2153-09-21', 4.2);
             INSERT INTO admissions VALUES (10009628, 28166872, '2154-01-05', '2154-01-09', NULL);
             CREATE TABLE discharge (
                note_id TEXT, subject_id INTEGER, admission_id INTEGER, text TEXT
             );
             INSERT INTO discharge VALUES ('n1', 10009628, 25926192, 'Discharged in stable condition.');
             INSERT INTO discharge VALUES ('n2', 10009628, 28166872, 'Second admission note.');
             INSERT INTO discharge VALUES ('n3', 10014729, 23224574, 'Other patient.');",
        )
        .unwrap();
        file
    }

    #[test]
    fn run_returns_ordered_rows() {
        let db = seeded_db();
        let executor = QueryExecutor::new(db.path());

        let result = executor
            .run("SELECT subject_id, hadm_id FROM admissions ORDER BY admittime")
            .unwrap();
        let rows = match result {
            ExecutionResult::Rows(rows) => rows,
            other => panic!("expected rows, got {other:?}"),
        };
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["hadm_id"], Value::from(25926192));
        assert_eq!(rows[1]["hadm_id"], Value::from(28166872));
    }

    #[test]
    fn run_empty_result_is_success() {
        let db = seeded_db();
        let executor = QueryExecutor::new(db.path());

        let result = executor
            .run("SELECT * FROM admissions WHERE subject_id = 1")
            .unwrap();
        assert!(matches!(result, ExecutionResult::Rows(rows) if rows.is_empty()));
    }

    #[test]
    fn run_rejected_statement_becomes_failure() {
        let db = seeded_db();
        let executor = QueryExecutor::new(db.path());

        let bad = "SELECT nonexistent_column FROM admissions";
        let result = executor.run(bad).unwrap();
        match result {
            ExecutionResult::Failure { message, sql } => {
                assert!(message.contains("nonexistent_column"));
                assert_eq!(sql, bad);
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[test]
    fn run_maps_sqlite_types_to_json() {
        let db = seeded_db();
        let executor = QueryExecutor::new(db.path());

        let result = executor
            .run("SELECT admittime, los FROM admissions ORDER BY admittime")
            .unwrap();
        let rows = match result {
            ExecutionResult::Rows(rows) => rows,
            other => panic!("expected rows, got {other:?}"),
        };
        assert_eq!(rows[0]["admittime"], Value::String("2153-09-17".into()));
        assert_eq!(rows[0]["los"], serde_json::json!(4.2));
        assert_eq!(rows[1]["los"], Value::Null);
    }

    #[test]
    fn reference_records_by_subject() {
        let db = seeded_db();
        let rows = fetch_reference_records(db.path(), "10009628", None).unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn reference_records_narrowed_by_admission() {
        let db = seeded_db();
        let rows = fetch_reference_records(db.path(), "10009628", Some("25926192")).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(
            rows[0]["text"],
            Value::String("Discharged in stable condition.".into())
        );
    }

    #[test]
    fn reference_records_unknown_subject_is_empty() {
        let db = seeded_db();
        let rows = fetch_reference_records(db.path(), "99999999", None).unwrap();
        assert!(rows.is_empty());
    }
}
