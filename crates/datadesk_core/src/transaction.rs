//! Atomic multi-statement execution over raw SQL.
//!
//! # Responsibility
//! - Run an ordered batch of read/write statements inside one
//!   `BEGIN IMMEDIATE` transaction.
//! - Convert JSON parameters to SQLite values and result rows back to JSON.
//!
//! # Invariants
//! - Either every operation commits or none does.
//! - The first failing operation is reported by its index.
//! - A batch is never started while another transaction is open on the
//!   same connection.

use crate::db::DbError;
use log::{error, info, warn};
use rusqlite::types::{Value, ValueRef};
use rusqlite::{params_from_iter, Connection, Transaction, TransactionBehavior};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value as JsonValue};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

/// Statement category deciding the shape of its result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Read,
    #[default]
    Write,
}

/// One statement of a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    pub statement: String,
    #[serde(default)]
    pub parameters: Vec<JsonValue>,
    #[serde(default)]
    pub kind: OperationKind,
}

impl Operation {
    pub fn read(statement: impl Into<String>, parameters: Vec<JsonValue>) -> Self {
        Self {
            statement: statement.into(),
            parameters,
            kind: OperationKind::Read,
        }
    }

    pub fn write(statement: impl Into<String>, parameters: Vec<JsonValue>) -> Self {
        Self {
            statement: statement.into(),
            parameters,
            kind: OperationKind::Write,
        }
    }
}

/// Result row: column name to JSON value.
pub type JsonRow = Map<String, JsonValue>;

/// Outcome of a write statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteOutcome {
    pub rows_affected: usize,
    /// Row id of the inserted row for `INSERT`/`REPLACE` statements.
    pub generated_id: Option<i64>,
}

/// Per-operation result, in batch order.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum OperationResult {
    Rows(Vec<JsonRow>),
    Write(WriteOutcome),
}

#[derive(Debug)]
pub enum TransactionError {
    /// Another transaction is already open on the connection.
    Nested,
    /// Operation `index` failed; everything was rolled back.
    Aborted {
        index: usize,
        source: rusqlite::Error,
    },
    /// Begin or commit failed.
    Db(DbError),
}

impl Display for TransactionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Nested => write!(f, "a transaction is already open on this connection"),
            Self::Aborted { index, source } => {
                write!(f, "transaction aborted at operation {index}: {source}")
            }
            Self::Db(err) => write!(f, "{err}"),
        }
    }
}

impl Error for TransactionError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Nested => None,
            Self::Aborted { source, .. } => Some(source),
            Self::Db(err) => Some(err),
        }
    }
}

impl From<rusqlite::Error> for TransactionError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Executes `operations` atomically and returns one result per operation.
///
/// An empty batch returns an empty list without touching the store.
pub fn execute_transaction(
    conn: &Connection,
    operations: &[Operation],
) -> Result<Vec<OperationResult>, TransactionError> {
    if !conn.is_autocommit() {
        warn!("event=transaction module=transaction status=rejected reason=nested");
        return Err(TransactionError::Nested);
    }
    if operations.is_empty() {
        return Ok(Vec::new());
    }

    let started_at = Instant::now();
    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;
    let mut results = Vec::with_capacity(operations.len());
    for (index, operation) in operations.iter().enumerate() {
        match run_operation(&tx, operation) {
            Ok(result) => results.push(result),
            Err(source) => {
                if let Err(rollback_err) = tx.rollback() {
                    error!(
                        "event=transaction module=transaction status=rollback_error error={rollback_err}"
                    );
                }
                error!(
                    "event=transaction module=transaction status=aborted index={index} operations={} duration_ms={} error={source}",
                    operations.len(),
                    started_at.elapsed().as_millis()
                );
                return Err(TransactionError::Aborted { index, source });
            }
        }
    }
    tx.commit()?;

    info!(
        "event=transaction module=transaction status=ok operations={} duration_ms={}",
        operations.len(),
        started_at.elapsed().as_millis()
    );
    Ok(results)
}

fn run_operation(
    conn: &Connection,
    operation: &Operation,
) -> Result<OperationResult, rusqlite::Error> {
    match operation.kind {
        OperationKind::Read => {
            query_rows(conn, &operation.statement, &operation.parameters).map(OperationResult::Rows)
        }
        OperationKind::Write => execute_statement(conn, &operation.statement, &operation.parameters)
            .map(OperationResult::Write),
    }
}

/// Runs one read statement and returns its rows as JSON objects.
pub fn query_rows(
    conn: &Connection,
    statement: &str,
    parameters: &[JsonValue],
) -> Result<Vec<JsonRow>, rusqlite::Error> {
    let mut stmt = conn.prepare(statement)?;
    let columns: Vec<String> = stmt
        .column_names()
        .into_iter()
        .map(str::to_string)
        .collect();
    let mut rows = stmt.query(params_from_iter(parameters.iter().map(json_to_sql)))?;
    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        let mut object = Map::with_capacity(columns.len());
        for (index, name) in columns.iter().enumerate() {
            object.insert(name.clone(), sql_to_json(row.get_ref(index)?));
        }
        out.push(object);
    }
    Ok(out)
}

/// Runs one write statement.
pub fn execute_statement(
    conn: &Connection,
    statement: &str,
    parameters: &[JsonValue],
) -> Result<WriteOutcome, rusqlite::Error> {
    let rows_affected = conn.execute(
        statement,
        params_from_iter(parameters.iter().map(json_to_sql)),
    )?;
    let generated_id = (rows_affected > 0 && is_insert(statement)).then(|| conn.last_insert_rowid());
    Ok(WriteOutcome {
        rows_affected,
        generated_id,
    })
}

fn is_insert(statement: &str) -> bool {
    let head: String = statement
        .trim_start()
        .chars()
        .take(7)
        .collect::<String>()
        .to_ascii_uppercase();
    head.starts_with("INSERT") || head.starts_with("REPLACE")
}

/// JSON parameter to SQLite value. Booleans bind as `0`/`1`, composites as
/// JSON text.
pub fn json_to_sql(value: &JsonValue) -> Value {
    match value {
        JsonValue::Null => Value::Null,
        JsonValue::Bool(flag) => Value::Integer(i64::from(*flag)),
        JsonValue::Number(number) => match number.as_i64() {
            Some(integer) => Value::Integer(integer),
            None => Value::Real(number.as_f64().unwrap_or(0.0)),
        },
        JsonValue::String(text) => Value::Text(text.clone()),
        JsonValue::Array(_) | JsonValue::Object(_) => Value::Text(value.to_string()),
    }
}

fn sql_to_json(value: ValueRef<'_>) -> JsonValue {
    match value {
        ValueRef::Null => JsonValue::Null,
        ValueRef::Integer(integer) => JsonValue::Number(Number::from(integer)),
        ValueRef::Real(real) => Number::from_f64(real).map_or(JsonValue::Null, JsonValue::Number),
        ValueRef::Text(bytes) => JsonValue::String(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => JsonValue::Array(
            bytes
                .iter()
                .map(|byte| JsonValue::Number(Number::from(*byte)))
                .collect(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::{is_insert, json_to_sql};
    use rusqlite::types::Value;
    use serde_json::json;

    #[test]
    fn json_parameters_map_to_sqlite_values() {
        assert_eq!(json_to_sql(&json!(true)), Value::Integer(1));
        assert_eq!(json_to_sql(&json!(2.5)), Value::Real(2.5));
        assert_eq!(json_to_sql(&json!(["a"])), Value::Text("[\"a\"]".to_string()));
        assert_eq!(json_to_sql(&json!(null)), Value::Null);
    }

    #[test]
    fn insert_detection_ignores_case_and_leading_space() {
        assert!(is_insert("  insert into t values (1)"));
        assert!(is_insert("REPLACE INTO t VALUES (1)"));
        assert!(!is_insert("UPDATE t SET a = 1"));
    }
}
