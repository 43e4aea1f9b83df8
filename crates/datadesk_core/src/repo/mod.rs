//! Repository layer: one generic table repository plus entity wrappers.
//!
//! # Responsibility
//! - Provide CRUD, counting and pagination over any table described by a
//!   static [`TableSchema`].
//! - Enforce per-entity uniqueness rules before inserts and updates.
//! - Isolate SQL text from services.
//!
//! # Invariants
//! - Every identifier placed into SQL text comes from a schema allow-list;
//!   values are always bound.
//! - Writes re-read the affected row so callers see store-computed columns.
//! - Repositories borrow the connection and never close it.

pub mod account_repo;
pub mod document_repo;
pub mod setting_repo;

use crate::db::DbError;
use crate::query::{
    build_page_plan, OrderDirection, Page, PageMeta, PageRequest, PageSpec, Predicate,
};
use rusqlite::types::{ToSql, Value};
use rusqlite::{params_from_iter, Connection, OptionalExtension, Row};
use serde::Serialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::marker::PhantomData;

/// SQL expression producing the current time in epoch milliseconds.
pub const NOW_MS_SQL: &str = "(strftime('%s', 'now') * 1000)";

pub type RepoResult<T> = Result<T, RepoError>;

/// A unique column already holds the value on another row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UniquenessConflict {
    /// Logical field name.
    pub field: &'static str,
    pub value: String,
}

/// Persistence error shared by all repositories.
#[derive(Debug)]
pub enum RepoError {
    Db(DbError),
    Conflict(UniquenessConflict),
    /// Ordering or filter column outside the entity allow-list.
    UnknownColumn(String),
    /// Insert succeeded but produced no row id to read back.
    MissingGeneratedId(&'static str),
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::Conflict(conflict) => {
                write!(f, "{} `{}` already exists", conflict.field, conflict.value)
            }
            Self::UnknownColumn(name) => write!(f, "unknown column: `{name}`"),
            Self::MissingGeneratedId(table) => {
                write!(f, "insert into `{table}` produced no generated id")
            }
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Conflict(_)
            | Self::UnknownColumn(_)
            | Self::MissingGeneratedId(_)
            | Self::InvalidData(_) => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Logical field to physical column mapping.
#[derive(Debug, Clone, Copy)]
pub struct Column {
    pub field: &'static str,
    pub column: &'static str,
}

/// Column whose non-null values must be unique across rows.
#[derive(Debug, Clone, Copy)]
pub struct UniqueRule {
    pub column: &'static str,
    pub field: &'static str,
}

/// Static description of one table.
#[derive(Debug)]
pub struct TableSchema {
    pub table: &'static str,
    pub key_column: &'static str,
    /// Every selectable column; also the ordering/filter allow-list.
    pub columns: &'static [Column],
    pub search_columns: &'static [&'static str],
    pub default_order: &'static str,
    pub default_direction: OrderDirection,
    pub unique: &'static [UniqueRule],
}

impl TableSchema {
    /// Resolves a logical field or physical column name to the column.
    pub fn resolve_column(&self, name: &str) -> RepoResult<&'static str> {
        self.columns
            .iter()
            .find(|column| column.field == name || column.column == name)
            .map(|column| column.column)
            .ok_or_else(|| RepoError::UnknownColumn(name.to_string()))
    }

    fn select_list(&self) -> String {
        self.columns
            .iter()
            .map(|column| column.column)
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn field_of(&self, column: &str) -> &'static str {
        self.columns
            .iter()
            .find(|candidate| candidate.column == column)
            .map_or("", |candidate| candidate.field)
    }
}

/// Row type stored in one table.
pub trait Entity: Sized {
    type Key: ToSql + Display;

    const SCHEMA: &'static TableSchema;

    /// Decodes one row selected with the schema's column list.
    fn from_row(row: &Row<'_>) -> RepoResult<Self>;
}

/// Column values of one write, keyed by physical column.
pub type ColumnValues = Vec<(&'static str, Value)>;

/// Generic repository over the table of `E`.
pub struct Repository<'conn, E> {
    conn: &'conn Connection,
    entity: PhantomData<fn() -> E>,
}

impl<'conn, E: Entity> Repository<'conn, E> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self {
            conn,
            entity: PhantomData,
        }
    }

    pub fn connection(&self) -> &'conn Connection {
        self.conn
    }

    pub fn schema(&self) -> &'static TableSchema {
        E::SCHEMA
    }

    pub fn find_by_id(&self, key: &E::Key) -> RepoResult<Option<E>> {
        let schema = E::SCHEMA;
        let rows = self.select(
            &format!("WHERE {} = ?", schema.key_column),
            &[key as &dyn ToSql],
        )?;
        Ok(rows.into_iter().next())
    }

    /// Lists every row; `order_by` falls back to the schema default.
    pub fn find_all(
        &self,
        order_by: Option<&str>,
        direction: Option<OrderDirection>,
        limit: Option<u32>,
    ) -> RepoResult<Vec<E>> {
        let schema = E::SCHEMA;
        let column = match order_by {
            Some(name) => schema.resolve_column(name)?,
            None => schema.default_order,
        };
        let direction = direction.unwrap_or(schema.default_direction).as_sql();
        let mut tail = format!(
            "ORDER BY {column} {direction}, {} {direction}",
            schema.key_column
        );
        if let Some(limit) = limit {
            tail.push_str(&format!(" LIMIT {limit}"));
        }
        self.select(&tail, &[])
    }

    /// Rows matching every `field = value` pair; empty input lists all rows.
    pub fn find_where(&self, equalities: &[(&str, Value)]) -> RepoResult<Vec<E>> {
        let (where_sql, params) = self.equality_clause(equalities)?;
        let schema = E::SCHEMA;
        let tail = format!(
            "{where_sql} ORDER BY {} {}",
            schema.default_order,
            schema.default_direction.as_sql()
        );
        self.select(&tail, &to_sql_refs(&params))
    }

    pub fn count(&self, equalities: &[(&str, Value)]) -> RepoResult<u64> {
        let (where_sql, params) = self.equality_clause(equalities)?;
        let sql = format!("SELECT COUNT(*) FROM {} {where_sql}", E::SCHEMA.table);
        let total: i64 = self
            .conn
            .query_row(&sql, params_from_iter(params.iter()), |row| row.get(0))?;
        Ok(u64::try_from(total).unwrap_or(0))
    }

    pub fn exists(&self, key: &E::Key) -> RepoResult<bool> {
        let schema = E::SCHEMA;
        let found = self
            .conn
            .query_row(
                &format!(
                    "SELECT 1 FROM {} WHERE {} = ?1 LIMIT 1",
                    schema.table, schema.key_column
                ),
                [key],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Inserts a row and returns it as re-read from the store.
    pub fn create(&self, values: &[(&'static str, Value)]) -> RepoResult<E> {
        let schema = E::SCHEMA;
        self.ensure_allowed(values)?;
        self.check_unique(values, None)?;

        let sql = if values.is_empty() {
            format!("INSERT INTO {} DEFAULT VALUES", schema.table)
        } else {
            let columns = values
                .iter()
                .map(|(column, _)| *column)
                .collect::<Vec<_>>()
                .join(", ");
            let placeholders = vec!["?"; values.len()].join(", ");
            format!(
                "INSERT INTO {} ({columns}) VALUES ({placeholders})",
                schema.table
            )
        };
        let inserted = self
            .conn
            .execute(&sql, params_from_iter(values.iter().map(|(_, value)| value)))?;
        if inserted == 0 {
            return Err(RepoError::MissingGeneratedId(schema.table));
        }

        let rowid = self.conn.last_insert_rowid();
        self.select("WHERE rowid = ?", &[&rowid as &dyn ToSql])?
            .into_iter()
            .next()
            .ok_or(RepoError::MissingGeneratedId(schema.table))
    }

    /// Applies partial changes and refreshes `updated_at`.
    ///
    /// Empty changes return the current row untouched. `Ok(None)` means no
    /// row matched `key`.
    pub fn update(
        &self,
        key: &E::Key,
        changes: &[(&'static str, Value)],
    ) -> RepoResult<Option<E>> {
        if changes.is_empty() {
            return self.find_by_id(key);
        }
        self.ensure_allowed(changes)?;
        self.check_unique(changes, Some(key))?;

        let schema = E::SCHEMA;
        let sql = format!(
            "UPDATE {} SET {}, updated_at = {NOW_MS_SQL} WHERE {} = ?",
            schema.table,
            assignment_list(changes),
            schema.key_column
        );
        let mut params = to_sql_refs_of(changes);
        params.push(key);
        let changed = self.conn.execute(&sql, params.as_slice())?;
        if changed == 0 {
            return Ok(None);
        }
        self.find_by_id(key)
    }

    /// Applies the same changes to every listed row; returns rows changed.
    ///
    /// Uniqueness rules are not evaluated here; callers only use it for
    /// non-unique columns.
    pub fn update_many(
        &self,
        keys: &[E::Key],
        changes: &[(&'static str, Value)],
    ) -> RepoResult<usize> {
        if keys.is_empty() || changes.is_empty() {
            return Ok(0);
        }
        self.ensure_allowed(changes)?;
        let schema = E::SCHEMA;
        let sql = format!(
            "UPDATE {} SET {}, updated_at = {NOW_MS_SQL} WHERE {} IN ({})",
            schema.table,
            assignment_list(changes),
            schema.key_column,
            vec!["?"; keys.len()].join(", ")
        );
        let mut params = to_sql_refs_of(changes);
        params.extend(keys.iter().map(|key| key as &dyn ToSql));
        Ok(self.conn.execute(&sql, params.as_slice())?)
    }

    pub fn delete(&self, key: &E::Key) -> RepoResult<bool> {
        let schema = E::SCHEMA;
        let deleted = self.conn.execute(
            &format!("DELETE FROM {} WHERE {} = ?1", schema.table, schema.key_column),
            [key],
        )?;
        Ok(deleted > 0)
    }

    /// Deletes every listed row; returns rows removed, `0` for empty input.
    pub fn delete_many(&self, keys: &[E::Key]) -> RepoResult<usize> {
        if keys.is_empty() {
            return Ok(0);
        }
        let schema = E::SCHEMA;
        let sql = format!(
            "DELETE FROM {} WHERE {} IN ({})",
            schema.table,
            schema.key_column,
            vec!["?"; keys.len()].join(", ")
        );
        Ok(self.conn.execute(&sql, params_from_iter(keys.iter()))?)
    }

    /// One page of rows matching `predicate` and the request's search term.
    pub fn paginate(&self, request: &PageRequest, predicate: &Predicate) -> RepoResult<Page<E>> {
        let schema = E::SCHEMA;
        let order_column = match request.order_by.as_deref().filter(|name| !name.is_empty()) {
            Some(name) => schema.resolve_column(name)?,
            None => schema.default_order,
        };
        let select = schema.select_list();
        let plan = build_page_plan(&PageSpec {
            table: schema.table,
            select: &select,
            predicate,
            search: request.search.as_deref(),
            search_columns: schema.search_columns,
            order_column,
            tie_breaker: schema.key_column,
            direction: request.order_direction.unwrap_or(schema.default_direction),
            page: request.page(),
            limit: request.limit(),
        });

        let total: i64 = self.conn.query_row(
            &plan.count_sql,
            params_from_iter(plan.params.iter()),
            |row| row.get(0),
        )?;

        let mut stmt = self.conn.prepare(&plan.data_sql)?;
        let mut rows = stmt.query(params_from_iter(plan.data_params()))?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(E::from_row(row)?);
        }

        Ok(Page {
            rows: items,
            meta: PageMeta::new(
                request.page(),
                request.limit(),
                u64::try_from(total).unwrap_or(0),
            ),
        })
    }

    /// Fails with [`RepoError::Conflict`] when a unique column value is
    /// already used by another row. Null values never conflict.
    pub fn check_unique(
        &self,
        values: &[(&'static str, Value)],
        exclude: Option<&E::Key>,
    ) -> RepoResult<()> {
        let schema = E::SCHEMA;
        for rule in schema.unique {
            let Some((_, value)) = values.iter().find(|(column, _)| *column == rule.column) else {
                continue;
            };
            if matches!(value, Value::Null) {
                continue;
            }

            let taken = match exclude {
                Some(key) => self
                    .conn
                    .query_row(
                        &format!(
                            "SELECT 1 FROM {} WHERE {} = ?1 AND {} <> ?2 LIMIT 1",
                            schema.table, rule.column, schema.key_column
                        ),
                        [value as &dyn ToSql, key as &dyn ToSql],
                        |_| Ok(()),
                    )
                    .optional()?,
                None => self
                    .conn
                    .query_row(
                        &format!(
                            "SELECT 1 FROM {} WHERE {} = ?1 LIMIT 1",
                            schema.table, rule.column
                        ),
                        [value],
                        |_| Ok(()),
                    )
                    .optional()?,
            };

            if taken.is_some() {
                return Err(RepoError::Conflict(UniquenessConflict {
                    field: rule.field,
                    value: value_text(value),
                }));
            }
        }
        Ok(())
    }

    /// Runs `SELECT <schema columns> FROM <table> <tail>`.
    pub(crate) fn select(&self, tail: &str, params: &[&dyn ToSql]) -> RepoResult<Vec<E>> {
        let schema = E::SCHEMA;
        let sql = format!("SELECT {} FROM {} {tail}", schema.select_list(), schema.table);
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params)?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(E::from_row(row)?);
        }
        Ok(items)
    }

    fn equality_clause(&self, equalities: &[(&str, Value)]) -> RepoResult<(String, Vec<Value>)> {
        if equalities.is_empty() {
            return Ok((String::new(), Vec::new()));
        }
        let mut clauses = Vec::with_capacity(equalities.len());
        let mut params = Vec::with_capacity(equalities.len());
        for (name, value) in equalities {
            let column = E::SCHEMA.resolve_column(name)?;
            if matches!(value, Value::Null) {
                clauses.push(format!("{column} IS NULL"));
            } else {
                clauses.push(format!("{column} = ?"));
                params.push(value.clone());
            }
        }
        Ok((format!("WHERE {}", clauses.join(" AND ")), params))
    }

    fn ensure_allowed(&self, values: &[(&'static str, Value)]) -> RepoResult<()> {
        for (column, _) in values {
            if E::SCHEMA.field_of(column).is_empty() {
                return Err(RepoError::UnknownColumn((*column).to_string()));
            }
        }
        Ok(())
    }
}

fn assignment_list(changes: &[(&'static str, Value)]) -> String {
    changes
        .iter()
        .map(|(column, _)| format!("{column} = ?"))
        .collect::<Vec<_>>()
        .join(", ")
}

fn to_sql_refs(values: &[Value]) -> Vec<&dyn ToSql> {
    values.iter().map(|value| value as &dyn ToSql).collect()
}

fn to_sql_refs_of<'a>(changes: &'a [(&'static str, Value)]) -> Vec<&'a dyn ToSql> {
    changes.iter().map(|(_, value)| value as &dyn ToSql).collect()
}

fn value_text(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Integer(number) => number.to_string(),
        Value::Real(number) => number.to_string(),
        Value::Text(text) => text.clone(),
        Value::Blob(bytes) => format!("<{} bytes>", bytes.len()),
    }
}

/// Converts an optional string into a bindable value.
pub(crate) fn text_or_null(value: Option<&str>) -> Value {
    value.map_or(Value::Null, |text| Value::Text(text.to_string()))
}
