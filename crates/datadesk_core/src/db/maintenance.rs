//! Store metadata and backup helpers.

use super::migrations::stored_version;
use super::{DbError, DbResult};
use log::{error, info};
use rusqlite::Connection;
use serde::Serialize;
use std::path::Path;
use std::time::Instant;

/// Snapshot of store metadata reported to the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseInfo {
    /// Main database file, `None` for in-memory stores.
    pub path: Option<String>,
    pub schema_version: u32,
    pub page_size: i64,
    pub page_count: i64,
    pub accounts: i64,
    pub documents: i64,
    pub settings: i64,
}

/// Reads schema version, page statistics and per-table row counts.
pub fn database_info(conn: &Connection) -> DbResult<DatabaseInfo> {
    let path = conn
        .path()
        .filter(|path| !path.is_empty())
        .map(str::to_string);
    let page_size = conn.query_row("PRAGMA page_size;", [], |row| row.get(0))?;
    let page_count = conn.query_row("PRAGMA page_count;", [], |row| row.get(0))?;

    Ok(DatabaseInfo {
        path,
        schema_version: stored_version(conn)?,
        page_size,
        page_count,
        accounts: count_rows(conn, "SELECT COUNT(*) FROM accounts;")?,
        documents: count_rows(conn, "SELECT COUNT(*) FROM documents;")?,
        settings: count_rows(conn, "SELECT COUNT(*) FROM settings;")?,
    })
}

/// Writes a consistent copy of the main database to `target`.
///
/// # Errors
/// - Fails when `target` already exists or is not writable.
pub fn backup_to(conn: &Connection, target: impl AsRef<Path>) -> DbResult<()> {
    let started_at = Instant::now();
    let target = target.as_ref();
    if let Some(parent) = target.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|source| DbError::Directory {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    let target_text = target.to_string_lossy();
    match conn.execute("VACUUM INTO ?1;", [target_text.as_ref()]) {
        Ok(_) => {
            info!(
                "event=db_backup module=db status=ok duration_ms={}",
                started_at.elapsed().as_millis()
            );
            Ok(())
        }
        Err(err) => {
            error!(
                "event=db_backup module=db status=error duration_ms={} error={}",
                started_at.elapsed().as_millis(),
                err
            );
            Err(err.into())
        }
    }
}

fn count_rows(conn: &Connection, sql: &str) -> DbResult<i64> {
    Ok(conn.query_row(sql, [], |row| row.get(0))?)
}
