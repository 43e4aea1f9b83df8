//! Schema upgrades keyed by `PRAGMA user_version`.
//!
//! # Invariants
//! - Steps are listed in ascending version order with no gaps.
//! - A store is either at an older version, upgraded in one transaction, or
//!   exactly at [`supported_version`]. Anything newer is refused.

use crate::db::{DbError, DbResult};
use log::info;
use rusqlite::Connection;

/// Version number paired with the SQL script that produces it.
type SchemaStep = (u32, &'static str);

const SCHEMA_STEPS: [SchemaStep; 1] = [(1, include_str!("0001_init.sql"))];

/// Highest schema version this build can read and write.
pub const fn supported_version() -> u32 {
    SCHEMA_STEPS[SCHEMA_STEPS.len() - 1].0
}

/// Reads the version recorded in the store header.
pub fn stored_version(conn: &Connection) -> DbResult<u32> {
    Ok(conn.pragma_query_value(None, "user_version", |row| row.get(0))?)
}

/// Runs every step above the stored version and returns the version the
/// store started from.
pub fn upgrade_schema(conn: &mut Connection) -> DbResult<u32> {
    let found = stored_version(conn)?;
    let supported = supported_version();
    if found > supported {
        return Err(DbError::UnsupportedSchemaVersion { found, supported });
    }

    let pending: Vec<&SchemaStep> = SCHEMA_STEPS
        .iter()
        .skip_while(|(version, _)| *version <= found)
        .collect();
    if pending.is_empty() {
        return Ok(found);
    }

    let tx = conn.transaction()?;
    for (version, script) in pending {
        tx.execute_batch(script)?;
        tx.pragma_update(None, "user_version", version)?;
    }
    tx.commit()?;

    info!("event=db_migrate module=db status=ok from={found} to={supported}");
    Ok(found)
}
