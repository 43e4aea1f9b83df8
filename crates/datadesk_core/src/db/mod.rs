//! Store lifecycle: open, upgrade, inspect, back up.
//!
//! # Responsibility
//! - Hand out configured connections with the current schema applied.
//! - Report store metadata and write file copies for the host.
//!
//! # Invariants
//! - No repository touches a connection that failed [`migrations::upgrade_schema`].
//! - Callers own the connection; this module never closes it.

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

mod maintenance;
pub mod migrations;
mod open;

pub use maintenance::{backup_to, database_info, DatabaseInfo};
pub use open::{open_db, open_db_in_memory, open_db_with};

pub type DbResult<T> = Result<T, DbError>;

/// Failures while opening, upgrading or copying a store.
#[derive(Debug)]
pub enum DbError {
    Sqlite(rusqlite::Error),
    /// The file was written by a newer build.
    UnsupportedSchemaVersion { found: u32, supported: u32 },
    /// A parent directory for the store or a backup could not be created.
    Directory { path: PathBuf, source: std::io::Error },
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "sqlite: {err}"),
            Self::UnsupportedSchemaVersion { found, supported } => write!(
                f,
                "store schema v{found} is newer than this build (v{supported})"
            ),
            Self::Directory { path, source } => {
                write!(f, "cannot create directory `{}`: {source}", path.display())
            }
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::Directory { source, .. } => Some(source),
            Self::UnsupportedSchemaVersion { .. } => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}
