//! Core data layer for DataDesk.
//! Owns storage, validation and the business invariants for accounts,
//! documents and settings; host bindings stay thin on top of it.

pub mod codec;
pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod query;
pub mod repo;
pub mod service;
pub mod transaction;
pub mod validation;

pub use codec::TypeTag;
pub use config::{ConfigError, CoreConfig, JournalMode};
pub use db::{
    backup_to, database_info, open_db, open_db_in_memory, open_db_with, DatabaseInfo, DbError,
    DbResult,
};
pub use logging::{default_log_level, init_from_config, init_logging, logging_status};
pub use model::account::{Account, AccountStatistics, LifecycleState};
pub use model::document::{Document, DocumentDetail, DocumentStatistics};
pub use model::setting::{Setting, SettingStatistics, SettingsExport};
pub use model::RecordId;
pub use query::{OrderDirection, Page, PageMeta, PageRequest};
pub use repo::{RepoError, RepoResult, Repository, UniquenessConflict};
pub use service::account_service::AccountService;
pub use service::document_service::DocumentService;
pub use service::setting_service::SettingService;
pub use service::{BatchOutcome, ErrorKind, ServiceError, ServiceResult};
pub use transaction::{execute_transaction, Operation, OperationResult, TransactionError};
pub use validation::ValidationResult;

/// Liveness probe for hosts.
pub fn ping() -> &'static str {
    "pong"
}

/// Version of the core crate.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
