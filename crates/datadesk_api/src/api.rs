//! Call-name dispatch for embedding hosts.
//!
//! # Responsibility
//! - Map host call names 1:1 onto core operations.
//! - Decode JSON payloads and encode every outcome into [`ApiResponse`].
//!
//! # Invariants
//! - Dispatch never panics; every failure becomes `success: false`.
//! - Validation failures carry the full validation result.
//! - Log events carry the call name and outcome only, never payloads.

use datadesk_core::transaction::{execute_statement, query_rows};
use datadesk_core::validation::account::{AccountInput, AccountQuery};
use datadesk_core::validation::common::BatchRequest;
use datadesk_core::validation::document::{DocumentInput, DocumentQuery};
use datadesk_core::validation::setting::{SettingInput, SettingQuery};
use datadesk_core::{
    backup_to, core_version as core_version_inner, database_info, execute_transaction,
    init_logging as init_logging_inner, open_db_in_memory, open_db_with, ping as ping_inner,
    AccountService, CoreConfig, DbError, DocumentService, Operation, RecordId, ServiceError,
    SettingService, ValidationResult,
};
use log::{info, warn};
use rusqlite::Connection;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

/// Every call name understood by [`ApiContext::dispatch`].
pub const CALLS: &[&str] = &[
    "ping",
    "core-version",
    "accounts-list",
    "accounts-get",
    "accounts-create",
    "accounts-update",
    "accounts-delete",
    "accounts-batch",
    "accounts-statistics",
    "documents-list",
    "documents-get",
    "documents-create",
    "documents-update",
    "documents-delete",
    "documents-batch",
    "documents-categories",
    "documents-tags",
    "documents-statistics",
    "documents-import",
    "settings-list",
    "settings-get",
    "settings-get-many",
    "settings-set",
    "settings-delete",
    "settings-delete-many",
    "settings-batch-set",
    "settings-all",
    "settings-export",
    "settings-import",
    "settings-statistics",
    "database-execute",
    "database-query",
    "database-transaction",
    "database-backup",
    "database-info",
];

/// Envelope returned for every call.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Stable failure code such as `validation` or `not_found`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation: Option<ValidationResult>,
}

impl ApiResponse {
    fn ok(data: Value) -> Self {
        Self {
            success: true,
            data: (!data.is_null()).then_some(data),
            error: None,
            error_code: None,
            validation: None,
        }
    }

    fn failed(err: CallError) -> Self {
        let error_code = err.code();
        let message = err.to_string();
        let validation = match err {
            CallError::Service(ServiceError::Validation(result)) => Some(result),
            _ => None,
        };
        Self {
            success: false,
            data: None,
            error: Some(message),
            error_code: Some(error_code),
            validation,
        }
    }

    /// Serializes the envelope; falls back to a fixed failure body.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|err| {
            json!({"success": false, "error": format!("response encoding failed: {err}")})
                .to_string()
        })
    }
}

/// Failure of one call before it becomes an [`ApiResponse`].
#[derive(Debug)]
pub enum CallError {
    UnknownCall(String),
    /// Payload did not have the shape the call expects.
    Payload(String),
    Service(ServiceError),
    Storage(DbError),
    /// Result could not be encoded as JSON.
    Encode(serde_json::Error),
}

impl CallError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnknownCall(_) => "unknown_call",
            Self::Payload(_) => "invalid_payload",
            Self::Service(err) => err.kind().as_str(),
            Self::Storage(_) => "storage",
            Self::Encode(_) => "encode",
        }
    }
}

impl Display for CallError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownCall(call) => write!(f, "unknown call `{call}`"),
            Self::Payload(message) => write!(f, "invalid payload: {message}"),
            Self::Service(err) => write!(f, "{err}"),
            Self::Storage(err) => write!(f, "{err}"),
            Self::Encode(err) => write!(f, "cannot encode result: {err}"),
        }
    }
}

impl Error for CallError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Service(err) => Some(err),
            Self::Storage(err) => Some(err),
            Self::Encode(err) => Some(err),
            Self::UnknownCall(_) | Self::Payload(_) => None,
        }
    }
}

impl From<ServiceError> for CallError {
    fn from(value: ServiceError) -> Self {
        Self::Service(value)
    }
}

impl From<DbError> for CallError {
    fn from(value: DbError) -> Self {
        Self::Storage(value)
    }
}

impl From<rusqlite::Error> for CallError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Service(ServiceError::from(value))
    }
}

type CallResult = Result<Value, CallError>;

#[derive(Deserialize)]
struct UpdateArgs<T> {
    id: RecordId,
    #[serde(alias = "userData", alias = "docData")]
    data: T,
}

#[derive(Deserialize)]
struct SqlArgs {
    sql: String,
    #[serde(default)]
    params: Vec<Value>,
}

#[derive(Deserialize)]
struct SettingsImportArgs {
    data: Value,
    #[serde(default)]
    overwrite: bool,
}

/// Owns the store connection and answers host calls against it.
pub struct ApiContext {
    conn: Connection,
}

impl ApiContext {
    /// Opens the store described by `config`.
    pub fn open(config: &CoreConfig) -> Result<Self, DbError> {
        open_db_with(config).map(Self::from_connection)
    }

    pub fn in_memory() -> Result<Self, DbError> {
        open_db_in_memory().map(Self::from_connection)
    }

    /// Wraps an already migrated connection.
    pub fn from_connection(conn: Connection) -> Self {
        Self { conn }
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Runs `call` with `payload` and wraps the outcome.
    pub fn dispatch(&self, call: &str, payload: &Value) -> ApiResponse {
        let started_at = Instant::now();
        match self.route(call, payload) {
            Ok(data) => {
                info!(
                    "event=api_call module=api call={call} status=ok duration_ms={}",
                    started_at.elapsed().as_millis()
                );
                ApiResponse::ok(data)
            }
            Err(err) => {
                warn!(
                    "event=api_call module=api call={call} status=error error_code={} duration_ms={}",
                    err.code(),
                    started_at.elapsed().as_millis()
                );
                ApiResponse::failed(err)
            }
        }
    }

    /// String-in/string-out form of [`dispatch`](Self::dispatch).
    ///
    /// Blank payload text is treated as `null`.
    pub fn dispatch_json(&self, call: &str, payload: &str) -> String {
        let payload = if payload.trim().is_empty() {
            Ok(Value::Null)
        } else {
            serde_json::from_str(payload)
        };
        match payload {
            Ok(payload) => self.dispatch(call, &payload).to_json(),
            Err(err) => ApiResponse::failed(CallError::Payload(err.to_string())).to_json(),
        }
    }

    fn route(&self, call: &str, payload: &Value) -> CallResult {
        let conn = &self.conn;
        match call {
            "ping" => Ok(json!(ping_inner())),
            "core-version" => Ok(json!(core_version_inner())),

            "accounts-list" => {
                encode(AccountService::new(conn).list(&args::<AccountQuery>(payload)?)?)
            }
            "accounts-get" => encode(AccountService::new(conn).get(record_id(payload)?)?),
            "accounts-create" => {
                encode(AccountService::new(conn).create(&required::<AccountInput>(payload)?)?)
            }
            "accounts-update" => {
                let update: UpdateArgs<AccountInput> = required(payload)?;
                encode(AccountService::new(conn).update(update.id, &update.data)?)
            }
            "accounts-delete" => {
                AccountService::new(conn).delete(record_id(payload)?)?;
                Ok(Value::Null)
            }
            "accounts-batch" => {
                encode(AccountService::new(conn).batch(&required::<BatchRequest>(payload)?)?)
            }
            "accounts-statistics" => encode(AccountService::new(conn).statistics()?),

            "documents-list" => {
                encode(DocumentService::new(conn).list(&args::<DocumentQuery>(payload)?)?)
            }
            "documents-get" => encode(DocumentService::new(conn).detail(record_id(payload)?)?),
            "documents-create" => {
                encode(DocumentService::new(conn).create(&required::<DocumentInput>(payload)?)?)
            }
            "documents-update" => {
                let update: UpdateArgs<DocumentInput> = required(payload)?;
                encode(DocumentService::new(conn).update(update.id, &update.data)?)
            }
            "documents-delete" => {
                DocumentService::new(conn).delete(record_id(payload)?)?;
                Ok(Value::Null)
            }
            "documents-batch" => {
                encode(DocumentService::new(conn).batch(&required::<BatchRequest>(payload)?)?)
            }
            "documents-categories" => encode(DocumentService::new(conn).categories()?),
            "documents-tags" => encode(DocumentService::new(conn).tags()?),
            "documents-statistics" => encode(DocumentService::new(conn).statistics()?),
            "documents-import" => {
                let documents = payload.get("documents").unwrap_or(payload);
                encode(DocumentService::new(conn).import(documents)?)
            }

            "settings-list" => {
                encode(SettingService::new(conn).list(&args::<SettingQuery>(payload)?)?)
            }
            "settings-get" => encode(SettingService::new(conn).get(&key_arg(payload)?)?),
            "settings-get-many" => {
                let keys = payload.get("keys").unwrap_or(payload);
                encode(SettingService::new(conn).get_many(keys)?)
            }
            "settings-set" => {
                encode(SettingService::new(conn).set(&required::<SettingInput>(payload)?)?)
            }
            "settings-delete" => {
                SettingService::new(conn).delete(&key_arg(payload)?)?;
                Ok(Value::Null)
            }
            "settings-delete-many" => {
                let keys = payload.get("keys").unwrap_or(payload);
                encode(json!({"deleted": SettingService::new(conn).delete_many(keys)?}))
            }
            "settings-batch-set" => {
                let settings = payload.get("settings").unwrap_or(payload);
                encode(SettingService::new(conn).batch_set(settings)?)
            }
            "settings-all" => encode(SettingService::new(conn).all()?),
            "settings-export" => encode(SettingService::new(conn).export()?),
            "settings-import" => {
                let import: SettingsImportArgs = required(payload)?;
                let imported = SettingService::new(conn).import(&import.data, import.overwrite)?;
                Ok(json!({"imported": imported}))
            }
            "settings-statistics" => encode(SettingService::new(conn).statistics()?),

            "database-execute" => {
                let sql: SqlArgs = required(payload)?;
                encode(execute_statement(conn, &sql.sql, &sql.params)?)
            }
            "database-query" => {
                let sql: SqlArgs = required(payload)?;
                encode(query_rows(conn, &sql.sql, &sql.params)?)
            }
            "database-transaction" => {
                let operations = payload.get("operations").unwrap_or(payload);
                let operations: Vec<Operation> = required(operations)?;
                let results = execute_transaction(conn, &operations).map_err(ServiceError::from)?;
                encode(results)
            }
            "database-backup" => {
                let target = payload
                    .get("path")
                    .unwrap_or(payload)
                    .as_str()
                    .filter(|path| !path.trim().is_empty())
                    .ok_or_else(|| CallError::Payload("expected a backup path".to_string()))?;
                backup_to(conn, target)?;
                Ok(Value::Null)
            }
            "database-info" => encode(database_info(conn)?),

            other => Err(CallError::UnknownCall(other.to_string())),
        }
    }
}

/// Health probe.
pub fn ping() -> String {
    ping_inner().to_owned()
}

pub fn core_version() -> String {
    core_version_inner().to_owned()
}

/// Starts core logging.
///
/// Returns an empty string on success and the error message otherwise.
pub fn init_logging(level: &str, log_dir: &str) -> String {
    match init_logging_inner(level, log_dir) {
        Ok(()) => String::new(),
        Err(err) => err,
    }
}

fn encode(value: impl Serialize) -> CallResult {
    serde_json::to_value(value).map_err(CallError::Encode)
}

/// Optional argument object; `null` means defaults.
fn args<T: DeserializeOwned + Default>(payload: &Value) -> Result<T, CallError> {
    if payload.is_null() {
        return Ok(T::default());
    }
    required(payload)
}

fn required<T: DeserializeOwned>(payload: &Value) -> Result<T, CallError> {
    T::deserialize(payload).map_err(|err| CallError::Payload(err.to_string()))
}

/// Accepts `7` or `{"id": 7}`.
fn record_id(payload: &Value) -> Result<RecordId, CallError> {
    payload
        .get("id")
        .unwrap_or(payload)
        .as_i64()
        .filter(|id| *id > 0)
        .ok_or_else(|| CallError::Payload("expected a positive integer id".to_string()))
}

/// Accepts `"ui.theme"` or `{"key": "ui.theme"}`.
fn key_arg(payload: &Value) -> Result<String, CallError> {
    payload
        .get("key")
        .unwrap_or(payload)
        .as_str()
        .filter(|key| !key.trim().is_empty())
        .map(str::to_string)
        .ok_or_else(|| CallError::Payload("expected a setting key".to_string()))
}

#[cfg(test)]
mod tests {
    use super::{record_id, ApiContext, CALLS};
    use serde_json::{json, Value};

    #[test]
    fn record_id_accepts_bare_and_wrapped_ids() {
        assert_eq!(record_id(&json!(7)).unwrap(), 7);
        assert_eq!(record_id(&json!({"id": 9})).unwrap(), 9);
        assert!(record_id(&json!(0)).is_err());
        assert!(record_id(&json!("7")).is_err());
    }

    #[test]
    fn every_listed_call_is_routed() {
        let ctx = ApiContext::in_memory().unwrap();
        for call in CALLS {
            let response = ctx.dispatch(call, &Value::Null);
            assert_ne!(
                response.error_code,
                Some("unknown_call"),
                "call `{call}` is not routed"
            );
        }
    }

    #[test]
    fn unknown_call_is_reported() {
        let ctx = ApiContext::in_memory().unwrap();
        let response = ctx.dispatch("users-list", &Value::Null);
        assert!(!response.success);
        assert_eq!(response.error_code, Some("unknown_call"));
    }

    #[test]
    fn malformed_json_text_is_a_payload_error() {
        let ctx = ApiContext::in_memory().unwrap();
        let body: Value = serde_json::from_str(&ctx.dispatch_json("accounts-create", "{")).unwrap();
        assert_eq!(body["success"], json!(false));
        assert_eq!(body["errorCode"], json!("invalid_payload"));
    }
}
