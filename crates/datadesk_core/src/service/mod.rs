//! Core use-case services.
//!
//! # Responsibility
//! - Run validate, sanitize and persist for every entity operation.
//! - Map validation, uniqueness, lookup and storage failures onto one error
//!   taxonomy the host boundary can report.
//!
//! # Invariants
//! - Nothing reaches a repository write without a passing validation.
//! - Expected failures are returned as values; services never panic.

pub mod account_service;
pub mod document_service;
pub mod setting_service;

use crate::repo::{RepoError, UniquenessConflict};
use crate::transaction::TransactionError;
use crate::validation::ValidationResult;
use serde::Serialize;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Coarse failure class exposed to hosts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    UniquenessConflict,
    NotFound,
    Storage,
    TransactionAbort,
}

impl ErrorKind {
    /// Stable snake_case code reported to hosts.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::UniquenessConflict => "uniqueness_conflict",
            Self::NotFound => "not_found",
            Self::Storage => "storage",
            Self::TransactionAbort => "transaction_abort",
        }
    }
}

#[derive(Debug)]
pub enum ServiceError {
    /// Input rejected; carries every field error and warning.
    Validation(ValidationResult),
    Conflict(UniquenessConflict),
    NotFound {
        entity: &'static str,
        key: String,
    },
    Repo(RepoError),
    Transaction(TransactionError),
}

impl ServiceError {
    pub fn not_found(entity: &'static str, key: impl ToString) -> Self {
        Self::NotFound {
            entity,
            key: key.to_string(),
        }
    }

    /// Single-error validation failure.
    pub fn invalid(field: &str, message: impl Into<String>) -> Self {
        let mut result = ValidationResult::new();
        result.add_error(field, message);
        Self::Validation(result)
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) | Self::Repo(RepoError::UnknownColumn(_)) => ErrorKind::Validation,
            Self::Conflict(_) | Self::Repo(RepoError::Conflict(_)) => ErrorKind::UniquenessConflict,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Repo(_) | Self::Transaction(TransactionError::Db(_)) => ErrorKind::Storage,
            Self::Transaction(_) => ErrorKind::TransactionAbort,
        }
    }

    /// Validation details when the failure is a validation failure.
    pub fn validation(&self) -> Option<&ValidationResult> {
        match self {
            Self::Validation(result) => Some(result),
            _ => None,
        }
    }
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(result) => match result.first_error() {
                Some(message) => write!(f, "{message}"),
                None => write!(f, "validation failed"),
            },
            Self::Conflict(conflict) => {
                write!(f, "{} `{}` already exists", conflict.field, conflict.value)
            }
            Self::NotFound { entity, key } => write!(f, "{entity} not found: {key}"),
            Self::Repo(err) => write!(f, "{err}"),
            Self::Transaction(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            Self::Transaction(err) => Some(err),
            Self::Validation(_) | Self::Conflict(_) | Self::NotFound { .. } => None,
        }
    }
}

impl From<RepoError> for ServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::Conflict(conflict) => Self::Conflict(conflict),
            other => Self::Repo(other),
        }
    }
}

impl From<rusqlite::Error> for ServiceError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Repo(RepoError::from(value))
    }
}

impl From<TransactionError> for ServiceError {
    fn from(value: TransactionError) -> Self {
        Self::Transaction(value)
    }
}

/// Turns a failed validation into an error, passing warnings through.
pub(crate) fn ensure_valid(result: ValidationResult) -> ServiceResult<ValidationResult> {
    if result.is_valid() {
        Ok(result)
    } else {
        Err(ServiceError::Validation(result))
    }
}

/// Count of rows touched by a batch operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchOutcome {
    pub operation: String,
    pub requested: usize,
    pub affected: usize,
}

#[cfg(test)]
mod tests {
    use super::{ErrorKind, ServiceError};
    use crate::repo::{RepoError, UniquenessConflict};
    use crate::transaction::TransactionError;

    #[test]
    fn kinds_follow_the_failure_class() {
        assert_eq!(
            ServiceError::invalid("title", "title is required").kind(),
            ErrorKind::Validation
        );
        let conflict = ServiceError::from(RepoError::Conflict(UniquenessConflict {
            field: "handle",
            value: "alice".to_string(),
        }));
        assert_eq!(conflict.kind(), ErrorKind::UniquenessConflict);
        assert_eq!(conflict.to_string(), "handle `alice` already exists");
        assert_eq!(
            ServiceError::not_found("account", 7).kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            ServiceError::from(RepoError::UnknownColumn("drop".to_string())).kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            ServiceError::from(TransactionError::Nested).kind(),
            ErrorKind::TransactionAbort
        );
    }

    #[test]
    fn validation_message_is_the_first_error() {
        let err = ServiceError::invalid("key", "key is reserved");
        assert_eq!(err.to_string(), "key is reserved");
        assert!(err.validation().is_some());
    }
}
