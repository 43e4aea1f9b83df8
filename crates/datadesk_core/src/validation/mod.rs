//! Field-level validation engine shared by every entity.
//!
//! # Responsibility
//! - Accumulate ordered field errors and non-blocking warnings.
//! - Provide pure rule primitives ([`rules`]) and sanitizers ([`sanitize`]).
//! - Host per-entity rule sets and the shared batch/search validators.
//!
//! # Invariants
//! - `is_valid()` is true iff no error was recorded; warnings never affect it.
//! - Sanitization runs only on input that already validated.

pub mod account;
pub mod common;
pub mod document;
pub mod rules;
pub mod sanitize;
pub mod setting;

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// One message attributed to an input field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldIssue {
    pub field: String,
    pub message: String,
}

/// Outcome of one validation pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    /// Mirrors `errors.is_empty()`; kept for serialized consumers.
    is_valid: bool,
    errors: Vec<FieldIssue>,
    warnings: Vec<FieldIssue>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self {
            is_valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.is_valid = false;
        self.errors.push(FieldIssue {
            field: field.into(),
            message: message.into(),
        });
    }

    pub fn add_warning(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(FieldIssue {
            field: field.into(),
            message: message.into(),
        });
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn errors(&self) -> &[FieldIssue] {
        &self.errors
    }

    pub fn warnings(&self) -> &[FieldIssue] {
        &self.warnings
    }

    /// Message of the first recorded error.
    pub fn first_error(&self) -> Option<&str> {
        self.errors.first().map(|issue| issue.message.as_str())
    }

    /// All error messages recorded for `field`, in order.
    pub fn field_errors(&self, field: &str) -> Vec<&str> {
        self.errors
            .iter()
            .filter(|issue| issue.field == field)
            .map(|issue| issue.message.as_str())
            .collect()
    }

    /// Copies errors and warnings of a nested result under `prefix.field`.
    pub fn absorb_prefixed(&mut self, prefix: &str, other: ValidationResult) {
        for issue in other.errors {
            self.add_error(format!("{prefix}.{}", issue.field), issue.message);
        }
        for issue in other.warnings {
            self.add_warning(format!("{prefix}.{}", issue.field), issue.message);
        }
    }
}

impl Default for ValidationResult {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for ValidationResult {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.errors.as_slice() {
            [] => write!(f, "validation passed"),
            issues => {
                let joined = issues
                    .iter()
                    .map(|issue| format!("{}: {}", issue.field, issue.message))
                    .collect::<Vec<_>>()
                    .join(", ");
                write!(f, "{joined}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::ValidationResult;

    #[test]
    fn warnings_do_not_invalidate() {
        let mut result = ValidationResult::new();
        result.add_warning("tags", "duplicates removed");
        assert!(result.is_valid());

        result.add_error("title", "title is required");
        result.add_error("title", "title is too long");
        assert!(!result.is_valid());
        assert_eq!(result.first_error(), Some("title is required"));
        assert_eq!(result.field_errors("title").len(), 2);
    }

    #[test]
    fn absorb_prefixed_keeps_order_and_prefixes_fields() {
        let mut inner = ValidationResult::new();
        inner.add_error("key", "bad key");
        let mut outer = ValidationResult::new();
        outer.absorb_prefixed("settings[2]", inner);
        assert_eq!(outer.errors()[0].field, "settings[2].key");
    }

    #[test]
    fn serializes_with_is_valid_flag() {
        let mut result = ValidationResult::new();
        result.add_error("handle", "handle is required");
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["isValid"], serde_json::json!(false));
        assert_eq!(json["errors"][0]["field"], "handle");
    }
}
