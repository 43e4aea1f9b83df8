//! Account rule set and sanitizer.

use super::common::{
    double_option, validate_batch_ids, validate_operation, validate_page_request, BatchRequest,
};
use super::sanitize::sanitize_string;
use super::{rules, ValidationResult};
use crate::model::account::{AccountChanges, LifecycleState, NewAccount};
use crate::model::RecordId;
use crate::query::PageRequest;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

pub const BATCH_CAP: usize = 100;
pub const BATCH_OPERATIONS: [&str; 3] = ["delete", "activate", "deactivate"];

const RESERVED_HANDLES: [&str; 7] = [
    "admin",
    "root",
    "system",
    "user",
    "guest",
    "null",
    "undefined",
];

static HANDLE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_\x{4e00}-\x{9fa5}]+$").expect("valid handle regex"));

/// Raw account payload for create and update.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AccountInput {
    pub handle: Option<String>,
    #[serde(deserialize_with = "double_option")]
    pub contact_address: Option<Option<String>>,
    #[serde(deserialize_with = "double_option")]
    pub avatar_reference: Option<Option<String>>,
    pub lifecycle_state: Option<String>,
}

/// List/search parameters for accounts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AccountQuery {
    #[serde(flatten)]
    pub page: PageRequest,
    pub lifecycle_state: Option<String>,
}

/// Validates a create (`is_update == false`) or partial update payload.
pub fn validate(input: &AccountInput, is_update: bool) -> ValidationResult {
    let mut result = ValidationResult::new();

    if !is_update || input.handle.is_some() {
        rules::required_text(input.handle.as_deref(), "handle", &mut result);
        validate_handle(input.handle.as_deref(), &mut result);
    }

    if let Some(Some(contact)) = &input.contact_address {
        rules::email(Some(contact), "contactAddress", &mut result);
    }

    if let Some(Some(avatar)) = &input.avatar_reference {
        rules::url(Some(avatar), "avatarReference", &mut result);
    }

    if let Some(state) = input.lifecycle_state.as_deref() {
        rules::one_of(Some(state), &LifecycleState::OPTIONS, "lifecycleState", &mut result);
    }

    result
}

fn validate_handle(handle: Option<&str>, result: &mut ValidationResult) {
    let Some(handle) = handle.map(str::trim).filter(|handle| !handle.is_empty()) else {
        return;
    };

    rules::length(Some(handle), "handle", 2, Some(50), result);
    rules::pattern(
        Some(handle),
        &HANDLE_RE,
        "handle",
        "handle may only contain letters, digits, underscores and CJK characters",
        result,
    );
    if handle.starts_with(|ch: char| ch.is_ascii_digit()) {
        result.add_error("handle", "handle must not start with a digit");
    }
    if RESERVED_HANDLES.contains(&handle.to_lowercase().as_str()) {
        result.add_error("handle", "handle is reserved");
    }
}

/// Builds a new-account draft from a validated payload.
pub fn sanitize_new(input: &AccountInput) -> NewAccount {
    NewAccount {
        handle: sanitize_string(input.handle.as_deref().unwrap_or_default()),
        contact_address: input
            .contact_address
            .clone()
            .flatten()
            .as_deref()
            .and_then(clean_contact),
        avatar_reference: input
            .avatar_reference
            .clone()
            .flatten()
            .as_deref()
            .and_then(clean_optional),
        lifecycle_state: input
            .lifecycle_state
            .as_deref()
            .and_then(LifecycleState::parse)
            .unwrap_or_default(),
    }
}

/// Builds partial changes from a validated update payload.
pub fn sanitize_changes(input: &AccountInput) -> AccountChanges {
    AccountChanges {
        handle: input.handle.as_deref().map(sanitize_string),
        contact_address: input
            .contact_address
            .as_ref()
            .map(|contact| contact.as_deref().and_then(clean_contact)),
        avatar_reference: input
            .avatar_reference
            .as_ref()
            .map(|avatar| avatar.as_deref().and_then(clean_optional)),
        lifecycle_state: input.lifecycle_state.as_deref().and_then(LifecycleState::parse),
    }
}

fn clean_contact(value: &str) -> Option<String> {
    clean_optional(value).map(|contact| contact.to_lowercase())
}

fn clean_optional(value: &str) -> Option<String> {
    let cleaned = sanitize_string(value);
    (!cleaned.is_empty()).then_some(cleaned)
}

/// Validates list parameters.
pub fn validate_query(query: &AccountQuery) -> ValidationResult {
    let mut result = ValidationResult::new();
    validate_page_request(&query.page, &mut result);
    if let Some(state) = query.lifecycle_state.as_deref().filter(|state| !state.is_empty()) {
        rules::one_of(Some(state), &LifecycleState::OPTIONS, "lifecycleState", &mut result);
    }
    result
}

/// Validates a batch request and returns the parsed ids.
pub fn validate_batch(request: &BatchRequest) -> (ValidationResult, Vec<RecordId>) {
    let mut result = ValidationResult::new();
    let ids = validate_batch_ids(&request.ids, BATCH_CAP, &mut result);
    if result.field_errors("ids").is_empty() {
        validate_operation(&request.operation, &BATCH_OPERATIONS, &mut result);
    }
    (result, ids)
}

#[cfg(test)]
mod tests {
    use super::{sanitize_changes, sanitize_new, validate, validate_batch, AccountInput};
    use crate::model::account::LifecycleState;
    use crate::validation::common::BatchRequest;
    use serde_json::json;

    fn input(value: serde_json::Value) -> AccountInput {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn create_requires_handle() {
        let result = validate(&input(json!({})), false);
        assert_eq!(result.first_error(), Some("handle is required"));
        assert!(validate(&input(json!({})), true).is_valid());
    }

    #[test]
    fn handle_shape_rules() {
        for (handle, expected) in [
            ("a", "handle must be at least 2 characters"),
            ("9lives", "handle must not start with a digit"),
            ("Admin", "handle is reserved"),
            ("bad-name", "handle may only contain letters, digits, underscores and CJK characters"),
        ] {
            let result = validate(&input(json!({ "handle": handle })), false);
            assert_eq!(result.field_errors("handle"), vec![expected], "{handle}");
        }
        assert!(validate(&input(json!({ "handle": "张三_01" })), false).is_valid());
    }

    #[test]
    fn contact_avatar_and_state_shapes() {
        let result = validate(
            &input(json!({
                "handle": "alice",
                "contactAddress": "nope",
                "avatarReference": "not a url",
                "lifecycleState": "banned"
            })),
            false,
        );
        assert_eq!(result.errors().len(), 3);

        let result = validate(
            &input(json!({ "handle": "alice", "contactAddress": null, "avatarReference": "" })),
            false,
        );
        assert!(result.is_valid());
    }

    #[test]
    fn sanitize_lowercases_contact_and_distinguishes_null_from_absent() {
        let draft = sanitize_new(&input(json!({
            "handle": "  alice  ",
            "contactAddress": " Alice@Example.COM ",
            "avatarReference": ""
        })));
        assert_eq!(draft.handle, "alice");
        assert_eq!(draft.contact_address.as_deref(), Some("alice@example.com"));
        assert_eq!(draft.avatar_reference, None);
        assert_eq!(draft.lifecycle_state, LifecycleState::Active);

        let changes = sanitize_changes(&input(json!({ "contactAddress": null })));
        assert_eq!(changes.contact_address, Some(None));
        assert_eq!(changes.avatar_reference, None);
        assert!(!changes.is_empty());
    }

    #[test]
    fn batch_checks_operation_and_cap() {
        let request: BatchRequest =
            serde_json::from_value(json!({ "ids": [1, 2], "operation": "archive" })).unwrap();
        let (result, ids) = validate_batch(&request);
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(result.field_errors("operation").len(), 1);

        let ids: Vec<i64> = (1..=101).collect();
        let request: BatchRequest =
            serde_json::from_value(json!({ "ids": ids, "operation": "activate" })).unwrap();
        assert!(!validate_batch(&request).0.is_valid());
    }
}
