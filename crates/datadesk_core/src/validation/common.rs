//! Structural validators shared by every entity: batch id lists, page
//! requests and key lists.

use super::{rules, ValidationResult};
use crate::codec::numeric_value;
use crate::model::RecordId;
use crate::query::{PageRequest, MAX_LIMIT};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Longest accepted free-text search term.
pub const MAX_SEARCH_LENGTH: usize = 100;

/// Raw batch request as received from the host.
///
/// `ids` stays untyped so that non-array input is reported as a field error
/// instead of a payload decoding failure.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BatchRequest {
    pub ids: Value,
    pub operation: String,
    /// Operation argument, e.g. the new category of `updateCategory`.
    pub data: Value,
}

/// Deserializes a present field (including an explicit `null`) as `Some`.
///
/// Combined with `#[serde(default)]` this separates "absent" from "null".
pub fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Checks a batch id list and returns the ids that parsed.
///
/// Empty or non-array input stops further checks. Each id must be a positive
/// integer (numeric strings count); more than `cap` ids is an error.
pub fn validate_batch_ids(ids: &Value, cap: usize, result: &mut ValidationResult) -> Vec<RecordId> {
    let items = match ids {
        Value::Array(items) if !items.is_empty() => items,
        _ => {
            result.add_error("ids", "select at least one record");
            return Vec::new();
        }
    };

    let mut parsed = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        match positive_id(item) {
            Some(id) => parsed.push(id),
            None => result.add_error(format!("ids[{index}]"), "id must be a positive integer"),
        }
    }

    if items.len() > cap {
        result.add_error("batch", format!("a batch may contain at most {cap} records"));
    }
    parsed
}

/// Checks an operation name against the allowed list.
pub fn validate_operation(operation: &str, allowed: &[&str], result: &mut ValidationResult) -> bool {
    let before = result.errors().len();
    rules::one_of(Some(operation), allowed, "operation", result);
    result.errors().len() == before
}

/// Page number, page size and search length bounds.
pub fn validate_page_request(request: &PageRequest, result: &mut ValidationResult) {
    if let Some(page) = request.page {
        rules::range(Some(f64::from(page)), "page", Some(1.0), None, result);
    }
    if let Some(limit) = request.limit {
        rules::range(
            Some(f64::from(limit)),
            "limit",
            Some(1.0),
            Some(f64::from(MAX_LIMIT)),
            result,
        );
    }
    if let Some(search) = request.search.as_deref() {
        if search.chars().count() > MAX_SEARCH_LENGTH {
            result.add_error(
                "search",
                format!("search must be at most {MAX_SEARCH_LENGTH} characters"),
            );
        }
    }
}

/// Checks a list of setting keys used by bulk reads and deletes.
pub fn validate_key_list(keys: &Value, cap: usize, result: &mut ValidationResult) -> Vec<String> {
    let items = match keys {
        Value::Array(items) if !items.is_empty() => items,
        _ => {
            result.add_error("keys", "select at least one key");
            return Vec::new();
        }
    };

    let mut parsed = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        match item.as_str().map(str::trim).filter(|key| !key.is_empty()) {
            Some(key) => parsed.push(key.to_lowercase()),
            None => result.add_error(format!("keys[{index}]"), "key must be a non-empty string"),
        }
    }

    if items.len() > cap {
        result.add_error("batch", format!("a batch may contain at most {cap} keys"));
    }
    parsed
}

fn positive_id(value: &Value) -> Option<RecordId> {
    if value.is_boolean() || value.is_null() {
        return None;
    }
    let number = numeric_value(value)?;
    if number.fract() != 0.0 || number < 1.0 || number > i64::MAX as f64 {
        return None;
    }
    Some(number as RecordId)
}
