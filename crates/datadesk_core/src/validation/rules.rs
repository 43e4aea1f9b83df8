//! Rule primitives.
//!
//! Each rule checks one field and appends to the shared result when violated.
//! Absent or empty optional values pass every rule except [`required`].

use super::ValidationResult;
use crate::codec::numeric_value;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email regex"));
static URL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z][A-Za-z0-9+.\-]*:(//)?[^\s/?#]+[^\s]*$").expect("valid url regex")
});

/// Returns whether a raw value counts as "not provided".
///
/// `null`, empty strings, empty arrays and empty objects are empty.
pub fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(text) => text.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}

pub fn required(value: &Value, field: &str, result: &mut ValidationResult) {
    if is_empty(value) {
        result.add_error(field, format!("{field} is required"));
    }
}

/// Whitespace-only text counts as missing since sanitization trims it away.
pub fn required_text(value: Option<&str>, field: &str, result: &mut ValidationResult) {
    if value.map_or(true, |text| text.trim().is_empty()) {
        result.add_error(field, format!("{field} is required"));
    }
}

/// Character-count bounds. `max = None` means unbounded.
pub fn length(
    value: Option<&str>,
    field: &str,
    min: usize,
    max: Option<usize>,
    result: &mut ValidationResult,
) {
    let Some(text) = value.filter(|text| !text.is_empty()) else {
        return;
    };
    let count = text.chars().count();
    if count < min {
        result.add_error(field, format!("{field} must be at least {min} characters"));
    }
    if let Some(max) = max {
        if count > max {
            result.add_error(field, format!("{field} must be at most {max} characters"));
        }
    }
}

/// Whole-value pattern match with a caller-supplied message.
pub fn pattern(
    value: Option<&str>,
    re: &Regex,
    field: &str,
    message: &str,
    result: &mut ValidationResult,
) {
    if let Some(text) = value.filter(|text| !text.is_empty()) {
        if !re.is_match(text) {
            result.add_error(field, message);
        }
    }
}

/// Reads a numeric value, recording an error when it is not a number.
pub fn numeric(value: &Value, field: &str, result: &mut ValidationResult) -> Option<f64> {
    if value.is_null() {
        return None;
    }
    let number = numeric_value(value);
    if number.is_none() {
        result.add_error(field, format!("{field} must be a number"));
    }
    number
}

/// Inclusive numeric bounds.
pub fn range(
    value: Option<f64>,
    field: &str,
    min: Option<f64>,
    max: Option<f64>,
    result: &mut ValidationResult,
) {
    let Some(number) = value else {
        return;
    };
    if let Some(min) = min {
        if number < min {
            result.add_error(field, format!("{field} must be at least {min}"));
        }
    }
    if let Some(max) = max {
        if number > max {
            result.add_error(field, format!("{field} must be at most {max}"));
        }
    }
}

/// Enumerated-options membership.
pub fn one_of(value: Option<&str>, options: &[&str], field: &str, result: &mut ValidationResult) {
    if let Some(text) = value {
        if !options.contains(&text) {
            result.add_error(
                field,
                format!("{field} must be one of: {}", options.join(", ")),
            );
        }
    }
}

pub fn email(value: Option<&str>, field: &str, result: &mut ValidationResult) {
    pattern(
        value,
        &EMAIL_RE,
        field,
        &format!("{field} is not a valid email address"),
        result,
    );
}

/// Absolute URL shape: `scheme:` followed by a host-like part.
pub fn url(value: Option<&str>, field: &str, result: &mut ValidationResult) {
    pattern(
        value,
        &URL_RE,
        field,
        &format!("{field} is not a valid URL"),
        result,
    );
}

/// JSON parseability. Returns the parsed value on success.
pub fn json(text: &str, field: &str, result: &mut ValidationResult) -> Option<Value> {
    match serde_json::from_str(text) {
        Ok(value) => Some(value),
        Err(_) => {
            result.add_error(field, format!("{field} is not valid JSON"));
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{
        email, is_empty, json, length, numeric, one_of, range, required, required_text, url,
    };
    use crate::validation::ValidationResult;
    use serde_json::json;

    #[test]
    fn empty_values_fail_required() {
        for value in [json!(null), json!(""), json!([]), json!({})] {
            assert!(is_empty(&value));
            let mut result = ValidationResult::new();
            required(&value, "title", &mut result);
            assert_eq!(result.field_errors("title"), vec!["title is required"]);
        }
        assert!(!is_empty(&json!(0)));
    }

    #[test]
    fn blank_text_fails_required_text() {
        for value in [None, Some(""), Some("   "), Some("\t\n")] {
            let mut result = ValidationResult::new();
            required_text(value, "handle", &mut result);
            assert_eq!(result.field_errors("handle"), vec!["handle is required"]);
        }
        let mut result = ValidationResult::new();
        required_text(Some(" a "), "handle", &mut result);
        assert!(result.is_valid());
    }

    #[test]
    fn length_counts_characters_and_skips_empty() {
        let mut result = ValidationResult::new();
        length(Some("文档"), "title", 1, Some(2), &mut result);
        length(Some(""), "title", 5, None, &mut result);
        assert!(result.is_valid());

        length(Some("a"), "handle", 2, Some(50), &mut result);
        assert_eq!(
            result.first_error(),
            Some("handle must be at least 2 characters")
        );
    }

    #[test]
    fn numeric_and_range_report_separately() {
        let mut result = ValidationResult::new();
        let value = numeric(&json!("abc"), "page", &mut result);
        assert!(value.is_none());
        assert_eq!(result.first_error(), Some("page must be a number"));

        let mut result = ValidationResult::new();
        let value = numeric(&json!("0"), "page", &mut result);
        range(value, "page", Some(1.0), None, &mut result);
        assert_eq!(result.first_error(), Some("page must be at least 1"));
    }

    #[test]
    fn shape_rules_accept_and_reject() {
        let mut result = ValidationResult::new();
        email(Some("a@b.io"), "contactAddress", &mut result);
        url(Some("https://cdn.example.com/a.png"), "avatarReference", &mut result);
        one_of(Some("active"), &["active", "inactive"], "lifecycleState", &mut result);
        assert!(json("{\"a\":1}", "value", &mut result).is_some());
        assert!(result.is_valid());

        email(Some("not-an-email"), "contactAddress", &mut result);
        url(Some("just text"), "avatarReference", &mut result);
        one_of(Some("banned"), &["active", "inactive"], "lifecycleState", &mut result);
        assert!(json("{oops", "value", &mut result).is_none());
        assert_eq!(result.errors().len(), 4);
    }
}
