//! Setting rule set, value coercion and bulk payload checks.

use super::common::validate_page_request;
use super::sanitize::sanitize_string;
use super::{rules, ValidationResult};
use crate::codec::{numeric_value, parse_number, TypeTag};
use crate::model::setting::SettingDraft;
use crate::query::PageRequest;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::{Map, Number, Value};

pub const BATCH_CAP: usize = 100;
pub const IMPORT_CAP: usize = 500;

const MAX_KEY: usize = 100;
const MAX_KEY_SEGMENTS: usize = 5;
const MAX_STRING_VALUE: usize = 10_000;
const MAX_JSON_VALUE: usize = 50_000;
const MAX_DESCRIPTION: usize = 500;
const RESERVED_KEYS: [&str; 4] = [
    "system.version",
    "system.config",
    "app.secret",
    "database.password",
];
/// Largest integer every JSON consumer represents exactly.
const MAX_EXACT_INTEGER: f64 = 9_007_199_254_740_991.0;

static KEY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9_.]*$").expect("valid key regex"));

/// Raw setting payload.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SettingInput {
    pub key: Option<String>,
    pub value: Value,
    pub description: Option<String>,
    pub type_tag: Option<String>,
}

/// List/search parameters for settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SettingQuery {
    #[serde(flatten)]
    pub page: PageRequest,
    pub type_tag: Option<String>,
}

pub fn validate(input: &SettingInput) -> ValidationResult {
    let mut result = ValidationResult::new();

    rules::required_text(input.key.as_deref(), "key", &mut result);
    if let Some(key) = input.key.as_deref() {
        validate_key(key, &mut result);
    }

    validate_value(&input.value, input.type_tag.as_deref(), &mut result);

    if let Some(description) = input.description.as_deref() {
        rules::length(Some(description), "description", 0, Some(MAX_DESCRIPTION), &mut result);
    }

    if let Some(tag) = input.type_tag.as_deref() {
        rules::one_of(Some(tag), &type_tag_options(), "typeTag", &mut result);
    }

    result
}

/// Key length, shape, reserved names and nesting depth.
pub fn validate_key(key: &str, result: &mut ValidationResult) {
    if key.is_empty() {
        return;
    }
    rules::length(Some(key), "key", 1, Some(MAX_KEY), result);
    rules::pattern(
        Some(key),
        &KEY_RE,
        "key",
        "key must start with a letter and contain only letters, digits, underscores and dots",
        result,
    );
    if RESERVED_KEYS.contains(&key.to_lowercase().as_str()) {
        result.add_error("key", "key is reserved");
    }
    if key.split('.').count() > MAX_KEY_SEGMENTS {
        result.add_error(
            "key",
            format!("key must not have more than {MAX_KEY_SEGMENTS} segments"),
        );
    }
}

fn validate_value(value: &Value, type_tag: Option<&str>, result: &mut ValidationResult) {
    if value.is_null() {
        return;
    }

    match type_tag.and_then(TypeTag::parse) {
        Some(TypeTag::String) => match value.as_str() {
            Some(text) => {
                rules::length(Some(text), "value", 0, Some(MAX_STRING_VALUE), result);
            }
            None => result.add_error("value", "a string setting needs a string value"),
        },
        Some(TypeTag::Number) => match numeric_value(value) {
            Some(number) => {
                if number.fract() == 0.0 && number.abs() > MAX_EXACT_INTEGER {
                    result.add_warning("value", "number exceeds the exact integer range");
                }
            }
            None => result.add_error("value", "a number setting needs a numeric value"),
        },
        Some(TypeTag::Boolean) => {
            let accepted = value.is_boolean()
                || matches!(value.as_str(), Some("true" | "false" | "1" | "0"));
            if !accepted {
                result.add_error("value", "a boolean setting needs true/false or 1/0");
            }
        }
        Some(TypeTag::Json) => match value {
            Value::String(text) => {
                if let Some(parsed) = rules::json(text, "value", result) {
                    check_json_size(&parsed, result);
                }
            }
            Value::Object(_) | Value::Array(_) => check_json_size(value, result),
            _ => result.add_error(
                "value",
                "a json setting needs an object, an array or JSON text",
            ),
        },
        None => {
            let text = display_text(value);
            rules::length(Some(&text), "value", 0, Some(MAX_STRING_VALUE), result);
        }
    }
}

fn check_json_size(value: &Value, result: &mut ValidationResult) {
    if value.to_string().len() > MAX_JSON_VALUE {
        result.add_error("value", "JSON value must not exceed 50000 bytes");
    }
}

fn type_tag_options() -> [&'static str; 4] {
    TypeTag::ALL.map(TypeTag::as_str)
}

fn display_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// Builds an upsert draft from a validated payload.
///
/// Without a declared type, strings are cleaned and other values pass
/// through unchanged so that type detection still sees them.
pub fn sanitize(input: &SettingInput) -> SettingDraft {
    let type_tag = input
        .type_tag
        .as_deref()
        .filter(|tag| !tag.is_empty())
        .and_then(TypeTag::parse);
    SettingDraft {
        key: sanitize_string(input.key.as_deref().unwrap_or_default()).to_lowercase(),
        value: sanitize_value(&input.value, type_tag),
        description: input.description.as_deref().map(sanitize_string).unwrap_or_default(),
        type_tag,
    }
}

/// Coerces a value to its declared type.
pub fn sanitize_value(value: &Value, type_tag: Option<TypeTag>) -> Value {
    if value.is_null() {
        return Value::Null;
    }
    match type_tag {
        Some(TypeTag::String) => Value::String(sanitize_string(&display_text(value))),
        Some(TypeTag::Number) => Value::Number(match value {
            Value::Number(number) => number.clone(),
            Value::String(text) => parse_number(text).unwrap_or_else(|| Number::from(0)),
            Value::Bool(flag) => Number::from(i64::from(*flag)),
            _ => Number::from(0),
        }),
        Some(TypeTag::Boolean) => Value::Bool(match value {
            Value::Bool(flag) => *flag,
            Value::String(text) => text == "true" || text == "1",
            Value::Number(number) => number.as_f64() == Some(1.0),
            _ => false,
        }),
        Some(TypeTag::Json) => match value {
            Value::String(text) => serde_json::from_str(text).unwrap_or(Value::Null),
            other => other.clone(),
        },
        None => match value {
            Value::String(text) => Value::String(sanitize_string(text)),
            other => other.clone(),
        },
    }
}

/// Validates list parameters.
pub fn validate_query(query: &SettingQuery) -> ValidationResult {
    let mut result = ValidationResult::new();
    validate_page_request(&query.page, &mut result);
    if let Some(tag) = query.type_tag.as_deref().filter(|tag| !tag.is_empty()) {
        rules::one_of(Some(tag), &type_tag_options(), "typeTag", &mut result);
    }
    result
}

/// Validates a bulk set given as `{key: value}` or `[{key, value, ...}]`.
///
/// Returns the decoded entries in input order.
pub fn validate_batch_set(settings: &Value) -> (ValidationResult, Vec<SettingInput>) {
    let mut result = ValidationResult::new();
    let entries: Vec<Result<SettingInput, String>> = match settings {
        Value::Object(map) => map
            .iter()
            .map(|(key, value)| {
                Ok(SettingInput {
                    key: Some(key.clone()),
                    value: value.clone(),
                    ..SettingInput::default()
                })
            })
            .collect(),
        Value::Array(items) => items
            .iter()
            .map(|item| {
                serde_json::from_value::<SettingInput>(item.clone()).map_err(|err| err.to_string())
            })
            .collect(),
        _ => {
            result.add_error("settings", "settings must be an object or an array");
            return (result, Vec::new());
        }
    };

    if entries.is_empty() {
        result.add_error("settings", "settings must not be empty");
        return (result, Vec::new());
    }
    if entries.len() > BATCH_CAP {
        result.add_error(
            "batch",
            format!("a batch may contain at most {BATCH_CAP} settings"),
        );
        return (result, Vec::new());
    }

    let mut inputs = Vec::with_capacity(entries.len());
    for (index, entry) in entries.into_iter().enumerate() {
        let prefix = format!("settings[{index}]");
        match entry {
            Ok(input) => {
                result.absorb_prefixed(&prefix, validate(&input));
                inputs.push(input);
            }
            Err(message) => result.add_error(prefix, format!("setting is malformed: {message}")),
        }
    }

    let mut keys: Vec<String> = inputs
        .iter()
        .filter_map(|input| input.key.as_deref())
        .filter(|key| !key.is_empty())
        .map(|key| key.to_lowercase())
        .collect();
    let total = keys.len();
    keys.sort();
    keys.dedup();
    if keys.len() != total {
        result.add_error("settings", "duplicate keys are not allowed");
    }

    (result, inputs)
}

/// Validates an import map of `key -> {value, description?, typeTag?}`.
pub fn validate_import(data: &Value) -> (ValidationResult, Vec<SettingInput>) {
    let mut result = ValidationResult::new();
    let Some(map) = data.as_object() else {
        result.add_error("data", "import data must be an object");
        return (result, Vec::new());
    };
    if map.is_empty() {
        result.add_error("data", "import data must not be empty");
        return (result, Vec::new());
    }
    if map.len() > IMPORT_CAP {
        result.add_error(
            "data",
            format!("at most {IMPORT_CAP} settings can be imported at once"),
        );
        return (result, Vec::new());
    }

    let mut inputs = Vec::with_capacity(map.len());
    for (key, entry) in map {
        let prefix = format!("settings[{key}]");
        let Some(fields) = entry.as_object() else {
            result.add_error(prefix, "setting must be an object");
            continue;
        };
        match import_entry(key, fields) {
            Ok(input) => {
                result.absorb_prefixed(&prefix, validate(&input));
                inputs.push(input);
            }
            Err(err) => result.add_error(prefix, format!("setting is malformed: {err}")),
        }
    }
    (result, inputs)
}

fn import_entry(key: &str, fields: &Map<String, Value>) -> Result<SettingInput, serde_json::Error> {
    let mut fields = fields.clone();
    fields.insert("key".to_string(), Value::String(key.to_string()));
    serde_json::from_value(Value::Object(fields))
}
