//! Typed value codec for settings storage.
//!
//! # Responsibility
//! - Map a logical setting value (`serde_json::Value`) to the single text
//!   column of `settings.value` and back.
//! - Detect the declared type of an untyped value.
//!
//! # Invariants
//! - `deserialize(serialize(v, t), t) == v` for every `v` of type `t`, except
//!   numbers outside `i64`/`u64` which round-trip through `f64`.
//! - Decoding never fails: malformed numbers become `0`, malformed JSON
//!   becomes `null`.

use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use std::fmt::{Display, Formatter};

/// Declared logical type of a setting value.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum TypeTag {
    #[default]
    String,
    Number,
    Boolean,
    Json,
}

impl TypeTag {
    /// All tags in schema order.
    pub const ALL: [TypeTag; 4] = [Self::String, Self::Number, Self::Boolean, Self::Json];

    /// Returns the persisted `type_tag` column value.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Json => "json",
        }
    }

    /// Parses a persisted or caller-supplied tag.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "string" => Some(Self::String),
            "number" => Some(Self::Number),
            "boolean" => Some(Self::Boolean),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

impl Display for TypeTag {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Infers the type tag of an untyped value.
///
/// Objects and arrays are `json`; strings and `null` fall back to `string`.
pub fn detect(value: &Value) -> TypeTag {
    match value {
        Value::Bool(_) => TypeTag::Boolean,
        Value::Number(_) => TypeTag::Number,
        Value::Object(_) | Value::Array(_) => TypeTag::Json,
        Value::String(_) | Value::Null => TypeTag::String,
    }
}

/// Serializes `value` to its persisted text under `tag`.
///
/// Returns `None` for `null`, which is stored as SQL `NULL`.
pub fn serialize(value: &Value, tag: TypeTag) -> Option<String> {
    if value.is_null() {
        return None;
    }

    let text = match tag {
        TypeTag::String | TypeTag::Number => display_text(value),
        TypeTag::Boolean => {
            if is_truthy(value) {
                "1".to_string()
            } else {
                "0".to_string()
            }
        }
        TypeTag::Json => value.to_string(),
    };
    Some(text)
}

/// Rebuilds the logical value from persisted text.
pub fn deserialize(text: Option<&str>, tag: TypeTag) -> Value {
    let Some(text) = text else {
        return Value::Null;
    };

    match tag {
        TypeTag::String => Value::String(text.to_string()),
        TypeTag::Number => Value::Number(parse_number(text).unwrap_or_else(|| Number::from(0))),
        TypeTag::Boolean => Value::Bool(text == "1" || text == "true"),
        TypeTag::Json => serde_json::from_str(text).unwrap_or(Value::Null),
    }
}

/// Parses decimal text into a JSON number.
///
/// Blank text is `0`; non-finite or malformed input yields `None`.
pub fn parse_number(text: &str) -> Option<Number> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Some(Number::from(0));
    }
    if let Ok(value) = trimmed.parse::<i64>() {
        return Some(Number::from(value));
    }
    if let Ok(value) = trimmed.parse::<u64>() {
        return Some(Number::from(value));
    }
    trimmed
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
        .and_then(Number::from_f64)
}

/// Numeric reading of any logical value, `None` when it is not numeric.
pub fn numeric_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => parse_number(text).and_then(|number| number.as_f64()),
        Value::Bool(flag) => Some(if *flag { 1.0 } else { 0.0 }),
        Value::Null => Some(0.0),
        Value::Array(_) | Value::Object(_) => None,
    }
}

fn display_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Number(number) => number.to_string(),
        Value::Bool(flag) => flag.to_string(),
        other => other.to_string(),
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0),
        Value::String(text) => !text.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::{deserialize, detect, serialize, TypeTag};
    use serde_json::{json, Value};

    fn round_trip(value: Value, tag: TypeTag) -> Value {
        let text = serialize(&value, tag);
        deserialize(text.as_deref(), tag)
    }

    #[test]
    fn detect_maps_value_shapes() {
        assert_eq!(detect(&json!(true)), TypeTag::Boolean);
        assert_eq!(detect(&json!(3.5)), TypeTag::Number);
        assert_eq!(detect(&json!({"a": 1})), TypeTag::Json);
        assert_eq!(detect(&json!([1, 2])), TypeTag::Json);
        assert_eq!(detect(&json!("x")), TypeTag::String);
        assert_eq!(detect(&Value::Null), TypeTag::String);
    }

    #[test]
    fn values_survive_round_trip_under_their_own_type() {
        for value in [json!(""), json!("hello world"), json!("  padded ")] {
            assert_eq!(round_trip(value.clone(), TypeTag::String), value);
        }
        for value in [json!(0), json!(-17), json!(2.5), json!(9_007_199_254_740_991_i64)] {
            assert_eq!(round_trip(value.clone(), TypeTag::Number), value);
        }
        for value in [json!(true), json!(false)] {
            assert_eq!(round_trip(value.clone(), TypeTag::Boolean), value);
        }
        for value in [json!({"theme": "dark", "sizes": [1, 2]}), json!([]), json!(null)] {
            assert_eq!(round_trip(value.clone(), TypeTag::Json), value);
        }
    }

    #[test]
    fn boolean_is_stored_as_digit() {
        assert_eq!(serialize(&json!(true), TypeTag::Boolean).as_deref(), Some("1"));
        assert_eq!(serialize(&json!(false), TypeTag::Boolean).as_deref(), Some("0"));
        assert_eq!(deserialize(Some("true"), TypeTag::Boolean), json!(true));
        assert_eq!(deserialize(Some("yes"), TypeTag::Boolean), json!(false));
    }

    #[test]
    fn malformed_text_decodes_leniently() {
        assert_eq!(deserialize(Some("abc"), TypeTag::Number), json!(0));
        assert_eq!(deserialize(Some("{oops"), TypeTag::Json), Value::Null);
        assert_eq!(deserialize(None, TypeTag::Number), Value::Null);
    }

    #[test]
    fn json_is_serialized_compactly() {
        let text = serialize(&json!({"a": [1, 2], "b": null}), TypeTag::Json).unwrap();
        assert!(!text.contains(' '));
    }
}
