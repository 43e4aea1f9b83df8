//! Document rule set, tag normalization and import checks.

use super::common::{
    double_option, validate_batch_ids, validate_operation, validate_page_request, BatchRequest,
};
use super::sanitize::{sanitize_html, sanitize_labels, sanitize_string};
use super::{rules, ValidationResult};
use crate::model::document::{DocumentChanges, NewDocument, DEFAULT_CATEGORY, MAX_TAGS};
use crate::model::RecordId;
use crate::query::PageRequest;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;

pub const BATCH_CAP: usize = 50;
pub const BATCH_OPERATIONS: [&str; 3] = ["delete", "updateCategory", "updateTags"];
pub const IMPORT_CAP: usize = 1000;

const MAX_TITLE: usize = 200;
const MAX_BODY: usize = 50_000;
const MAX_CATEGORY: usize = 50;
const MAX_TAG: usize = 20;

static LABEL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_\x{4e00}-\x{9fa5}]+$").expect("valid label regex"));

/// Raw document payload for create, update and import.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DocumentInput {
    pub title: Option<String>,
    pub body: Option<String>,
    pub category: Option<String>,
    /// Array of labels or JSON-array text.
    pub tags: Option<Value>,
    #[serde(deserialize_with = "double_option")]
    pub owner_ref: Option<Option<RecordId>>,
}

/// List/search parameters for documents.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DocumentQuery {
    #[serde(flatten)]
    pub page: PageRequest,
    pub category: Option<String>,
    pub tag: Option<String>,
    pub owner_ref: Option<RecordId>,
}

/// Validates a create (`is_update == false`) or partial update payload.
pub fn validate(input: &DocumentInput, is_update: bool) -> ValidationResult {
    let mut result = ValidationResult::new();

    if !is_update || input.title.is_some() {
        let cleaned = input.title.as_deref().map(sanitize_string);
        rules::required_text(cleaned.as_deref(), "title", &mut result);
        rules::length(input.title.as_deref(), "title", 1, Some(MAX_TITLE), &mut result);
    }

    if let Some(body) = input.body.as_deref() {
        rules::length(Some(body), "body", 0, Some(MAX_BODY), &mut result);
    }

    if let Some(category) = input.category.as_deref() {
        validate_category(category, &mut result);
    }

    if let Some(tags) = &input.tags {
        validate_tags(tags, &mut result);
    }

    if let Some(Some(owner)) = input.owner_ref {
        rules::range(Some(owner as f64), "ownerRef", Some(1.0), None, &mut result);
    }

    result
}

/// Category length and character class. Empty means "use the default".
pub fn validate_category(category: &str, result: &mut ValidationResult) {
    if category.is_empty() {
        return;
    }
    rules::length(Some(category), "category", 1, Some(MAX_CATEGORY), result);
    rules::pattern(
        Some(category),
        &LABEL_RE,
        "category",
        "category may only contain letters, digits, underscores and CJK characters",
        result,
    );
}

/// Checks a tag list given as an array or JSON-array text.
///
/// Tags are trimmed before every per-tag check; duplicates only warn since
/// the sanitizer removes them.
pub fn validate_tags(tags: &Value, result: &mut ValidationResult) {
    let parsed;
    let items = match tags {
        Value::Array(items) => items,
        Value::String(text) => match serde_json::from_str::<Value>(text) {
            Ok(Value::Array(items)) => {
                parsed = items;
                &parsed
            }
            Ok(_) => {
                result.add_error("tags", "tags must be an array");
                return;
            }
            Err(_) => {
                result.add_error("tags", "tags must be a JSON array");
                return;
            }
        },
        _ => {
            result.add_error("tags", "tags must be an array");
            return;
        }
    };

    if items.len() > MAX_TAGS {
        result.add_error("tags", format!("at most {MAX_TAGS} tags are allowed"));
    }

    let mut seen: Vec<&str> = Vec::with_capacity(items.len());
    let mut has_duplicates = false;
    for (index, item) in items.iter().enumerate() {
        let field = format!("tags[{index}]");
        let Some(tag) = item.as_str().map(str::trim) else {
            result.add_error(field, "tag must be a string");
            continue;
        };
        if tag.is_empty() {
            result.add_error(field, "tag must not be blank");
            continue;
        }
        if tag.chars().count() > MAX_TAG {
            result.add_error(field.clone(), format!("tag must be at most {MAX_TAG} characters"));
        }
        if !LABEL_RE.is_match(tag) {
            result.add_error(
                field,
                format!("tag \"{tag}\" may only contain letters, digits, underscores and CJK characters"),
            );
        }
        if seen.contains(&tag) {
            has_duplicates = true;
        } else {
            seen.push(tag);
        }
    }

    if has_duplicates {
        result.add_warning("tags", "duplicate tags will be removed");
    }
}

/// Normalizes tags: trimmed, deduplicated in first-seen order, capped.
///
/// Unparseable input yields an empty list.
pub fn sanitize_tags(tags: &Value) -> Vec<String> {
    let parsed;
    let items = match tags {
        Value::Array(items) => items,
        Value::String(text) => match serde_json::from_str::<Value>(text) {
            Ok(Value::Array(items)) => {
                parsed = items;
                &parsed
            }
            _ => return Vec::new(),
        },
        _ => return Vec::new(),
    };
    sanitize_labels(items.iter().filter_map(Value::as_str), MAX_TAGS)
}

fn sanitize_category(category: &str) -> String {
    let cleaned = sanitize_string(category);
    if cleaned.is_empty() {
        DEFAULT_CATEGORY.to_string()
    } else {
        cleaned
    }
}

/// Builds a new-document draft from a validated payload.
pub fn sanitize_new(input: &DocumentInput) -> NewDocument {
    NewDocument {
        title: sanitize_string(input.title.as_deref().unwrap_or_default()),
        body: input.body.as_deref().map(sanitize_html).unwrap_or_default(),
        category: sanitize_category(input.category.as_deref().unwrap_or_default()),
        tags: input.tags.as_ref().map(sanitize_tags).unwrap_or_default(),
        owner_ref: input.owner_ref.flatten(),
    }
}

/// Builds partial changes from a validated update payload.
pub fn sanitize_changes(input: &DocumentInput) -> DocumentChanges {
    DocumentChanges {
        title: input.title.as_deref().map(sanitize_string),
        body: input.body.as_deref().map(sanitize_html),
        category: input.category.as_deref().map(sanitize_category),
        tags: input.tags.as_ref().map(sanitize_tags),
        owner_ref: input.owner_ref,
    }
}

/// Validates list parameters.
pub fn validate_query(query: &DocumentQuery) -> ValidationResult {
    let mut result = ValidationResult::new();
    validate_page_request(&query.page, &mut result);
    if let Some(category) = query.category.as_deref() {
        validate_category(category, &mut result);
    }
    if let Some(tag) = query.tag.as_deref().filter(|tag| !tag.is_empty()) {
        rules::length(Some(tag), "tag", 1, Some(MAX_TAG), &mut result);
    }
    if let Some(owner) = query.owner_ref {
        rules::range(Some(owner as f64), "ownerRef", Some(1.0), None, &mut result);
    }
    result
}

/// Validates a batch request, including the argument of the chosen operation.
pub fn validate_batch(request: &BatchRequest) -> (ValidationResult, Vec<RecordId>) {
    let mut result = ValidationResult::new();
    let ids = validate_batch_ids(&request.ids, BATCH_CAP, &mut result);
    if !result.field_errors("ids").is_empty() {
        return (result, ids);
    }
    if !validate_operation(&request.operation, &BATCH_OPERATIONS, &mut result) {
        return (result, ids);
    }

    match request.operation.as_str() {
        "updateCategory" => match request.data.as_str().filter(|text| !text.is_empty()) {
            Some(category) => validate_category(category, &mut result),
            None => result.add_error("category", "provide a valid category"),
        },
        "updateTags" => validate_tags(&request.data, &mut result),
        _ => {}
    }
    (result, ids)
}

/// Validates an import payload and returns the decoded documents.
///
/// Per-document errors are reported under `documents[i].field`.
pub fn validate_import(documents: &Value) -> (ValidationResult, Vec<DocumentInput>) {
    let mut result = ValidationResult::new();
    let Some(items) = documents.as_array() else {
        result.add_error("documents", "documents must be an array");
        return (result, Vec::new());
    };
    if items.is_empty() {
        result.add_error("documents", "documents must not be empty");
        return (result, Vec::new());
    }
    if items.len() > IMPORT_CAP {
        result.add_error(
            "documents",
            format!("at most {IMPORT_CAP} documents can be imported at once"),
        );
        return (result, Vec::new());
    }

    let mut inputs = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        let prefix = format!("documents[{index}]");
        match serde_json::from_value::<DocumentInput>(item.clone()) {
            Ok(input) => {
                result.absorb_prefixed(&prefix, validate(&input, false));
                inputs.push(input);
            }
            Err(err) => result.add_error(prefix, format!("document is malformed: {err}")),
        }
    }
    (result, inputs)
}

#[cfg(test)]
mod tests {
    use super::{
        sanitize_changes, sanitize_new, sanitize_tags, validate, validate_batch, validate_import,
        validate_tags, DocumentInput,
    };
    use crate::validation::common::BatchRequest;
    use crate::validation::ValidationResult;
    use serde_json::json;

    fn input(value: serde_json::Value) -> DocumentInput {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn tags_with_duplicates_only_warn() {
        let tags = json!(["a", "a", "b", " c "]);
        let mut result = ValidationResult::new();
        validate_tags(&tags, &mut result);
        assert!(result.is_valid());
        assert_eq!(result.warnings().len(), 1);
        assert_eq!(sanitize_tags(&tags), vec!["a", "b", "c"]);
    }

    #[test]
    fn tags_accept_json_text_and_reject_bad_shapes() {
        let mut result = ValidationResult::new();
        validate_tags(&json!("[\"rust\",\"db\"]"), &mut result);
        assert!(result.is_valid());
        assert_eq!(sanitize_tags(&json!("[\"rust\",\"db\"]")), vec!["rust", "db"]);

        validate_tags(&json!("not json"), &mut result);
        validate_tags(&json!({"a": 1}), &mut result);
        validate_tags(&json!([1, "", "has space", "x".repeat(21)]), &mut result);
        let fields: Vec<_> = result.errors().iter().map(|e| e.field.as_str()).collect();
        assert_eq!(
            fields,
            vec!["tags", "tags", "tags[0]", "tags[1]", "tags[2]", "tags[3]"]
        );
        assert!(sanitize_tags(&json!("not json")).is_empty());
    }

    #[test]
    fn too_many_tags_is_an_error() {
        let tags: Vec<String> = (0..11).map(|i| format!("t{i}")).collect();
        let mut result = ValidationResult::new();
        validate_tags(&json!(tags), &mut result);
        assert_eq!(result.field_errors("tags").len(), 1);
    }

    #[test]
    fn create_rules_cover_title_category_and_owner() {
        let result = validate(&input(json!({ "body": "x" })), false);
        assert_eq!(result.first_error(), Some("title is required"));

        let result = validate(
            &input(json!({
                "title": "t".repeat(201),
                "category": "bad category",
                "ownerRef": 0
            })),
            false,
        );
        let fields: Vec<_> = result.errors().iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["title", "category", "ownerRef"]);
    }

    #[test]
    fn sanitize_applies_defaults_and_strips_markup() {
        let draft = sanitize_new(&input(json!({
            "title": "  Release   notes ",
            "body": "<p>hello</p><script>x()</script>",
            "category": ""
        })));
        assert_eq!(draft.title, "Release notes");
        assert_eq!(draft.body, "hello");
        assert_eq!(draft.category, "default");
        assert!(draft.tags.is_empty());
        assert_eq!(draft.owner_ref, None);

        let changes = sanitize_changes(&input(json!({ "ownerRef": null })));
        assert_eq!(changes.owner_ref, Some(None));
        assert!(changes.title.is_none());
    }

    #[test]
    fn batch_checks_operation_argument() {
        let request: BatchRequest = serde_json::from_value(json!({
            "ids": [1, 2],
            "operation": "updateCategory",
            "data": ""
        }))
        .unwrap();
        let (result, _) = validate_batch(&request);
        assert_eq!(result.field_errors("category"), vec!["provide a valid category"]);

        let request: BatchRequest = serde_json::from_value(json!({
            "ids": [1],
            "operation": "updateTags",
            "data": ["ok", "ok"]
        }))
        .unwrap();
        let (result, ids) = validate_batch(&request);
        assert!(result.is_valid());
        assert_eq!(ids, vec![1]);
    }

    #[test]
    fn import_prefixes_nested_errors() {
        let (result, inputs) = validate_import(&json!([{ "title": "ok" }, { "body": "no title" }]));
        assert_eq!(inputs.len(), 2);
        assert_eq!(result.errors()[0].field, "documents[1].title");

        let (result, _) = validate_import(&json!([]));
        assert_eq!(result.first_error(), Some("documents must not be empty"));
    }
}
