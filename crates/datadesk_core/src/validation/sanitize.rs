//! Text sanitizers applied after validation passed.

use once_cell::sync::Lazy;
use regex::Regex;

static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid ws regex"));
static SCRIPT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<script\b.*?</script\s*>").expect("valid script regex"));
static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("valid tag regex"));

/// Single-line cleanup: trim, collapse whitespace runs, drop `<` and `>`.
pub fn sanitize_string(value: &str) -> String {
    let collapsed = WHITESPACE_RE.replace_all(value.trim(), " ");
    collapsed.replace(['<', '>'], "")
}

/// Multi-line cleanup: remove `<script>` blocks and remaining markup, keep
/// line breaks.
pub fn sanitize_html(value: &str) -> String {
    let without_scripts = SCRIPT_RE.replace_all(value, "");
    let without_tags = TAG_RE.replace_all(&without_scripts, "");
    without_tags.trim().to_string()
}

/// Trims, deduplicates (first occurrence wins) and caps a list of labels.
pub fn sanitize_labels<'a>(labels: impl IntoIterator<Item = &'a str>, cap: usize) -> Vec<String> {
    let mut unique: Vec<String> = Vec::new();
    for label in labels {
        if label.trim().is_empty() {
            continue;
        }
        let cleaned = sanitize_string(label);
        if !unique.contains(&cleaned) {
            unique.push(cleaned);
        }
    }
    unique.truncate(cap);
    unique
}

#[cfg(test)]
mod tests {
    use super::{sanitize_html, sanitize_labels, sanitize_string};

    #[test]
    fn sanitize_string_collapses_and_strips_brackets() {
        assert_eq!(sanitize_string("  hello \n\t <b>world</b> "), "hello bworld/b");
    }

    #[test]
    fn sanitize_html_drops_scripts_but_keeps_newlines() {
        let cleaned = sanitize_html("<p>one</p>\n<SCRIPT>alert(1)</script>two");
        assert_eq!(cleaned, "one\ntwo");
    }

    #[test]
    fn labels_keep_first_occurrence_order() {
        let labels = sanitize_labels(["a", "a", "b", " c ", "  "], 10);
        assert_eq!(labels, vec!["a", "b", "c"]);
        assert_eq!(sanitize_labels(["x", "y", "z"], 2), vec!["x", "y"]);
    }
}
