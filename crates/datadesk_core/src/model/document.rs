//! Document records and aggregates.

use super::RecordId;
use serde::{Deserialize, Serialize};

/// Category assigned when none is given.
pub const DEFAULT_CATEGORY: &str = "default";
/// Upper bound of tags kept on one document.
pub const MAX_TAGS: usize = 10;

/// Persisted document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: RecordId,
    pub title: String,
    pub body: String,
    pub category: String,
    /// Ordered, deduplicated labels.
    pub tags: Vec<String>,
    /// Weak reference to an account; cleared when the account is deleted.
    pub owner_ref: Option<RecordId>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Document joined with its owner's identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentDetail {
    #[serde(flatten)]
    pub document: Document,
    pub owner_handle: Option<String>,
    pub owner_contact: Option<String>,
}

/// Sanitized input for a new document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewDocument {
    pub title: String,
    pub body: String,
    pub category: String,
    pub tags: Vec<String>,
    pub owner_ref: Option<RecordId>,
}

/// Sanitized partial update.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentChanges {
    pub title: Option<String>,
    pub body: Option<String>,
    pub category: Option<String>,
    pub tags: Option<Vec<String>>,
    pub owner_ref: Option<Option<RecordId>>,
}

impl DocumentChanges {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.body.is_none()
            && self.category.is_none()
            && self.tags.is_none()
            && self.owner_ref.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryCount {
    pub category: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagCount {
    pub tag: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentStatistics {
    pub total: u64,
    /// Number of distinct categories.
    pub categories: u64,
    /// Number of distinct tags.
    pub tags: u64,
    /// Mean body length in characters, rounded to an integer.
    pub average_body_length: u64,
}
