//! Document persistence.
//!
//! # Invariants
//! - `tags` is stored as a JSON array of strings; reads reject anything else.
//! - `category` is never empty in storage.

use super::{Column, ColumnValues, Entity, RepoError, RepoResult, Repository, TableSchema};
use crate::model::document::{
    CategoryCount, Document, DocumentChanges, DocumentDetail, DocumentStatistics, NewDocument,
    TagCount,
};
use crate::model::RecordId;
use crate::query::{escape_like, OrderDirection, Page, PageRequest, Predicate};
use rusqlite::types::Value;
use rusqlite::{params, Connection, Row};

const DOCUMENT_SCHEMA: TableSchema = TableSchema {
    table: "documents",
    key_column: "id",
    columns: &[
        Column { field: "id", column: "id" },
        Column { field: "title", column: "title" },
        Column { field: "body", column: "body" },
        Column { field: "category", column: "category" },
        Column { field: "tags", column: "tags" },
        Column { field: "ownerRef", column: "owner_ref" },
        Column { field: "createdAt", column: "created_at" },
        Column { field: "updatedAt", column: "updated_at" },
    ],
    search_columns: &["title", "body", "category"],
    default_order: "updated_at",
    default_direction: OrderDirection::Desc,
    unique: &[],
};

const TAG_FILTER_SQL: &str = "tags LIKE ? ESCAPE '\\'";

impl Entity for Document {
    type Key = RecordId;

    const SCHEMA: &'static TableSchema = &DOCUMENT_SCHEMA;

    fn from_row(row: &Row<'_>) -> RepoResult<Self> {
        let tags_text: String = row.get("tags")?;
        Ok(Self {
            id: row.get("id")?,
            title: row.get("title")?,
            body: row.get("body")?,
            category: row.get("category")?,
            tags: decode_tags(&tags_text)?,
            owner_ref: row.get("owner_ref")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

/// Optional filters combined with free-text search.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentFilter {
    pub category: Option<String>,
    pub tag: Option<String>,
    pub owner_ref: Option<RecordId>,
}

impl DocumentFilter {
    fn predicate(&self) -> Predicate {
        let mut predicate = Predicate::none();
        if let Some(category) = self.category.as_deref().filter(|c| !c.is_empty()) {
            predicate = predicate.and(Predicate::eq("category", category.to_string()));
        }
        if let Some(tag) = self.tag.as_deref().filter(|t| !t.is_empty()) {
            predicate = predicate.and(tag_predicate(tag));
        }
        if let Some(owner) = self.owner_ref {
            predicate = predicate.and(Predicate::eq("owner_ref", owner));
        }
        predicate
    }
}

/// Document repository built on the generic table repository.
pub struct DocumentRepository<'conn> {
    base: Repository<'conn, Document>,
}

impl<'conn> DocumentRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self {
            base: Repository::new(conn),
        }
    }

    pub fn base(&self) -> &Repository<'conn, Document> {
        &self.base
    }

    fn conn(&self) -> &'conn Connection {
        self.base.connection()
    }

    pub fn find_by_id(&self, id: RecordId) -> RepoResult<Option<Document>> {
        self.base.find_by_id(&id)
    }

    pub fn create(&self, draft: &NewDocument) -> RepoResult<Document> {
        let values: ColumnValues = vec![
            ("title", Value::Text(draft.title.clone())),
            ("body", Value::Text(draft.body.clone())),
            ("category", Value::Text(draft.category.clone())),
            ("tags", encode_tags(&draft.tags)?),
            ("owner_ref", draft.owner_ref.map_or(Value::Null, Value::Integer)),
        ];
        self.base.create(&values)
    }

    pub fn update(&self, id: RecordId, changes: &DocumentChanges) -> RepoResult<Option<Document>> {
        let mut values: ColumnValues = Vec::new();
        if let Some(title) = &changes.title {
            values.push(("title", Value::Text(title.clone())));
        }
        if let Some(body) = &changes.body {
            values.push(("body", Value::Text(body.clone())));
        }
        if let Some(category) = &changes.category {
            values.push(("category", Value::Text(category.clone())));
        }
        if let Some(tags) = &changes.tags {
            values.push(("tags", encode_tags(tags)?));
        }
        if let Some(owner) = changes.owner_ref {
            values.push(("owner_ref", owner.map_or(Value::Null, Value::Integer)));
        }
        self.base.update(&id, &values)
    }

    pub fn delete(&self, id: RecordId) -> RepoResult<bool> {
        self.base.delete(&id)
    }

    pub fn delete_many(&self, ids: &[RecordId]) -> RepoResult<usize> {
        self.base.delete_many(ids)
    }

    pub fn find_by_owner(&self, owner: RecordId) -> RepoResult<Vec<Document>> {
        self.base.find_where(&[("owner_ref", Value::Integer(owner))])
    }

    pub fn find_by_category(&self, category: &str) -> RepoResult<Vec<Document>> {
        self.base
            .find_where(&[("category", Value::Text(category.to_string()))])
    }

    pub fn find_by_tag(&self, tag: &str, request: &PageRequest) -> RepoResult<Page<Document>> {
        self.base.paginate(request, &tag_predicate(tag))
    }

    /// Title/body/category search narrowed by the filter.
    pub fn search(
        &self,
        request: &PageRequest,
        filter: &DocumentFilter,
    ) -> RepoResult<Page<Document>> {
        self.base.paginate(request, &filter.predicate())
    }

    /// Document plus its owner's handle and contact.
    pub fn detail_by_id(&self, id: RecordId) -> RepoResult<Option<DocumentDetail>> {
        let mut stmt = self.conn().prepare(
            "SELECT
                d.id, d.title, d.body, d.category, d.tags, d.owner_ref,
                d.created_at, d.updated_at,
                a.handle AS owner_handle,
                a.contact_address AS owner_contact
             FROM documents d
             LEFT JOIN accounts a ON a.id = d.owner_ref
             WHERE d.id = ?1",
        )?;
        let mut rows = stmt.query([id])?;
        let Some(row) = rows.next()? else {
            return Ok(None);
        };
        Ok(Some(DocumentDetail {
            document: Document::from_row(row)?,
            owner_handle: row.get("owner_handle")?,
            owner_contact: row.get("owner_contact")?,
        }))
    }

    /// Categories with document counts, most used first.
    pub fn categories(&self) -> RepoResult<Vec<CategoryCount>> {
        let mut stmt = self.conn().prepare(
            "SELECT category, COUNT(*) AS total
             FROM documents
             GROUP BY category
             ORDER BY total DESC, category ASC",
        )?;
        let mut rows = stmt.query([])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            out.push(CategoryCount {
                category: row.get(0)?,
                count: count_column(row, 1)?,
            });
        }
        Ok(out)
    }

    /// Tags with document counts, most used first.
    pub fn tags(&self) -> RepoResult<Vec<TagCount>> {
        let mut stmt = self.conn().prepare(
            "SELECT tag.value AS name, COUNT(*) AS total
             FROM documents, json_each(documents.tags) AS tag
             GROUP BY tag.value
             ORDER BY total DESC, name ASC",
        )?;
        let mut rows = stmt.query([])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            out.push(TagCount {
                tag: row.get(0)?,
                count: count_column(row, 1)?,
            });
        }
        Ok(out)
    }

    pub fn batch_update_category(&self, ids: &[RecordId], category: &str) -> RepoResult<usize> {
        self.base
            .update_many(ids, &[("category", Value::Text(category.to_string()))])
    }

    pub fn batch_update_tags(&self, ids: &[RecordId], tags: &[String]) -> RepoResult<usize> {
        self.base.update_many(ids, &[("tags", encode_tags(tags)?)])
    }

    /// Removes every document owned by `owner`.
    pub fn delete_by_owner(&self, owner: RecordId) -> RepoResult<usize> {
        Ok(self
            .conn()
            .execute("DELETE FROM documents WHERE owner_ref = ?1", [owner])?)
    }

    /// Most recently updated documents.
    pub fn recent(&self, limit: u32) -> RepoResult<Vec<Document>> {
        self.base
            .find_all(Some("updated_at"), Some(OrderDirection::Desc), Some(limit))
    }

    pub fn statistics(&self) -> RepoResult<DocumentStatistics> {
        let (total, categories, average): (i64, i64, Option<f64>) = self.conn().query_row(
            "SELECT COUNT(*), COUNT(DISTINCT category), AVG(length(body)) FROM documents",
            params![],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )?;
        let tags: i64 = self.conn().query_row(
            "SELECT COUNT(DISTINCT tag.value)
             FROM documents, json_each(documents.tags) AS tag",
            params![],
            |row| row.get(0),
        )?;

        Ok(DocumentStatistics {
            total: u64::try_from(total).unwrap_or(0),
            categories: u64::try_from(categories).unwrap_or(0),
            tags: u64::try_from(tags).unwrap_or(0),
            average_body_length: average.map_or(0, |value| value.round() as u64),
        })
    }
}

fn tag_predicate(tag: &str) -> Predicate {
    let needle = serde_json::Value::String(tag.to_string()).to_string();
    Predicate::fragment(
        TAG_FILTER_SQL,
        vec![Value::Text(format!("%{}%", escape_like(&needle)))],
    )
}

fn encode_tags(tags: &[String]) -> RepoResult<Value> {
    serde_json::to_string(tags)
        .map(Value::Text)
        .map_err(|err| RepoError::InvalidData(format!("tags are not serializable: {err}")))
}

fn decode_tags(text: &str) -> RepoResult<Vec<String>> {
    serde_json::from_str(text)
        .map_err(|err| RepoError::InvalidData(format!("tags column is not a JSON array: {err}")))
}

fn count_column(row: &Row<'_>, index: usize) -> RepoResult<u64> {
    let total: i64 = row.get(index)?;
    Ok(u64::try_from(total).unwrap_or(0))
}
