//! Document use-case service.
//!
//! # Responsibility
//! - Validate and sanitize document payloads, including tag normalization.
//! - Expose search, batch, import and aggregate entry points.
//!
//! # Invariants
//! - `ownerRef` must reference an existing account when set.
//! - Imports are all-or-nothing.

use super::{ensure_valid, BatchOutcome, ServiceError, ServiceResult};
use crate::model::document::{
    CategoryCount, Document, DocumentDetail, DocumentStatistics, TagCount,
};
use crate::model::RecordId;
use crate::query::{Page, PageRequest};
use crate::repo::account_repo::AccountRepository;
use crate::repo::document_repo::{DocumentFilter, DocumentRepository};
use crate::validation::common::BatchRequest;
use crate::validation::document::{self, sanitize_tags, DocumentInput, DocumentQuery};
use crate::validation::sanitize::sanitize_string;
use log::info;
use rusqlite::{Connection, Transaction, TransactionBehavior};
use serde::Serialize;
use serde_json::Value;
use std::time::Instant;

const ENTITY: &str = "document";

/// Result of a document import.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportOutcome {
    pub imported: usize,
    pub ids: Vec<RecordId>,
}

/// Use-case service over [`DocumentRepository`].
pub struct DocumentService<'conn> {
    conn: &'conn Connection,
    repo: DocumentRepository<'conn>,
}

impl<'conn> DocumentService<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self {
            conn,
            repo: DocumentRepository::new(conn),
        }
    }

    pub fn repository(&self) -> &DocumentRepository<'conn> {
        &self.repo
    }

    /// Paginated title/body/category search with category, tag and owner
    /// filters.
    pub fn list(&self, query: &DocumentQuery) -> ServiceResult<Page<Document>> {
        ensure_valid(document::validate_query(query))?;
        let filter = DocumentFilter {
            category: query.category.clone(),
            tag: query.tag.as_deref().map(str::trim).map(str::to_string),
            owner_ref: query.owner_ref,
        };
        Ok(self.repo.search(&query.page, &filter)?)
    }

    pub fn get(&self, id: RecordId) -> ServiceResult<Document> {
        self.repo
            .find_by_id(id)?
            .ok_or_else(|| ServiceError::not_found(ENTITY, id))
    }

    /// Document joined with its owner's handle and contact.
    pub fn detail(&self, id: RecordId) -> ServiceResult<DocumentDetail> {
        self.repo
            .detail_by_id(id)?
            .ok_or_else(|| ServiceError::not_found(ENTITY, id))
    }

    /// # Contract
    /// - Tags are trimmed, deduplicated and capped at 10.
    /// - Missing category becomes `default`; missing owner stays null.
    pub fn create(&self, input: &DocumentInput) -> ServiceResult<Document> {
        ensure_valid(document::validate(input, false))?;
        let draft = document::sanitize_new(input);
        self.ensure_owner_exists(self.conn, draft.owner_ref)?;
        let created = self.repo.create(&draft)?;
        info!(
            "event=document_create module=service status=ok id={} tags={}",
            created.id,
            created.tags.len()
        );
        Ok(created)
    }

    /// Partial update; an empty payload returns the current record.
    pub fn update(&self, id: RecordId, input: &DocumentInput) -> ServiceResult<Document> {
        ensure_valid(document::validate(input, true))?;
        let changes = document::sanitize_changes(input);
        if changes.is_empty() {
            return self.get(id);
        }
        self.ensure_owner_exists(self.conn, changes.owner_ref.flatten())?;
        self.repo
            .update(id, &changes)?
            .ok_or_else(|| ServiceError::not_found(ENTITY, id))
    }

    pub fn delete(&self, id: RecordId) -> ServiceResult<()> {
        if !self.repo.delete(id)? {
            return Err(ServiceError::not_found(ENTITY, id));
        }
        info!("event=document_delete module=service status=ok id={id}");
        Ok(())
    }

    /// `delete`, `updateCategory` or `updateTags` up to 50 documents.
    pub fn batch(&self, request: &BatchRequest) -> ServiceResult<BatchOutcome> {
        let (result, ids) = document::validate_batch(request);
        ensure_valid(result)?;

        let affected = match request.operation.as_str() {
            "delete" => self.repo.delete_many(&ids)?,
            "updateCategory" => {
                let category = sanitize_string(request.data.as_str().unwrap_or_default());
                self.repo.batch_update_category(&ids, &category)?
            }
            "updateTags" => self
                .repo
                .batch_update_tags(&ids, &sanitize_tags(&request.data))?,
            other => {
                return Err(ServiceError::invalid(
                    "operation",
                    format!("unsupported operation `{other}`"),
                ))
            }
        };
        info!(
            "event=document_batch module=service status=ok operation={} requested={} affected={affected}",
            request.operation,
            ids.len()
        );
        Ok(BatchOutcome {
            operation: request.operation.clone(),
            requested: ids.len(),
            affected,
        })
    }

    /// Creates every document of `documents` in one transaction.
    pub fn import(&self, documents: &Value) -> ServiceResult<ImportOutcome> {
        let (result, inputs) = document::validate_import(documents);
        ensure_valid(result)?;

        let started_at = Instant::now();
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let ids = {
            let repo = DocumentRepository::new(&tx);
            let mut ids = Vec::with_capacity(inputs.len());
            for input in &inputs {
                let draft = document::sanitize_new(input);
                self.ensure_owner_exists(&tx, draft.owner_ref)?;
                ids.push(repo.create(&draft)?.id);
            }
            ids
        };
        tx.commit()?;

        info!(
            "event=document_import module=service status=ok imported={} duration_ms={}",
            ids.len(),
            started_at.elapsed().as_millis()
        );
        Ok(ImportOutcome {
            imported: ids.len(),
            ids,
        })
    }

    pub fn find_by_owner(&self, owner: RecordId) -> ServiceResult<Vec<Document>> {
        Ok(self.repo.find_by_owner(owner)?)
    }

    pub fn find_by_category(&self, category: &str) -> ServiceResult<Vec<Document>> {
        Ok(self.repo.find_by_category(category)?)
    }

    pub fn find_by_tag(&self, tag: &str, request: &PageRequest) -> ServiceResult<Page<Document>> {
        Ok(self.repo.find_by_tag(tag.trim(), request)?)
    }

    pub fn delete_by_owner(&self, owner: RecordId) -> ServiceResult<usize> {
        Ok(self.repo.delete_by_owner(owner)?)
    }

    pub fn recent(&self, limit: u32) -> ServiceResult<Vec<Document>> {
        Ok(self.repo.recent(limit.clamp(1, 100))?)
    }

    pub fn categories(&self) -> ServiceResult<Vec<CategoryCount>> {
        Ok(self.repo.categories()?)
    }

    pub fn tags(&self) -> ServiceResult<Vec<TagCount>> {
        Ok(self.repo.tags()?)
    }

    pub fn statistics(&self) -> ServiceResult<DocumentStatistics> {
        Ok(self.repo.statistics()?)
    }

    fn ensure_owner_exists(&self, conn: &Connection, owner: Option<RecordId>) -> ServiceResult<()> {
        let Some(owner) = owner else {
            return Ok(());
        };
        if AccountRepository::new(conn).base().exists(&owner)? {
            Ok(())
        } else {
            Err(ServiceError::invalid(
                "ownerRef",
                format!("ownerRef {owner} does not reference an account"),
            ))
        }
    }
}
