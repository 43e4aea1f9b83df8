//! Account use-case service.
//!
//! # Responsibility
//! - Validate and sanitize account payloads before persistence.
//! - Expose list, lookup, batch and statistics entry points.
//!
//! # Invariants
//! - Handle and contact uniqueness failures surface as
//!   `ServiceError::Conflict`.

use super::{ensure_valid, BatchOutcome, ServiceError, ServiceResult};
use crate::model::account::{Account, AccountStatistics, LifecycleState};
use crate::model::RecordId;
use crate::query::Page;
use crate::repo::account_repo::AccountRepository;
use crate::validation::account::{self, AccountInput, AccountQuery};
use crate::validation::common::BatchRequest;
use log::info;
use rusqlite::Connection;

const ENTITY: &str = "account";

/// Use-case service over [`AccountRepository`].
pub struct AccountService<'conn> {
    repo: AccountRepository<'conn>,
}

impl<'conn> AccountService<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self {
            repo: AccountRepository::new(conn),
        }
    }

    pub fn repository(&self) -> &AccountRepository<'conn> {
        &self.repo
    }

    /// Paginated handle/contact search with optional lifecycle filter.
    pub fn list(&self, query: &AccountQuery) -> ServiceResult<Page<Account>> {
        ensure_valid(account::validate_query(query))?;
        let state = query
            .lifecycle_state
            .as_deref()
            .and_then(LifecycleState::parse);
        Ok(self.repo.search(&query.page, state)?)
    }

    pub fn get(&self, id: RecordId) -> ServiceResult<Account> {
        self.repo
            .find_by_id(id)?
            .ok_or_else(|| ServiceError::not_found(ENTITY, id))
    }

    pub fn find_by_handle(&self, handle: &str) -> ServiceResult<Option<Account>> {
        Ok(self.repo.find_by_handle(handle)?)
    }

    /// # Contract
    /// - Rejects invalid payloads with the full validation result.
    /// - Returns the stored row including generated id and timestamps.
    pub fn create(&self, input: &AccountInput) -> ServiceResult<Account> {
        ensure_valid(account::validate(input, false))?;
        let created = self.repo.create(&account::sanitize_new(input))?;
        info!(
            "event=account_create module=service status=ok id={}",
            created.id
        );
        Ok(created)
    }

    /// Partial update; an empty payload returns the current record.
    pub fn update(&self, id: RecordId, input: &AccountInput) -> ServiceResult<Account> {
        ensure_valid(account::validate(input, true))?;
        let changes = account::sanitize_changes(input);
        if changes.is_empty() {
            return self.get(id);
        }
        self.repo
            .update(id, &changes)?
            .ok_or_else(|| ServiceError::not_found(ENTITY, id))
    }

    pub fn delete(&self, id: RecordId) -> ServiceResult<()> {
        if !self.repo.delete(id)? {
            return Err(ServiceError::not_found(ENTITY, id));
        }
        info!("event=account_delete module=service status=ok id={id}");
        Ok(())
    }

    /// `delete`, `activate` or `deactivate` up to 100 accounts.
    pub fn batch(&self, request: &BatchRequest) -> ServiceResult<BatchOutcome> {
        let (result, ids) = account::validate_batch(request);
        ensure_valid(result)?;

        let affected = match request.operation.as_str() {
            "delete" => self.repo.delete_many(&ids)?,
            "activate" => self.repo.batch_update_state(&ids, LifecycleState::Active)?,
            "deactivate" => self
                .repo
                .batch_update_state(&ids, LifecycleState::Inactive)?,
            other => {
                return Err(ServiceError::invalid(
                    "operation",
                    format!("unsupported operation `{other}`"),
                ))
            }
        };
        info!(
            "event=account_batch module=service status=ok operation={} requested={} affected={affected}",
            request.operation,
            ids.len()
        );
        Ok(BatchOutcome {
            operation: request.operation.clone(),
            requested: ids.len(),
            affected,
        })
    }

    pub fn set_state(&self, id: RecordId, state: LifecycleState) -> ServiceResult<Account> {
        self.repo
            .update_state(id, state)?
            .ok_or_else(|| ServiceError::not_found(ENTITY, id))
    }

    pub fn active_accounts(&self) -> ServiceResult<Vec<Account>> {
        Ok(self.repo.active_accounts()?)
    }

    pub fn recent(&self, limit: u32) -> ServiceResult<Vec<Account>> {
        Ok(self.repo.recent(limit.clamp(1, 100))?)
    }

    pub fn statistics(&self) -> ServiceResult<AccountStatistics> {
        Ok(self.repo.statistics()?)
    }
}
