//! Account persistence.
//!
//! # Invariants
//! - `handle` and non-null `contact_address` stay unique across rows.
//! - Deleting an account leaves its documents in place with a null owner.

use super::{
    text_or_null, Column, ColumnValues, Entity, RepoError, RepoResult, Repository, TableSchema,
    UniqueRule,
};
use crate::model::account::{
    Account, AccountChanges, AccountStatistics, LifecycleState, NewAccount,
};
use crate::model::RecordId;
use crate::query::{OrderDirection, Page, PageRequest, Predicate};
use rusqlite::types::Value;
use rusqlite::{Connection, Row};

const ACCOUNT_SCHEMA: TableSchema = TableSchema {
    table: "accounts",
    key_column: "id",
    columns: &[
        Column { field: "id", column: "id" },
        Column { field: "handle", column: "handle" },
        Column { field: "contactAddress", column: "contact_address" },
        Column { field: "avatarReference", column: "avatar_reference" },
        Column { field: "lifecycleState", column: "lifecycle_state" },
        Column { field: "createdAt", column: "created_at" },
        Column { field: "updatedAt", column: "updated_at" },
    ],
    search_columns: &["handle", "contact_address"],
    default_order: "created_at",
    default_direction: OrderDirection::Desc,
    unique: &[
        UniqueRule { column: "handle", field: "handle" },
        UniqueRule { column: "contact_address", field: "contactAddress" },
    ],
};

impl Entity for Account {
    type Key = RecordId;

    const SCHEMA: &'static TableSchema = &ACCOUNT_SCHEMA;

    fn from_row(row: &Row<'_>) -> RepoResult<Self> {
        let state: String = row.get("lifecycle_state")?;
        let lifecycle_state = LifecycleState::parse(&state)
            .ok_or_else(|| RepoError::InvalidData(format!("unknown lifecycle state `{state}`")))?;
        Ok(Self {
            id: row.get("id")?,
            handle: row.get("handle")?,
            contact_address: row.get("contact_address")?,
            avatar_reference: row.get("avatar_reference")?,
            lifecycle_state,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

/// Account repository built on the generic table repository.
pub struct AccountRepository<'conn> {
    base: Repository<'conn, Account>,
}

impl<'conn> AccountRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self {
            base: Repository::new(conn),
        }
    }

    /// Generic operations (`paginate`, `count`, `exists`, ...).
    pub fn base(&self) -> &Repository<'conn, Account> {
        &self.base
    }

    pub fn find_by_id(&self, id: RecordId) -> RepoResult<Option<Account>> {
        self.base.find_by_id(&id)
    }

    pub fn create(&self, draft: &NewAccount) -> RepoResult<Account> {
        let values: ColumnValues = vec![
            ("handle", Value::Text(draft.handle.clone())),
            ("contact_address", text_or_null(draft.contact_address.as_deref())),
            ("avatar_reference", text_or_null(draft.avatar_reference.as_deref())),
            ("lifecycle_state", Value::Text(draft.lifecycle_state.as_str().to_string())),
        ];
        self.base.create(&values)
    }

    pub fn update(&self, id: RecordId, changes: &AccountChanges) -> RepoResult<Option<Account>> {
        let mut values: ColumnValues = Vec::new();
        if let Some(handle) = &changes.handle {
            values.push(("handle", Value::Text(handle.clone())));
        }
        if let Some(contact) = &changes.contact_address {
            values.push(("contact_address", text_or_null(contact.as_deref())));
        }
        if let Some(avatar) = &changes.avatar_reference {
            values.push(("avatar_reference", text_or_null(avatar.as_deref())));
        }
        if let Some(state) = changes.lifecycle_state {
            values.push(("lifecycle_state", Value::Text(state.as_str().to_string())));
        }
        self.base.update(&id, &values)
    }

    pub fn delete(&self, id: RecordId) -> RepoResult<bool> {
        self.base.delete(&id)
    }

    pub fn delete_many(&self, ids: &[RecordId]) -> RepoResult<usize> {
        self.base.delete_many(ids)
    }

    pub fn find_by_handle(&self, handle: &str) -> RepoResult<Option<Account>> {
        let rows = self
            .base
            .find_where(&[("handle", Value::Text(handle.to_string()))])?;
        Ok(rows.into_iter().next())
    }

    pub fn find_by_contact(&self, contact: &str) -> RepoResult<Option<Account>> {
        let rows = self
            .base
            .find_where(&[("contact_address", Value::Text(contact.to_lowercase()))])?;
        Ok(rows.into_iter().next())
    }

    /// Handle/contact search with an optional lifecycle filter.
    pub fn search(
        &self,
        request: &PageRequest,
        state: Option<LifecycleState>,
    ) -> RepoResult<Page<Account>> {
        let predicate = match state {
            Some(state) => Predicate::eq("lifecycle_state", state.as_str().to_string()),
            None => Predicate::none(),
        };
        self.base.paginate(request, &predicate)
    }

    pub fn active_accounts(&self) -> RepoResult<Vec<Account>> {
        self.base.find_where(&[(
            "lifecycle_state",
            Value::Text(LifecycleState::Active.as_str().to_string()),
        )])
    }

    pub fn update_state(&self, id: RecordId, state: LifecycleState) -> RepoResult<Option<Account>> {
        self.update(
            id,
            &AccountChanges {
                lifecycle_state: Some(state),
                ..AccountChanges::default()
            },
        )
    }

    /// Sets the lifecycle state of every listed account; returns rows changed.
    pub fn batch_update_state(&self, ids: &[RecordId], state: LifecycleState) -> RepoResult<usize> {
        self.base.update_many(
            ids,
            &[("lifecycle_state", Value::Text(state.as_str().to_string()))],
        )
    }

    /// Most recently created accounts.
    pub fn recent(&self, limit: u32) -> RepoResult<Vec<Account>> {
        self.base
            .find_all(Some("created_at"), Some(OrderDirection::Desc), Some(limit))
    }

    pub fn statistics(&self) -> RepoResult<AccountStatistics> {
        let active = self.base.count(&[(
            "lifecycle_state",
            Value::Text(LifecycleState::Active.as_str().to_string()),
        )])?;
        let inactive = self.base.count(&[(
            "lifecycle_state",
            Value::Text(LifecycleState::Inactive.as_str().to_string()),
        )])?;
        Ok(AccountStatistics::new(active, inactive))
    }
}
