//! Setting use-case service.
//!
//! # Responsibility
//! - Validate and coerce setting payloads before upserts.
//! - Provide bulk set, export and import with all-or-nothing semantics.
//!
//! # Invariants
//! - Keys are trimmed and lower-cased on every entry point.

use super::{ensure_valid, ServiceError, ServiceResult};
use crate::codec::TypeTag;
use crate::model::setting::{Setting, SettingStatistics, SettingsExport};
use crate::query::Page;
use crate::repo::setting_repo::SettingRepository;
use crate::validation::common::validate_key_list;
use crate::validation::setting::{self, SettingInput, SettingQuery};
use crate::validation::ValidationResult;
use log::info;
use rusqlite::Connection;
use serde_json::Value;
use std::collections::BTreeMap;

const ENTITY: &str = "setting";

/// Use-case service over [`SettingRepository`].
pub struct SettingService<'conn> {
    repo: SettingRepository<'conn>,
}

impl<'conn> SettingService<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self {
            repo: SettingRepository::new(conn),
        }
    }

    pub fn repository(&self) -> &SettingRepository<'conn> {
        &self.repo
    }

    /// Paginated key/description search ordered by key.
    pub fn list(&self, query: &SettingQuery) -> ServiceResult<Page<Setting>> {
        ensure_valid(setting::validate_query(query))?;
        let type_tag = query.type_tag.as_deref().and_then(TypeTag::parse);
        Ok(self.repo.list(&query.page, type_tag)?)
    }

    pub fn get(&self, key: &str) -> ServiceResult<Setting> {
        let key = normalize_key(key);
        self.repo
            .find_by_key(&key)?
            .ok_or_else(|| ServiceError::not_found(ENTITY, key))
    }

    /// Logical value of `key`, or `default` when absent.
    pub fn get_value(&self, key: &str, default: Value) -> ServiceResult<Value> {
        Ok(self.repo.get_value(&normalize_key(key), default)?)
    }

    pub fn get_many(&self, keys: &Value) -> ServiceResult<BTreeMap<String, Value>> {
        let mut result = ValidationResult::new();
        let keys = validate_key_list(keys, setting::BATCH_CAP, &mut result);
        ensure_valid(result)?;
        Ok(self.repo.get_many(&keys)?)
    }

    pub fn all(&self) -> ServiceResult<BTreeMap<String, Value>> {
        Ok(self.repo.get_all()?)
    }

    pub fn has_key(&self, key: &str) -> ServiceResult<bool> {
        Ok(self.repo.has_key(&normalize_key(key))?)
    }

    /// # Contract
    /// - The type tag is detected from the value when not declared.
    /// - Inserting and overwriting both return the re-read row.
    pub fn set(&self, input: &SettingInput) -> ServiceResult<Setting> {
        ensure_valid(setting::validate(input))?;
        let saved = self.repo.set(&setting::sanitize(input))?;
        info!(
            "event=setting_set module=service status=ok type_tag={}",
            saved.type_tag
        );
        Ok(saved)
    }

    pub fn delete(&self, key: &str) -> ServiceResult<()> {
        let key = normalize_key(key);
        if !self.repo.delete_by_key(&key)? {
            return Err(ServiceError::not_found(ENTITY, key));
        }
        Ok(())
    }

    pub fn delete_many(&self, keys: &Value) -> ServiceResult<usize> {
        let mut result = ValidationResult::new();
        let keys = validate_key_list(keys, setting::BATCH_CAP, &mut result);
        ensure_valid(result)?;
        Ok(self.repo.delete_many_keys(&keys)?)
    }

    /// Upserts a `{key: value}` map or `[{key, value, ...}]` list atomically.
    pub fn batch_set(&self, settings: &Value) -> ServiceResult<Vec<Setting>> {
        let (result, inputs) = setting::validate_batch_set(settings);
        ensure_valid(result)?;
        let drafts: Vec<_> = inputs.iter().map(setting::sanitize).collect();
        let saved = self.repo.set_many(&drafts)?;
        info!(
            "event=setting_batch_set module=service status=ok count={}",
            saved.len()
        );
        Ok(saved)
    }

    pub fn export(&self) -> ServiceResult<SettingsExport> {
        Ok(self.repo.export()?)
    }

    /// Imports an export map; existing keys are kept unless `overwrite`.
    pub fn import(&self, data: &Value, overwrite: bool) -> ServiceResult<usize> {
        let (result, inputs) = setting::validate_import(data);
        ensure_valid(result)?;
        let drafts: Vec<_> = inputs.iter().map(setting::sanitize).collect();
        let imported = self.repo.import(&drafts, overwrite)?;
        info!(
            "event=setting_import module=service status=ok imported={imported} overwrite={overwrite}"
        );
        Ok(imported)
    }

    pub fn statistics(&self) -> ServiceResult<SettingStatistics> {
        Ok(self.repo.statistics()?)
    }
}

fn normalize_key(key: &str) -> String {
    key.trim().to_lowercase()
}
