//! Setting persistence.
//!
//! # Invariants
//! - `value` holds codec text for the row's `type_tag`; reads decode it.
//! - Keys are stored lower-cased by the sanitizer; lookups use them as given.
//! - Bulk writes (`set_many`, `import`) are all-or-nothing.

use super::{Column, Entity, RepoError, RepoResult, Repository, TableSchema, NOW_MS_SQL};
use crate::codec::{self, TypeTag};
use crate::model::setting::{
    ExportedSetting, Setting, SettingDraft, SettingStatistics, SettingsExport,
};
use crate::query::{OrderDirection, Page, PageRequest, Predicate};
use rusqlite::types::ToSql;
use rusqlite::{params, Connection, Row, Transaction, TransactionBehavior};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

const SETTING_SCHEMA: TableSchema = TableSchema {
    table: "settings",
    key_column: "key",
    columns: &[
        Column { field: "key", column: "key" },
        Column { field: "value", column: "value" },
        Column { field: "description", column: "description" },
        Column { field: "typeTag", column: "type_tag" },
        Column { field: "updatedAt", column: "updated_at" },
    ],
    search_columns: &["key", "description"],
    default_order: "key",
    default_direction: OrderDirection::Asc,
    unique: &[],
};

impl Entity for Setting {
    type Key = String;

    const SCHEMA: &'static TableSchema = &SETTING_SCHEMA;

    fn from_row(row: &Row<'_>) -> RepoResult<Self> {
        let tag_text: String = row.get("type_tag")?;
        let type_tag = TypeTag::parse(&tag_text)
            .ok_or_else(|| RepoError::InvalidData(format!("unknown type tag `{tag_text}`")))?;
        let raw: Option<String> = row.get("value")?;
        Ok(Self {
            key: row.get("key")?,
            value: codec::deserialize(raw.as_deref(), type_tag),
            description: row.get("description")?,
            type_tag,
            updated_at: row.get("updated_at")?,
        })
    }
}

/// Setting repository built on the generic table repository.
pub struct SettingRepository<'conn> {
    base: Repository<'conn, Setting>,
}

impl<'conn> SettingRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self {
            base: Repository::new(conn),
        }
    }

    pub fn base(&self) -> &Repository<'conn, Setting> {
        &self.base
    }

    fn conn(&self) -> &'conn Connection {
        self.base.connection()
    }

    pub fn find_by_key(&self, key: &str) -> RepoResult<Option<Setting>> {
        self.base.find_by_id(&key.to_string())
    }

    /// Logical value of `key`, or `default` when the key is absent.
    pub fn get_value(&self, key: &str, default: JsonValue) -> RepoResult<JsonValue> {
        Ok(self
            .find_by_key(key)?
            .map_or(default, |setting| setting.value))
    }

    /// Values of the keys that exist; missing keys are omitted.
    pub fn get_many(&self, keys: &[String]) -> RepoResult<BTreeMap<String, JsonValue>> {
        if keys.is_empty() {
            return Ok(BTreeMap::new());
        }
        let placeholders = vec!["?"; keys.len()].join(", ");
        let params: Vec<&dyn ToSql> = keys.iter().map(|key| key as &dyn ToSql).collect();
        let rows = self
            .base
            .select(&format!("WHERE key IN ({placeholders})"), &params)?;
        Ok(rows
            .into_iter()
            .map(|setting| (setting.key, setting.value))
            .collect())
    }

    /// Every key with its logical value.
    pub fn get_all(&self) -> RepoResult<BTreeMap<String, JsonValue>> {
        Ok(self
            .base
            .find_all(None, None, None)?
            .into_iter()
            .map(|setting| (setting.key, setting.value))
            .collect())
    }

    /// Upserts one setting and returns the stored row.
    ///
    /// The type tag is detected from `value` when not given.
    pub fn set_value(
        &self,
        key: &str,
        value: &JsonValue,
        description: &str,
        type_tag: Option<TypeTag>,
    ) -> RepoResult<Setting> {
        let type_tag = type_tag.unwrap_or_else(|| codec::detect(value));
        let text = codec::serialize(value, type_tag);
        self.conn().execute(
            &format!(
                "INSERT INTO settings (key, value, description, type_tag)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(key) DO UPDATE SET
                    value = excluded.value,
                    description = excluded.description,
                    type_tag = excluded.type_tag,
                    updated_at = {NOW_MS_SQL}"
            ),
            params![key, text, description, type_tag.as_str()],
        )?;
        self.find_by_key(key)?
            .ok_or(RepoError::MissingGeneratedId(SETTING_SCHEMA.table))
    }

    pub fn set(&self, draft: &SettingDraft) -> RepoResult<Setting> {
        self.set_value(&draft.key, &draft.value, &draft.description, draft.type_tag)
    }

    /// Upserts every draft inside one transaction.
    pub fn set_many(&self, drafts: &[SettingDraft]) -> RepoResult<Vec<Setting>> {
        let tx = Transaction::new_unchecked(self.conn(), TransactionBehavior::Immediate)?;
        let saved = {
            let repo = SettingRepository::new(&tx);
            drafts
                .iter()
                .map(|draft| repo.set(draft))
                .collect::<RepoResult<Vec<_>>>()?
        };
        tx.commit()?;
        Ok(saved)
    }

    /// Key/description search ordered by key, optionally narrowed by type.
    pub fn list(
        &self,
        request: &PageRequest,
        type_tag: Option<TypeTag>,
    ) -> RepoResult<Page<Setting>> {
        let predicate = match type_tag {
            Some(tag) => Predicate::eq("type_tag", tag.as_str().to_string()),
            None => Predicate::none(),
        };
        self.base.paginate(request, &predicate)
    }

    pub fn delete_by_key(&self, key: &str) -> RepoResult<bool> {
        self.base.delete(&key.to_string())
    }

    pub fn delete_many_keys(&self, keys: &[String]) -> RepoResult<usize> {
        self.base.delete_many(keys)
    }

    pub fn has_key(&self, key: &str) -> RepoResult<bool> {
        self.base.exists(&key.to_string())
    }

    pub fn statistics(&self) -> RepoResult<SettingStatistics> {
        let mut by_type: BTreeMap<TypeTag, u64> =
            TypeTag::ALL.iter().map(|tag| (*tag, 0)).collect();
        let mut stmt = self
            .conn()
            .prepare("SELECT type_tag, COUNT(*) FROM settings GROUP BY type_tag")?;
        let mut rows = stmt.query([])?;
        let mut total = 0;
        while let Some(row) = rows.next()? {
            let tag_text: String = row.get(0)?;
            let count: i64 = row.get(1)?;
            let count = u64::try_from(count).unwrap_or(0);
            if let Some(tag) = TypeTag::parse(&tag_text) {
                by_type.insert(tag, count);
            }
            total += count;
        }
        Ok(SettingStatistics { total, by_type })
    }

    /// Every setting keyed by its key, with decoded values.
    pub fn export(&self) -> RepoResult<SettingsExport> {
        Ok(self
            .base
            .find_all(None, None, None)?
            .into_iter()
            .map(|setting| (setting.key.clone(), ExportedSetting::from(setting)))
            .collect())
    }

    /// Writes the drafts in one transaction; existing keys are skipped
    /// unless `overwrite`. Returns how many drafts were written.
    pub fn import(&self, drafts: &[SettingDraft], overwrite: bool) -> RepoResult<usize> {
        let tx = Transaction::new_unchecked(self.conn(), TransactionBehavior::Immediate)?;
        let imported = {
            let repo = SettingRepository::new(&tx);
            let mut imported = 0;
            for draft in drafts {
                if !overwrite && repo.has_key(&draft.key)? {
                    continue;
                }
                repo.set(draft)?;
                imported += 1;
            }
            imported
        };
        tx.commit()?;
        Ok(imported)
    }
}
