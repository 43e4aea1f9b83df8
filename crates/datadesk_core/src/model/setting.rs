//! Key/value settings.

use crate::codec::TypeTag;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Persisted setting with its logical value rebuilt by the codec.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Setting {
    pub key: String,
    pub value: Value,
    pub description: String,
    pub type_tag: TypeTag,
    pub updated_at: i64,
}

/// Sanitized input for an upsert.
#[derive(Debug, Clone, PartialEq)]
pub struct SettingDraft {
    pub key: String,
    pub value: Value,
    pub description: String,
    /// Declared type; detected from `value` when absent.
    pub type_tag: Option<TypeTag>,
}

/// One exported setting, keyed by its key in [`SettingsExport`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportedSetting {
    pub value: Value,
    pub description: String,
    pub type_tag: TypeTag,
    pub updated_at: i64,
}

impl From<Setting> for ExportedSetting {
    fn from(setting: Setting) -> Self {
        Self {
            value: setting.value,
            description: setting.description,
            type_tag: setting.type_tag,
            updated_at: setting.updated_at,
        }
    }
}

pub type SettingsExport = BTreeMap<String, ExportedSetting>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingStatistics {
    pub total: u64,
    /// Count per type tag; tags without rows are reported as zero.
    pub by_type: BTreeMap<TypeTag, u64>,
}
