//! Runtime key/value settings editable by admins.
//!
//! Each entry carries a declared type; writes are checked against it.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tallymart_types::{AccountId, Result, TallymartError};
use tracing::info;

/// Declared type of a setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigValueType {
    Number,
    String,
    Boolean,
    /// Any JSON object or array.
    Object,
}

impl ConfigValueType {
    #[must_use]
    pub fn accepts(self, value: &Value) -> bool {
        match self {
            Self::Number => value.is_number(),
            Self::String => value.is_string(),
            Self::Boolean => value.is_boolean(),
            Self::Object => value.is_object() || value.is_array(),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Number => "number",
            Self::String => "string",
            Self::Boolean => "boolean",
            Self::Object => "object",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigEntry {
    pub key: String,
    pub value: Value,
    #[serde(rename = "type")]
    pub value_type: ConfigValueType,
    pub description: Option<String>,
    pub updated_by: Option<AccountId>,
    pub updated_at: DateTime<Utc>,
}

/// Keys seeded into an empty store.
pub const IMPORT_MAX_RECORDS: &str = "import_max_records";
pub const EXPORT_RETENTION_DAYS: &str = "export_retention_days";

fn defaults() -> Vec<(&'static str, Value, ConfigValueType, &'static str)> {
    vec![
        (
            IMPORT_MAX_RECORDS,
            json!(1000),
            ConfigValueType::Number,
            "Maximum rows accepted in one listing import",
        ),
        (
            "import_batch_size",
            json!(10),
            ConfigValueType::Number,
            "Rows validated per batch during import",
        ),
        (
            "gateway_request_delay_ms",
            json!(200),
            ConfigValueType::Number,
            "Delay between provider catalogue requests",
        ),
        (
            EXPORT_RETENTION_DAYS,
            json!(30),
            ConfigValueType::Number,
            "Days purchase exports are kept before deletion",
        ),
        (
            "account_default_balance",
            json!(0),
            ConfigValueType::Number,
            "Opening balance for new accounts",
        ),
        (
            "notify_on_checkout",
            json!(true),
            ConfigValueType::Boolean,
            "Notify sellers when their listings sell",
        ),
        (
            "export_allowed_formats",
            json!(["json"]),
            ConfigValueType::Object,
            "Formats a purchase export may be requested in",
        ),
    ]
}

fn type_mismatch(expected: ConfigValueType) -> TallymartError {
    TallymartError::validation(format!("invalid value type, expected {}", expected.as_str()))
}

#[derive(Default)]
pub struct ConfigStore {
    entries: RwLock<BTreeMap<String, ConfigEntry>>,
}

impl ConfigStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A store holding the default settings.
    #[must_use]
    pub fn with_defaults() -> Self {
        let store = Self::new();
        store.seed_defaults();
        store
    }

    /// Insert every default whose key is absent. Returns how many were added.
    pub fn seed_defaults(&self) -> usize {
        let now = Utc::now();
        let mut entries = self.entries.write();
        let mut added = 0;
        for (key, value, value_type, description) in defaults() {
            entries.entry(key.to_string()).or_insert_with(|| {
                added += 1;
                ConfigEntry {
                    key: key.to_string(),
                    value,
                    value_type,
                    description: Some(description.to_string()),
                    updated_by: None,
                    updated_at: now,
                }
            });
        }
        info!(added, "configuration defaults seeded");
        added
    }

    pub fn get(&self, key: &str) -> Result<ConfigEntry> {
        self.entries
            .read()
            .get(key)
            .cloned()
            .ok_or_else(|| TallymartError::ConfigKeyNotFound(key.to_string()))
    }

    /// The stored value, or `default` when the key is absent.
    #[must_use]
    pub fn get_value(&self, key: &str, default: Value) -> Value {
        self.entries
            .read()
            .get(key)
            .map_or(default, |entry| entry.value.clone())
    }

    /// Numeric setting as `u64`, or `default` when absent or not a
    /// non-negative integer.
    #[must_use]
    pub fn get_u64(&self, key: &str, default: u64) -> u64 {
        self.get_value(key, Value::Null).as_u64().unwrap_or(default)
    }

    pub fn create(
        &self,
        key: &str,
        value: Value,
        value_type: ConfigValueType,
        description: Option<String>,
        updated_by: Option<AccountId>,
    ) -> Result<ConfigEntry> {
        let key = key.trim();
        if key.is_empty() {
            return Err(TallymartError::validation("key, value, and type are required"));
        }
        if !value_type.accepts(&value) {
            return Err(type_mismatch(value_type));
        }

        let mut entries = self.entries.write();
        if entries.contains_key(key) {
            return Err(TallymartError::DuplicateConfigKey(key.to_string()));
        }
        let entry = ConfigEntry {
            key: key.to_string(),
            value,
            value_type,
            description,
            updated_by,
            updated_at: Utc::now(),
        };
        entries.insert(key.to_string(), entry.clone());
        info!(key, kind = value_type.as_str(), "configuration created");
        Ok(entry)
    }

    /// Replace the value of an existing key. The type is fixed at creation.
    pub fn update(
        &self,
        key: &str,
        value: Value,
        description: Option<String>,
        updated_by: Option<AccountId>,
    ) -> Result<ConfigEntry> {
        let mut entries = self.entries.write();
        let entry = entries
            .get_mut(key)
            .ok_or_else(|| TallymartError::ConfigKeyNotFound(key.to_string()))?;
        if !entry.value_type.accepts(&value) {
            return Err(type_mismatch(entry.value_type));
        }
        entry.value = value;
        if description.is_some() {
            entry.description = description;
        }
        if updated_by.is_some() {
            entry.updated_by = updated_by;
        }
        entry.updated_at = Utc::now();
        info!(key, ?updated_by, "configuration updated");
        Ok(entry.clone())
    }

    /// Restore a key to its seeded default.
    pub fn reset(&self, key: &str, updated_by: Option<AccountId>) -> Result<ConfigEntry> {
        let (_, value, value_type, description) = defaults()
            .into_iter()
            .find(|(k, ..)| *k == key)
            .ok_or_else(|| TallymartError::ConfigKeyNotFound(key.to_string()))?;

        let mut entries = self.entries.write();
        let entry = ConfigEntry {
            key: key.to_string(),
            value,
            value_type,
            description: Some(description.to_string()),
            updated_by,
            updated_at: Utc::now(),
        };
        entries.insert(key.to_string(), entry.clone());
        info!(key, "configuration reset to default");
        Ok(entry)
    }

    pub fn delete(&self, key: &str) -> Result<ConfigEntry> {
        let removed = self
            .entries
            .write()
            .remove(key)
            .ok_or_else(|| TallymartError::ConfigKeyNotFound(key.to_string()))?;
        info!(key, "configuration deleted");
        Ok(removed)
    }

    /// All entries ordered by key.
    #[must_use]
    pub fn list(&self) -> Vec<ConfigEntry> {
        self.entries.read().values().cloned().collect()
    }

    /// Entries grouped by the key segment before the first `_`.
    #[must_use]
    pub fn categories(&self) -> BTreeMap<String, Vec<ConfigEntry>> {
        let mut grouped: BTreeMap<String, Vec<ConfigEntry>> = BTreeMap::new();
        for entry in self.entries.read().values() {
            let prefix = entry.key.split('_').next().unwrap_or_default();
            grouped.entry(prefix.to_string()).or_default().push(entry.clone());
        }
        grouped
    }
}
