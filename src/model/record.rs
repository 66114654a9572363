use std::fmt;

use serde::{Deserialize, Serialize};

/// Developer-chosen plugin identifier. Locates the manifest and the code
/// module, and is what every index lookup keys on.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PluginId(pub String);

impl PluginId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Blank ids are rejected by every mutating lifecycle operation.
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for PluginId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PluginId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for PluginId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Opaque identifier assigned by the registry. Only deletes and updates use it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub String);

impl RecordId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Registry-side lifecycle state for one plugin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginRecord {
    pub id: RecordId,
    pub plugin_id: PluginId,
    #[serde(default)]
    pub is_activated: bool,
    #[serde(default)]
    pub is_installed: bool,
    #[serde(default)]
    pub backup: bool,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

/// Mutable fields of a record; `None` leaves the field untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePlugin {
    pub id: RecordId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_activated: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_installed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backup: Option<bool>,
}

impl UpdatePlugin {
    pub fn activation(id: RecordId, is_activated: bool) -> Self {
        Self {
            id,
            is_activated: Some(is_activated),
            is_installed: None,
            backup: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletedPlugin {
    pub id: RecordId,
    pub plugin_id: PluginId,
}
