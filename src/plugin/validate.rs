//! Shape checks for untrusted manifest documents.
//!
//! [`validate`] is a pure predicate over an already-parsed JSON value.
//! [`parse_manifest`] is the only way a typed [`PluginManifest`] is built.

use serde_json::Value;

use crate::error::{Error, Result};
use crate::model::record::PluginId;
use crate::plugin::manifest::{PluginManifest, order_from_json};

const REQUIRED_FIELDS: [&str; 6] = ["name", "pluginId", "version", "description", "author", "main"];
const ROUTE_FIELDS: [&str; 3] = ["pluginId", "path", "component"];
const DRAWER_FIELDS: [&str; 3] = ["pluginId", "label", "path"];

/// Role-scoped slots only need what their entry type cannot default.
const SLOT_FIELDS: [(&str, &[&str]); 12] = [
    ("RA1", &["path", "component"]),
    ("RA2", &["path", "component"]),
    ("RU1", &["path", "component"]),
    ("RU2", &["path", "component"]),
    ("DA1", &["label", "path"]),
    ("DA2", &["label", "path"]),
    ("DU1", &["label", "path"]),
    ("DU2", &["label", "path"]),
    ("G1", &["injector"]),
    ("G2", &["injector"]),
    ("G3", &["injector"]),
    ("G4", &["injector"]),
];

pub fn validate(candidate: &Value) -> bool {
    let Some(manifest) = candidate.as_object() else {
        return false;
    };

    let has_required = REQUIRED_FIELDS
        .iter()
        .all(|field| manifest.get(*field).is_some_and(Value::is_string));
    if !has_required {
        return false;
    }

    match manifest.get("extensionPoints") {
        None | Some(Value::Null) => true,
        Some(Value::Object(points)) => {
            entries_valid(points.get("routes"), &ROUTE_FIELDS)
                && entries_valid(points.get("drawer"), &DRAWER_FIELDS)
                && SLOT_FIELDS
                    .iter()
                    .all(|(slot, fields)| entries_valid(points.get(*slot), fields))
        }
        Some(_) => false,
    }
}

/// Validates `value` and converts it into a typed manifest. Any shape the
/// typed manifest cannot hold is an invalid manifest, never a JSON error.
pub fn parse_manifest(plugin_id: &PluginId, value: Value) -> Result<PluginManifest> {
    let invalid = || Error::InvalidManifest {
        plugin_id: plugin_id.clone(),
    };

    if !validate(&value) {
        return Err(invalid());
    }

    serde_json::from_value(value).map_err(|err| {
        tracing::warn!("manifest for plugin {plugin_id} has an unusable field: {err}");
        invalid()
    })
}

fn entries_valid(list: Option<&Value>, fields: &[&str]) -> bool {
    match list {
        None | Some(Value::Null) => true,
        Some(Value::Array(entries)) => entries.iter().all(|entry| entry_valid(entry, fields)),
        Some(_) => false,
    }
}

fn entry_valid(entry: &Value, fields: &[&str]) -> bool {
    let has_fields = fields
        .iter()
        .all(|field| entry.get(*field).is_some_and(non_empty_string));
    let order_ok = entry
        .get("order")
        .is_none_or(|order| order_from_json(order).is_ok());
    has_fields && order_ok
}

fn non_empty_string(value: &Value) -> bool {
    value.as_str().is_some_and(|s| !s.is_empty())
}
