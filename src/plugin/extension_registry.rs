use std::collections::BTreeMap;
use std::sync::RwLock;

use crate::plugin::extension::{filter_by_permissions, sort_drawer_items};
use crate::plugin::manifest::{Extension, ExtensionPointType, PluginManifest};

/// Every extension point with its registered entries. All points are
/// present, possibly empty.
pub type ExtensionTable = BTreeMap<ExtensionPointType, Vec<Extension>>;

/// Contributions of active plugins, grouped by extension point.
#[derive(Debug)]
pub struct ExtensionRegistry {
    table: RwLock<ExtensionTable>,
}

impl Default for ExtensionRegistry {
    fn default() -> Self {
        Self {
            table: RwLock::new(empty_table()),
        }
    }
}

fn empty_table() -> ExtensionTable {
    ExtensionPointType::ALL
        .into_iter()
        .map(|kind| (kind, Vec::new()))
        .collect()
}

impl ExtensionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces whatever `plugin_id` registered before with the manifest's
    /// declared entries.
    pub fn register_extension_points(&self, plugin_id: &str, manifest: &PluginManifest) {
        let mut table = self.table.write().unwrap_or_else(|e| e.into_inner());
        remove_plugin(&mut table, plugin_id);

        let Some(points) = manifest.extension_points.as_ref() else {
            return;
        };

        let mut added = 0usize;
        for (kind, extension) in points.entries() {
            table
                .entry(kind)
                .or_default()
                .push(extension.with_plugin_id(plugin_id));
            added += 1;
        }
        tracing::debug!(plugin = plugin_id, added, "registered extension points");
    }

    pub fn unregister_extension_points(&self, plugin_id: &str) {
        let mut table = self.table.write().unwrap_or_else(|e| e.into_inner());
        remove_plugin(&mut table, plugin_id);
    }

    pub fn extension_points(&self, kind: ExtensionPointType) -> Vec<Extension> {
        let table = self.table.read().unwrap_or_else(|e| e.into_inner());
        table.get(&kind).cloned().unwrap_or_default()
    }

    pub fn snapshot(&self) -> ExtensionTable {
        self.table.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Entries the caller may see; drawer points come back in display order.
    pub fn visible_extension_points(
        &self,
        kind: ExtensionPointType,
        user_permissions: &[String],
        is_admin: bool,
    ) -> Vec<Extension> {
        let visible = filter_by_permissions(self.extension_points(kind), user_permissions, is_admin);
        if !kind.is_drawer() {
            return visible;
        }

        let items = visible
            .into_iter()
            .filter_map(|extension| match extension {
                Extension::Drawer(item) => Some(item),
                _ => None,
            })
            .collect();
        sort_drawer_items(items)
            .into_iter()
            .map(Extension::Drawer)
            .collect()
    }
}

fn remove_plugin(table: &mut ExtensionTable, plugin_id: &str) {
    for entries in table.values_mut() {
        entries.retain(|extension| extension.plugin_id() != plugin_id);
    }
}
