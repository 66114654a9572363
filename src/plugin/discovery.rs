use std::collections::HashSet;
use std::sync::{Arc, RwLock};

use crate::error::{Error, Result};
use crate::model::record::{PluginId, PluginRecord, UpdatePlugin};
use crate::plugin::loader::{ComponentMap, ModuleLoader};
use crate::plugin::manifest::PluginManifest;
use crate::plugin::registry::RegistryClient;
use crate::plugin::source::{ArtifactSource, PluginPaths};
use crate::plugin::validate::parse_manifest;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PluginState {
    Active,
    Inactive,
}

impl PluginState {
    pub fn is_active(self) -> bool {
        matches!(self, Self::Active)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
        }
    }
}

impl std::str::FromStr for PluginState {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        match value {
            "active" => Ok(Self::Active),
            "inactive" => Ok(Self::Inactive),
            other => Err(Error::InvalidStatus(other.to_string())),
        }
    }
}

/// Mirrors the registry's plugin records locally and loads plugin artifacts.
///
/// The index is replaced wholesale after every registry round trip; readers
/// get clones and never block on in-flight async work.
pub struct DiscoveryManager {
    index: RwLock<Vec<PluginRecord>>,
    registry: RwLock<Option<RegistryClient>>,
    source: Arc<dyn ArtifactSource>,
    loader: Arc<dyn ModuleLoader>,
    paths: PluginPaths,
}

impl DiscoveryManager {
    pub fn new(source: Arc<dyn ArtifactSource>, loader: Arc<dyn ModuleLoader>) -> Self {
        Self {
            index: RwLock::new(Vec::new()),
            registry: RwLock::new(None),
            source,
            loader,
            paths: PluginPaths::default(),
        }
    }

    pub fn with_paths(mut self, paths: PluginPaths) -> Self {
        self.paths = paths;
        self
    }

    pub fn with_registry_client(self, client: RegistryClient) -> Self {
        self.set_registry_client(client);
        self
    }

    pub fn set_registry_client(&self, client: RegistryClient) {
        let mut registry = self.registry.write().unwrap_or_else(|e| e.into_inner());
        *registry = Some(client);
    }

    pub fn paths(&self) -> &PluginPaths {
        &self.paths
    }

    pub fn plugin_index(&self) -> Vec<PluginRecord> {
        self.index.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn set_plugin_index(&self, records: Vec<PluginRecord>) {
        let mut index = self.index.write().unwrap_or_else(|e| e.into_inner());
        *index = records;
    }

    pub fn find_in_index(&self, plugin_id: &PluginId) -> Option<PluginRecord> {
        let index = self.index.read().unwrap_or_else(|e| e.into_inner());
        index.iter().find(|r| &r.plugin_id == plugin_id).cloned()
    }

    pub fn is_activated(&self, plugin_id: &PluginId) -> bool {
        self.find_in_index(plugin_id)
            .is_some_and(|record| record.is_activated)
    }

    pub fn is_installed(&self, plugin_id: &PluginId) -> bool {
        self.find_in_index(plugin_id)
            .is_some_and(|record| record.is_installed)
    }

    fn registry(&self) -> Option<RegistryClient> {
        self.registry
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Installed plugin ids, each reported once. Never fails: a missing or
    /// failing registry yields an empty list.
    pub async fn discover_plugins(&self) -> Vec<PluginId> {
        let Some(registry) = self.registry() else {
            tracing::warn!("no registry client available for plugin discovery");
            return Vec::new();
        };

        let records = match registry.list_all().await {
            Ok(records) => records,
            Err(err) => {
                tracing::error!("registry discovery failed: {err}");
                return Vec::new();
            }
        };

        self.set_plugin_index(records.clone());

        let mut seen = HashSet::new();
        records
            .into_iter()
            .filter(|record| record.is_installed)
            .map(|record| record.plugin_id)
            .filter(|plugin_id| seen.insert(plugin_id.clone()))
            .collect()
    }

    /// Resyncs the index without discovery filtering.
    pub async fn load_plugin_index_from_registry(&self) {
        let Some(registry) = self.registry() else {
            return;
        };

        match registry.list_all().await {
            Ok(records) => self.set_plugin_index(records),
            Err(err) => tracing::error!("failed to load plugin index from registry: {err}"),
        }
    }

    pub async fn load_manifest(&self, plugin_id: &PluginId) -> Result<PluginManifest> {
        let path = self.paths.manifest(plugin_id);
        let response = self
            .source
            .get(&path)
            .await
            .map_err(|source| Error::Network {
                plugin_id: plugin_id.clone(),
                source,
            })?;

        if !response.is_success() {
            return Err(Error::ManifestStatus {
                status: response.status,
                plugin_id: plugin_id.clone(),
            });
        }

        let document: serde_json::Value = serde_json::from_slice(&response.body)?;
        parse_manifest(plugin_id, document)
    }

    /// Imports the plugin's entry module. A default export is also exposed
    /// under `"default"` and under the plugin id.
    pub async fn load_components(
        &self,
        plugin_id: &PluginId,
        manifest: &PluginManifest,
    ) -> Result<ComponentMap> {
        let module_path = self.paths.module(plugin_id, &manifest.main);
        tracing::debug!(plugin = %plugin_id, module = %module_path, "loading plugin module");

        let module = match self.loader.import(&module_path).await {
            Ok(module) => module,
            Err(err) => {
                tracing::error!("failed to load components for plugin {plugin_id}: {err}");
                return Err(Error::component_load(plugin_id, &err));
            }
        };

        let mut components = module.exports;
        if let Some(default) = module.default {
            components.insert("default".to_string(), default.clone());
            components.insert(plugin_id.to_string(), default);
        }
        Ok(components)
    }

    /// Creates a registry record for a plugin that has none. Best effort.
    pub async fn sync_with_registry(&self, plugin_id: &PluginId) {
        if self.find_in_index(plugin_id).is_some() {
            return;
        }
        let Some(registry) = self.registry() else {
            return;
        };

        match registry.create(plugin_id).await {
            Ok(_) => self.load_plugin_index_from_registry().await,
            Err(err) => tracing::warn!("failed to sync plugin {plugin_id} with registry: {err}"),
        }
    }

    /// Deletes the plugin's record; on failure drops it from the local index
    /// anyway.
    pub async fn remove_from_registry(&self, plugin_id: &PluginId) {
        let Some(record) = self.find_in_index(plugin_id) else {
            return;
        };
        let Some(registry) = self.registry() else {
            return;
        };

        match registry.delete(&record.id).await {
            Ok(_) => self.load_plugin_index_from_registry().await,
            Err(err) => {
                tracing::warn!("failed to delete plugin {plugin_id} via registry: {err}");
                let mut index = self.index.write().unwrap_or_else(|e| e.into_inner());
                index.retain(|r| &r.plugin_id != plugin_id);
            }
        }
    }

    pub async fn update_status(&self, plugin_id: &PluginId, state: PluginState) {
        let Some(registry) = self.registry() else {
            return;
        };
        let activated = state.is_active();

        let record_id = match self.find_in_index(plugin_id) {
            Some(record) => Some(record.id),
            None => match registry.create(plugin_id).await {
                Ok(Some(created)) => Some(created.id),
                Ok(None) => None,
                Err(err) => {
                    tracing::warn!("failed to create registry record for {plugin_id}: {err}");
                    None
                }
            },
        };

        if let Some(id) = record_id {
            let update = UpdatePlugin::activation(id, activated);
            if let Err(err) = registry.update(&update).await {
                tracing::warn!("failed to set plugin {plugin_id} {}: {err}", state.as_str());
            }
        }

        self.load_plugin_index_from_registry().await;
    }

    /// Deletes the plugin's published artifact directory. Failures are
    /// reported, not raised.
    pub async fn delete_artifacts(&self, plugin_id: &PluginId) -> bool {
        let path = self.paths.plugin_dir(plugin_id);
        match self.source.delete(&path).await {
            Ok(response) if response.is_success() => true,
            Ok(response) => {
                tracing::warn!("plugin directory deletion returned HTTP {}", response.status);
                false
            }
            Err(err) => {
                tracing::warn!("could not delete plugin directory for {plugin_id}: {err}");
                false
            }
        }
    }
}

impl std::fmt::Debug for DiscoveryManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscoveryManager")
            .field("index", &self.plugin_index())
            .field("has_registry", &self.registry().is_some())
            .field("paths", &self.paths)
            .finish()
    }
}
