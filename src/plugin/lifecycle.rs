use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::error::{Error, Result};
use crate::model::record::PluginId;
use crate::plugin::discovery::{DiscoveryManager, PluginState};
use crate::plugin::events::{EventBus, PluginEvent};
use crate::plugin::extension_registry::ExtensionRegistry;
use crate::plugin::loader::{Component, ComponentMap};
use crate::plugin::manifest::PluginManifest;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PluginStatus {
    Active,
    Inactive,
    Error(String),
}

impl PluginStatus {
    pub fn label(&self) -> String {
        match self {
            Self::Active => "active".to_string(),
            Self::Inactive => "inactive".to_string(),
            Self::Error(err) => format!("error: {err}"),
        }
    }
}

impl From<PluginState> for PluginStatus {
    fn from(state: PluginState) -> Self {
        match state {
            PluginState::Active => Self::Active,
            PluginState::Inactive => Self::Inactive,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoadedPlugin {
    pub id: PluginId,
    pub manifest: Option<PluginManifest>,
    pub components: ComponentMap,
    pub status: PluginStatus,
}

impl LoadedPlugin {
    fn failed(id: PluginId, message: String) -> Self {
        Self {
            id,
            manifest: None,
            components: ComponentMap::new(),
            status: PluginStatus::Error(message),
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self.status, PluginStatus::Active)
    }

    pub fn display_name(&self) -> String {
        self.manifest
            .as_ref()
            .map(|manifest| manifest.name.clone())
            .unwrap_or_else(|| self.id.to_string())
    }
}

/// Loads, unloads and toggles plugins, keeping the extension registry and
/// the remote registry in step with local state.
pub struct LifecycleManager {
    discovery: Arc<DiscoveryManager>,
    extensions: Arc<ExtensionRegistry>,
    events: EventBus,
    plugins: RwLock<HashMap<PluginId, LoadedPlugin>>,
}

fn ensure_plugin_id(plugin_id: &PluginId) -> Result<()> {
    if plugin_id.is_blank() {
        return Err(Error::InvalidPluginId(plugin_id.to_string()));
    }
    Ok(())
}

impl LifecycleManager {
    pub fn new(
        discovery: Arc<DiscoveryManager>,
        extensions: Arc<ExtensionRegistry>,
        events: EventBus,
    ) -> Self {
        Self {
            discovery,
            extensions,
            events,
            plugins: RwLock::new(HashMap::new()),
        }
    }

    pub async fn load_plugin(&self, plugin_id: &PluginId) -> Result<()> {
        ensure_plugin_id(plugin_id)?;

        let loaded = match self.load_artifacts(plugin_id).await {
            Ok(loaded) => loaded,
            Err(err) => {
                let message = err.to_string();
                tracing::error!("failed to load plugin {plugin_id}: {message}");
                self.insert(LoadedPlugin::failed(plugin_id.clone(), message.clone()));
                self.events.emit(PluginEvent::Error {
                    plugin_id: plugin_id.clone(),
                    message,
                });
                return Err(err);
            }
        };

        self.discovery.sync_with_registry(plugin_id).await;

        let state = if self.discovery.is_activated(plugin_id) {
            PluginState::Active
        } else {
            PluginState::Inactive
        };
        if state.is_active() {
            self.extensions
                .register_extension_points(plugin_id.as_str(), &loaded.0);
        }

        self.insert(LoadedPlugin {
            id: plugin_id.clone(),
            manifest: Some(loaded.0),
            components: loaded.1,
            status: state.into(),
        });
        tracing::info!(plugin = %plugin_id, status = state.as_str(), "plugin loaded");
        self.events.emit(PluginEvent::Loaded(plugin_id.clone()));
        Ok(())
    }

    async fn load_artifacts(&self, plugin_id: &PluginId) -> Result<(PluginManifest, ComponentMap)> {
        let manifest = self.discovery.load_manifest(plugin_id).await?;
        let components = self.discovery.load_components(plugin_id, &manifest).await?;
        Ok((manifest, components))
    }

    pub async fn unload_plugin(&self, plugin_id: &PluginId) -> Result<()> {
        ensure_plugin_id(plugin_id)?;
        if !self.is_loaded(plugin_id) {
            return Err(Error::NotLoaded(plugin_id.clone()));
        }

        self.extensions.unregister_extension_points(plugin_id.as_str());
        self.discovery.remove_from_registry(plugin_id).await;
        self.discovery.delete_artifacts(plugin_id).await;

        self.plugins
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(plugin_id);
        tracing::info!(plugin = %plugin_id, "plugin unloaded");
        self.events.emit(PluginEvent::Unloaded(plugin_id.clone()));
        Ok(())
    }

    pub async fn set_status(&self, plugin_id: &PluginId, state: PluginState) -> Result<()> {
        ensure_plugin_id(plugin_id)?;
        if !self.is_loaded(plugin_id) {
            return Err(Error::NotLoaded(plugin_id.clone()));
        }

        self.discovery.update_status(plugin_id, state).await;

        let manifest = {
            let mut plugins = self.plugins.write().unwrap_or_else(|e| e.into_inner());
            let Some(plugin) = plugins.get_mut(plugin_id) else {
                return Err(Error::NotLoaded(plugin_id.clone()));
            };
            plugin.status = state.into();
            plugin.manifest.clone()
        };

        match (state, manifest) {
            (PluginState::Active, Some(manifest)) => self
                .extensions
                .register_extension_points(plugin_id.as_str(), &manifest),
            (PluginState::Active, None) => {}
            (PluginState::Inactive, _) => self
                .extensions
                .unregister_extension_points(plugin_id.as_str()),
        }

        tracing::info!(plugin = %plugin_id, status = state.as_str(), "plugin status changed");
        self.events.emit(PluginEvent::StatusChanged {
            plugin_id: plugin_id.clone(),
            state,
        });
        Ok(())
    }

    pub fn loaded_plugins(&self) -> Vec<LoadedPlugin> {
        let plugins = self.plugins.read().unwrap_or_else(|e| e.into_inner());
        let mut loaded: Vec<_> = plugins.values().cloned().collect();
        loaded.sort_by(|a, b| a.id.cmp(&b.id));
        loaded
    }

    pub fn loaded_plugin(&self, plugin_id: &PluginId) -> Option<LoadedPlugin> {
        let plugins = self.plugins.read().unwrap_or_else(|e| e.into_inner());
        plugins.get(plugin_id).cloned()
    }

    pub fn is_loaded(&self, plugin_id: &PluginId) -> bool {
        let plugins = self.plugins.read().unwrap_or_else(|e| e.into_inner());
        plugins.contains_key(plugin_id)
    }

    /// Looks up an export of an active plugin.
    pub fn component(&self, plugin_id: &PluginId, name: &str) -> Option<Component> {
        if plugin_id.is_blank() || name.trim().is_empty() {
            return None;
        }
        let plugins = self.plugins.read().unwrap_or_else(|e| e.into_inner());
        plugins
            .get(plugin_id)
            .filter(|plugin| plugin.is_active())
            .and_then(|plugin| plugin.components.get(name).cloned())
    }

    pub fn plugin_count(&self) -> usize {
        self.plugins.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn active_plugin_count(&self) -> usize {
        let plugins = self.plugins.read().unwrap_or_else(|e| e.into_inner());
        plugins.values().filter(|plugin| plugin.is_active()).count()
    }

    pub fn error_count(&self) -> usize {
        let plugins = self.plugins.read().unwrap_or_else(|e| e.into_inner());
        plugins
            .values()
            .filter(|plugin| matches!(plugin.status, PluginStatus::Error(_)))
            .count()
    }

    pub fn discovery(&self) -> &Arc<DiscoveryManager> {
        &self.discovery
    }

    pub fn extensions(&self) -> &Arc<ExtensionRegistry> {
        &self.extensions
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    fn insert(&self, plugin: LoadedPlugin) {
        let mut plugins = self.plugins.write().unwrap_or_else(|e| e.into_inner());
        plugins.insert(plugin.id.clone(), plugin);
    }
}

impl std::fmt::Debug for LifecycleManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleManager")
            .field("plugins", &self.plugin_count())
            .field("active", &self.active_plugin_count())
            .finish_non_exhaustive()
    }
}
