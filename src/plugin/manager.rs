use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Result;
use tokio::sync::broadcast;

use crate::error::Result as PluginResult;
use crate::model::config::RuntimeConfig;
use crate::model::record::{PluginId, PluginRecord};
use crate::plugin::discovery::{DiscoveryManager, PluginState};
use crate::plugin::events::{EventBus, PluginEvent};
use crate::plugin::extension_registry::{ExtensionRegistry, ExtensionTable};
use crate::plugin::lifecycle::{LifecycleManager, LoadedPlugin, PluginStatus};
use crate::plugin::loader::{Component, ModuleLoader};
use crate::plugin::manifest::{Extension, ExtensionPointType};
use crate::plugin::registry::{RegistryClient, RegistryService};
use crate::plugin::source::{ArtifactSource, DirArtifactSource, PluginPaths};

/// Entry point for hosts: owns discovery, lifecycle, extension points and
/// the event bus, built from one [`RuntimeConfig`].
pub struct PluginManager {
    config: RuntimeConfig,
    discovery: Arc<DiscoveryManager>,
    lifecycle: LifecycleManager,
    initialized: AtomicBool,
}

impl PluginManager {
    /// Picks the artifact source and, when an endpoint is configured, the
    /// GraphQL registry from `config`.
    pub fn from_config(config: RuntimeConfig, modules: Arc<dyn ModuleLoader>) -> Result<Self> {
        let source = artifact_source(&config)?;
        let manager = Self::with_source(config, source, modules);

        if let Some(endpoint) = manager.config.registry.endpoint.as_deref() {
            if let Some(service) = registry_service(endpoint) {
                tracing::info!("using plugin registry at {endpoint}");
                manager.set_registry_service(service);
            }
        }

        Ok(manager)
    }

    pub fn with_source(
        config: RuntimeConfig,
        source: Arc<dyn ArtifactSource>,
        modules: Arc<dyn ModuleLoader>,
    ) -> Self {
        let paths = PluginPaths::from_config(&config.plugins);
        let discovery = Arc::new(DiscoveryManager::new(source, modules).with_paths(paths));
        let lifecycle = LifecycleManager::new(
            discovery.clone(),
            Arc::new(ExtensionRegistry::new()),
            EventBus::new(),
        );

        Self {
            config,
            discovery,
            lifecycle,
            initialized: AtomicBool::new(false),
        }
    }

    pub fn set_registry_service(&self, service: Arc<dyn RegistryService>) {
        self.discovery
            .set_registry_client(RegistryClient::new(service));
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    /// Loads every installed plugin once. Individual load failures are
    /// recorded against the plugin and do not stop the others.
    pub async fn initialize(&self) {
        if self.is_initialized() {
            tracing::warn!("plugin system already initialized");
            return;
        }

        let discovered = self.refresh_discovery().await;
        tracing::info!("discovered {} installed plugins", discovered.len());

        for plugin_id in &discovered {
            if let Err(err) = self.lifecycle.load_plugin(plugin_id).await {
                tracing::warn!("skipping plugin {plugin_id}: {err}");
            }
        }

        self.initialized.store(true, Ordering::Release);
        tracing::info!("{}", self.summary_notification());
    }

    pub async fn refresh_discovery(&self) -> Vec<PluginId> {
        self.discovery.load_plugin_index_from_registry().await;
        self.discovery.discover_plugins().await
    }

    pub async fn install_plugin(&self, plugin_id: &PluginId) -> PluginResult<()> {
        self.lifecycle.load_plugin(plugin_id).await
    }

    pub async fn uninstall_plugin(&self, plugin_id: &PluginId) -> PluginResult<()> {
        self.lifecycle.unload_plugin(plugin_id).await
    }

    pub async fn activate_plugin(&self, plugin_id: &PluginId) -> PluginResult<()> {
        self.lifecycle.set_status(plugin_id, PluginState::Active).await
    }

    pub async fn deactivate_plugin(&self, plugin_id: &PluginId) -> PluginResult<()> {
        self.lifecycle
            .set_status(plugin_id, PluginState::Inactive)
            .await
    }

    /// `status` is `"active"` or `"inactive"`.
    pub async fn set_status(&self, plugin_id: &PluginId, status: &str) -> PluginResult<()> {
        let state: PluginState = status.parse()?;
        self.lifecycle.set_status(plugin_id, state).await
    }

    pub fn loaded_plugins(&self) -> Vec<LoadedPlugin> {
        self.lifecycle.loaded_plugins()
    }

    pub fn loaded_plugin(&self, plugin_id: &PluginId) -> Option<LoadedPlugin> {
        self.lifecycle.loaded_plugin(plugin_id)
    }

    pub fn component(&self, plugin_id: &PluginId, name: &str) -> Option<Component> {
        self.lifecycle.component(plugin_id, name)
    }

    pub fn plugin_count(&self) -> usize {
        self.lifecycle.plugin_count()
    }

    pub fn active_plugin_count(&self) -> usize {
        self.lifecycle.active_plugin_count()
    }

    pub fn error_count(&self) -> usize {
        self.lifecycle.error_count()
    }

    pub fn plugin_index(&self) -> Vec<PluginRecord> {
        self.discovery.plugin_index()
    }

    pub fn is_activated(&self, plugin_id: &PluginId) -> bool {
        self.discovery.is_activated(plugin_id)
    }

    pub fn is_installed(&self, plugin_id: &PluginId) -> bool {
        self.discovery.is_installed(plugin_id)
    }

    pub fn extension_points(
        &self,
        kind: ExtensionPointType,
        user_permissions: &[String],
        is_admin: bool,
    ) -> Vec<Extension> {
        self.lifecycle
            .extensions()
            .visible_extension_points(kind, user_permissions, is_admin)
    }

    pub fn all_extension_points(&self) -> ExtensionTable {
        self.lifecycle.extensions().snapshot()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PluginEvent> {
        self.lifecycle.events().subscribe()
    }

    pub fn startup_notifications(&self) -> Vec<String> {
        if self.plugin_count() == 0 {
            return Vec::new();
        }

        let mut notices = vec![self.summary_notification()];
        notices.extend(self.error_notifications());
        notices
    }

    pub fn summary_notification(&self) -> String {
        format!(
            "plugins: {} loaded, {} active, {} errors",
            self.plugin_count(),
            self.active_plugin_count(),
            self.error_count()
        )
    }

    pub fn error_notifications(&self) -> Vec<String> {
        self.loaded_plugins()
            .into_iter()
            .filter_map(|plugin| {
                if let PluginStatus::Error(err) = &plugin.status {
                    Some(format!("plugin {}: {err}", plugin.id))
                } else {
                    None
                }
            })
            .collect()
    }

    pub fn list_notifications(&self) -> Vec<String> {
        let plugins = self.loaded_plugins();
        if plugins.is_empty() {
            return vec!["plugins: none loaded".to_string()];
        }

        let mut rows: Vec<String> = plugins
            .iter()
            .map(|plugin| {
                format!(
                    "plugin {} [{}] ({})",
                    plugin.display_name(),
                    plugin.status.label(),
                    plugin.id
                )
            })
            .collect();

        rows.sort();
        rows
    }
}

impl std::fmt::Debug for PluginManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginManager")
            .field("initialized", &self.is_initialized())
            .field("discovery", &self.discovery)
            .field("lifecycle", &self.lifecycle)
            .finish()
    }
}

fn artifact_source(config: &RuntimeConfig) -> Result<Arc<dyn ArtifactSource>> {
    let root = config.plugins.artifact_root.as_str();
    if config.artifact_root_is_url() {
        http_source(root)
    } else {
        Ok(Arc::new(DirArtifactSource::new(root)))
    }
}

#[cfg(feature = "http")]
fn http_source(root: &str) -> Result<Arc<dyn ArtifactSource>> {
    Ok(Arc::new(crate::plugin::source::HttpArtifactSource::new(root)))
}

#[cfg(not(feature = "http"))]
fn http_source(root: &str) -> Result<Arc<dyn ArtifactSource>> {
    anyhow::bail!("artifact root {root} is a URL but the `http` feature is disabled")
}

#[cfg(feature = "http")]
fn registry_service(endpoint: &str) -> Option<Arc<dyn RegistryService>> {
    Some(Arc::new(crate::plugin::graphql::GraphqlRegistry::new(endpoint)))
}

#[cfg(not(feature = "http"))]
fn registry_service(endpoint: &str) -> Option<Arc<dyn RegistryService>> {
    tracing::warn!("ignoring registry endpoint {endpoint}: the `http` feature is disabled");
    None
}
