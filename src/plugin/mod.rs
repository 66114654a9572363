pub mod discovery;
pub mod events;
pub mod extension;
pub mod extension_registry;
#[cfg(feature = "http")]
pub mod graphql;
pub mod lifecycle;
pub mod loader;
pub mod manager;
pub mod manifest;
pub mod registry;
pub mod source;
pub mod validate;

#[cfg(test)]
pub(crate) mod testing;

pub use discovery::{DiscoveryManager, PluginState};
pub use events::{EventBus, PluginEvent};
pub use extension_registry::ExtensionRegistry;
#[cfg(feature = "http")]
pub use graphql::GraphqlRegistry;
pub use lifecycle::{LifecycleManager, LoadedPlugin, PluginStatus};
pub use loader::{Component, ComponentMap, ModuleLoader, ModuleTable, PluginModule};
pub use manager::PluginManager;
pub use manifest::{Extension, ExtensionPointType, PluginManifest};
pub use registry::{RegistryClient, RegistryService};
pub use source::{ArtifactResponse, ArtifactSource, DirArtifactSource, PluginPaths};
