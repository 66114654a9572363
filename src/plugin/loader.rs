//! Plugin code modules.
//!
//! Nothing is resolved from disk or network at load time. Hosts register a
//! factory per module path up front; loading a plugin looks its normalized
//! `main` up in that table.

use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;

/// Opaque handle to something a plugin exports (a view, a handler, ...).
pub type Component = Arc<dyn Any + Send + Sync>;

/// Exports keyed by name.
pub type ComponentMap = BTreeMap<String, Component>;

type ModuleFactory = Arc<dyn Fn() -> anyhow::Result<PluginModule> + Send + Sync>;

/// What importing a module yields.
#[derive(Clone, Default)]
pub struct PluginModule {
    pub default: Option<Component>,
    pub exports: ComponentMap,
}

impl PluginModule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default(mut self, component: Component) -> Self {
        self.default = Some(component);
        self
    }

    pub fn with_export(mut self, name: impl Into<String>, component: Component) -> Self {
        self.exports.insert(name.into(), component);
        self
    }
}

impl std::fmt::Debug for PluginModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginModule")
            .field("default", &self.default.is_some())
            .field("exports", &self.exports.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[async_trait]
pub trait ModuleLoader: Send + Sync {
    async fn import(&self, module_path: &str) -> anyhow::Result<PluginModule>;
}

/// Pre-registered module table keyed by module path
/// (`<available>/<pluginId>/<normalized main>`).
#[derive(Default)]
pub struct ModuleTable {
    factories: RwLock<HashMap<String, ModuleFactory>>,
}

impl ModuleTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&self, module_path: impl Into<String>, factory: F)
    where
        F: Fn() -> anyhow::Result<PluginModule> + Send + Sync + 'static,
    {
        let mut factories = self.factories.write().unwrap_or_else(|e| e.into_inner());
        factories.insert(module_path.into(), Arc::new(factory));
    }

    pub fn unregister(&self, module_path: &str) -> bool {
        let mut factories = self.factories.write().unwrap_or_else(|e| e.into_inner());
        factories.remove(module_path).is_some()
    }

    pub fn contains(&self, module_path: &str) -> bool {
        let factories = self.factories.read().unwrap_or_else(|e| e.into_inner());
        factories.contains_key(module_path)
    }

    pub fn len(&self) -> usize {
        let factories = self.factories.read().unwrap_or_else(|e| e.into_inner());
        factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for ModuleTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let factories = self.factories.read().unwrap_or_else(|e| e.into_inner());
        let mut keys: Vec<_> = factories.keys().collect();
        keys.sort();
        f.debug_struct("ModuleTable").field("modules", &keys).finish()
    }
}

#[async_trait]
impl ModuleLoader for ModuleTable {
    async fn import(&self, module_path: &str) -> anyhow::Result<PluginModule> {
        let factory = {
            let factories = self.factories.read().unwrap_or_else(|e| e.into_inner());
            factories.get(module_path).cloned()
        };

        let Some(factory) = factory else {
            anyhow::bail!("no module registered at {module_path}");
        };

        factory()
    }
}
