//! Runtime for admin-console plugins: discovers installed plugins from a
//! remote registry, validates their manifests, loads their code modules and
//! exposes their contributions through named extension points.

pub mod error;
pub mod logging;
pub mod model;
pub mod plugin;

pub use error::{Error, RegistryError, Result, TransportError};
pub use model::config::RuntimeConfig;
pub use model::record::{PluginId, PluginRecord, RecordId};
pub use plugin::PluginManager;
