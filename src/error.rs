use thiserror::Error;

use crate::model::record::PluginId;

/// Failure below the manifest/registry layer: the request never produced a
/// usable response.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[cfg(feature = "http")]
    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error("{0}")]
    Message(String),
}

impl TransportError {
    #[must_use]
    pub fn message(message: impl Into<String>) -> Self {
        Self::Message(message.into())
    }
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("registry returned errors: {}", .0.join("; "))]
    Graphql(Vec<String>),

    #[error("{0}")]
    Message(String),
}

impl RegistryError {
    #[must_use]
    pub fn message(message: impl Into<String>) -> Self {
        Self::Message(message.into())
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("HTTP {status}: Failed to load manifest for plugin {plugin_id}")]
    ManifestStatus { status: u16, plugin_id: PluginId },

    #[error("Invalid plugin manifest for plugin {plugin_id}")]
    InvalidManifest { plugin_id: PluginId },

    #[error("Network error loading manifest for plugin {plugin_id}: {source}")]
    Network {
        plugin_id: PluginId,
        #[source]
        source: TransportError,
    },

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("Component loading failed for plugin {plugin_id}: {message}")]
    ComponentLoad { plugin_id: PluginId, message: String },

    #[error("invalid plugin id: {0:?}")]
    InvalidPluginId(String),

    #[error("invalid status {0:?}: must be \"active\" or \"inactive\"")]
    InvalidStatus(String),

    #[error("plugin {0} is not loaded")]
    NotLoaded(PluginId),
}

impl Error {
    #[must_use]
    pub fn component_load(plugin_id: &PluginId, source: &(dyn std::fmt::Display)) -> Self {
        let message = source.to_string();
        let message = if message.trim().is_empty() {
            "Unknown error".to_string()
        } else {
            message
        };
        Self::ComponentLoad {
            plugin_id: plugin_id.clone(),
            message,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
