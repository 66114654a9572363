//! Remote registry of plugin records: the source of truth for installation
//! and activation state.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::RegistryError;
use crate::model::record::{DeletedPlugin, PluginId, PluginRecord, RecordId, UpdatePlugin};

/// Raw operations offered by the remote service. `Ok(None)` means the
/// service answered without a payload.
#[async_trait]
pub trait RegistryService: Send + Sync {
    async fn list_plugins(&self) -> Result<Option<Vec<PluginRecord>>, RegistryError>;

    async fn create_plugin(&self, plugin_id: &PluginId)
    -> Result<Option<PluginRecord>, RegistryError>;

    async fn update_plugin(&self, input: &UpdatePlugin)
    -> Result<Option<PluginRecord>, RegistryError>;

    async fn delete_plugin(&self, id: &RecordId) -> Result<Option<DeletedPlugin>, RegistryError>;

    /// Marks any cached plugin list as stale.
    async fn refetch_plugins(&self) {}
}

/// Facade over a [`RegistryService`]. Absent payloads become defaults,
/// failures are logged here and handed back as `Err` for the caller to
/// choose a fallback.
#[derive(Clone)]
pub struct RegistryClient {
    service: Arc<dyn RegistryService>,
}

impl RegistryClient {
    pub fn new(service: Arc<dyn RegistryService>) -> Self {
        Self { service }
    }

    pub async fn list_all(&self) -> Result<Vec<PluginRecord>, RegistryError> {
        match self.service.list_plugins().await {
            Ok(records) => Ok(records.unwrap_or_default()),
            Err(err) => {
                tracing::error!("failed to fetch plugins: {err}");
                Err(err)
            }
        }
    }

    pub async fn create(&self, plugin_id: &PluginId) -> Result<Option<PluginRecord>, RegistryError> {
        match self.service.create_plugin(plugin_id).await {
            Ok(record) => {
                self.service.refetch_plugins().await;
                Ok(record)
            }
            Err(err) => {
                tracing::error!("failed to create plugin {plugin_id}: {err}");
                Err(err)
            }
        }
    }

    pub async fn update(&self, input: &UpdatePlugin) -> Result<Option<PluginRecord>, RegistryError> {
        match self.service.update_plugin(input).await {
            Ok(record) => {
                self.service.refetch_plugins().await;
                Ok(record)
            }
            Err(err) => {
                tracing::error!("failed to update plugin record {}: {err}", input.id);
                Err(err)
            }
        }
    }

    pub async fn delete(&self, id: &RecordId) -> Result<Option<DeletedPlugin>, RegistryError> {
        match self.service.delete_plugin(id).await {
            Ok(deleted) => {
                self.service.refetch_plugins().await;
                Ok(deleted)
            }
            Err(err) => {
                tracing::error!("failed to delete plugin record {id}: {err}");
                Err(err)
            }
        }
    }
}

impl std::fmt::Debug for RegistryClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryClient").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::testing::{FakeRegistry, record};

    #[tokio::test]
    async fn list_defaults_to_empty_when_payload_missing() {
        let fake = Arc::new(FakeRegistry::default());
        fake.set_list_payload_missing(true);
        let client = RegistryClient::new(fake);
        assert!(client.list_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn list_failures_come_back_as_err() {
        let fake = Arc::new(FakeRegistry::default());
        fake.fail_list(true);
        let client = RegistryClient::new(fake);
        assert!(client.list_all().await.is_err());
    }

    #[tokio::test]
    async fn mutations_request_a_refetch() {
        let fake = Arc::new(FakeRegistry::with_records(vec![record("1", "a", true, true)]));
        let client = RegistryClient::new(fake.clone());

        let created = client.create(&PluginId::from("b")).await.unwrap().unwrap();
        client
            .update(&UpdatePlugin::activation(created.id.clone(), true))
            .await
            .unwrap();
        let deleted = client.delete(&RecordId::new("1")).await.unwrap().unwrap();

        assert_eq!(deleted.plugin_id, PluginId::from("a"));
        assert_eq!(fake.refetch_count(), 3);
    }

    #[tokio::test]
    async fn failed_mutations_do_not_refetch() {
        let fake = Arc::new(FakeRegistry::default());
        fake.fail_create(true);
        fake.fail_delete(true);
        let client = RegistryClient::new(fake.clone());

        assert!(client.create(&PluginId::from("b")).await.is_err());
        assert!(client.delete(&RecordId::new("1")).await.is_err());
        assert_eq!(fake.refetch_count(), 0);
    }
}
