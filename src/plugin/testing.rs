//! In-memory registry and fixtures shared by the unit tests.

use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::error::RegistryError;
use crate::model::record::{DeletedPlugin, PluginId, PluginRecord, RecordId, UpdatePlugin};
use crate::plugin::registry::RegistryService;

pub fn record(id: &str, plugin_id: &str, installed: bool, activated: bool) -> PluginRecord {
    PluginRecord {
        id: RecordId::new(id),
        plugin_id: PluginId::from(plugin_id),
        is_activated: activated,
        is_installed: installed,
        backup: false,
        created_at: Some("2023-01-01T00:00:00Z".to_string()),
        updated_at: Some("2023-01-01T00:00:00Z".to_string()),
    }
}

pub fn manifest_json(plugin_id: &str) -> Value {
    json!({
        "name": "Test Plugin",
        "pluginId": plugin_id,
        "version": "1.0.0",
        "description": "A test plugin",
        "author": "Test Author",
        "main": "index",
        "extensionPoints": {
            "routes": [{ "pluginId": plugin_id, "path": "/test", "component": "TestComponent" }],
            "drawer": [{ "pluginId": plugin_id, "label": "Test", "path": "/test", "order": 1 }]
        }
    })
}

pub fn write_manifest(root: &Path, plugin_id: &str, manifest: &Value) {
    let dir = root.join("available").join(plugin_id);
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("manifest.json"), manifest.to_string()).unwrap();
}

#[derive(Debug, Default)]
struct State {
    records: Vec<PluginRecord>,
    next_id: u32,
    list_missing: bool,
    fail_list: bool,
    fail_create: bool,
    create_returns_none: bool,
    fail_update: bool,
    fail_delete: bool,
    refetches: usize,
    creates: Vec<PluginId>,
    updates: Vec<UpdatePlugin>,
    deletes: Vec<RecordId>,
}

/// Scripted [`RegistryService`] backed by a vector of records.
#[derive(Debug, Default)]
pub struct FakeRegistry {
    state: Mutex<State>,
}

impl FakeRegistry {
    pub fn with_records(records: Vec<PluginRecord>) -> Self {
        let fake = Self::default();
        {
            let mut state = fake.state.lock().unwrap();
            state.next_id = 100;
            state.records = records;
        }
        fake
    }

    pub fn set_records(&self, records: Vec<PluginRecord>) {
        self.state.lock().unwrap().records = records;
    }

    pub fn records(&self) -> Vec<PluginRecord> {
        self.state.lock().unwrap().records.clone()
    }

    pub fn set_list_payload_missing(&self, missing: bool) {
        self.state.lock().unwrap().list_missing = missing;
    }

    pub fn fail_list(&self, fail: bool) {
        self.state.lock().unwrap().fail_list = fail;
    }

    pub fn fail_create(&self, fail: bool) {
        self.state.lock().unwrap().fail_create = fail;
    }

    pub fn create_returns_none(&self, none: bool) {
        self.state.lock().unwrap().create_returns_none = none;
    }

    pub fn fail_update(&self, fail: bool) {
        self.state.lock().unwrap().fail_update = fail;
    }

    pub fn fail_delete(&self, fail: bool) {
        self.state.lock().unwrap().fail_delete = fail;
    }

    pub fn refetch_count(&self) -> usize {
        self.state.lock().unwrap().refetches
    }

    pub fn creates(&self) -> Vec<PluginId> {
        self.state.lock().unwrap().creates.clone()
    }

    pub fn updates(&self) -> Vec<UpdatePlugin> {
        self.state.lock().unwrap().updates.clone()
    }

    pub fn deletes(&self) -> Vec<RecordId> {
        self.state.lock().unwrap().deletes.clone()
    }
}

fn offline() -> RegistryError {
    RegistryError::message("registry offline")
}

#[async_trait]
impl RegistryService for FakeRegistry {
    async fn list_plugins(&self) -> Result<Option<Vec<PluginRecord>>, RegistryError> {
        let state = self.state.lock().unwrap();
        if state.fail_list {
            return Err(offline());
        }
        if state.list_missing {
            return Ok(None);
        }
        Ok(Some(state.records.clone()))
    }

    async fn create_plugin(
        &self,
        plugin_id: &PluginId,
    ) -> Result<Option<PluginRecord>, RegistryError> {
        let mut state = self.state.lock().unwrap();
        state.creates.push(plugin_id.clone());
        if state.fail_create {
            return Err(offline());
        }
        if state.create_returns_none {
            return Ok(None);
        }
        state.next_id += 1;
        let created = record(&state.next_id.to_string(), plugin_id.as_str(), true, false);
        state.records.push(created.clone());
        Ok(Some(created))
    }

    async fn update_plugin(
        &self,
        input: &UpdatePlugin,
    ) -> Result<Option<PluginRecord>, RegistryError> {
        let mut state = self.state.lock().unwrap();
        state.updates.push(input.clone());
        if state.fail_update {
            return Err(offline());
        }
        let Some(found) = state.records.iter_mut().find(|r| r.id == input.id) else {
            return Ok(None);
        };
        if let Some(activated) = input.is_activated {
            found.is_activated = activated;
        }
        if let Some(installed) = input.is_installed {
            found.is_installed = installed;
        }
        if let Some(backup) = input.backup {
            found.backup = backup;
        }
        Ok(Some(found.clone()))
    }

    async fn delete_plugin(&self, id: &RecordId) -> Result<Option<DeletedPlugin>, RegistryError> {
        let mut state = self.state.lock().unwrap();
        state.deletes.push(id.clone());
        if state.fail_delete {
            return Err(offline());
        }
        let Some(pos) = state.records.iter().position(|r| &r.id == id) else {
            return Ok(None);
        };
        let removed = state.records.remove(pos);
        Ok(Some(DeletedPlugin {
            id: removed.id,
            plugin_id: removed.plugin_id,
        }))
    }

    async fn refetch_plugins(&self) {
        self.state.lock().unwrap().refetches += 1;
    }
}
