//! [`RegistryService`] speaking GraphQL over HTTP.

use std::sync::Mutex;

use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use crate::error::{RegistryError, TransportError};
use crate::model::record::{DeletedPlugin, PluginId, PluginRecord, RecordId, UpdatePlugin};
use crate::plugin::registry::RegistryService;

const GET_PLUGINS: &str = "query GetPlugins { getPlugins { id pluginId isActivated isInstalled backup createdAt updatedAt } }";

const CREATE_PLUGIN: &str = "mutation CreatePlugin($input: CreatePluginInput!) { createPlugin(input: $input) { id pluginId isActivated isInstalled backup createdAt updatedAt } }";

const UPDATE_PLUGIN: &str = "mutation UpdatePlugin($input: UpdatePluginInput!) { updatePlugin(input: $input) { id pluginId isActivated isInstalled backup createdAt updatedAt } }";

const DELETE_PLUGIN: &str =
    "mutation DeletePlugin($input: DeletePluginInput!) { deletePlugin(input: $input) { id pluginId } }";

#[derive(Debug, Deserialize)]
struct GraphqlResponse {
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    errors: Vec<GraphqlError>,
}

#[derive(Debug, Deserialize)]
struct GraphqlError {
    message: String,
}

pub struct GraphqlRegistry {
    client: reqwest::Client,
    endpoint: String,
    cache: Mutex<Option<Vec<PluginRecord>>>,
}

impl GraphqlRegistry {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), endpoint)
    }

    pub fn with_client(client: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            cache: Mutex::new(None),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Posts one document and pulls `data.<field>` out of the reply.
    /// A null or missing field is `Ok(None)`.
    async fn execute<T: DeserializeOwned>(
        &self,
        document: &str,
        variables: Value,
        field: &str,
    ) -> Result<Option<T>, RegistryError> {
        let body = json!({ "query": document, "variables": variables });
        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(TransportError::from)?;
        let reply: GraphqlResponse = response.json().await.map_err(TransportError::from)?;

        if !reply.errors.is_empty() {
            return Err(RegistryError::Graphql(
                reply.errors.into_iter().map(|e| e.message).collect(),
            ));
        }

        match reply.data.and_then(|mut data| data.get_mut(field).map(Value::take)) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
        }
    }
}

impl std::fmt::Debug for GraphqlRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphqlRegistry")
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl RegistryService for GraphqlRegistry {
    async fn list_plugins(&self) -> Result<Option<Vec<PluginRecord>>, RegistryError> {
        let cached = self.cache.lock().unwrap_or_else(|e| e.into_inner()).clone();
        if let Some(records) = cached {
            return Ok(Some(records));
        }

        let records: Option<Vec<PluginRecord>> =
            self.execute(GET_PLUGINS, json!({}), "getPlugins").await?;
        if let Some(records) = &records {
            *self.cache.lock().unwrap_or_else(|e| e.into_inner()) = Some(records.clone());
        }
        Ok(records)
    }

    async fn create_plugin(
        &self,
        plugin_id: &PluginId,
    ) -> Result<Option<PluginRecord>, RegistryError> {
        let variables = json!({ "input": { "pluginId": plugin_id } });
        self.execute(CREATE_PLUGIN, variables, "createPlugin").await
    }

    async fn update_plugin(
        &self,
        input: &UpdatePlugin,
    ) -> Result<Option<PluginRecord>, RegistryError> {
        let variables = json!({ "input": input });
        self.execute(UPDATE_PLUGIN, variables, "updatePlugin").await
    }

    async fn delete_plugin(&self, id: &RecordId) -> Result<Option<DeletedPlugin>, RegistryError> {
        let variables = json!({ "input": { "id": id.as_str() } });
        self.execute(DELETE_PLUGIN, variables, "deletePlugin").await
    }

    async fn refetch_plugins(&self) {
        self.cache.lock().unwrap_or_else(|e| e.into_inner()).take();
    }
}

#[cfg(test)]
mod tests {
    use mockito::Matcher;

    use super::*;

    const RECORD: &str = r#"{"id":"1","pluginId":"test-plugin","isActivated":true,"isInstalled":true,"backup":false,"createdAt":"2023-01-01T00:00:00Z","updatedAt":"2023-01-01T00:00:00Z"}"#;

    fn endpoint(server: &mockito::Server) -> String {
        format!("{}/graphql", server.url())
    }

    #[tokio::test]
    async fn lists_plugins_once_until_refetched() {
        let mut server = mockito::Server::new_async().await;
        let list = server
            .mock("POST", "/graphql")
            .match_body(Matcher::Regex("getPlugins".to_string()))
            .with_status(200)
            .with_body(format!(r#"{{"data":{{"getPlugins":[{RECORD}]}}}}"#))
            .expect(2)
            .create_async()
            .await;

        let registry = GraphqlRegistry::new(endpoint(&server));
        let first = registry.list_plugins().await.unwrap().unwrap();
        let second = registry.list_plugins().await.unwrap().unwrap();
        assert_eq!(first, second);
        assert_eq!(first[0].plugin_id, PluginId::from("test-plugin"));

        registry.refetch_plugins().await;
        registry.list_plugins().await.unwrap();
        list.assert_async().await;
    }

    #[tokio::test]
    async fn missing_data_is_no_payload() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("POST", "/graphql")
            .with_status(200)
            .with_body(r#"{"data":null}"#)
            .create_async()
            .await;

        let registry = GraphqlRegistry::new(endpoint(&server));
        assert!(registry.list_plugins().await.unwrap().is_none());
        assert!(
            registry
                .create_plugin(&PluginId::from("new-plugin"))
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn sends_input_variables() {
        let mut server = mockito::Server::new_async().await;
        let create = server
            .mock("POST", "/graphql")
            .match_body(Matcher::PartialJson(
                json!({ "variables": { "input": { "pluginId": "new-plugin" } } }),
            ))
            .with_status(200)
            .with_body(format!(r#"{{"data":{{"createPlugin":{RECORD}}}}}"#))
            .create_async()
            .await;
        let update = server
            .mock("POST", "/graphql")
            .match_body(Matcher::PartialJson(
                json!({ "variables": { "input": { "id": "1", "isActivated": false } } }),
            ))
            .with_status(200)
            .with_body(format!(r#"{{"data":{{"updatePlugin":{RECORD}}}}}"#))
            .create_async()
            .await;
        let delete = server
            .mock("POST", "/graphql")
            .match_body(Matcher::AllOf(vec![
                Matcher::PartialJson(json!({ "variables": { "input": { "id": "1" } } })),
                Matcher::Regex("deletePlugin".to_string()),
            ]))
            .with_status(200)
            .with_body(r#"{"data":{"deletePlugin":{"id":"1","pluginId":"test-plugin"}}}"#)
            .create_async()
            .await;

        let registry = GraphqlRegistry::new(endpoint(&server));
        registry
            .create_plugin(&PluginId::from("new-plugin"))
            .await
            .unwrap()
            .unwrap();
        registry
            .update_plugin(&UpdatePlugin::activation(RecordId::new("1"), false))
            .await
            .unwrap()
            .unwrap();
        let deleted = registry
            .delete_plugin(&RecordId::new("1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(deleted.plugin_id, PluginId::from("test-plugin"));

        create.assert_async().await;
        update.assert_async().await;
        delete.assert_async().await;
    }

    #[tokio::test]
    async fn graphql_errors_are_surfaced() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("POST", "/graphql")
            .with_status(200)
            .with_body(r#"{"data":null,"errors":[{"message":"Unauthorized"}]}"#)
            .create_async()
            .await;

        let registry = GraphqlRegistry::new(endpoint(&server));
        let err = registry.list_plugins().await.unwrap_err();
        assert!(matches!(&err, RegistryError::Graphql(messages) if messages == &["Unauthorized"]));
    }

    #[tokio::test]
    async fn http_failures_are_transport_errors() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("POST", "/graphql")
            .with_status(500)
            .create_async()
            .await;

        let registry = GraphqlRegistry::new(endpoint(&server));
        let err = registry.list_plugins().await.unwrap_err();
        assert!(matches!(err, RegistryError::Transport(_)));
    }
}
