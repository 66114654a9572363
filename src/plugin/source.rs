//! Where manifests and plugin directories are fetched from.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::error::TransportError;
use crate::model::config::PluginsConfig;
use crate::model::record::PluginId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl ArtifactResponse {
    pub fn ok(body: impl Into<Vec<u8>>) -> Self {
        Self {
            status: 200,
            body: body.into(),
        }
    }

    pub fn status(status: u16) -> Self {
        Self {
            status,
            body: Vec::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Read/delete access to the published plugin artifacts. Non-success
/// statuses are responses, not errors; `Err` means the request itself failed.
#[async_trait]
pub trait ArtifactSource: Send + Sync {
    async fn get(&self, path: &str) -> Result<ArtifactResponse, TransportError>;
    async fn delete(&self, path: &str) -> Result<ArtifactResponse, TransportError>;
}

/// Deterministic artifact paths, relative to the source root.
#[derive(Debug, Clone)]
pub struct PluginPaths {
    pub available_dir: String,
    pub manifest_file: String,
    pub default_extension: String,
    pub accepted_extensions: Vec<String>,
}

impl PluginPaths {
    pub fn from_config(config: &PluginsConfig) -> Self {
        Self {
            available_dir: config.available_dir.trim_matches('/').to_string(),
            manifest_file: config.manifest_file.clone(),
            default_extension: config.default_extension.trim_start_matches('.').to_string(),
            accepted_extensions: config
                .accepted_extensions
                .iter()
                .map(|ext| ext.trim_start_matches('.').to_string())
                .collect(),
        }
    }

    pub fn plugin_dir(&self, plugin_id: &PluginId) -> String {
        format!("{}/{}", self.available_dir, plugin_id)
    }

    pub fn manifest(&self, plugin_id: &PluginId) -> String {
        format!("{}/{}", self.plugin_dir(plugin_id), self.manifest_file)
    }

    pub fn module(&self, plugin_id: &PluginId, main: &str) -> String {
        format!("{}/{}", self.plugin_dir(plugin_id), self.normalize_main(main))
    }

    /// Keeps `main` when it already ends in an accepted extension, otherwise
    /// appends the default one (`index` → `index.js`, `index.txt` → `index.txt.js`).
    pub fn normalize_main(&self, main: &str) -> String {
        let accepted = Path::new(main)
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| self.accepted_extensions.iter().any(|a| a == ext));

        if accepted {
            main.to_string()
        } else {
            format!("{main}.{}", self.default_extension)
        }
    }
}

impl Default for PluginPaths {
    fn default() -> Self {
        Self::from_config(&crate::model::config::RuntimeConfig::default().plugins)
    }
}

/// Serves artifacts from a local directory tree.
#[derive(Debug, Clone)]
pub struct DirArtifactSource {
    root: PathBuf,
}

impl DirArtifactSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, path: &str) -> Result<PathBuf, TransportError> {
        let relative = Path::new(path.trim_start_matches('/'));
        let escapes = relative
            .components()
            .any(|part| !matches!(part, std::path::Component::Normal(_)));
        if escapes {
            return Err(TransportError::message(format!(
                "artifact path escapes source root: {path}"
            )));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl ArtifactSource for DirArtifactSource {
    async fn get(&self, path: &str) -> Result<ArtifactResponse, TransportError> {
        let full = self.resolve(path)?;
        match tokio::fs::read(&full).await {
            Ok(body) => Ok(ArtifactResponse::ok(body)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                Ok(ArtifactResponse::status(404))
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn delete(&self, path: &str) -> Result<ArtifactResponse, TransportError> {
        let full = self.resolve(path)?;
        match tokio::fs::remove_dir_all(&full).await {
            Ok(()) => Ok(ArtifactResponse::status(200)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                Ok(ArtifactResponse::status(404))
            }
            Err(err) => Err(err.into()),
        }
    }
}

/// Serves artifacts over HTTP relative to a base URL.
#[cfg(feature = "http")]
#[derive(Debug, Clone)]
pub struct HttpArtifactSource {
    client: reqwest::Client,
    base_url: String,
}

#[cfg(feature = "http")]
impl HttpArtifactSource {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn into_response(response: reqwest::Response) -> Result<ArtifactResponse, TransportError> {
        let status = response.status().as_u16();
        let body = response.bytes().await?;
        Ok(ArtifactResponse {
            status,
            body: body.to_vec(),
        })
    }
}

#[cfg(feature = "http")]
#[async_trait]
impl ArtifactSource for HttpArtifactSource {
    async fn get(&self, path: &str) -> Result<ArtifactResponse, TransportError> {
        let response = self.client.get(self.url(path)).send().await?;
        Self::into_response(response).await
    }

    async fn delete(&self, path: &str) -> Result<ArtifactResponse, TransportError> {
        let response = self.client.delete(self.url(path)).send().await?;
        Self::into_response(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_entry_extensions() {
        let paths = PluginPaths::default();
        assert_eq!(paths.normalize_main("index.js"), "index.js");
        assert_eq!(paths.normalize_main("index.ts"), "index.ts");
        assert_eq!(paths.normalize_main("index.tsx"), "index.tsx");
        assert_eq!(paths.normalize_main("index"), "index.js");
        assert_eq!(paths.normalize_main("index.txt"), "index.txt.js");
    }

    #[test]
    fn builds_deterministic_paths() {
        let paths = PluginPaths::default();
        let id = PluginId::from("test-plugin");
        assert_eq!(paths.manifest(&id), "available/test-plugin/manifest.json");
        assert_eq!(paths.module(&id, "index"), "available/test-plugin/index.js");
        assert_eq!(paths.plugin_dir(&id), "available/test-plugin");
    }

    #[tokio::test]
    async fn dir_source_reads_and_reports_missing_files() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(tmp.path().join("available/p")).unwrap();
        std::fs::write(tmp.path().join("available/p/manifest.json"), "{}").unwrap();

        let source = DirArtifactSource::new(tmp.path());
        let found = source.get("available/p/manifest.json").await.unwrap();
        assert!(found.is_success());
        assert_eq!(found.body, b"{}");

        let missing = source.get("available/q/manifest.json").await.unwrap();
        assert_eq!(missing.status, 404);
    }

    #[tokio::test]
    async fn dir_source_deletes_plugin_directories() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(tmp.path().join("available/p")).unwrap();

        let source = DirArtifactSource::new(tmp.path());
        assert!(source.delete("available/p").await.unwrap().is_success());
        assert!(!tmp.path().join("available/p").exists());
        assert_eq!(source.delete("available/p").await.unwrap().status, 404);
    }

    #[tokio::test]
    async fn dir_source_refuses_parent_traversal() {
        let tmp = tempfile::tempdir().unwrap();
        let source = DirArtifactSource::new(tmp.path());
        assert!(source.get("available/../../etc/passwd").await.is_err());
    }

    #[cfg(feature = "http")]
    #[tokio::test]
    async fn http_source_passes_status_through() {
        let mut server = mockito::Server::new_async().await;
        let ok = server
            .mock("GET", "/available/p/manifest.json")
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;
        let _missing = server
            .mock("GET", "/available/q/manifest.json")
            .with_status(404)
            .create_async()
            .await;
        let deleted = server
            .mock("DELETE", "/available/p")
            .with_status(204)
            .create_async()
            .await;

        let source = HttpArtifactSource::new(format!("{}/", server.url()));
        let found = source.get("available/p/manifest.json").await.unwrap();
        assert!(found.is_success());
        assert_eq!(found.body, b"{}");
        assert_eq!(source.get("available/q/manifest.json").await.unwrap().status, 404);
        assert!(source.delete("/available/p").await.unwrap().is_success());

        ok.assert_async().await;
        deleted.assert_async().await;
    }
}
