use anyhow::{Result, anyhow};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RuntimeConfig {
    pub plugins: PluginsConfig,
    pub registry: RegistryConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PluginsConfig {
    /// Directory path or `http(s)://` base URL that holds `available_dir`.
    pub artifact_root: String,
    pub available_dir: String,
    pub manifest_file: String,
    pub default_extension: String,
    pub accepted_extensions: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RegistryConfig {
    #[serde(default)]
    pub endpoint: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LoggingConfig {
    pub filter: String,
    #[serde(default)]
    pub directory: Option<String>,
}

const DEFAULTS: &str = include_str!("../../config/default.toml");

impl RuntimeConfig {
    /// Load configuration with layering: defaults → user config.
    pub fn load() -> Result<Self> {
        let user_path = directories::ProjectDirs::from("", "", "plugin-runtime")
            .map(|dirs| dirs.config_dir().join("config.toml"));

        match user_path {
            Some(path) if path.exists() => Self::load_with_overrides(&path),
            _ => Self::from_toml_str(""),
        }
    }

    pub fn load_with_overrides(path: &Path) -> Result<Self> {
        let user_str = fs::read_to_string(path)
            .map_err(|err| anyhow!("{}: {err}", path.display()))?;
        Self::from_toml_str(&user_str)
    }

    /// Parses `overrides` and deep-merges it over the embedded defaults.
    pub fn from_toml_str(overrides: &str) -> Result<Self> {
        let mut merged: toml::Table = toml::from_str(DEFAULTS)?;
        let user: toml::Table = toml::from_str(overrides)?;
        merge_tables(&mut merged, user);

        let mut config: RuntimeConfig = toml::Value::Table(merged).try_into()?;

        config.plugins.artifact_root = expand_tilde(&config.plugins.artifact_root)?;
        if let Some(dir) = config.logging.directory.as_mut() {
            *dir = expand_tilde(dir)?;
        }

        Ok(config)
    }

    pub fn artifact_root_is_url(&self) -> bool {
        let root = self.plugins.artifact_root.as_str();
        root.starts_with("http://") || root.starts_with("https://")
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            plugins: PluginsConfig {
                artifact_root: ".".to_string(),
                available_dir: "available".to_string(),
                manifest_file: "manifest.json".to_string(),
                default_extension: "js".to_string(),
                accepted_extensions: vec!["js".into(), "ts".into(), "tsx".into()],
            },
            registry: RegistryConfig::default(),
            logging: LoggingConfig {
                filter: "plugin_runtime=info".to_string(),
                directory: None,
            },
        }
    }
}

fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(existing)), toml::Value::Table(incoming)) => {
                merge_tables(existing, incoming);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

fn expand_tilde(path: &str) -> Result<String> {
    if !path.starts_with('~') {
        return Ok(path.to_string());
    }

    let home = dirs_home().ok_or_else(|| anyhow!("cannot determine home directory"))?;
    Ok(path.replacen('~', &home.to_string_lossy(), 1))
}

fn dirs_home() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.home_dir().to_path_buf())
}
