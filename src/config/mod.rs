//! Configuration management for Preflight

pub mod schema;

pub use schema::Config;

use crate::error::{PreflightError, PreflightResult};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

/// Project-local configuration file name
pub const LOCAL_CONFIG_FILE: &str = ".preflight.toml";

/// Configuration manager
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Create a new config manager with default path
    pub fn new() -> Self {
        Self {
            config_path: Self::default_config_path(),
        }
    }

    /// Create a config manager with a custom path
    pub fn with_path(path: PathBuf) -> Self {
        Self { config_path: path }
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("preflight")
            .join("config.toml")
    }

    /// Get the state directory path
    pub fn state_dir() -> PathBuf {
        dirs::state_dir()
            .or_else(dirs::data_local_dir)
            .unwrap_or_else(|| PathBuf::from("."))
            .join("preflight")
    }

    /// Get the run history path
    pub fn history_path() -> PathBuf {
        Self::state_dir().join("history.log")
    }

    /// Default artifact store directory
    pub fn default_cache_dir() -> PathBuf {
        dirs::cache_dir()
            .unwrap_or_else(|| PathBuf::from(".preflight"))
            .join("preflight")
            .join("artifacts")
    }

    /// Artifact store directory for a loaded config
    pub fn cache_dir(config: &Config) -> PathBuf {
        config
            .cache
            .dir
            .clone()
            .unwrap_or_else(Self::default_cache_dir)
    }

    /// Walk up from `start` looking for a project-local config
    pub fn find_local_config(start: &Path) -> Option<PathBuf> {
        start
            .ancestors()
            .map(|dir| dir.join(LOCAL_CONFIG_FILE))
            .find(|candidate| candidate.is_file())
    }

    /// Load configuration, using defaults if not exists
    pub async fn load(&self) -> PreflightResult<Config> {
        self.load_merged(None).await
    }

    /// Load global configuration with an optional local file merged on top
    pub async fn load_merged(&self, local: Option<&Path>) -> PreflightResult<Config> {
        let mut merged = if self.config_path.exists() {
            self.read_table(&self.config_path).await?
        } else {
            debug!("Config file not found, using defaults");
            toml::Table::new()
        };

        if let Some(local) = local {
            debug!("Merging local config: {}", local.display());
            let overlay = self.read_table(local).await?;
            merge_tables(&mut merged, overlay);
        }

        let path = local.unwrap_or(&self.config_path).to_path_buf();
        toml::Value::Table(merged)
            .try_into::<Config>()
            .map_err(|e| PreflightError::ConfigInvalid {
                path,
                reason: e.to_string(),
            })
    }

    async fn read_table(&self, path: &Path) -> PreflightResult<toml::Table> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| PreflightError::io(format!("reading config from {}", path.display()), e))?;

        toml::from_str(&content).map_err(|e| PreflightError::ConfigInvalid {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Save configuration to file
    pub async fn save(&self, config: &Config) -> PreflightResult<()> {
        self.ensure_config_dir().await?;

        let content = toml::to_string_pretty(config)?;
        fs::write(&self.config_path, content).await.map_err(|e| {
            PreflightError::io(
                format!("writing config to {}", self.config_path.display()),
                e,
            )
        })?;

        info!("Configuration saved to {}", self.config_path.display());
        Ok(())
    }

    /// Ensure the config directory exists
    async fn ensure_config_dir(&self) -> PreflightResult<()> {
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| PreflightError::ConfigDirCreate {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
        }
        Ok(())
    }

    /// Get the config file path
    pub fn path(&self) -> &Path {
        &self.config_path
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Deep-merge `overlay` into `base`; overlay wins for non-table values
fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        let toml::Value::Table(incoming) = value else {
            base.insert(key, value);
            continue;
        };
        if let Some(toml::Value::Table(existing)) = base.get_mut(&key) {
            merge_tables(existing, incoming);
            continue;
        }
        base.insert(key, toml::Value::Table(incoming));
    }
}
