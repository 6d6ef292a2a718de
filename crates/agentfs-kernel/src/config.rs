//! Configuration for agentfs.
//!
//! Configuration is loaded from `$AGENTFS_CONFIG` when set, otherwise from
//! `~/.config/agentfs/config.toml`. A missing file means defaults: every
//! tenant lives in memory.
//!
//! ```toml
//! [storage]
//! kind = "local"
//! root = "/var/lib/agentfs/tenants"
//! remove_on_close = true
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

#[cfg(feature = "native")]
use crate::factory::LocalFactory;
use crate::factory::{FilesystemFactory, MemoryFactory};

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "AGENTFS_CONFIG";

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentFsConfig {
    /// Where tenant files are stored.
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Storage backend selection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StorageConfig {
    /// Each tenant gets a private in-memory tree.
    #[default]
    Memory,
    /// Each tenant gets a private directory under `root`.
    Local {
        /// Defaults to `$XDG_DATA_HOME/agentfs/tenants`.
        #[serde(default)]
        root: Option<PathBuf>,
        /// Delete a tenant's directory when its instance is closed.
        #[serde(default)]
        remove_on_close: bool,
    },
}

impl StorageConfig {
    /// Build the factory this configuration describes.
    pub fn factory(&self) -> Result<Arc<dyn FilesystemFactory>> {
        match self {
            StorageConfig::Memory => Ok(Arc::new(MemoryFactory)),
            #[cfg(feature = "native")]
            StorageConfig::Local {
                root,
                remove_on_close,
            } => {
                let root = root.clone().unwrap_or_else(crate::paths::tenants_dir);
                Ok(Arc::new(LocalFactory::new(root, *remove_on_close)))
            }
            #[cfg(not(feature = "native"))]
            StorageConfig::Local { .. } => {
                anyhow::bail!("local storage requires the `native` feature")
            }
        }
    }
}

impl AgentFsConfig {
    /// Load configuration from `$AGENTFS_CONFIG` or the default path.
    ///
    /// If the config file doesn't exist, returns default configuration.
    /// An explicitly named file must exist.
    pub fn load() -> Result<Self> {
        if let Some(path) = std::env::var_os(CONFIG_ENV) {
            return Self::load_from(Path::new(&path));
        }

        let Some(path) = Self::config_path() else {
            return Ok(Self::default());
        };
        if !path.exists() {
            tracing::debug!("No config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        Self::load_from(&path)
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        Self::from_toml_str(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))
    }

    /// Parse configuration from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Get the default config file path.
    #[cfg(feature = "native")]
    pub fn config_path() -> Option<PathBuf> {
        Some(crate::paths::config_dir().join("config.toml"))
    }

    /// Get the default config file path.
    #[cfg(not(feature = "native"))]
    pub fn config_path() -> Option<PathBuf> {
        None
    }
}
