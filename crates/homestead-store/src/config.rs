//! Client configuration
//!
//! Stored in `~/.config/homestead/config.yaml`. Every field is optional;
//! command-line flags and environment variables take precedence.

use homestead_core::{ChannelIdent, KeyCache};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Result, StoreError};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub struct HomesteadConfig {
    /// Root directory of the artifact store
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store_path: Option<PathBuf>,

    /// Directory holding origin keys
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_cache_path: Option<PathBuf>,

    /// Origin used when `--origin` is not given
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_origin: Option<String>,

    /// Channel used for resolution when `--channel` is not given
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_channel: Option<ChannelIdent>,
}

impl HomesteadConfig {
    /// Load configuration from the default location, or defaults if absent
    pub fn load() -> Result<Self> {
        let path = Self::default_path()?;
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&content)?;
        if let Some(origin) = &config.default_origin {
            homestead_core::validate_origin(origin).map_err(|e| StoreError::InvalidConfig {
                message: e.to_string(),
            })?;
        }
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_yaml::to_string(self)?)?;
        Ok(())
    }

    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().ok_or_else(|| StoreError::InvalidConfig {
            message: "Could not determine config directory".to_string(),
        })?;
        Ok(config_dir.join("homestead").join("config.yaml"))
    }

    pub fn store_path(&self) -> PathBuf {
        self.store_path
            .clone()
            .unwrap_or_else(crate::store::ArtifactStore::default_path)
    }

    pub fn key_cache_path(&self) -> PathBuf {
        self.key_cache_path
            .clone()
            .unwrap_or_else(KeyCache::default_path)
    }
}
