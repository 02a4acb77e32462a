use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;
use vault_core::AllowAll;
use vault_files::{EngineConfig, FileManager};
use vault_meta_redb::RedbMetadataStore;
use vault_store_local::{LocalStore, LocalStoreConfig};

/// Bucket id every asset registered through the CLI points at.
pub const LOCAL_BUCKET_ID: &str = "local";
/// Base prefix of the local bucket; assets live at `assets/<asset id>/`.
pub const ASSETS_PREFIX: &str = "assets/";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultConfig {
    /// Root of the object stores and the metadata database.
    pub data_dir: PathBuf,
    #[serde(default = "default_content_bucket")]
    pub content_bucket: String,
    #[serde(default)]
    pub engine: EngineConfig,
}

pub fn default_content_bucket() -> String {
    "content".to_string()
}

impl VaultConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let toml_content = std::fs::read_to_string(path).with_context(|| {
            format!(
                "could not read config file {}; run `vault config init` first",
                path.display()
            )
        })?;
        toml::from_str(&toml_content)
            .with_context(|| format!("invalid config file {}", path.display()))
    }
}

/// Stores and engine opened from a [`VaultConfig`].
pub struct Vault {
    pub config: VaultConfig,
    pub database_id: String,
    pub meta: Arc<RedbMetadataStore>,
    pub manager: FileManager,
    /// Single-user CLI: every caller may do everything.
    pub perms: AllowAll,
}

impl Vault {
    pub fn open(config: VaultConfig, database_id: &str) -> Result<Self> {
        let data_dir = &config.data_dir;
        let content = LocalStore::create(LocalStoreConfig {
            base_path: path_string(&data_dir.join("objects"))?,
            versioned: true,
        });
        let auxiliary = LocalStore::create(LocalStoreConfig {
            base_path: path_string(&data_dir.join("auxiliary"))?,
            versioned: false,
        });
        let meta = Arc::new(
            RedbMetadataStore::open(data_dir.join("metadata"))
                .context("failed to open metadata database")?,
        );
        debug!(data_dir = %data_dir.display(), "opened vault stores");

        let manager = FileManager::new(content, auxiliary, meta.clone(), config.engine.clone());
        Ok(Self {
            config,
            database_id: database_id.to_string(),
            meta,
            manager,
            perms: AllowAll,
        })
    }
}

fn path_string(path: &Path) -> Result<String> {
    path.to_str()
        .map(str::to_string)
        .with_context(|| format!("path {} is not valid UTF-8", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_fills_defaults() {
        let config: VaultConfig = toml::from_str(r#"data_dir = "/tmp/vault""#).unwrap();
        assert_eq!(config.content_bucket, "content");
        assert_eq!(config.engine, EngineConfig::default());
    }

    #[test]
    fn engine_table_overrides_single_fields() {
        let config: VaultConfig = toml::from_str(
            r#"
            data_dir = "/tmp/vault"
            content_bucket = "models"

            [engine]
            version_history_limit = 10

            [engine.retry]
            max_attempts = 2
            "#,
        )
        .unwrap();
        assert_eq!(config.content_bucket, "models");
        assert_eq!(config.engine.version_history_limit, 10);
        assert_eq!(config.engine.retry.max_attempts, 2);
        assert_eq!(config.engine.auxiliary_bucket, "asset-auxiliary");
    }
}
