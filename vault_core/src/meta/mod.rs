pub mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Asset record as stored in the metadata store.
///
/// Only the fields the file engine reads are modelled; anything else the
/// asset service keeps on the record round-trips through `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
    pub database_id: String,
    pub asset_id: String,
    pub bucket_id: String,
    pub asset_location: AssetLocation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_version_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview_location: Option<AssetLocation>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Asset {
    pub fn new(
        database_id: impl Into<String>,
        asset_id: impl Into<String>,
        bucket_id: impl Into<String>,
        base_key: impl Into<String>,
    ) -> Self {
        Self {
            database_id: database_id.into(),
            asset_id: asset_id.into(),
            bucket_id: bucket_id.into(),
            asset_location: AssetLocation {
                key: base_key.into(),
            },
            current_version_id: None,
            preview_location: None,
            extra: serde_json::Map::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetLocation {
    #[serde(rename = "Key")]
    pub key: String,
}

/// Storage container an asset's files live in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketConfig {
    pub bucket_id: String,
    pub bucket_name: String,
    pub base_assets_prefix: String,
}

/// Version of one file pinned when an asset version was captured.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetVersionFileRecord {
    pub asset_id: String,
    pub asset_version_id: String,
    /// Path relative to the asset base key, without a leading `/`.
    pub file_key: String,
    pub version_id: String,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub last_modified: Option<String>,
    #[serde(default)]
    pub etag: Option<String>,
}

impl AssetVersionFileRecord {
    /// Partition key the records of one asset version share.
    pub fn partition_key(asset_id: &str, asset_version_id: &str) -> String {
        format!("{asset_id}:{asset_version_id}")
    }
}

#[async_trait]
pub trait MetadataStore: std::fmt::Debug + Send + Sync + 'static {
    async fn get_asset(&self, database_id: &str, asset_id: &str) -> anyhow::Result<Option<Asset>>;

    async fn put_asset(&self, asset: &Asset) -> anyhow::Result<()>;

    async fn get_bucket(&self, bucket_id: &str) -> anyhow::Result<Option<BucketConfig>>;

    async fn put_bucket(&self, bucket: &BucketConfig) -> anyhow::Result<()>;

    /// Records of one asset version, optionally narrowed to a single file
    /// key. Ordered by file key.
    async fn query_version_files(
        &self,
        asset_id: &str,
        asset_version_id: &str,
        file_key: Option<&str>,
    ) -> anyhow::Result<Vec<AssetVersionFileRecord>>;

    async fn put_version_file(&self, record: &AssetVersionFileRecord) -> anyhow::Result<()>;
}
