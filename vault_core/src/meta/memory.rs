use std::collections::BTreeMap;

use async_trait::async_trait;
use dashmap::DashMap;

use super::{Asset, AssetVersionFileRecord, BucketConfig, MetadataStore};

/// In-memory `MetadataStore`, used by tests and ephemeral setups.
#[derive(Debug, Default)]
pub struct MemoryMetadataStore {
    assets: DashMap<(String, String), Asset>,
    buckets: DashMap<String, BucketConfig>,
    // partition key -> file key -> record
    version_files: DashMap<String, BTreeMap<String, AssetVersionFileRecord>>,
}

impl MemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MetadataStore for MemoryMetadataStore {
    async fn get_asset(&self, database_id: &str, asset_id: &str) -> anyhow::Result<Option<Asset>> {
        let key = (database_id.to_string(), asset_id.to_string());
        Ok(self.assets.get(&key).map(|a| a.value().clone()))
    }

    async fn put_asset(&self, asset: &Asset) -> anyhow::Result<()> {
        let key = (asset.database_id.clone(), asset.asset_id.clone());
        self.assets.insert(key, asset.clone());
        Ok(())
    }

    async fn get_bucket(&self, bucket_id: &str) -> anyhow::Result<Option<BucketConfig>> {
        Ok(self.buckets.get(bucket_id).map(|b| b.value().clone()))
    }

    async fn put_bucket(&self, bucket: &BucketConfig) -> anyhow::Result<()> {
        self.buckets.insert(bucket.bucket_id.clone(), bucket.clone());
        Ok(())
    }

    async fn query_version_files(
        &self,
        asset_id: &str,
        asset_version_id: &str,
        file_key: Option<&str>,
    ) -> anyhow::Result<Vec<AssetVersionFileRecord>> {
        let partition = AssetVersionFileRecord::partition_key(asset_id, asset_version_id);
        let Some(records) = self.version_files.get(&partition) else {
            return Ok(Vec::new());
        };
        let rows = match file_key {
            Some(file_key) => records.get(file_key).cloned().into_iter().collect(),
            None => records.values().cloned().collect(),
        };
        Ok(rows)
    }

    async fn put_version_file(&self, record: &AssetVersionFileRecord) -> anyhow::Result<()> {
        let partition =
            AssetVersionFileRecord::partition_key(&record.asset_id, &record.asset_version_id);
        self.version_files
            .entry(partition)
            .or_default()
            .insert(record.file_key.clone(), record.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(file_key: &str, version_id: &str) -> AssetVersionFileRecord {
        AssetVersionFileRecord {
            asset_id: "asset1".into(),
            asset_version_id: "1".into(),
            file_key: file_key.into(),
            version_id: version_id.into(),
            size: Some(3),
            last_modified: None,
            etag: None,
        }
    }

    #[tokio::test]
    async fn version_files_are_partitioned_and_filtered() -> anyhow::Result<()> {
        let meta = MemoryMetadataStore::new();
        meta.put_version_file(&record("b.obj", "v2")).await?;
        meta.put_version_file(&record("a.obj", "v1")).await?;

        let all = meta.query_version_files("asset1", "1", None).await?;
        let keys: Vec<_> = all.iter().map(|r| r.file_key.as_str()).collect();
        assert_eq!(keys, vec!["a.obj", "b.obj"]);

        let one = meta.query_version_files("asset1", "1", Some("b.obj")).await?;
        assert_eq!(one.len(), 1);
        assert_eq!(one[0].version_id, "v2");

        assert!(meta.query_version_files("asset1", "2", None).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn asset_round_trips_extra_fields() -> anyhow::Result<()> {
        let meta = MemoryMetadataStore::new();
        let mut asset = Asset::new("db", "asset1", "bucket-1", "asset1/");
        asset
            .extra
            .insert("assetName".into(), serde_json::Value::from("Chair"));
        meta.put_asset(&asset).await?;

        let loaded = meta.get_asset("db", "asset1").await?.expect("asset");
        assert_eq!(loaded, asset);
        assert!(meta.get_asset("other", "asset1").await?.is_none());
        Ok(())
    }
}
