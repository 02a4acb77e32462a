//! RedbMetadataStore - asset metadata backed by a local redb database.

use std::{path::Path, sync::Arc};

use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use vault_core::meta::{Asset, AssetVersionFileRecord, BucketConfig, MetadataStore};

type JsonTable = TableDefinition<'static, &'static str, &'static [u8]>;

/// `"<databaseId>\0<assetId>"` -> asset JSON
const ASSETS: TableDefinition<&str, &[u8]> = TableDefinition::new("assets");
/// bucket id -> bucket configuration JSON
const BUCKETS: TableDefinition<&str, &[u8]> = TableDefinition::new("buckets");
/// `"<assetId>:<assetVersionId>\0<fileKey>"` -> record JSON
const VERSION_FILES: TableDefinition<&str, &[u8]> = TableDefinition::new("asset_version_files");

/// `MetadataStore` persisted in a single `metadata.redb` file.
#[derive(Clone)]
pub struct RedbMetadataStore {
    db: Arc<Database>,
}

impl RedbMetadataStore {
    pub fn open<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        std::fs::create_dir_all(path)?;
        let db = Database::create(path.join("metadata.redb"))?;

        // Create every table up front so first reads on a fresh database
        // do not fail with a missing-table error.
        {
            let write_txn = db.begin_write()?;
            {
                let _ = write_txn.open_table(ASSETS)?;
                let _ = write_txn.open_table(BUCKETS)?;
                let _ = write_txn.open_table(VERSION_FILES)?;
            }
            write_txn.commit()?;
        }

        Ok(Self { db: Arc::new(db) })
    }

    async fn get_json<T>(&self, table: JsonTable, key: String) -> anyhow::Result<Option<T>>
    where
        T: serde::de::DeserializeOwned + Send + 'static,
    {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || -> anyhow::Result<Option<T>> {
            let read_txn = db.begin_read()?;
            let table = read_txn.open_table(table)?;
            let value = table
                .get(key.as_str())?
                .map(|guard| serde_json::from_slice(guard.value()))
                .transpose()?;
            Ok(value)
        })
        .await
        .map_err(|e| anyhow::anyhow!("redb read task failed: {}", e))?
    }

    async fn put_json(
        &self,
        table: JsonTable,
        key: String,
        value: Vec<u8>,
    ) -> anyhow::Result<()> {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || -> anyhow::Result<()> {
            let write_txn = db.begin_write()?;
            {
                let mut table = write_txn.open_table(table)?;
                table.insert(key.as_str(), value.as_slice())?;
            }
            write_txn.commit()?;
            Ok(())
        })
        .await
        .map_err(|e| anyhow::anyhow!("redb write task failed: {}", e))?
    }
}

fn asset_key(database_id: &str, asset_id: &str) -> String {
    format!("{database_id}\0{asset_id}")
}

fn version_file_key(partition: &str, file_key: &str) -> String {
    format!("{partition}\0{file_key}")
}

impl std::fmt::Debug for RedbMetadataStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbMetadataStore").finish()
    }
}

#[async_trait::async_trait]
impl MetadataStore for RedbMetadataStore {
    async fn get_asset(&self, database_id: &str, asset_id: &str) -> anyhow::Result<Option<Asset>> {
        self.get_json(ASSETS, asset_key(database_id, asset_id)).await
    }

    async fn put_asset(&self, asset: &Asset) -> anyhow::Result<()> {
        let key = asset_key(&asset.database_id, &asset.asset_id);
        self.put_json(ASSETS, key, serde_json::to_vec(asset)?).await
    }

    async fn get_bucket(&self, bucket_id: &str) -> anyhow::Result<Option<BucketConfig>> {
        self.get_json(BUCKETS, bucket_id.to_string()).await
    }

    async fn put_bucket(&self, bucket: &BucketConfig) -> anyhow::Result<()> {
        let key = bucket.bucket_id.clone();
        self.put_json(BUCKETS, key, serde_json::to_vec(bucket)?).await
    }

    async fn query_version_files(
        &self,
        asset_id: &str,
        asset_version_id: &str,
        file_key: Option<&str>,
    ) -> anyhow::Result<Vec<AssetVersionFileRecord>> {
        let partition = AssetVersionFileRecord::partition_key(asset_id, asset_version_id);
        if let Some(file_key) = file_key {
            let key = version_file_key(&partition, file_key);
            let record: Option<AssetVersionFileRecord> = self.get_json(VERSION_FILES, key).await?;
            return Ok(record.into_iter().collect());
        }

        let db = self.db.clone();
        tokio::task::spawn_blocking(move || -> anyhow::Result<Vec<AssetVersionFileRecord>> {
            let read_txn = db.begin_read()?;
            let table = read_txn.open_table(VERSION_FILES)?;
            // '\0' sorts first, '\u{1}' bounds the partition
            let start = format!("{partition}\0");
            let end = format!("{partition}\u{1}");
            let mut records = Vec::new();
            for row in table.range(start.as_str()..end.as_str())? {
                let (_key, value) = row?;
                records.push(serde_json::from_slice(value.value())?);
            }
            Ok(records)
        })
        .await
        .map_err(|e| anyhow::anyhow!("redb read task failed: {}", e))?
    }

    async fn put_version_file(&self, record: &AssetVersionFileRecord) -> anyhow::Result<()> {
        let partition =
            AssetVersionFileRecord::partition_key(&record.asset_id, &record.asset_version_id);
        let key = version_file_key(&partition, &record.file_key);
        self.put_json(VERSION_FILES, key, serde_json::to_vec(record)?)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(asset_version_id: &str, file_key: &str, version_id: &str) -> AssetVersionFileRecord {
        AssetVersionFileRecord {
            asset_id: "asset1".into(),
            asset_version_id: asset_version_id.into(),
            file_key: file_key.into(),
            version_id: version_id.into(),
            size: Some(10),
            last_modified: None,
            etag: None,
        }
    }

    #[tokio::test]
    async fn assets_and_buckets_persist_across_reopen() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        {
            let meta = RedbMetadataStore::open(dir.path())?;
            meta.put_asset(&Asset::new("db", "asset1", "bucket-1", "asset1/"))
                .await?;
            meta.put_bucket(&BucketConfig {
                bucket_id: "bucket-1".into(),
                bucket_name: "content".into(),
                base_assets_prefix: "assets/".into(),
            })
            .await?;
        }

        let meta = RedbMetadataStore::open(dir.path())?;
        let asset = meta.get_asset("db", "asset1").await?.expect("asset");
        assert_eq!(asset.asset_location.key, "asset1/");
        let bucket = meta.get_bucket("bucket-1").await?.expect("bucket");
        assert_eq!(bucket.bucket_name, "content");
        assert!(meta.get_asset("db", "missing").await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn version_files_query_stays_inside_partition() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let meta = RedbMetadataStore::open(dir.path())?;
        meta.put_version_file(&record("1", "b.obj", "v2")).await?;
        meta.put_version_file(&record("1", "a.obj", "v1")).await?;
        meta.put_version_file(&record("10", "c.obj", "v9")).await?;

        let rows = meta.query_version_files("asset1", "1", None).await?;
        let keys: Vec<_> = rows.iter().map(|r| r.file_key.as_str()).collect();
        assert_eq!(keys, vec!["a.obj", "b.obj"]);

        let one = meta.query_version_files("asset1", "1", Some("b.obj")).await?;
        assert_eq!(one.len(), 1);
        assert_eq!(one[0].version_id, "v2");

        assert!(
            meta.query_version_files("asset1", "1", Some("c.obj"))
                .await?
                .is_empty()
        );
        Ok(())
    }
}
