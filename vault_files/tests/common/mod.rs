#![allow(dead_code)]

use std::sync::Arc;

use bytes::Bytes;
use vault_core::testutil::RecordingNotifier;
use vault_core::{
    Asset, BucketConfig, MemoryMetadataStore, MetadataStore, ObjectStore, PutOptions,
    RetryConfig, StaticPermissions, Tags,
};
use vault_files::{AssetRef, EngineConfig, FileManager};
use vault_store_memory::MemoryStore;

pub const DB: &str = "db1";
pub const BUCKET: &str = "content";
pub const AUX: &str = "asset-auxiliary";

/// Engine wired to in-memory stores, with two assets `a1` and `a2` in
/// database `db1` and a third asset `x1` in database `db2`.
pub struct Harness {
    pub content: Arc<MemoryStore>,
    pub auxiliary: Arc<MemoryStore>,
    pub meta: Arc<MemoryMetadataStore>,
    pub notifier: Arc<RecordingNotifier>,
    pub manager: FileManager,
}

/// Engine settings with retries short enough for tests.
pub fn test_config() -> EngineConfig {
    EngineConfig {
        retry: RetryConfig {
            max_attempts: 3,
            base_delay_ms: 1,
            max_delay_ms: 5,
        },
        ..EngineConfig::default()
    }
}

impl Harness {
    pub async fn new() -> Self {
        Self::with_config(test_config()).await
    }

    pub async fn with_config(config: EngineConfig) -> Self {
        let content = Arc::new(MemoryStore::new());
        let auxiliary = Arc::new(MemoryStore::unversioned());
        let meta = Arc::new(MemoryMetadataStore::new());
        let notifier = Arc::new(RecordingNotifier::new());

        meta.put_bucket(&BucketConfig {
            bucket_id: "bkt".into(),
            bucket_name: BUCKET.into(),
            base_assets_prefix: "assets/".into(),
        })
        .await
        .unwrap();
        for (db, asset) in [(DB, "a1"), (DB, "a2"), ("db2", "x1")] {
            meta.put_asset(&Asset::new(db, asset, "bkt", format!("assets/{asset}/")))
                .await
                .unwrap();
        }

        let manager = FileManager::new(
            content.clone(),
            auxiliary.clone(),
            meta.clone(),
            config,
        )
        .with_notifier(notifier.clone());

        Self {
            content,
            auxiliary,
            meta,
            notifier,
            manager,
        }
    }

    /// A second engine over the same auxiliary and metadata stores, with a
    /// different content store.
    pub fn manager_over<O: ObjectStore>(&self, objects: O) -> FileManager {
        FileManager::new(objects, self.auxiliary.clone(), self.meta.clone(), test_config())
            .with_notifier(self.notifier.clone())
    }

    pub fn asset(&self, asset_id: &str) -> AssetRef {
        AssetRef::new(DB, asset_id)
    }

    pub async fn put(&self, asset_id: &str, path: &str, body: &'static [u8]) -> String {
        self.put_tagged(asset_id, path, body, Tags::new()).await
    }

    pub async fn put_tagged(&self, asset_id: &str, path: &str, body: &'static [u8], tags: Tags) -> String {
        let options = PutOptions {
            content_type: Some("application/octet-stream".into()),
            tags,
        };
        self.content
            .put(BUCKET, &key(asset_id, path), Bytes::from_static(body), options)
            .await
            .unwrap()
    }

    pub async fn put_aux(&self, asset_id: &str, path: &str) {
        self.auxiliary
            .put(AUX, &key(asset_id, path), Bytes::from_static(b"aux"), PutOptions::default())
            .await
            .unwrap();
    }

    pub async fn aux_exists(&self, asset_id: &str, path: &str) -> bool {
        self.auxiliary.head(AUX, &key(asset_id, path)).await.is_ok()
    }

    pub async fn is_live(&self, asset_id: &str, path: &str) -> bool {
        self.content.head(BUCKET, &key(asset_id, path)).await.is_ok()
    }

    /// Number of chain entries (versions and tombstones) stored for a file.
    pub async fn chain_len(&self, asset_id: &str, path: &str) -> usize {
        let key = key(asset_id, path);
        let page = self
            .content
            .list_versions(BUCKET, &key, None, 1000)
            .await
            .unwrap();
        page.versions_of(&key).count() + page.tombstones_of(&key).count()
    }

    pub async fn body(&self, asset_id: &str, path: &str) -> Bytes {
        self.content
            .get(BUCKET, &key(asset_id, path), None)
            .await
            .unwrap()
    }
}

/// Store key of `path` inside `asset_id`.
pub fn key(asset_id: &str, path: &str) -> String {
    format!("assets/{asset_id}/{}", path.trim_start_matches('/'))
}

/// Read and write on every test asset.
pub fn full_access() -> StaticPermissions {
    StaticPermissions::new()
        .allow_all_on(DB, "a1")
        .allow_all_on(DB, "a2")
        .allow_all_on("db2", "x1")
}
