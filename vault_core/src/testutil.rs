//! Test utilities for `ObjectStore` implementations and engine tests.
//!
//! [`ObjectStoreTests`] is a conformance suite that every versioned store in
//! the workspace runs against itself.
//!
//! # Usage
//!
//! In your store crate's `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! vault_core = { workspace = true, features = ["testutil"] }
//! ```
//!
//! In your test file:
//!
//! ```ignore
//! use vault_core::testutil::ObjectStoreTests;
//!
//! #[tokio::test]
//! async fn conformance() {
//!     let store = MyStore::new(...);
//!     ObjectStoreTests::new(&store, "bucket").run_all().await.unwrap();
//! }
//! ```

use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;
use rand::Rng;

use crate::notify::NotificationSink;
use crate::store::{
    CopyRequest, ObjectStore, PutOptions, StoreError, StoreResult, TagDirective, Tags,
};

/// Conformance suite for `ObjectStore` implementations.
pub struct ObjectStoreTests<'a, S> {
    store: &'a S,
    bucket: String,
    /// Prefix for test keys to avoid conflicts
    prefix: String,
}

impl<'a, S: ObjectStore> ObjectStoreTests<'a, S> {
    pub fn new(store: &'a S, bucket: impl Into<String>) -> Self {
        let prefix = format!("_test_{}/", rand::rng().random::<u32>());
        Self {
            store,
            bucket: bucket.into(),
            prefix,
        }
    }

    fn key(&self, name: &str) -> String {
        format!("{}{}", self.prefix, name)
    }

    /// Run all tests. Version-chain tests only run on versioned stores.
    pub async fn run_all(&self) -> StoreResult<()> {
        self.test_put_head_get().await?;
        self.test_overwrite().await?;
        self.test_copy_preserves_content_type().await?;
        self.test_copy_replaces_tags().await?;
        self.test_list_pagination().await?;

        if self.store.features().versioned {
            self.test_tombstone_shadows_key().await?;
            self.test_explicit_version_reads().await?;
            self.test_delete_version().await?;
            self.test_list_versions_order().await?;
            self.test_restore_version().await?;
        } else {
            self.test_unversioned_delete().await?;
        }
        Ok(())
    }

    pub async fn test_put_head_get(&self) -> StoreResult<()> {
        let key = self.key("put_head_get.bin");
        let mut tags = Tags::new();
        tags.insert("assetid".into(), "a1".into());
        let options = PutOptions {
            content_type: Some("application/octet-stream".into()),
            tags: tags.clone(),
        };
        let version = self
            .store
            .put(&self.bucket, &key, Bytes::from_static(b"hello"), options)
            .await?;

        let head = self.store.head(&self.bucket, &key).await?;
        assert_eq!(head.version_id, version, "head should report the new version");
        assert_eq!(head.size, 5);
        assert_eq!(head.tags, tags, "tags should round-trip");
        assert_eq!(head.content_type.as_deref(), Some("application/octet-stream"));

        let body = self.store.get(&self.bucket, &key, None).await?;
        assert_eq!(body, Bytes::from_static(b"hello"));

        let missing = self.store.head(&self.bucket, &self.key("missing.bin")).await;
        assert!(
            matches!(missing, Err(StoreError::NotFound)),
            "absent key should be NotFound"
        );
        Ok(())
    }

    pub async fn test_overwrite(&self) -> StoreResult<()> {
        let key = self.key("overwrite.bin");
        let first = self.put(&key, b"one").await?;
        let second = self.put(&key, b"two").await?;
        assert_ne!(first, second, "each put should create a new version id");

        let body = self.store.get(&self.bucket, &key, None).await?;
        assert_eq!(body, Bytes::from_static(b"two"));
        Ok(())
    }

    pub async fn test_copy_preserves_content_type(&self) -> StoreResult<()> {
        let src = self.key("copy_src.txt");
        let dst = self.key("copy_dst.txt");
        let options = PutOptions {
            content_type: Some("text/plain".into()),
            ..Default::default()
        };
        self.store
            .put(&self.bucket, &src, Bytes::from_static(b"copied"), options)
            .await?;

        self.store
            .copy(CopyRequest::within(&self.bucket, &src, &dst))
            .await?;
        let head = self.store.head(&self.bucket, &dst).await?;
        assert_eq!(head.content_type.as_deref(), Some("text/plain"));
        assert_eq!(
            self.store.get(&self.bucket, &dst, None).await?,
            Bytes::from_static(b"copied")
        );

        let missing = self.key("copy_missing.txt");
        let result = self
            .store
            .copy(CopyRequest::within(&self.bucket, &missing, &dst))
            .await;
        assert!(result.is_err(), "copying an absent source should fail");
        Ok(())
    }

    pub async fn test_copy_replaces_tags(&self) -> StoreResult<()> {
        let src = self.key("tags_src.bin");
        let dst = self.key("tags_dst.bin");
        let mut tags = Tags::new();
        tags.insert("assetid".into(), "a1".into());
        tags.insert("vams-primarytype".into(), "lod1".into());
        self.store
            .put(
                &self.bucket,
                &src,
                Bytes::from_static(b"t"),
                PutOptions {
                    tags,
                    ..Default::default()
                },
            )
            .await?;

        let mut replaced = Tags::new();
        replaced.insert("assetid".into(), "a2".into());
        self.store
            .copy(
                CopyRequest::within(&self.bucket, &src, &dst)
                    .with_tags(TagDirective::Replace(replaced.clone())),
            )
            .await?;
        let head = self.store.head(&self.bucket, &dst).await?;
        assert_eq!(head.tags, replaced, "replace directive should win");
        Ok(())
    }

    pub async fn test_list_pagination(&self) -> StoreResult<()> {
        let prefix = self.key("page/");
        for name in ["c", "a", "b", "d", "e"] {
            self.put(&format!("{prefix}{name}"), b"x").await?;
        }

        let mut keys = Vec::new();
        let mut token: Option<String> = None;
        let mut pages = 0;
        loop {
            let page = self
                .store
                .list(&self.bucket, &prefix, token.as_deref(), 2)
                .await?;
            assert!(page.entries.len() <= 2, "page size should be honored");
            keys.extend(page.entries.into_iter().map(|e| e.key));
            pages += 1;
            match page.next_token {
                Some(next) => token = Some(next),
                None => break,
            }
        }
        let expected: Vec<String> = ["a", "b", "c", "d", "e"]
            .iter()
            .map(|n| format!("{prefix}{n}"))
            .collect();
        assert_eq!(keys, expected, "listing should be ordered and complete");
        assert_eq!(pages, 3);
        Ok(())
    }

    pub async fn test_tombstone_shadows_key(&self) -> StoreResult<()> {
        let key = self.key("tombstone.bin");
        self.put(&key, b"data").await?;
        self.store.delete(&self.bucket, &key, None).await?;

        assert!(
            matches!(
                self.store.head(&self.bucket, &key).await,
                Err(StoreError::NotFound)
            ),
            "tombstoned key should not be readable"
        );
        let page = self.store.list(&self.bucket, &key, None, 10).await?;
        assert!(page.entries.is_empty(), "tombstoned key should not be listed");

        let versions = self.store.list_versions(&self.bucket, &key, None, 10).await?;
        assert_eq!(versions.versions_of(&key).count(), 1);
        let tombstones: Vec<_> = versions.tombstones_of(&key).collect();
        assert_eq!(tombstones.len(), 1);
        assert!(tombstones[0].is_latest, "tombstone should be the latest entry");
        Ok(())
    }

    pub async fn test_explicit_version_reads(&self) -> StoreResult<()> {
        let key = self.key("explicit.bin");
        let first = self.put(&key, b"first").await?;
        self.put(&key, b"second").await?;
        self.store.delete(&self.bucket, &key, None).await?;

        let body = self.store.get(&self.bucket, &key, Some(&first)).await?;
        assert_eq!(body, Bytes::from_static(b"first"));
        let head = self.store.head_version(&self.bucket, &key, &first).await?;
        assert_eq!(head.version_id, first);
        assert_eq!(head.size, 5);
        Ok(())
    }

    pub async fn test_delete_version(&self) -> StoreResult<()> {
        let key = self.key("delete_version.bin");
        let first = self.put(&key, b"first").await?;
        let second = self.put(&key, b"second").await?;

        self.store.delete(&self.bucket, &key, Some(&second)).await?;
        let head = self.store.head(&self.bucket, &key).await?;
        assert_eq!(head.version_id, first, "older version should become live");

        self.store.delete(&self.bucket, &key, Some(&first)).await?;
        let versions = self.store.list_versions(&self.bucket, &key, None, 10).await?;
        assert!(versions.is_empty(), "erased key should leave no history");
        Ok(())
    }

    pub async fn test_list_versions_order(&self) -> StoreResult<()> {
        let key = self.key("order.bin");
        let first = self.put(&key, b"1").await?;
        let second = self.put(&key, b"2").await?;

        let page = self.store.list_versions(&self.bucket, &key, None, 10).await?;
        let ids: Vec<_> = page.versions_of(&key).map(|v| v.version_id.clone()).collect();
        assert_eq!(ids, vec![second, first], "versions should be newest first");
        let latest: Vec<_> = page.versions_of(&key).filter(|v| v.is_latest).collect();
        assert_eq!(latest.len(), 1);
        Ok(())
    }

    pub async fn test_restore_version(&self) -> StoreResult<()> {
        let key = self.key("restore.bin");
        let first = self.put(&key, b"original").await?;
        self.store.delete(&self.bucket, &key, None).await?;

        let restored = self
            .store
            .copy(CopyRequest::restore(&self.bucket, &key, &first))
            .await?;
        assert_ne!(restored, first, "restore should create a new version");
        assert_eq!(
            self.store.get(&self.bucket, &key, None).await?,
            Bytes::from_static(b"original")
        );
        Ok(())
    }

    pub async fn test_unversioned_delete(&self) -> StoreResult<()> {
        let key = self.key("unversioned.bin");
        self.put(&key, b"gone").await?;
        self.store.delete(&self.bucket, &key, None).await?;

        let versions = self.store.list_versions(&self.bucket, &key, None, 10).await?;
        assert!(versions.is_empty(), "unversioned delete should leave nothing");
        Ok(())
    }

    async fn put(&self, key: &str, body: &'static [u8]) -> StoreResult<String> {
        self.store
            .put(&self.bucket, key, Bytes::from_static(body), PutOptions::default())
            .await
    }
}

/// Notification sink that records every `(databaseId, assetId)` pair.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    events: Mutex<Vec<(String, String)>>,
    fail: bool,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// A notifier that records and then reports a delivery failure.
    pub fn failing() -> Self {
        Self {
            events: Mutex::default(),
            fail: true,
        }
    }

    pub fn events(&self) -> Vec<(String, String)> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl NotificationSink for RecordingNotifier {
    async fn notify(&self, database_id: &str, asset_id: &str) -> anyhow::Result<()> {
        if let Ok(mut events) = self.events.lock() {
            events.push((database_id.to_string(), asset_id.to_string()));
        }
        if self.fail {
            anyhow::bail!("notification channel unavailable");
        }
        Ok(())
    }
}
