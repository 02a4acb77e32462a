use chrono::{DateTime, Utc};
use serde::Serialize;
use vault_core::{ObjectStore, VersionEntry, VersionPage};

use crate::archive::chain_page;
use crate::error::FileResult;

/// One entry of a file's version history. Tombstones appear as archived
/// entries of size zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileVersion {
    pub version_id: String,
    pub last_modified: DateTime<Utc>,
    pub size: u64,
    pub is_latest: bool,
    pub storage_class: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    pub is_archived: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_asset_version_file_version_mismatch: Option<bool>,
}

impl From<&VersionEntry> for FileVersion {
    fn from(v: &VersionEntry) -> Self {
        Self {
            version_id: v.version_id.clone(),
            last_modified: v.last_modified,
            size: v.size,
            is_latest: v.is_latest,
            storage_class: v.storage_class.clone(),
            etag: Some(v.etag.clone()),
            is_archived: false,
            current_asset_version_file_version_mismatch: None,
        }
    }
}

/// Version history of exactly `key`, newest first, at most `limit` entries.
pub async fn version_history(
    store: &dyn ObjectStore,
    bucket: &str,
    key: &str,
    limit: usize,
) -> FileResult<Vec<FileVersion>> {
    let page = chain_page(store, bucket, key).await?;
    Ok(history_from_page(&page, key, limit))
}

/// Merges the versions and tombstones of `key` back into chain order.
fn history_from_page(page: &VersionPage, key: &str, limit: usize) -> Vec<FileVersion> {
    let mut entries: Vec<(usize, FileVersion)> = page
        .versions_of(key)
        .map(|v| (v.position, FileVersion::from(v)))
        .collect();
    entries.extend(page.tombstones_of(key).map(|t| {
        let version = FileVersion {
            version_id: t.version_id.clone(),
            last_modified: t.last_modified,
            size: 0,
            is_latest: t.is_latest,
            storage_class: vault_core::chain::STANDARD_STORAGE_CLASS.to_string(),
            etag: None,
            is_archived: true,
            current_asset_version_file_version_mismatch: None,
        };
        (t.position, version)
    }));
    // chain order, not timestamps: several writes can share one clock tick
    entries.sort_by_key(|(position, _)| *position);
    entries
        .into_iter()
        .take(limit)
        .map(|(_, version)| version)
        .collect()
}

/// Newest real (non-tombstone) version of `key`.
pub async fn newest_real_version(
    store: &dyn ObjectStore,
    bucket: &str,
    key: &str,
) -> FileResult<Option<VersionEntry>> {
    let page = chain_page(store, bucket, key).await?;
    // entries of one key come newest first
    Ok(page.versions_of(key).next().cloned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use vault_core::PutOptions;
    use vault_store_memory::MemoryStore;

    async fn put(store: &MemoryStore, key: &str, body: &'static [u8]) -> String {
        store
            .put("b", key, Bytes::from_static(body), PutOptions::default())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn history_is_newest_first_and_includes_tombstones() {
        let store = MemoryStore::new();
        let v1 = put(&store, "a/m.obj", b"1").await;
        let v2 = put(&store, "a/m.obj", b"22").await;
        put(&store, "a/m.obj.previewFile.png", b"p").await;
        store.delete("b", "a/m.obj", None).await.unwrap();

        let history = version_history(&store, "b", "a/m.obj", 100).await.unwrap();
        assert_eq!(history.len(), 3);
        assert!(history[0].is_archived);
        assert!(history[0].is_latest);
        assert_eq!(history[0].size, 0);
        assert_eq!(history[1].version_id, v2);
        assert_eq!(history[1].size, 2);
        assert_eq!(history[2].version_id, v1);

        let newest = newest_real_version(&store, "b", "a/m.obj").await.unwrap();
        assert_eq!(newest.map(|v| v.version_id), Some(v2));
    }

    #[test]
    fn history_follows_chain_order_within_one_timestamp() {
        use vault_core::chain::{StoredVersion, VersionChain};

        let at = Utc::now();
        let entry = |id: &str, tombstone: bool| StoredVersion {
            last_modified: at,
            tombstone,
            ..StoredVersion::tombstone(id.to_string())
        };
        let chain = VersionChain {
            entries: vec![
                entry("put-1", false),
                entry("del-1", true),
                entry("put-2", false),
                entry("del-2", true),
                entry("put-3", false),
            ],
        };
        let page = vault_core::chain::version_page([("k", &chain)], None, 10);
        let positions: Vec<_> = page.versions_of("k").map(|v| v.position).collect();
        assert_eq!(positions, vec![0, 2, 4]);

        let history = history_from_page(&page, "k", 100);
        let ids: Vec<_> = history.iter().map(|v| v.version_id.as_str()).collect();
        assert_eq!(ids, vec!["put-3", "del-2", "put-2", "del-1", "put-1"]);
        assert!(history[0].is_latest);
        assert!(history[1].is_archived);

        let capped = history_from_page(&page, "k", 2);
        assert_eq!(capped.len(), 2);
        assert_eq!(capped[1].version_id, "del-2");
    }

    #[tokio::test]
    async fn history_is_capped() {
        let store = MemoryStore::new();
        for _ in 0..5 {
            put(&store, "k", b"x").await;
        }
        let history = version_history(&store, "b", "k", 3).await.unwrap();
        assert_eq!(history.len(), 3);
        assert!(history[0].is_latest);
    }
}
