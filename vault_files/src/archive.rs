//! Archive state of a key, derived from its version chain on every call.

use vault_core::{ObjectHead, ObjectStore, StoreError, VersionPage};

use crate::error::{FileError, FileResult};

/// Page size used when inspecting the chain of a single key.
pub(crate) const CHAIN_PAGE_SIZE: usize = 1000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyState {
    Live(ObjectHead),
    /// The latest chain entry is the tombstone with this id.
    Archived { tombstone_id: String },
    NotFound,
}

impl KeyState {
    pub fn is_archived(&self) -> bool {
        matches!(self, KeyState::Archived { .. })
    }
}

/// First page of version entries under `key`.
///
/// Listing by the key itself as prefix also returns longer keys (previews,
/// folder contents), but the exact key sorts first and pages never split a
/// chain, so the whole chain of `key` is always on this page.
pub(crate) async fn chain_page(
    store: &dyn ObjectStore,
    bucket: &str,
    key: &str,
) -> FileResult<VersionPage> {
    Ok(store
        .list_versions(bucket, key, None, CHAIN_PAGE_SIZE)
        .await?)
}

/// Determines whether `key` is live, archived or absent.
///
/// Throttling errors propagate as [`FileError::Transient`]; they are never
/// reported as "not archived".
pub async fn key_state(store: &dyn ObjectStore, bucket: &str, key: &str) -> FileResult<KeyState> {
    match store.head(bucket, key).await {
        Ok(head) => Ok(KeyState::Live(head)),
        Err(StoreError::NotFound) => {
            let page = chain_page(store, bucket, key).await?;
            Ok(page
                .tombstones_of(key)
                .find(|t| t.is_latest)
                .map(|t| KeyState::Archived {
                    tombstone_id: t.version_id.clone(),
                })
                .unwrap_or(KeyState::NotFound))
        }
        Err(e) => Err(e.into()),
    }
}

/// Without a version: whether the key is archived, failing with
/// `"File not found."` when it has no chain at all. With a version: whether
/// that exact entry is a tombstone.
pub async fn is_archived(
    store: &dyn ObjectStore,
    bucket: &str,
    key: &str,
    version_id: Option<&str>,
) -> FileResult<bool> {
    match version_id {
        Some(version_id) => {
            let page = chain_page(store, bucket, key).await?;
            Ok(page
                .tombstones_of(key)
                .any(|t| t.version_id == version_id))
        }
        None => match key_state(store, bucket, key).await? {
            KeyState::Live(_) => Ok(false),
            KeyState::Archived { .. } => Ok(true),
            KeyState::NotFound => Err(FileError::general("File not found.")),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use vault_core::PutOptions;
    use vault_store_memory::MemoryStore;

    #[tokio::test]
    async fn states_follow_the_chain() {
        let store = MemoryStore::new();
        let put = |key: &'static str| {
            store.put("b", key, Bytes::from_static(b"x"), PutOptions::default())
        };
        put("a/photo.jpg").await.unwrap();
        put("a/photo.jpg.previewFile.png").await.unwrap();

        assert!(matches!(
            key_state(&store, "b", "a/photo.jpg").await.unwrap(),
            KeyState::Live(_)
        ));
        assert!(!is_archived(&store, "b", "a/photo.jpg", None).await.unwrap());

        store.delete("b", "a/photo.jpg", None).await.unwrap();
        let state = key_state(&store, "b", "a/photo.jpg").await.unwrap();
        let KeyState::Archived { tombstone_id } = state else {
            panic!("expected archived, got {state:?}");
        };
        assert!(is_archived(&store, "b", "a/photo.jpg", None).await.unwrap());
        assert!(
            is_archived(&store, "b", "a/photo.jpg", Some(&tombstone_id))
                .await
                .unwrap()
        );

        // the preview shares the prefix but keeps its own state
        assert!(
            !is_archived(&store, "b", "a/photo.jpg.previewFile.png", None)
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn missing_keys_are_not_archived() {
        let store = MemoryStore::new();
        assert_eq!(
            key_state(&store, "b", "nope").await.unwrap(),
            KeyState::NotFound
        );
        let err = is_archived(&store, "b", "nope", None).await.unwrap_err();
        assert!(matches!(err, FileError::General(_)));
    }

    #[tokio::test]
    async fn throttling_is_not_reported_as_live() {
        let store = MemoryStore::new();
        store.fail_next(1);
        let err = key_state(&store, "b", "k").await.unwrap_err();
        assert!(matches!(err, FileError::Transient(_)));
    }
}
