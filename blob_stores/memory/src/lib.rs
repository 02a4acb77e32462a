use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};

use bytes::Bytes;
use chrono::Utc;
use dashmap::DashMap;
use vault_core::chain::{self, STANDARD_STORAGE_CLASS, StoredVersion, VersionChain};
use vault_core::store::{
    CopyRequest, ObjectHead, ObjectPage, PutOptions, StoreError, StoreFeatures, StoreResult,
    TagDirective, Tags, VersionPage,
};

/// In-memory versioned object store.
///
/// Each bucket is a sorted map of key to version chain; bodies are kept
/// per version id. Built unversioned, a delete removes the key outright
/// and every put replaces the single stored version.
#[derive(Debug)]
pub struct MemoryStore {
    buckets: DashMap<String, BTreeMap<String, VersionChain>>,
    bodies: DashMap<String, Bytes>,
    versioned: bool,
    throttle: AtomicU32,
}

impl MemoryStore {
    /// Creates a new, empty versioned `MemoryStore`.
    pub fn new() -> Self {
        Self {
            buckets: DashMap::new(),
            bodies: DashMap::new(),
            versioned: true,
            throttle: AtomicU32::new(0),
        }
    }

    /// Creates a store without version history.
    pub fn unversioned() -> Self {
        Self {
            versioned: false,
            ..Self::new()
        }
    }

    /// Makes the next `n` calls fail with [`StoreError::Throttled`].
    pub fn fail_next(&self, n: u32) {
        self.throttle.store(n, Ordering::SeqCst);
    }

    fn check_throttle(&self) -> StoreResult<()> {
        let throttled = self
            .throttle
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if throttled {
            return Err(StoreError::Throttled("injected fault".into()));
        }
        Ok(())
    }

    fn entry(
        &self,
        bucket: &str,
        key: &str,
        version_id: Option<&str>,
    ) -> StoreResult<StoredVersion> {
        let chains = self.buckets.get(bucket).ok_or(StoreError::NotFound)?;
        let chain = chains.get(key).ok_or(StoreError::NotFound)?;
        let entry = match version_id {
            Some(id) => chain.find(id).filter(|e| !e.tombstone),
            None => chain.live(),
        };
        entry.cloned().ok_or(StoreError::NotFound)
    }

    fn write(
        &self,
        bucket: &str,
        key: &str,
        body: Bytes,
        content_type: Option<String>,
        tags: Tags,
    ) -> String {
        let version_id = uuid::Uuid::new_v4().simple().to_string();
        let entry = StoredVersion {
            version_id: version_id.clone(),
            last_modified: Utc::now(),
            tombstone: false,
            size: body.len() as u64,
            etag: blake3::hash(&body).to_hex().to_string(),
            content_type,
            storage_class: STANDARD_STORAGE_CLASS.to_string(),
            tags,
        };
        self.bodies.insert(version_id.clone(), body);

        let mut chains = self.buckets.entry(bucket.to_string()).or_default();
        let chain = chains.entry(key.to_string()).or_default();
        if !self.versioned {
            for old in chain.entries.drain(..) {
                self.bodies.remove(&old.version_id);
            }
        }
        chain.push(entry);
        version_id
    }

    fn sorted_under(&self, bucket: &str, prefix: &str) -> Vec<(String, VersionChain)> {
        let Some(chains) = self.buckets.get(bucket) else {
            return Vec::new();
        };
        chains
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, chain)| (key.clone(), chain.clone()))
            .collect()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl vault_core::store::ObjectStore for MemoryStore {
    fn features(&self) -> StoreFeatures {
        StoreFeatures {
            versioned: self.versioned,
        }
    }

    async fn head(&self, bucket: &str, key: &str) -> StoreResult<ObjectHead> {
        self.check_throttle()?;
        Ok(self.entry(bucket, key, None)?.to_head(key))
    }

    async fn head_version(
        &self,
        bucket: &str,
        key: &str,
        version_id: &str,
    ) -> StoreResult<ObjectHead> {
        self.check_throttle()?;
        Ok(self.entry(bucket, key, Some(version_id))?.to_head(key))
    }

    async fn get(&self, bucket: &str, key: &str, version_id: Option<&str>) -> StoreResult<Bytes> {
        self.check_throttle()?;
        let entry = self.entry(bucket, key, version_id)?;
        let body = self
            .bodies
            .get(&entry.version_id)
            .ok_or(StoreError::NotFound)?;
        Ok(body.value().clone())
    }

    async fn put(
        &self,
        bucket: &str,
        key: &str,
        body: Bytes,
        options: PutOptions,
    ) -> StoreResult<String> {
        self.check_throttle()?;
        Ok(self.write(bucket, key, body, options.content_type, options.tags))
    }

    async fn copy(&self, request: CopyRequest<'_>) -> StoreResult<String> {
        self.check_throttle()?;
        let source = self.entry(request.src_bucket, request.src_key, request.src_version)?;
        let body = self
            .bodies
            .get(&source.version_id)
            .map(|b| b.value().clone())
            .ok_or(StoreError::NotFound)?;
        let tags = match request.tags {
            TagDirective::Copy => source.tags,
            TagDirective::Replace(tags) => tags,
        };
        Ok(self.write(
            request.dst_bucket,
            request.dst_key,
            body,
            source.content_type,
            tags,
        ))
    }

    async fn delete(&self, bucket: &str, key: &str, version_id: Option<&str>) -> StoreResult<()> {
        self.check_throttle()?;
        let mut chains = self.buckets.get_mut(bucket).ok_or(StoreError::NotFound)?;
        let chain = chains.get_mut(key).ok_or(StoreError::NotFound)?;
        match version_id {
            Some(id) => {
                let removed = chain.remove(id).ok_or(StoreError::NotFound)?;
                self.bodies.remove(&removed.version_id);
            }
            None if self.versioned => {
                let id = uuid::Uuid::new_v4().simple().to_string();
                chain.push(StoredVersion::tombstone(id));
            }
            None => {
                for old in chain.entries.drain(..) {
                    self.bodies.remove(&old.version_id);
                }
            }
        }
        if chain.is_empty() {
            chains.remove(key);
        }
        Ok(())
    }

    async fn list(
        &self,
        bucket: &str,
        prefix: &str,
        page_token: Option<&str>,
        page_size: usize,
    ) -> StoreResult<ObjectPage> {
        self.check_throttle()?;
        let chains = self.sorted_under(bucket, prefix);
        Ok(chain::list_page(
            chains.iter().map(|(k, c)| (k.as_str(), c)),
            page_token,
            page_size,
        ))
    }

    async fn list_versions(
        &self,
        bucket: &str,
        prefix: &str,
        page_token: Option<&str>,
        page_size: usize,
    ) -> StoreResult<VersionPage> {
        self.check_throttle()?;
        let chains = self.sorted_under(bucket, prefix);
        Ok(chain::version_page(
            chains.iter().map(|(k, c)| (k.as_str(), c)),
            page_token,
            page_size,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vault_core::store::ObjectStore;
    use vault_core::testutil::ObjectStoreTests;

    #[tokio::test]
    async fn test_memory_store() {
        let store = MemoryStore::new();
        ObjectStoreTests::new(&store, "content").run_all().await.unwrap();
    }

    #[tokio::test]
    async fn test_unversioned_memory_store() {
        let store = MemoryStore::unversioned();
        ObjectStoreTests::new(&store, "auxiliary").run_all().await.unwrap();
    }

    #[tokio::test]
    async fn injected_faults_are_throttling_errors() {
        let store = MemoryStore::new();
        store.fail_next(2);
        assert!(matches!(
            store.head("b", "k").await,
            Err(StoreError::Throttled(_))
        ));
        assert!(matches!(
            store.head("b", "k").await,
            Err(StoreError::Throttled(_))
        ));
        assert!(matches!(store.head("b", "k").await, Err(StoreError::NotFound)));
    }

    #[tokio::test]
    async fn buckets_are_isolated() {
        let store = MemoryStore::new();
        store
            .put("one", "k", Bytes::from_static(b"x"), PutOptions::default())
            .await
            .unwrap();
        assert!(store.head("two", "k").await.is_err());
        let page = store.list("two", "", None, 10).await.unwrap();
        assert!(page.entries.is_empty());
    }
}
