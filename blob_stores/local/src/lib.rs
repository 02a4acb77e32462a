use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, anyhow};
use bytes::Bytes;
use chrono::Utc;
use tokio::sync::Mutex;
use vault_core::chain::{self, STANDARD_STORAGE_CLASS, StoredVersion, VersionChain};
use vault_core::store::{
    CopyRequest, ObjectHead, ObjectPage, PutOptions, StoreError, StoreFeatures, StoreResult,
    TagDirective, Tags, VersionPage,
};

const MANIFEST: &str = "manifest.json";

/// Contents of a key directory's manifest.
#[derive(Debug, serde::Serialize, serde::Deserialize)]
struct Manifest {
    key: String,
    chain: VersionChain,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub struct LocalStoreConfig {
    pub base_path: String,
    #[serde(default = "default_versioned")]
    pub versioned: bool,
}

fn default_versioned() -> bool {
    true
}

/// Filesystem-backed versioned object store.
///
/// Layout: `<base>/<bucket>/<blake3(key)>/manifest.json` holds the key and
/// its version chain, `<version id>.bin` next to it holds each body. Keys
/// are hashed so that separators never reach the filesystem and long keys
/// stay within the file name limit.
#[derive(Debug, Clone)]
pub struct LocalStore {
    base_path: PathBuf,
    versioned: bool,
    // serializes manifest read-modify-write cycles
    write_lock: Arc<Mutex<()>>,
}

impl LocalStore {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        LocalStore {
            base_path: base_path.into(),
            versioned: true,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn create(config: LocalStoreConfig) -> Self {
        LocalStore {
            versioned: config.versioned,
            ..Self::new(config.base_path)
        }
    }

    fn bucket_dir(&self, bucket: &str) -> StoreResult<PathBuf> {
        if bucket.is_empty() || bucket.contains("..") || bucket.contains(['/', '\\']) {
            return Err(anyhow!("Invalid bucket name: '{}'", bucket).into());
        }
        Ok(self.base_path.join(bucket))
    }

    fn key_dir(&self, bucket: &str, key: &str) -> StoreResult<PathBuf> {
        if key.is_empty() {
            return Err(anyhow!("Invalid empty key").into());
        }
        let digest = blake3::hash(key.as_bytes()).to_hex();
        Ok(self.bucket_dir(bucket)?.join(digest.as_str()))
    }

    async fn read_manifest(dir: &Path) -> StoreResult<Manifest> {
        let path = dir.join(MANIFEST);
        let raw = tokio::fs::read(&path).await?;
        let manifest = serde_json::from_slice(&raw)
            .with_context(|| format!("corrupt manifest at {}", path.display()))?;
        Ok(manifest)
    }

    async fn read_chain(&self, bucket: &str, key: &str) -> StoreResult<VersionChain> {
        let manifest = Self::read_manifest(&self.key_dir(bucket, key)?).await?;
        if manifest.key != key {
            return Err(anyhow!("manifest key collision for '{}'", key).into());
        }
        Ok(manifest.chain)
    }

    async fn write_chain(&self, bucket: &str, key: &str, chain: &VersionChain) -> StoreResult<()> {
        let dir = self.key_dir(bucket, key)?;
        if chain.is_empty() {
            match tokio::fs::remove_dir_all(&dir).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
            return Ok(());
        }
        tokio::fs::create_dir_all(&dir).await?;
        let manifest = Manifest {
            key: key.to_string(),
            chain: chain.clone(),
        };
        let raw = serde_json::to_vec(&manifest).context("failed to encode manifest")?;
        let tmp = dir.join(format!("{MANIFEST}.tmp"));
        tokio::fs::write(&tmp, raw).await?;
        tokio::fs::rename(&tmp, dir.join(MANIFEST)).await?;
        Ok(())
    }

    async fn entry(
        &self,
        bucket: &str,
        key: &str,
        version_id: Option<&str>,
    ) -> StoreResult<StoredVersion> {
        let chain = self.read_chain(bucket, key).await?;
        let entry = match version_id {
            Some(id) => chain.find(id).filter(|e| !e.tombstone),
            None => chain.live(),
        };
        entry.cloned().ok_or(StoreError::NotFound)
    }

    async fn read_body(&self, bucket: &str, key: &str, version_id: &str) -> StoreResult<Bytes> {
        let path = self.key_dir(bucket, key)?.join(format!("{version_id}.bin"));
        Ok(Bytes::from(tokio::fs::read(&path).await?))
    }

    async fn remove_body(&self, bucket: &str, key: &str, version_id: &str) -> StoreResult<()> {
        let path = self.key_dir(bucket, key)?.join(format!("{version_id}.bin"));
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn write(
        &self,
        bucket: &str,
        key: &str,
        body: Bytes,
        content_type: Option<String>,
        tags: Tags,
    ) -> StoreResult<String> {
        let _guard = self.write_lock.lock().await;
        let dir = self.key_dir(bucket, key)?;
        tokio::fs::create_dir_all(&dir).await?;

        let version_id = uuid::Uuid::new_v4().simple().to_string();
        tokio::fs::write(dir.join(format!("{version_id}.bin")), &body).await?;

        let mut chain = match self.read_chain(bucket, key).await {
            Ok(chain) => chain,
            Err(StoreError::NotFound) => VersionChain::default(),
            Err(e) => return Err(e),
        };
        if !self.versioned {
            for old in std::mem::take(&mut chain.entries) {
                self.remove_body(bucket, key, &old.version_id).await?;
            }
        }
        chain.push(StoredVersion {
            version_id: version_id.clone(),
            last_modified: Utc::now(),
            tombstone: false,
            size: body.len() as u64,
            etag: blake3::hash(&body).to_hex().to_string(),
            content_type,
            storage_class: STANDARD_STORAGE_CLASS.to_string(),
            tags,
        });
        self.write_chain(bucket, key, &chain).await?;
        Ok(version_id)
    }

    /// Chains of every key under `prefix`, sorted by key.
    async fn sorted_under(
        &self,
        bucket: &str,
        prefix: &str,
    ) -> StoreResult<Vec<(String, VersionChain)>> {
        let dir = self.bucket_dir(bucket)?;
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut chains = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            match Self::read_manifest(&entry.path()).await {
                Ok(manifest) if manifest.key.starts_with(prefix) => {
                    chains.push((manifest.key, manifest.chain));
                }
                Ok(_) => {}
                // created by a write that has not committed its manifest yet,
                // or removed between the directory scan and the read
                Err(StoreError::NotFound) => {}
                Err(e) => return Err(e),
            }
        }
        chains.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(chains)
    }
}

#[async_trait::async_trait]
impl vault_core::store::ObjectStore for LocalStore {
    fn features(&self) -> StoreFeatures {
        StoreFeatures {
            versioned: self.versioned,
        }
    }

    async fn head(&self, bucket: &str, key: &str) -> StoreResult<ObjectHead> {
        Ok(self.entry(bucket, key, None).await?.to_head(key))
    }

    async fn head_version(
        &self,
        bucket: &str,
        key: &str,
        version_id: &str,
    ) -> StoreResult<ObjectHead> {
        Ok(self.entry(bucket, key, Some(version_id)).await?.to_head(key))
    }

    async fn get(&self, bucket: &str, key: &str, version_id: Option<&str>) -> StoreResult<Bytes> {
        let entry = self.entry(bucket, key, version_id).await?;
        self.read_body(bucket, key, &entry.version_id).await
    }

    async fn put(
        &self,
        bucket: &str,
        key: &str,
        body: Bytes,
        options: PutOptions,
    ) -> StoreResult<String> {
        self.write(bucket, key, body, options.content_type, options.tags)
            .await
    }

    async fn copy(&self, request: CopyRequest<'_>) -> StoreResult<String> {
        let source = self
            .entry(request.src_bucket, request.src_key, request.src_version)
            .await?;
        let body = self
            .read_body(request.src_bucket, request.src_key, &source.version_id)
            .await?;
        let tags = match request.tags {
            TagDirective::Copy => source.tags,
            TagDirective::Replace(tags) => tags,
        };
        self.write(
            request.dst_bucket,
            request.dst_key,
            body,
            source.content_type,
            tags,
        )
        .await
    }

    async fn delete(&self, bucket: &str, key: &str, version_id: Option<&str>) -> StoreResult<()> {
        let _guard = self.write_lock.lock().await;
        let mut chain = self.read_chain(bucket, key).await?;
        match version_id {
            Some(id) => {
                let removed = chain.remove(id).ok_or(StoreError::NotFound)?;
                self.remove_body(bucket, key, &removed.version_id).await?;
            }
            None if self.versioned => {
                let id = uuid::Uuid::new_v4().simple().to_string();
                chain.push(StoredVersion::tombstone(id));
            }
            None => chain.entries.clear(),
        }
        self.write_chain(bucket, key, &chain).await
    }

    async fn list(
        &self,
        bucket: &str,
        prefix: &str,
        page_token: Option<&str>,
        page_size: usize,
    ) -> StoreResult<ObjectPage> {
        let chains = self.sorted_under(bucket, prefix).await?;
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
        let chains = self.sorted_under(bucket, prefix).await?;
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
    async fn test_local_store() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = LocalStore::new(temp_dir.path());
        ObjectStoreTests::new(&store, "content").run_all().await.unwrap();
    }

    #[tokio::test]
    async fn test_unversioned_local_store() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = LocalStore::create(LocalStoreConfig {
            base_path: temp_dir.path().to_string_lossy().into_owned(),
            versioned: false,
        });
        ObjectStoreTests::new(&store, "auxiliary")
            .run_all()
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn chains_survive_reopen() {
        let temp_dir = tempfile::tempdir().unwrap();
        let version = {
            let store = LocalStore::new(temp_dir.path());
            store
                .put(
                    "content",
                    "assets/a1/model.obj",
                    Bytes::from_static(b"v1"),
                    PutOptions::default(),
                )
                .await
                .unwrap()
        };

        let store = LocalStore::new(temp_dir.path());
        let head = store.head("content", "assets/a1/model.obj").await.unwrap();
        assert_eq!(head.version_id, version);
        let page = store.list("content", "assets/", None, 10).await.unwrap();
        assert_eq!(page.entries.len(), 1);
        assert_eq!(page.entries[0].key, "assets/a1/model.obj");
    }

    #[tokio::test]
    async fn long_keys_fit_in_one_directory() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = LocalStore::new(temp_dir.path());
        let long_key = format!(
            "assets/0f8fad5b-d9cb-469f-a165-70867728950e/{}/mesh.obj",
            ["renders/high/lod0"; 20].join("/")
        );
        assert!(long_key.len() >= 300);

        let version = store
            .put(
                "content",
                &long_key,
                Bytes::from_static(b"mesh"),
                PutOptions::default(),
            )
            .await
            .unwrap();
        store
            .put(
                "content",
                "assets/0f8fad5b-d9cb-469f-a165-70867728950e/a.txt",
                Bytes::from_static(b"a"),
                PutOptions::default(),
            )
            .await
            .unwrap();

        let head = store.head("content", &long_key).await.unwrap();
        assert_eq!(head.version_id, version);
        let body = store.get("content", &long_key, None).await.unwrap();
        assert_eq!(&body[..], b"mesh");

        let page = store.list("content", "assets/", None, 10).await.unwrap();
        let keys: Vec<_> = page.entries.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(
            keys,
            vec![
                "assets/0f8fad5b-d9cb-469f-a165-70867728950e/a.txt",
                long_key.as_str(),
            ]
        );

        store.delete("content", &long_key, None).await.unwrap();
        let versions = store
            .list_versions("content", &long_key, None, 10)
            .await
            .unwrap();
        assert_eq!(versions.versions.len(), 1);
        assert_eq!(versions.tombstones.len(), 1);
    }

    #[tokio::test]
    async fn invalid_bucket_names_are_rejected() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = LocalStore::new(temp_dir.path());
        let result = store.head("../escape", "k").await;
        assert!(matches!(result, Err(StoreError::Other(_))));
    }
}
