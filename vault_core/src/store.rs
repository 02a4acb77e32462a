use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// User-defined metadata attached to an object version.
pub type Tags = BTreeMap<String, String>;

pub type StoreResult<T, E = StoreError> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The key (or the addressed version) does not exist, or its latest
    /// entry is a tombstone and no version was given.
    #[error("object not found")]
    NotFound,
    /// The backend rejected the request because of rate limiting or a
    /// transient fault. Safe to retry.
    #[error("request throttled: {0}")]
    Throttled(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound)
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Throttled(_))
    }
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            StoreError::NotFound
        } else {
            StoreError::Other(err.into())
        }
    }
}

/// Versioned object storage addressed by `(bucket, key)`.
///
/// Every key owns an ordered version chain. A chain entry is either a real
/// version (with a body) or a tombstone that shadows the key without erasing
/// older versions. A key with an empty chain does not exist.
///
/// Listing contract shared by all implementations:
/// - keys are returned in ascending lexicographic order;
/// - `list_versions` returns the entries of each key newest first, with
///   `is_latest` set on exactly one entry (version or tombstone) per key;
/// - pages never split the chain of a single key, and `next_token` is
///   opaque to callers.
#[async_trait]
pub trait ObjectStore: std::fmt::Debug + Send + Sync + 'static {
    fn features(&self) -> StoreFeatures;

    /// Metadata of the live version. `NotFound` when the key is absent or
    /// archived.
    async fn head(&self, bucket: &str, key: &str) -> StoreResult<ObjectHead>;

    /// Metadata of an explicit version, regardless of tombstones.
    async fn head_version(&self, bucket: &str, key: &str, version_id: &str)
    -> StoreResult<ObjectHead>;

    async fn get(&self, bucket: &str, key: &str, version_id: Option<&str>) -> StoreResult<Bytes>;

    /// Writes a new version and returns its id.
    async fn put(&self, bucket: &str, key: &str, body: Bytes, options: PutOptions)
    -> StoreResult<String>;

    /// Copies a (possibly explicit) source version onto the destination key,
    /// creating a new version there. Returns the new version id.
    async fn copy(&self, request: CopyRequest<'_>) -> StoreResult<String>;

    /// Without a version id: writes a tombstone on versioned stores, removes
    /// the object on unversioned ones. With a version id: permanently
    /// removes that version or tombstone.
    async fn delete(&self, bucket: &str, key: &str, version_id: Option<&str>) -> StoreResult<()>;

    /// Live objects under `prefix`.
    async fn list(
        &self,
        bucket: &str,
        prefix: &str,
        page_token: Option<&str>,
        page_size: usize,
    ) -> StoreResult<ObjectPage>;

    /// Versions and tombstones of every key under `prefix`.
    async fn list_versions(
        &self,
        bucket: &str,
        prefix: &str,
        page_token: Option<&str>,
        page_size: usize,
    ) -> StoreResult<VersionPage>;
}

#[async_trait]
impl<S: ObjectStore + ?Sized> ObjectStore for Arc<S> {
    fn features(&self) -> StoreFeatures {
        (**self).features()
    }

    async fn head(&self, bucket: &str, key: &str) -> StoreResult<ObjectHead> {
        (**self).head(bucket, key).await
    }

    async fn head_version(
        &self,
        bucket: &str,
        key: &str,
        version_id: &str,
    ) -> StoreResult<ObjectHead> {
        (**self).head_version(bucket, key, version_id).await
    }

    async fn get(&self, bucket: &str, key: &str, version_id: Option<&str>) -> StoreResult<Bytes> {
        (**self).get(bucket, key, version_id).await
    }

    async fn put(
        &self,
        bucket: &str,
        key: &str,
        body: Bytes,
        options: PutOptions,
    ) -> StoreResult<String> {
        (**self).put(bucket, key, body, options).await
    }

    async fn copy(&self, request: CopyRequest<'_>) -> StoreResult<String> {
        (**self).copy(request).await
    }

    async fn delete(&self, bucket: &str, key: &str, version_id: Option<&str>) -> StoreResult<()> {
        (**self).delete(bucket, key, version_id).await
    }

    async fn list(
        &self,
        bucket: &str,
        prefix: &str,
        page_token: Option<&str>,
        page_size: usize,
    ) -> StoreResult<ObjectPage> {
        (**self).list(bucket, prefix, page_token, page_size).await
    }

    async fn list_versions(
        &self,
        bucket: &str,
        prefix: &str,
        page_token: Option<&str>,
        page_size: usize,
    ) -> StoreResult<VersionPage> {
        (**self)
            .list_versions(bucket, prefix, page_token, page_size)
            .await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreFeatures {
    /// Whether deletes without a version id leave a tombstone behind.
    pub versioned: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectHead {
    pub key: String,
    pub version_id: String,
    pub size: u64,
    pub last_modified: DateTime<Utc>,
    pub content_type: Option<String>,
    pub etag: String,
    pub storage_class: String,
    pub tags: Tags,
}

#[derive(Debug, Clone, Default)]
pub struct PutOptions {
    pub content_type: Option<String>,
    pub tags: Tags,
}

/// How tags are carried over by [`ObjectStore::copy`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TagDirective {
    #[default]
    Copy,
    Replace(Tags),
}

#[derive(Debug, Clone)]
pub struct CopyRequest<'a> {
    pub src_bucket: &'a str,
    pub src_key: &'a str,
    pub src_version: Option<&'a str>,
    pub dst_bucket: &'a str,
    pub dst_key: &'a str,
    pub tags: TagDirective,
}

impl<'a> CopyRequest<'a> {
    /// Copies the live version of `src_key` within one bucket.
    pub fn within(bucket: &'a str, src_key: &'a str, dst_key: &'a str) -> Self {
        Self {
            src_bucket: bucket,
            src_key,
            src_version: None,
            dst_bucket: bucket,
            dst_key,
            tags: TagDirective::Copy,
        }
    }

    /// Copies an explicit version of `key` back onto itself.
    pub fn restore(bucket: &'a str, key: &'a str, version_id: &'a str) -> Self {
        Self {
            src_bucket: bucket,
            src_key: key,
            src_version: Some(version_id),
            dst_bucket: bucket,
            dst_key: key,
            tags: TagDirective::Copy,
        }
    }

    pub fn with_tags(mut self, tags: TagDirective) -> Self {
        self.tags = tags;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectSummary {
    pub key: String,
    pub size: u64,
    pub last_modified: DateTime<Utc>,
    pub etag: String,
    pub storage_class: String,
}

#[derive(Debug, Clone, Default)]
pub struct ObjectPage {
    pub entries: Vec<ObjectSummary>,
    pub next_token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionEntry {
    pub key: String,
    pub version_id: String,
    pub size: u64,
    pub last_modified: DateTime<Utc>,
    pub etag: String,
    pub storage_class: String,
    pub is_latest: bool,
    /// Place in the key's chain counting back from the latest entry (0).
    pub position: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TombstoneEntry {
    pub key: String,
    pub version_id: String,
    pub last_modified: DateTime<Utc>,
    pub is_latest: bool,
    pub position: usize,
}

#[derive(Debug, Clone, Default)]
pub struct VersionPage {
    pub versions: Vec<VersionEntry>,
    pub tombstones: Vec<TombstoneEntry>,
    pub next_token: Option<String>,
}

impl VersionPage {
    /// Versions recorded for exactly `key`, newest first.
    pub fn versions_of<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a VersionEntry> + 'a {
        self.versions.iter().filter(move |v| v.key == key)
    }

    /// Tombstones recorded for exactly `key`, newest first.
    pub fn tombstones_of<'a>(
        &'a self,
        key: &'a str,
    ) -> impl Iterator<Item = &'a TombstoneEntry> + 'a {
        self.tombstones.iter().filter(move |t| t.key == key)
    }

    pub fn is_empty(&self) -> bool {
        self.versions.is_empty() && self.tombstones.is_empty()
    }
}
