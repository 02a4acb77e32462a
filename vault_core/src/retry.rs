//! Bounded retry with exponential backoff for throttled store requests.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::store::{
    CopyRequest, ObjectHead, ObjectPage, ObjectStore, PutOptions, StoreFeatures, StoreResult,
    VersionPage,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_ms: 50,
            max_delay_ms: 2_000,
        }
    }
}

impl RetryConfig {
    /// Delay before the attempt following `attempt` (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 1u64 << attempt.saturating_sub(1).min(20);
        let ms = self.base_delay_ms.saturating_mul(factor).min(self.max_delay_ms);
        Duration::from_millis(ms)
    }
}

/// Runs `f` until it succeeds, fails with a non-retryable error, or the
/// attempt budget is spent. Only [`StoreError::Throttled`] is retried.
///
/// [`StoreError::Throttled`]: crate::store::StoreError::Throttled
pub async fn with_retry<T, F, Fut>(config: &RetryConfig, op: &str, mut f: F) -> StoreResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = StoreResult<T>>,
{
    let mut attempt = 1;
    loop {
        match f().await {
            Err(err) if err.is_retryable() && attempt < config.max_attempts => {
                let delay = config.delay_after(attempt);
                tracing::debug!(op, attempt, ?delay, "store request throttled, retrying: {err}");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            result => return result,
        }
    }
}

/// `ObjectStore` decorator applying [`with_retry`] to every call.
#[derive(Debug)]
pub struct RetryingStore<S> {
    inner: S,
    config: RetryConfig,
}

impl<S: ObjectStore> RetryingStore<S> {
    pub fn new(inner: S, config: RetryConfig) -> Self {
        Self { inner, config }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

#[async_trait]
impl<S: ObjectStore> ObjectStore for RetryingStore<S> {
    fn features(&self) -> StoreFeatures {
        self.inner.features()
    }

    async fn head(&self, bucket: &str, key: &str) -> StoreResult<ObjectHead> {
        with_retry(&self.config, "head", || self.inner.head(bucket, key)).await
    }

    async fn head_version(
        &self,
        bucket: &str,
        key: &str,
        version_id: &str,
    ) -> StoreResult<ObjectHead> {
        with_retry(&self.config, "head_version", || {
            self.inner.head_version(bucket, key, version_id)
        })
        .await
    }

    async fn get(&self, bucket: &str, key: &str, version_id: Option<&str>) -> StoreResult<Bytes> {
        with_retry(&self.config, "get", || self.inner.get(bucket, key, version_id)).await
    }

    async fn put(
        &self,
        bucket: &str,
        key: &str,
        body: Bytes,
        options: PutOptions,
    ) -> StoreResult<String> {
        with_retry(&self.config, "put", || {
            self.inner.put(bucket, key, body.clone(), options.clone())
        })
        .await
    }

    async fn copy(&self, request: CopyRequest<'_>) -> StoreResult<String> {
        with_retry(&self.config, "copy", || self.inner.copy(request.clone())).await
    }

    async fn delete(&self, bucket: &str, key: &str, version_id: Option<&str>) -> StoreResult<()> {
        with_retry(&self.config, "delete", || {
            self.inner.delete(bucket, key, version_id)
        })
        .await
    }

    async fn list(
        &self,
        bucket: &str,
        prefix: &str,
        page_token: Option<&str>,
        page_size: usize,
    ) -> StoreResult<ObjectPage> {
        with_retry(&self.config, "list", || {
            self.inner.list(bucket, prefix, page_token, page_size)
        })
        .await
    }

    async fn list_versions(
        &self,
        bucket: &str,
        prefix: &str,
        page_token: Option<&str>,
        page_size: usize,
    ) -> StoreResult<VersionPage> {
        with_retry(&self.config, "list_versions", || {
            self.inner.list_versions(bucket, prefix, page_token, page_size)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StoreError;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast() -> RetryConfig {
        RetryConfig {
            max_attempts: 3,
            base_delay_ms: 1,
            max_delay_ms: 4,
        }
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let config = RetryConfig {
            max_attempts: 10,
            base_delay_ms: 50,
            max_delay_ms: 300,
        };
        assert_eq!(config.delay_after(1), Duration::from_millis(50));
        assert_eq!(config.delay_after(2), Duration::from_millis(100));
        assert_eq!(config.delay_after(3), Duration::from_millis(200));
        assert_eq!(config.delay_after(4), Duration::from_millis(300));
    }

    #[tokio::test]
    async fn throttled_requests_are_retried_until_success() {
        let calls = AtomicU32::new(0);
        let result = with_retry(&fast(), "test", || async {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(StoreError::Throttled("slow down".into()))
            } else {
                Ok(7)
            }
        })
        .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn attempts_are_bounded() {
        let calls = AtomicU32::new(0);
        let result: StoreResult<()> = with_retry(&fast(), "test", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(StoreError::Throttled("slow down".into()))
        })
        .await;
        assert!(matches!(result, Err(StoreError::Throttled(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn other_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let result: StoreResult<()> = with_retry(&fast(), "test", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(StoreError::NotFound)
        })
        .await;
        assert!(matches!(result, Err(StoreError::NotFound)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
