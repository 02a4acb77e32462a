use std::future::Future;
use std::sync::Arc;

use tracing::{error, warn};
use vault_core::{
    CopyRequest, LogNotifier, MetadataStore, NotificationSink, ObjectStore, Operation,
    PermissionOracle, RetryingStore, StoreError,
};

use crate::archive::chain_page;
use crate::authorize::{AuthorizedAsset, authorize};
use crate::cascade::{CascadeAction, CascadeOutcome, CascadeReport};
use crate::config::EngineConfig;
use crate::error::{FileError, FileResult};
use crate::model::*;
use crate::ops;
use crate::paths::auxiliary_prefix;
use crate::preview::{PreviewFile, find_previews};
use crate::versions::newest_real_version;

/// File lifecycle engine for the files of versioned assets.
///
/// Every operation runs the same pipeline: validate the request, authorize
/// the caller against the asset, resolve the path, check preconditions,
/// execute, cascade to previews and auxiliary files, then notify.
/// The engine holds no state between calls; the stores' per-key version
/// chains are the only serialization point.
#[derive(Debug, Clone)]
pub struct FileManager {
    pub(crate) objects: Arc<dyn ObjectStore>,
    pub(crate) auxiliary: Arc<dyn ObjectStore>,
    pub(crate) meta: Arc<dyn MetadataStore>,
    notifier: Arc<dyn NotificationSink>,
    pub(crate) config: EngineConfig,
}

impl FileManager {
    /// `objects` holds asset content and must be versioned; `auxiliary`
    /// holds derived files. Both are wrapped with the configured retry
    /// policy.
    pub fn new<O, A>(objects: O, auxiliary: A, meta: Arc<dyn MetadataStore>, config: EngineConfig) -> Self
    where
        O: ObjectStore,
        A: ObjectStore,
    {
        if !objects.features().versioned {
            warn!("content store is unversioned; archive and unarchive will not work");
        }
        Self {
            objects: Arc::new(RetryingStore::new(objects, config.retry)),
            auxiliary: Arc::new(RetryingStore::new(auxiliary, config.retry)),
            meta,
            notifier: Arc::new(LogNotifier),
            config,
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn NotificationSink>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Content store, with retries applied.
    pub fn objects(&self) -> &dyn ObjectStore {
        self.objects.as_ref()
    }

    pub fn metadata(&self) -> &dyn MetadataStore {
        self.meta.as_ref()
    }

    /// Permanently removes a file (or every file under a prefix) with all
    /// of its versions and tombstones.
    pub async fn delete_file(
        &self,
        perms: &dyn PermissionOracle,
        asset: &AssetRef,
        request: &DeleteFileRequest,
    ) -> FileResult<FileOperationResult> {
        self.observed("delete_file", ops::delete::delete_file(self, perms, asset, request))
            .await
    }

    /// Soft-deletes a file (or every live file under a prefix) by writing a
    /// tombstone.
    pub async fn archive_file(
        &self,
        perms: &dyn PermissionOracle,
        asset: &AssetRef,
        request: &ArchiveFileRequest,
    ) -> FileResult<FileOperationResult> {
        self.observed("archive_file", ops::archive::archive_file(self, perms, asset, request))
            .await
    }

    /// Restores the newest real version of an archived file.
    pub async fn unarchive_file(
        &self,
        perms: &dyn PermissionOracle,
        asset: &AssetRef,
        request: &UnarchiveFileRequest,
    ) -> FileResult<FileOperationResult> {
        self.observed(
            "unarchive_file",
            ops::archive::unarchive_file(self, perms, asset, request),
        )
        .await
    }

    pub async fn revert_file(
        &self,
        perms: &dyn PermissionOracle,
        asset: &AssetRef,
        request: &RevertFileRequest,
    ) -> FileResult<RevertFileResult> {
        self.observed("revert_file", ops::revert::revert_file(self, perms, asset, request))
            .await
    }

    /// Copies a file within an asset, or into another asset of the same
    /// database.
    pub async fn copy_file(
        &self,
        perms: &dyn PermissionOracle,
        asset: &AssetRef,
        request: &CopyFileRequest,
    ) -> FileResult<FileOperationResult> {
        self.observed("copy_file", ops::transfer::copy_file(self, perms, asset, request))
            .await
    }

    /// Moves a file within an asset as copy followed by archive of the
    /// source.
    pub async fn move_file(
        &self,
        perms: &dyn PermissionOracle,
        asset: &AssetRef,
        request: &MoveFileRequest,
    ) -> FileResult<FileOperationResult> {
        self.observed("move_file", ops::transfer::move_file(self, perms, asset, request))
            .await
    }

    pub async fn set_primary_type(
        &self,
        perms: &dyn PermissionOracle,
        asset: &AssetRef,
        request: &SetPrimaryTypeRequest,
    ) -> FileResult<SetPrimaryTypeResult> {
        self.observed(
            "set_primary_type",
            ops::primary::set_primary_type(self, perms, asset, request),
        )
        .await
    }

    pub async fn create_folder(
        &self,
        perms: &dyn PermissionOracle,
        asset: &AssetRef,
        request: &CreateFolderRequest,
    ) -> FileResult<CreateFolderResult> {
        self.observed("create_folder", ops::folder::create_folder(self, perms, asset, request))
            .await
    }

    pub async fn delete_auxiliary_files(
        &self,
        perms: &dyn PermissionOracle,
        asset: &AssetRef,
        request: &DeleteAuxiliaryRequest,
    ) -> FileResult<DeleteAuxiliaryResult> {
        self.observed(
            "delete_auxiliary_files",
            ops::auxiliary::delete_auxiliary_files(self, perms, asset, request),
        )
        .await
    }

    /// Erases the asset-level preview image and clears it from the asset.
    pub async fn delete_asset_preview(
        &self,
        perms: &dyn PermissionOracle,
        asset: &AssetRef,
    ) -> FileResult<DeleteAssetPreviewResult> {
        self.observed(
            "delete_asset_preview",
            ops::auxiliary::delete_asset_preview(self, perms, asset),
        )
        .await
    }

    pub async fn file_info(
        &self,
        perms: &dyn PermissionOracle,
        asset: &AssetRef,
        request: &FileInfoRequest,
    ) -> FileResult<FileInfo> {
        self.observed("file_info", crate::info::file_info(self, perms, asset, request))
            .await
    }

    pub async fn list_files(
        &self,
        perms: &dyn PermissionOracle,
        asset: &AssetRef,
        request: &ListFilesRequest,
    ) -> FileResult<FileListResult> {
        self.observed("list_files", crate::listing::list_files(self, perms, asset, request))
            .await
    }

    /// Logs failures the caller only sees a generic message for.
    async fn observed<T>(
        &self,
        operation: &'static str,
        fut: impl Future<Output = FileResult<T>>,
    ) -> FileResult<T> {
        let result = fut.await;
        match &result {
            Err(FileError::Internal(err)) => error!(operation, "{err:#}"),
            Err(FileError::Transient(msg)) => warn!(operation, "retries exhausted: {msg}"),
            _ => {}
        }
        result
    }

    pub(crate) async fn authorize(
        &self,
        perms: &dyn PermissionOracle,
        asset: &AssetRef,
        operation: Operation,
    ) -> FileResult<AuthorizedAsset> {
        authorize(
            self.meta.as_ref(),
            perms,
            &asset.database_id,
            &asset.asset_id,
            operation,
        )
        .await
    }

    pub(crate) async fn notify(&self, database_id: &str, asset_id: &str) {
        if let Err(e) = self.notifier.notify(database_id, asset_id).await {
            warn!(database_id, asset_id, "change notification failed: {e:#}");
        }
    }

    pub(crate) async fn previews(
        &self,
        bucket: &str,
        base_key: &str,
        include_archived: bool,
    ) -> FileResult<Vec<PreviewFile>> {
        find_previews(
            self.objects.as_ref(),
            bucket,
            base_key,
            include_archived,
            self.config.list_page_size,
        )
        .await
    }

    /// Permanently removes every version and tombstone of `key`. Returns the
    /// number of chain entries removed.
    pub(crate) async fn erase_key(&self, bucket: &str, key: &str) -> FileResult<usize> {
        let page = chain_page(self.objects.as_ref(), bucket, key).await?;
        let ids: Vec<String> = page
            .versions_of(key)
            .map(|v| v.version_id.clone())
            .chain(page.tombstones_of(key).map(|t| t.version_id.clone()))
            .collect();
        for id in &ids {
            self.objects.delete(bucket, key, Some(id)).await?;
        }
        Ok(ids.len())
    }

    /// Copies the newest real version of `key` back on top of its chain.
    pub(crate) async fn restore_newest(&self, bucket: &str, key: &str) -> FileResult<String> {
        let version = newest_real_version(self.objects.as_ref(), bucket, key)
            .await?
            .ok_or_else(|| FileError::general("Could not find a previous version for file."))?;
        let request = CopyRequest::restore(bucket, key, &version.version_id);
        Ok(self.objects.copy(request).await?)
    }

    /// Every key under `prefix` with at least one chain entry, sorted.
    pub(crate) async fn keys_with_history(&self, bucket: &str, prefix: &str) -> FileResult<Vec<String>> {
        let mut keys = Vec::new();
        let mut token = None;
        loop {
            let page = self
                .objects
                .list_versions(bucket, prefix, token.as_deref(), self.config.list_page_size)
                .await?;
            keys.extend(page.versions.iter().map(|v| v.key.clone()));
            keys.extend(page.tombstones.iter().map(|t| t.key.clone()));
            token = page.next_token;
            if token.is_none() {
                break;
            }
        }
        keys.sort();
        keys.dedup();
        Ok(keys)
    }

    /// Every live key under `prefix` of a store.
    pub(crate) async fn live_keys(
        &self,
        store: &dyn ObjectStore,
        bucket: &str,
        prefix: &str,
    ) -> FileResult<Vec<String>> {
        let mut keys = Vec::new();
        let mut token = None;
        loop {
            let page = store
                .list(bucket, prefix, token.as_deref(), self.config.list_page_size)
                .await?;
            keys.extend(page.entries.into_iter().map(|e| e.key));
            token = page.next_token;
            if token.is_none() {
                break;
            }
        }
        Ok(keys)
    }

    /// Removes the auxiliary derivatives of `key`. Returns the removed keys.
    pub(crate) async fn purge_auxiliary(&self, key: &str, report: &mut CascadeReport) -> Vec<String> {
        let bucket = self.config.auxiliary_bucket.as_str();
        let prefix = auxiliary_prefix(key);
        let keys = match self.live_keys(self.auxiliary.as_ref(), bucket, &prefix).await {
            Ok(keys) => keys,
            Err(e) => {
                report.record(
                    CascadeAction::PurgeAuxiliary,
                    prefix,
                    CascadeOutcome::Failed(e.to_string()),
                );
                return Vec::new();
            }
        };
        report
            .fan_out(CascadeAction::PurgeAuxiliary, keys, |aux_key: String| async move {
                self.auxiliary.delete(bucket, &aux_key, None).await
            })
            .await;
        report
            .done(CascadeAction::PurgeAuxiliary)
            .filter(|k| k.starts_with(&prefix))
            .map(str::to_string)
            .collect()
    }

    /// Copies (or moves) the auxiliary derivatives of `src_key` under
    /// `dst_key`. Returns the destination keys written.
    pub(crate) async fn transfer_auxiliary(
        &self,
        src_key: &str,
        dst_key: &str,
        remove_source: bool,
        report: &mut CascadeReport,
    ) -> Vec<String> {
        let bucket = self.config.auxiliary_bucket.as_str();
        let action = if remove_source {
            CascadeAction::MoveAuxiliary
        } else {
            CascadeAction::CopyAuxiliary
        };
        let src_prefix = auxiliary_prefix(src_key);
        let dst_prefix = auxiliary_prefix(dst_key);
        let keys = match self.live_keys(self.auxiliary.as_ref(), bucket, &src_prefix).await {
            Ok(keys) => keys,
            Err(e) => {
                report.record(
                    action,
                    src_prefix,
                    CascadeOutcome::Failed(e.to_string()),
                );
                return Vec::new();
            }
        };
        let targets: Vec<String> = keys
            .iter()
            .map(|k| format!("{dst_prefix}{}", &k[src_prefix.len()..]))
            .collect();
        let auxiliary = self.auxiliary.as_ref();
        report
            .fan_out(action, targets, |target: String| {
                let source = format!("{src_prefix}{}", &target[dst_prefix.len()..]);
                async move {
                    auxiliary
                        .copy(CopyRequest::within(bucket, &source, &target))
                        .await?;
                    if remove_source {
                        auxiliary.delete(bucket, &source, None).await?;
                    }
                    Ok::<(), StoreError>(())
                }
            })
            .await;
        report
            .done(action)
            .filter(|k| k.starts_with(&dst_prefix))
            .map(str::to_string)
            .collect()
    }
}
