use vault_core::chain::STANDARD_STORAGE_CLASS;
use vault_core::{Operation, PermissionOracle, StoreError};

use crate::archive::chain_page;
use crate::error::{FileError, FileResult};
use crate::manager::FileManager;
use crate::mismatch::VersionSnapshot;
use crate::model::{AssetRef, FileInfo, FileInfoRequest, PRIMARY_TYPE_TAG};
use crate::paths::{file_name, is_folder_key, is_preview_path, relative_path, resolve, snapshot_key};
use crate::preview::active_preview;
use crate::versions::version_history;

/// Metadata of one file or folder, live or archived.
pub(crate) async fn file_info(
    mgr: &FileManager,
    perms: &dyn PermissionOracle,
    asset: &AssetRef,
    request: &FileInfoRequest,
) -> FileResult<FileInfo> {
    request.validate()?;
    let target = mgr.authorize(perms, asset, Operation::Read).await?;
    let base = target.base_key.as_str();
    let bucket = target.bucket.as_str();
    let key = resolve(base, &request.file_path);
    let is_folder = is_folder_key(&key);
    let objects = mgr.objects();

    let (head, is_archived) = match objects.head(bucket, &key).await {
        Ok(head) => (head, false),
        Err(StoreError::NotFound) => {
            let page = chain_page(objects, bucket, &key).await?;
            if page.tombstones_of(&key).next().is_none() {
                return Err(FileError::general("File not found."));
            }
            // an archived file is described by its newest real version
            let Some(newest) = page.versions_of(&key).next() else {
                return Err(FileError::general("File not found."));
            };
            let mut head = objects.head_version(bucket, &key, &newest.version_id).await?;
            head.storage_class = STANDARD_STORAGE_CLASS.to_string();
            (head, true)
        }
        Err(e) => return Err(e.into()),
    };

    let mut versions = if request.include_versions {
        Some(
            version_history(objects, bucket, &key, mgr.config.version_history_limit).await?,
        )
    } else {
        None
    };

    let current_version = target
        .asset
        .current_version_id
        .as_deref()
        .filter(|id| !id.is_empty());
    let mismatch = match current_version {
        Some(asset_version) if !is_folder => {
            let file_key = snapshot_key(base, &key);
            let snapshot = VersionSnapshot::load(
                mgr.meta.as_ref(),
                target.asset_id(),
                asset_version,
                Some(&file_key),
            )
            .await;
            let flag = snapshot.is_mismatch(&file_key, is_archived, &head.version_id);
            if let Some(latest) = versions.iter_mut().flatten().find(|v| v.is_latest) {
                latest.current_asset_version_file_version_mismatch = Some(flag);
            }
            Some(flag)
        }
        _ => None,
    };

    let preview_file = if is_folder || is_preview_path(&request.file_path) {
        String::new()
    } else {
        let previews = mgr.previews(bucket, &key, false).await?;
        active_preview(&previews, &mgr.config.preview_extensions)
            .map(|p| relative_path(base, &p.key))
            .unwrap_or_default()
    };

    let primary_type = if is_folder {
        None
    } else {
        head.tags
            .get(PRIMARY_TYPE_TAG)
            .filter(|t| !t.is_empty())
            .cloned()
    };

    Ok(FileInfo {
        file_name: file_name(&key).to_string(),
        relative_path: relative_path(base, &key),
        is_folder,
        size: Some(head.size),
        content_type: head.content_type,
        last_modified: Some(head.last_modified),
        etag: Some(head.etag),
        storage_class: Some(head.storage_class),
        is_archived,
        primary_type,
        preview_file,
        current_asset_version_file_version_mismatch: mismatch,
        versions,
        key,
    })
}
