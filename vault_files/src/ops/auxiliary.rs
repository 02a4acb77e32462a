//! Removal of derived files: auxiliary derivatives and the asset preview.

use tracing::info;
use vault_core::{Operation, PermissionOracle};

use crate::authorize::bucket_details;
use crate::error::{FileError, FileResult};
use crate::manager::FileManager;
use crate::model::{AssetRef, DeleteAssetPreviewResult, DeleteAuxiliaryRequest, DeleteAuxiliaryResult};
use crate::paths::resolve;

pub(crate) async fn delete_auxiliary_files(
    mgr: &FileManager,
    perms: &dyn PermissionOracle,
    asset: &AssetRef,
    request: &DeleteAuxiliaryRequest,
) -> FileResult<DeleteAuxiliaryResult> {
    request.validate()?;
    let target = mgr.authorize(perms, asset, Operation::Write).await?;
    // the resolved key is used as a raw prefix here
    let prefix = resolve(&target.base_key, &request.file_path);
    let bucket = mgr.config.auxiliary_bucket.as_str();
    let auxiliary = mgr.auxiliary.as_ref();

    let keys = mgr.live_keys(auxiliary, bucket, &prefix).await?;
    if keys.is_empty() {
        return Err(FileError::general("No auxiliary files found under prefix"));
    }
    let mut deleted = 0;
    for key in &keys {
        auxiliary.delete(bucket, key, None).await?;
        deleted += 1;
    }
    info!(bucket, prefix = %prefix, deleted, "deleted auxiliary files");

    mgr.notify(target.database_id(), target.asset_id()).await;

    Ok(DeleteAuxiliaryResult {
        success: true,
        message: format!("Successfully deleted {deleted} auxiliary preview files under prefix"),
        file_path: request.file_path.clone(),
        deleted_count: deleted,
    })
}

pub(crate) async fn delete_asset_preview(
    mgr: &FileManager,
    perms: &dyn PermissionOracle,
    asset: &AssetRef,
) -> FileResult<DeleteAssetPreviewResult> {
    let target = mgr.authorize(perms, asset, Operation::Write).await?;
    let mut record = target.asset;
    let Some(preview_key) = record
        .preview_location
        .take()
        .map(|location| location.key)
        .filter(|key| !key.is_empty())
    else {
        return Err(FileError::general(format!(
            "Asset {} does not have a preview file",
            asset.asset_id
        )));
    };

    let bucket = bucket_details(mgr.meta.as_ref(), &record.bucket_id)
        .await?
        .bucket_name;
    let removed = mgr.erase_key(&bucket, &preview_key).await?;
    mgr.meta.put_asset(&record).await?;
    info!(bucket = %bucket, key = %preview_key, removed, "deleted asset preview");

    mgr.notify(&record.database_id, &record.asset_id).await;

    Ok(DeleteAssetPreviewResult {
        success: true,
        message: format!("Successfully deleted preview file for asset {}", asset.asset_id),
        asset_id: asset.asset_id.clone(),
    })
}
