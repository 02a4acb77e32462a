//! Copy and move, including their preview and auxiliary cascades.

use tracing::{error, info};
use vault_core::{
    CopyRequest, ObjectStore, Operation, PermissionOracle, StoreError, TagDirective,
};

use super::preview_suffix;
use crate::authorize::AuthorizedAsset;
use crate::cascade::{CascadeAction, CascadeReport};
use crate::error::{FileError, FileResult};
use crate::manager::FileManager;
use crate::model::{AssetRef, CopyFileRequest, FileOperationResult, MoveFileRequest};
use crate::paths::{is_preview_path, relative_path, rename_preview, resolve};

/// Object tags naming the asset a file belongs to.
pub const ASSET_ID_TAG: &str = "assetid";
pub const DATABASE_ID_TAG: &str = "databaseid";

/// How tags travel with a copy. Crossing into another asset rewrites the
/// identifying tags and keeps every other tag of the source.
#[derive(Debug, Clone, Copy)]
enum TagRewrite<'a> {
    Keep,
    Retarget(&'a AuthorizedAsset),
}

async fn copy_object(
    store: &dyn ObjectStore,
    src_bucket: &str,
    src_key: &str,
    dst_bucket: &str,
    dst_key: &str,
    rewrite: TagRewrite<'_>,
) -> Result<String, StoreError> {
    let tags = match rewrite {
        TagRewrite::Keep => TagDirective::Copy,
        TagRewrite::Retarget(dest) => {
            let mut tags = store.head(src_bucket, src_key).await?.tags;
            tags.insert(ASSET_ID_TAG.to_string(), dest.asset_id().to_string());
            tags.insert(DATABASE_ID_TAG.to_string(), dest.database_id().to_string());
            TagDirective::Replace(tags)
        }
    };
    store
        .copy(CopyRequest {
            src_bucket,
            src_key,
            src_version: None,
            dst_bucket,
            dst_key,
            tags,
        })
        .await
}

/// Fails unless `src_key` is live and `dst_key` is free.
async fn check_endpoints(
    store: &dyn ObjectStore,
    src_bucket: &str,
    src_key: &str,
    dst_bucket: &str,
    dst_key: &str,
) -> FileResult<()> {
    match store.head(src_bucket, src_key).await {
        Ok(_) => {}
        Err(StoreError::NotFound) => return Err(FileError::general("Source file not found.")),
        Err(e) => return Err(e.into()),
    }
    match store.head(dst_bucket, dst_key).await {
        Ok(_) => Err(FileError::general("Destination file already exists.")),
        Err(StoreError::NotFound) => Ok(()),
        Err(e) => Err(e.into()),
    }
}

pub(crate) async fn copy_file(
    mgr: &FileManager,
    perms: &dyn PermissionOracle,
    asset: &AssetRef,
    request: &CopyFileRequest,
) -> FileResult<FileOperationResult> {
    request.validate()?;
    let source = mgr.authorize(perms, asset, Operation::Read).await?;
    if is_preview_path(&request.source_path) {
        return Err(FileError::general(
            "Cannot directly copy preview files. Copy the base file instead.",
        ));
    }

    let cross_asset = request
        .destination_asset_id
        .as_deref()
        .filter(|id| *id != asset.asset_id);
    let dest = match cross_asset {
        Some(dest_id) => {
            let dest_ref = AssetRef::new(asset.database_id.clone(), dest_id);
            let dest = mgr.authorize(perms, &dest_ref, Operation::Write).await?;
            if dest.database_id() != source.database_id() {
                return Err(FileError::general("Cross-database operations are not allowed"));
            }
            dest
        }
        None => mgr.authorize(perms, asset, Operation::Write).await?,
    };
    let rewrite = if cross_asset.is_some() {
        TagRewrite::Retarget(&dest)
    } else {
        TagRewrite::Keep
    };

    let src_key = resolve(&source.base_key, &request.source_path);
    let dst_key = resolve(&dest.base_key, &request.destination_path);
    let (src_bucket, dst_bucket) = (source.bucket.as_str(), dest.bucket.as_str());
    let objects = mgr.objects();
    check_endpoints(objects, src_bucket, &src_key, dst_bucket, &dst_key).await?;

    copy_object(objects, src_bucket, &src_key, dst_bucket, &dst_key, rewrite).await?;
    info!(src = %src_key, dst = %dst_key, cross_asset = cross_asset.is_some(), "copied");

    let mut report = CascadeReport::new();
    let previews = mgr.previews(src_bucket, &src_key, false).await?;
    let targets: Vec<String> = previews
        .iter()
        .filter_map(|p| rename_preview(&p.key, &src_key, &dst_key))
        .collect();
    report
        .fan_out(CascadeAction::CopyPreview, targets, |target: String| {
            let preview_src = format!("{src_key}{}", &target[dst_key.len()..]);
            async move {
                copy_object(objects, src_bucket, &preview_src, dst_bucket, &target, rewrite)
                    .await
                    .map(|_| ())
            }
        })
        .await;
    let copied_previews: Vec<String> = report
        .done(CascadeAction::CopyPreview)
        .map(|k| relative_path(&dest.base_key, k))
        .collect();
    let aux = mgr.transfer_auxiliary(&src_key, &dst_key, false, &mut report).await;

    mgr.notify(dest.database_id(), dest.asset_id()).await;

    let mut affected = vec![relative_path(&dest.base_key, &dst_key)];
    affected.extend(copied_previews.iter().cloned());
    affected.extend(aux.iter().map(|k| relative_path(&dest.base_key, k)));
    Ok(FileOperationResult {
        success: true,
        message: format!(
            "Successfully copied file from {} to {}{}{}",
            request.source_path,
            request.destination_path,
            cross_asset
                .map(|id| format!(" in asset {id}"))
                .unwrap_or_default(),
            preview_suffix(copied_previews.len())
        ),
        affected_files: affected,
        cascades: report,
    })
}

pub(crate) async fn move_file(
    mgr: &FileManager,
    perms: &dyn PermissionOracle,
    asset: &AssetRef,
    request: &MoveFileRequest,
) -> FileResult<FileOperationResult> {
    request.validate()?;
    let target = mgr.authorize(perms, asset, Operation::Write).await?;
    if is_preview_path(&request.source_path) {
        return Err(FileError::general(
            "Cannot directly move preview files. Move the base file instead.",
        ));
    }

    let base = target.base_key.as_str();
    let bucket = target.bucket.as_str();
    let src_key = resolve(base, &request.source_path);
    let dst_key = resolve(base, &request.destination_path);
    if src_key == dst_key {
        return Err(FileError::general(
            "Source and destination paths must be different.",
        ));
    }
    let objects = mgr.objects();
    check_endpoints(objects, bucket, &src_key, bucket, &dst_key).await?;

    objects
        .copy(CopyRequest::within(bucket, &src_key, &dst_key))
        .await?;
    if let Err(e) = objects.delete(bucket, &src_key, None).await {
        // the copy stays in place: both keys now hold the file
        error!(src = %src_key, dst = %dst_key, "move left a duplicate: {e}");
        return Err(FileError::general(format!(
            "File was copied to {} but the source {} could not be removed; both now exist.",
            request.destination_path, request.source_path
        )));
    }
    info!(src = %src_key, dst = %dst_key, "moved");

    let mut report = CascadeReport::new();
    let previews = mgr.previews(bucket, &src_key, false).await?;
    let targets: Vec<String> = previews
        .iter()
        .filter_map(|p| rename_preview(&p.key, &src_key, &dst_key))
        .collect();
    report
        .fan_out(CascadeAction::MovePreview, targets, |preview_dst: String| {
            let preview_src = format!("{src_key}{}", &preview_dst[dst_key.len()..]);
            async move {
                objects
                    .copy(CopyRequest::within(bucket, &preview_src, &preview_dst))
                    .await?;
                objects.delete(bucket, &preview_src, None).await
            }
        })
        .await;
    let mut moved_previews = Vec::new();
    for preview_dst in report.done(CascadeAction::MovePreview) {
        let preview_src = format!("{src_key}{}", &preview_dst[dst_key.len()..]);
        moved_previews.push(relative_path(base, &preview_src));
        moved_previews.push(relative_path(base, preview_dst));
    }
    let aux = mgr.transfer_auxiliary(&src_key, &dst_key, true, &mut report).await;

    mgr.notify(target.database_id(), target.asset_id()).await;

    let mut affected = vec![relative_path(base, &src_key), relative_path(base, &dst_key)];
    affected.extend(moved_previews.iter().cloned());
    affected.extend(aux.iter().map(|k| relative_path(base, k)));
    Ok(FileOperationResult {
        success: true,
        message: format!(
            "Successfully moved file from {} to {}{}",
            request.source_path,
            request.destination_path,
            preview_suffix(moved_previews.len() / 2)
        ),
        affected_files: affected,
        cascades: report,
    })
}
