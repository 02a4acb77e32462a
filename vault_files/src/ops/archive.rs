use tracing::{info, warn};
use vault_core::{Operation, PermissionOracle};

use super::{is_asset_root, preview_suffix, scope_suffix};
use crate::archive::{KeyState, key_state};
use crate::cascade::{CascadeAction, CascadeReport};
use crate::error::{FileError, FileResult};
use crate::manager::FileManager;
use crate::model::{ArchiveFileRequest, AssetRef, FileOperationResult, UnarchiveFileRequest};
use crate::paths::{is_preview_path, normalize_prefix, relative_path, resolve};

pub(crate) async fn archive_file(
    mgr: &FileManager,
    perms: &dyn PermissionOracle,
    asset: &AssetRef,
    request: &ArchiveFileRequest,
) -> FileResult<FileOperationResult> {
    request.validate()?;
    let target = mgr.authorize(perms, asset, Operation::Write).await?;
    let key = resolve(&target.base_key, &request.file_path);
    if is_asset_root(&target.base_key, &key) {
        return Err(FileError::general("Cannot archive the top-level asset folder"));
    }
    let bucket = target.bucket.as_str();
    let base = target.base_key.as_str();
    let objects = mgr.objects();
    let mut report = CascadeReport::new();
    let mut affected = Vec::new();

    if request.is_prefix {
        let prefix = normalize_prefix(&key);
        let keys = mgr.live_keys(objects, bucket, &prefix).await?;
        if keys.is_empty() {
            return Err(FileError::general("No files found under prefix."));
        }
        for key in &keys {
            match objects.delete(bucket, key, None).await {
                Ok(()) => affected.push(relative_path(base, key)),
                Err(e) => warn!(bucket, key = %key, "failed to archive key under prefix: {e}"),
            }
        }
    } else {
        match key_state(objects, bucket, &key).await? {
            KeyState::NotFound => return Err(FileError::general("File not found.")),
            KeyState::Archived { .. } => {
                return Err(FileError::general("File is already archived."));
            }
            KeyState::Live(_) => {}
        }
        objects.delete(bucket, &key, None).await?;
        affected.push(relative_path(base, &key));

        if !is_preview_path(&request.file_path) {
            let previews = mgr.previews(bucket, &key, false).await?;
            report
                .fan_out(
                    CascadeAction::ArchivePreview,
                    previews.into_iter().map(|p| p.key).collect(),
                    |preview: String| async move { objects.delete(bucket, &preview, None).await },
                )
                .await;
            affected.extend(
                report
                    .done(CascadeAction::ArchivePreview)
                    .map(|k| relative_path(base, k)),
            );
        }
    }

    info!(bucket, key = %key, files = affected.len(), "archived");
    mgr.notify(target.database_id(), target.asset_id()).await;

    Ok(FileOperationResult {
        success: true,
        message: format!(
            "Successfully archived {} file(s){}",
            affected.len(),
            scope_suffix(&request.file_path, request.is_prefix)
        ),
        affected_files: affected,
        cascades: report,
    })
}

pub(crate) async fn unarchive_file(
    mgr: &FileManager,
    perms: &dyn PermissionOracle,
    asset: &AssetRef,
    request: &UnarchiveFileRequest,
) -> FileResult<FileOperationResult> {
    request.validate()?;
    let target = mgr.authorize(perms, asset, Operation::Write).await?;
    let key = resolve(&target.base_key, &request.file_path);
    let bucket = target.bucket.as_str();
    let base = target.base_key.as_str();

    match key_state(mgr.objects(), bucket, &key).await? {
        KeyState::NotFound => return Err(FileError::general("File not found.")),
        KeyState::Live(_) => return Err(FileError::general("File is not archived.")),
        KeyState::Archived { .. } => {}
    }
    let restored = mgr.restore_newest(bucket, &key).await?;
    info!(bucket, key = %key, version_id = %restored, "unarchived");

    let mut report = CascadeReport::new();
    let mut affected = vec![relative_path(base, &key)];
    if !is_preview_path(&request.file_path) {
        let (archived, live): (Vec<_>, Vec<_>) = mgr
            .previews(bucket, &key, true)
            .await?
            .into_iter()
            .partition(|p| p.is_archived);
        for preview in live {
            report.skip(CascadeAction::UnarchivePreview, preview.key, "not archived");
        }
        report
            .fan_out(
                CascadeAction::UnarchivePreview,
                archived.into_iter().map(|p| p.key).collect(),
                |preview: String| async move {
                    mgr.restore_newest(bucket, &preview).await.map(|_| ())
                },
            )
            .await;
        affected.extend(
            report
                .done(CascadeAction::UnarchivePreview)
                .map(|k| relative_path(base, k)),
        );
    }

    mgr.notify(target.database_id(), target.asset_id()).await;

    Ok(FileOperationResult {
        success: true,
        message: format!(
            "Successfully unarchived file: {}{}",
            request.file_path,
            preview_suffix(affected.len() - 1)
        ),
        affected_files: affected,
        cascades: report,
    })
}
