use tracing::{info, warn};
use vault_core::{Operation, PermissionOracle};

use super::{is_asset_root, scope_suffix};
use crate::archive::{KeyState, key_state};
use crate::cascade::{CascadeAction, CascadeReport};
use crate::error::{FileError, FileResult};
use crate::manager::FileManager;
use crate::model::{AssetRef, DeleteFileRequest, FileOperationResult};
use crate::paths::{is_preview_path, normalize_prefix, relative_path, resolve};

pub(crate) async fn delete_file(
    mgr: &FileManager,
    perms: &dyn PermissionOracle,
    asset: &AssetRef,
    request: &DeleteFileRequest,
) -> FileResult<FileOperationResult> {
    request.validate()?;
    if !request.confirm_permanent_delete {
        return Err(FileError::validation(
            "Permanent deletion requires confirmation. Set confirmPermanentDelete to true.",
        ));
    }

    let target = mgr.authorize(perms, asset, Operation::Write).await?;
    let key = resolve(&target.base_key, &request.file_path);
    if is_asset_root(&target.base_key, &key) {
        return Err(FileError::general("Cannot delete the top-level asset folder"));
    }
    let bucket = target.bucket.as_str();
    let base = target.base_key.as_str();
    let mut report = CascadeReport::new();
    let mut affected = Vec::new();

    if request.is_prefix {
        let prefix = normalize_prefix(&key);
        let keys = mgr.keys_with_history(bucket, &prefix).await?;
        if keys.is_empty() {
            return Err(FileError::general("No files found under prefix."));
        }
        // keys already erased stay erased when a later one fails
        for key in &keys {
            match mgr.erase_key(bucket, key).await {
                Ok(_) => affected.push(relative_path(base, key)),
                Err(e) => warn!(bucket, key = %key, "failed to erase key under prefix: {e}"),
            }
        }
        let purged = mgr.purge_auxiliary(&prefix, &mut report).await;
        affected.extend(purged.iter().map(|k| relative_path(base, k)));
    } else {
        if is_preview_path(&request.file_path) {
            return Err(FileError::general(
                "Cannot directly delete preview files. Delete the base file instead.",
            ));
        }
        if key_state(mgr.objects(), bucket, &key).await? == KeyState::NotFound {
            return Err(FileError::general("File not found."));
        }

        let previews = mgr.previews(bucket, &key, true).await?;
        report
            .fan_out(
                CascadeAction::DeletePreview,
                previews.into_iter().map(|p| p.key).collect(),
                |preview: String| async move { mgr.erase_key(bucket, &preview).await.map(|_| ()) },
            )
            .await;
        affected.extend(
            report
                .done(CascadeAction::DeletePreview)
                .map(|k| relative_path(base, k)),
        );

        mgr.erase_key(bucket, &key).await?;
        affected.push(relative_path(base, &key));

        let purged = mgr.purge_auxiliary(&key, &mut report).await;
        affected.extend(purged.iter().map(|k| relative_path(base, k)));
    }

    info!(bucket, key = %key, files = affected.len(), "deleted permanently");
    mgr.notify(target.database_id(), target.asset_id()).await;

    Ok(FileOperationResult {
        success: true,
        message: format!(
            "Successfully deleted {} file(s) and all versions{}",
            affected.len(),
            scope_suffix(&request.file_path, request.is_prefix)
        ),
        affected_files: affected,
        cascades: report,
    })
}
