use tracing::info;
use vault_core::{CopyRequest, Operation, PermissionOracle};

use crate::cascade::CascadeReport;
use crate::error::{FileError, FileResult};
use crate::manager::FileManager;
use crate::model::{AssetRef, RevertFileRequest, RevertFileResult};
use crate::paths::resolve;
use crate::versions::version_history;

pub(crate) async fn revert_file(
    mgr: &FileManager,
    perms: &dyn PermissionOracle,
    asset: &AssetRef,
    request: &RevertFileRequest,
) -> FileResult<RevertFileResult> {
    request.validate()?;
    let target = mgr.authorize(perms, asset, Operation::Write).await?;
    let key = resolve(&target.base_key, &request.file_path);
    let bucket = target.bucket.as_str();

    let history = version_history(
        mgr.objects(),
        bucket,
        &key,
        mgr.config.version_history_limit,
    )
    .await?;
    if history.is_empty() {
        return Err(FileError::general("File not found."));
    }
    let version = history
        .iter()
        .find(|v| v.version_id == request.version_id)
        .ok_or_else(|| FileError::general("Version not found for file"))?;
    if version.is_latest {
        return Err(FileError::general("Version is already the current version"));
    }
    if version.is_archived {
        return Err(FileError::general("Cannot revert to archived version."));
    }

    let new_version_id = mgr
        .objects()
        .copy(CopyRequest::restore(bucket, &key, &request.version_id))
        .await?;
    info!(bucket, key = %key, from = %request.version_id, to = %new_version_id, "reverted");

    // derivatives were built from the replaced version
    let mut report = CascadeReport::new();
    mgr.purge_auxiliary(&key, &mut report).await;
    mgr.notify(target.database_id(), target.asset_id()).await;

    Ok(RevertFileResult {
        success: true,
        message: format!(
            "Successfully reverted file {} to version {}",
            request.file_path, request.version_id
        ),
        file_path: request.file_path.clone(),
        reverted_from_version_id: request.version_id.clone(),
        new_version_id,
        cascades: report,
    })
}
