use bytes::Bytes;
use tracing::info;
use vault_core::{Operation, PermissionOracle, PutOptions};

use crate::error::FileResult;
use crate::manager::FileManager;
use crate::model::{AssetRef, CreateFolderRequest, CreateFolderResult};
use crate::paths::resolve;

/// Writes the zero-length marker object a folder is represented by.
pub(crate) async fn create_folder(
    mgr: &FileManager,
    perms: &dyn PermissionOracle,
    asset: &AssetRef,
    request: &CreateFolderRequest,
) -> FileResult<CreateFolderResult> {
    request.validate()?;
    let target = mgr.authorize(perms, asset, Operation::Write).await?;
    let key = resolve(&target.base_key, request.relative_key.trim());
    mgr.objects()
        .put(&target.bucket, &key, Bytes::new(), PutOptions::default())
        .await?;
    info!(bucket = %target.bucket, key = %key, "created folder");

    mgr.notify(target.database_id(), target.asset_id()).await;

    Ok(CreateFolderResult {
        message: "Folder created successfully".to_string(),
        relative_key: request.relative_key.clone(),
    })
}
