use tracing::info;
use vault_core::{CopyRequest, Operation, PermissionOracle, StoreError, TagDirective};

use crate::archive::{KeyState, key_state};
use crate::error::{FileError, FileResult};
use crate::manager::FileManager;
use crate::model::{AssetRef, PRIMARY_TYPE_TAG, SetPrimaryTypeRequest, SetPrimaryTypeResult};
use crate::paths::resolve;

pub(crate) async fn set_primary_type(
    mgr: &FileManager,
    perms: &dyn PermissionOracle,
    asset: &AssetRef,
    request: &SetPrimaryTypeRequest,
) -> FileResult<SetPrimaryTypeResult> {
    let primary_type = request.validate()?;
    let target = mgr.authorize(perms, asset, Operation::Write).await?;
    if request.file_path.trim_end().ends_with('/') {
        return Err(FileError::general(
            "Cannot set primary type on folders. File path must not end with '/'",
        ));
    }
    let key = resolve(&target.base_key, &request.file_path);
    let bucket = target.bucket.as_str();
    let objects = mgr.objects();

    let head = match objects.head(bucket, &key).await {
        Ok(head) => head,
        Err(StoreError::NotFound) => {
            return match key_state(objects, bucket, &key).await? {
                KeyState::Archived { .. } => Err(FileError::general(
                    "Cannot set primary type on archived file",
                )),
                _ => Err(FileError::general("File not found")),
            };
        }
        Err(e) => return Err(e.into()),
    };

    let mut tags = head.tags;
    let message = match &primary_type {
        Some(value) => {
            tags.insert(PRIMARY_TYPE_TAG.to_string(), value.clone());
            format!("Set primary type '{value}' for file: {}", request.file_path)
        }
        None => {
            tags.remove(PRIMARY_TYPE_TAG);
            format!("Removed primary type metadata from file: {}", request.file_path)
        }
    };
    // rewriting tags in place writes a new version
    let version_id = objects
        .copy(CopyRequest::within(bucket, &key, &key).with_tags(TagDirective::Replace(tags)))
        .await?;
    info!(bucket, key = %key, version_id = %version_id, primary_type = ?primary_type, "primary type updated");

    mgr.notify(target.database_id(), target.asset_id()).await;

    Ok(SetPrimaryTypeResult {
        success: true,
        message,
        file_path: request.file_path.clone(),
        primary_type,
    })
}
