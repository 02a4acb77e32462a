//! Authorize-then-execute stage shared by every operation: load the asset,
//! consult the permission oracle, then resolve where the asset's files live.

use tracing::debug;
use vault_core::{Asset, BucketConfig, MetadataStore, Operation, PermissionOracle, Subject};

use crate::error::{FileError, FileResult};
use crate::paths::normalize_prefix;

/// An asset the caller may act on, with its storage location resolved.
#[derive(Debug, Clone)]
pub struct AuthorizedAsset {
    pub asset: Asset,
    /// Content bucket name.
    pub bucket: String,
    /// Bucket configuration with a normalized base prefix.
    pub bucket_config: BucketConfig,
    /// Prefix every file key of the asset starts with, ending in `/`.
    pub base_key: String,
}

impl AuthorizedAsset {
    pub fn database_id(&self) -> &str {
        &self.asset.database_id
    }

    pub fn asset_id(&self) -> &str {
        &self.asset.asset_id
    }
}

/// Loads `(database_id, asset_id)` and checks `operation` against it.
pub async fn authorize(
    meta: &dyn MetadataStore,
    perms: &dyn PermissionOracle,
    database_id: &str,
    asset_id: &str,
    operation: Operation,
) -> FileResult<AuthorizedAsset> {
    let asset = meta.get_asset(database_id, asset_id).await?.ok_or_else(|| {
        FileError::general(
            "Asset not found in database. Note: Files cannot be moved cross-database.",
        )
    })?;

    let subject = Subject::asset(&asset);
    if !perms.enforce(&subject, operation).await? {
        debug!(database_id, asset_id, %operation, "permission denied");
        return Err(FileError::Unauthorized(
            "Not authorized to perform this operation on the asset".to_string(),
        ));
    }

    let bucket_config = bucket_details(meta, &asset.bucket_id).await?;
    // assets registered without a location live under the bucket prefix
    let base_key = if asset.asset_location.key.is_empty() {
        format!("{}{}/", bucket_config.base_assets_prefix, asset.asset_id)
    } else {
        normalize_prefix(&asset.asset_location.key)
    };

    Ok(AuthorizedAsset {
        bucket: bucket_config.bucket_name.clone(),
        bucket_config,
        base_key,
        asset,
    })
}

/// Bucket configuration with the base prefix normalized to end in `/`
/// without a leading `/`.
pub async fn bucket_details(meta: &dyn MetadataStore, bucket_id: &str) -> FileResult<BucketConfig> {
    let Some(mut bucket) = meta.get_bucket(bucket_id).await? else {
        return Err(FileError::general("Error getting bucket details."));
    };
    if bucket.bucket_name.is_empty() || bucket.base_assets_prefix.is_empty() {
        return Err(FileError::general("Error getting bucket details."));
    }
    let prefix = normalize_prefix(&bucket.base_assets_prefix);
    bucket.base_assets_prefix = prefix.strip_prefix('/').unwrap_or(&prefix).to_string();
    Ok(bucket)
}
