use anyhow::{Context, Result};
use bytes::Bytes;
use tracing::info;
use vault_core::{ObjectStore, Operation, PutOptions, Tags};
use vault_files::authorize::authorize;
use vault_files::paths::{is_preview_path, relative_path, resolve, validate_file_path};
use vault_files::{
    ASSET_ID_TAG, ArchiveFileRequest, AssetRef, CopyFileRequest, CreateFolderRequest,
    DATABASE_ID_TAG, DeleteAuxiliaryRequest, DeleteFileRequest, FileInfoRequest, ListFilesRequest,
    MoveFileRequest, RevertFileRequest, SetPrimaryTypeRequest, UnarchiveFileRequest,
};

use crate::FileCmd;
use crate::config::Vault;
use crate::helpers::{engine, print_json};

pub async fn run_file(cmd: FileCmd, vault: &Vault) -> Result<()> {
    let mgr = &vault.manager;
    let perms = &vault.perms;
    let asset = |id: &str| AssetRef::new(&vault.database_id, id);

    match cmd {
        FileCmd::Put {
            asset_id,
            path,
            source,
            content_type,
        } => put_file(vault, &asset(&asset_id), &path, &source, content_type).await,
        FileCmd::Ls {
            asset_id,
            prefix,
            archived,
            max_items,
            page_size,
            token,
        } => {
            let request = ListFilesRequest {
                max_items,
                page_size,
                starting_token: token,
                prefix,
                include_archived: archived,
            };
            print_json(&engine(mgr.list_files(perms, &asset(&asset_id), &request).await)?)
        }
        FileCmd::Info {
            asset_id,
            path,
            versions,
        } => {
            let request = FileInfoRequest {
                file_path: path,
                include_versions: versions,
            };
            print_json(&engine(mgr.file_info(perms, &asset(&asset_id), &request).await)?)
        }
        FileCmd::Archive {
            asset_id,
            path,
            prefix,
        } => {
            let request = ArchiveFileRequest {
                file_path: path,
                is_prefix: prefix,
            };
            print_json(&engine(mgr.archive_file(perms, &asset(&asset_id), &request).await)?)
        }
        FileCmd::Unarchive { asset_id, path } => {
            let request = UnarchiveFileRequest { file_path: path };
            print_json(&engine(mgr.unarchive_file(perms, &asset(&asset_id), &request).await)?)
        }
        FileCmd::Rm {
            asset_id,
            path,
            prefix,
            yes,
        } => {
            let request = DeleteFileRequest {
                file_path: path,
                is_prefix: prefix,
                confirm_permanent_delete: yes,
            };
            print_json(&engine(mgr.delete_file(perms, &asset(&asset_id), &request).await)?)
        }
        FileCmd::Revert {
            asset_id,
            path,
            version_id,
        } => {
            let request = RevertFileRequest {
                file_path: path,
                version_id,
            };
            print_json(&engine(mgr.revert_file(perms, &asset(&asset_id), &request).await)?)
        }
        FileCmd::Cp {
            asset_id,
            source,
            destination,
            to_asset,
        } => {
            let request = CopyFileRequest {
                source_path: source,
                destination_path: destination,
                destination_asset_id: to_asset,
            };
            print_json(&engine(mgr.copy_file(perms, &asset(&asset_id), &request).await)?)
        }
        FileCmd::Mv {
            asset_id,
            source,
            destination,
        } => {
            let request = MoveFileRequest {
                source_path: source,
                destination_path: destination,
            };
            print_json(&engine(mgr.move_file(perms, &asset(&asset_id), &request).await)?)
        }
        FileCmd::SetPrimary {
            asset_id,
            path,
            primary_type,
            other,
        } => {
            let request = SetPrimaryTypeRequest {
                file_path: path,
                primary_type,
                primary_type_other: other,
            };
            print_json(&engine(
                mgr.set_primary_type(perms, &asset(&asset_id), &request).await,
            )?)
        }
        FileCmd::Mkdir { asset_id, key } => {
            let request = CreateFolderRequest { relative_key: key };
            print_json(&engine(mgr.create_folder(perms, &asset(&asset_id), &request).await)?)
        }
        FileCmd::RmAux { asset_id, path } => {
            let request = DeleteAuxiliaryRequest { file_path: path };
            print_json(&engine(
                mgr.delete_auxiliary_files(perms, &asset(&asset_id), &request)
                    .await,
            )?)
        }
        FileCmd::RmPreview { asset_id } => {
            print_json(&engine(mgr.delete_asset_preview(perms, &asset(&asset_id)).await)?)
        }
    }
}

/// Uploads a local file as a new version, tagged with the asset it belongs
/// to. Preview sidecars are uploaded like any other file.
async fn put_file(
    vault: &Vault,
    asset: &AssetRef,
    path: &str,
    source: &std::path::Path,
    content_type: Option<String>,
) -> Result<()> {
    engine(validate_file_path(path, "path"))?;
    let target = engine(
        authorize(
            vault.manager.metadata(),
            &vault.perms,
            &asset.database_id,
            &asset.asset_id,
            Operation::Write,
        )
        .await,
    )?;
    let body = tokio::fs::read(source)
        .await
        .with_context(|| format!("failed to read {}", source.display()))?;
    let key = resolve(&target.base_key, path);

    let mut tags = Tags::new();
    tags.insert(ASSET_ID_TAG.to_string(), asset.asset_id.clone());
    tags.insert(DATABASE_ID_TAG.to_string(), asset.database_id.clone());
    let size = body.len();
    let version_id = vault
        .manager
        .objects()
        .put(
            &target.bucket,
            &key,
            Bytes::from(body),
            PutOptions { content_type, tags },
        )
        .await
        .map_err(vault_files::FileError::from)
        .map_err(|e| anyhow::anyhow!(e.public_message()))?;
    info!(key = %key, size, preview = is_preview_path(path), "uploaded file");

    print_json(&serde_json::json!({
        "relativePath": relative_path(&target.base_key, &key),
        "versionId": version_id,
        "size": size,
    }))
}
