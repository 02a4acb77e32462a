use anyhow::{Context, Result, bail};
use tracing::info;
use vault_core::{Asset, AssetVersionFileRecord, BucketConfig, MetadataStore};
use vault_files::paths::normalize_prefix;
use vault_files::{AssetRef, ListFilesRequest};

use crate::AssetCmd;
use crate::config::{ASSETS_PREFIX, LOCAL_BUCKET_ID, Vault};
use crate::helpers::{engine, print_json};

pub async fn run_asset(cmd: AssetCmd, vault: &Vault) -> Result<()> {
    let meta = vault.meta.as_ref();
    match cmd {
        AssetCmd::Register { asset_id, location } => {
            vault_files::paths::validate_asset_id(&asset_id, "assetId")
                .map_err(|e| anyhow::anyhow!(e.public_message()))?;
            if meta.get_asset(&vault.database_id, &asset_id).await?.is_some() {
                bail!("asset {asset_id} already exists in database {}", vault.database_id);
            }
            ensure_local_bucket(vault).await?;
            let location = location
                .map(|l| normalize_prefix(l.trim_start_matches('/')))
                .unwrap_or_else(|| format!("{ASSETS_PREFIX}{asset_id}/"));
            let asset = Asset::new(&vault.database_id, &asset_id, LOCAL_BUCKET_ID, location);
            meta.put_asset(&asset).await?;
            info!(database_id = %vault.database_id, asset_id = %asset_id, "registered asset");
            print_json(&asset)
        }
        AssetCmd::Show { asset_id } => {
            let asset = meta
                .get_asset(&vault.database_id, &asset_id)
                .await?
                .with_context(|| format!("asset {asset_id} not found"))?;
            print_json(&asset)
        }
        AssetCmd::Capture {
            asset_id,
            version_id,
        } => {
            let mut asset = meta
                .get_asset(&vault.database_id, &asset_id)
                .await?
                .with_context(|| format!("asset {asset_id} not found"))?;
            let target = AssetRef::new(&vault.database_id, &asset_id);

            let mut recorded = 0;
            let mut token = None;
            loop {
                let request = ListFilesRequest {
                    starting_token: token,
                    ..ListFilesRequest::default()
                };
                let page = engine(
                    vault
                        .manager
                        .list_files(&vault.perms, &target, &request)
                        .await,
                )?;
                for item in page.items.iter().filter(|i| !i.is_folder) {
                    meta.put_version_file(&AssetVersionFileRecord {
                        asset_id: asset_id.clone(),
                        asset_version_id: version_id.clone(),
                        file_key: item.relative_path.trim_start_matches('/').to_string(),
                        version_id: item.version_id.clone(),
                        size: item.size,
                        last_modified: Some(item.date_created_current_version.to_rfc3339()),
                        etag: None,
                    })
                    .await?;
                    recorded += 1;
                }
                token = page.next_token;
                if token.is_none() {
                    break;
                }
            }

            asset.current_version_id = Some(version_id.clone());
            meta.put_asset(&asset).await?;
            info!(asset_id = %asset_id, version_id = %version_id, files = recorded, "captured asset version");
            print_json(&asset)
        }
    }
}

async fn ensure_local_bucket(vault: &Vault) -> Result<()> {
    let meta = vault.meta.as_ref();
    let bucket = BucketConfig {
        bucket_id: LOCAL_BUCKET_ID.to_string(),
        bucket_name: vault.config.content_bucket.clone(),
        base_assets_prefix: ASSETS_PREFIX.to_string(),
    };
    if meta.get_bucket(LOCAL_BUCKET_ID).await?.as_ref() != Some(&bucket) {
        meta.put_bucket(&bucket).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VaultConfig;
    use vault_files::FileInfoRequest;

    fn open(dir: &std::path::Path) -> Vault {
        let config = VaultConfig {
            data_dir: dir.to_path_buf(),
            content_bucket: "content".into(),
            engine: Default::default(),
        };
        Vault::open(config, "db1").unwrap()
    }

    #[tokio::test]
    async fn register_and_capture_pin_the_live_versions() {
        let dir = tempfile::tempdir().unwrap();
        let vault = open(dir.path());
        run_asset(
            AssetCmd::Register {
                asset_id: "chair".into(),
                location: None,
            },
            &vault,
        )
        .await
        .unwrap();

        let source = dir.path().join("chair.obj");
        std::fs::write(&source, b"v1").unwrap();
        crate::cmd::run_file(
            crate::FileCmd::Put {
                asset_id: "chair".into(),
                path: "/chair.obj".into(),
                source: source.clone(),
                content_type: None,
            },
            &vault,
        )
        .await
        .unwrap();

        run_asset(
            AssetCmd::Capture {
                asset_id: "chair".into(),
                version_id: "1".into(),
            },
            &vault,
        )
        .await
        .unwrap();

        let asset = AssetRef::new("db1", "chair");
        let request = FileInfoRequest {
            file_path: "/chair.obj".into(),
            include_versions: false,
        };
        let info = vault
            .manager
            .file_info(&vault.perms, &asset, &request)
            .await
            .unwrap();
        assert_eq!(info.current_asset_version_file_version_mismatch, Some(false));

        // a new upload drifts away from the captured version
        crate::cmd::run_file(
            crate::FileCmd::Put {
                asset_id: "chair".into(),
                path: "/chair.obj".into(),
                source,
                content_type: None,
            },
            &vault,
        )
        .await
        .unwrap();
        let info = vault
            .manager
            .file_info(&vault.perms, &asset, &request)
            .await
            .unwrap();
        assert_eq!(info.current_asset_version_file_version_mismatch, Some(true));
    }

    #[tokio::test]
    async fn registering_twice_fails() {
        let dir = tempfile::tempdir().unwrap();
        let vault = open(dir.path());
        let register = || AssetCmd::Register {
            asset_id: "chair".into(),
            location: None,
        };
        run_asset(register(), &vault).await.unwrap();
        assert!(run_asset(register(), &vault).await.is_err());
    }
}
