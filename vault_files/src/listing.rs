//! Paged enumeration of an asset's files, merging live objects with
//! archived ones and pairing previews with their base files.

use std::collections::{HashMap, HashSet};

use futures::{StreamExt, TryStreamExt};
use tracing::{debug, warn};
use vault_core::chain::STANDARD_STORAGE_CLASS;
use vault_core::{ObjectSummary, Operation, PermissionOracle};

use crate::error::{FileError, FileResult};
use crate::manager::FileManager;
use crate::mismatch::VersionSnapshot;
use crate::model::{AssetRef, FileListItem, FileListResult, ListFilesRequest, PRIMARY_TYPE_TAG};
use crate::paths::{
    file_name, is_folder_key, is_preview_path, preview_base, relative_path, resolve,
    snapshot_key,
};
use crate::preview::has_allowed_extension;

/// Concurrent metadata lookups per listing page.
const HEAD_CONCURRENCY: usize = 16;

pub(crate) async fn list_files(
    mgr: &FileManager,
    perms: &dyn PermissionOracle,
    asset: &AssetRef,
    request: &ListFilesRequest,
) -> FileResult<FileListResult> {
    request.validate()?;
    if request.max_items > mgr.config.max_list_items {
        return Err(FileError::validation(format!(
            "maxItems must not exceed {}",
            mgr.config.max_list_items
        )));
    }
    let target = mgr.authorize(perms, asset, Operation::Read).await?;
    let base = target.base_key.as_str();
    let bucket = target.bucket.as_str();
    let objects = mgr.objects();
    let list_prefix = match request.prefix.as_deref().filter(|p| !p.is_empty()) {
        Some(prefix) => resolve(base, prefix),
        None => base.to_string(),
    };

    // live objects, up to max_items
    let mut summaries: Vec<ObjectSummary> = Vec::new();
    let mut token = request.starting_token.clone();
    loop {
        let remaining = request.max_items - summaries.len();
        let page = objects
            .list(bucket, &list_prefix, token.as_deref(), request.page_size.min(remaining))
            .await?;
        summaries.extend(page.entries);
        token = page.next_token;
        if token.is_none() || summaries.len() >= request.max_items {
            break;
        }
    }
    let next_token = token;

    let mut items: Vec<FileListItem> = futures::stream::iter(
        summaries
            .into_iter()
            // the asset's own folder marker is not one of its files
            .filter(|s| s.key != base),
    )
    .map(|summary| live_item(mgr, bucket, base, summary))
    .buffered(HEAD_CONCURRENCY)
    .try_filter_map(|item| async move { Ok(item) })
    .try_collect()
    .await?;

    // archived objects are merged into the first page only
    if request.include_archived && request.starting_token.is_none() {
        let live: HashSet<String> = items.iter().map(|i| i.key.clone()).collect();
        let archived = archived_items(mgr, bucket, base, &list_prefix, &live, request.max_items).await?;
        items.extend(archived);
    }

    pair_previews(&mut items, base, &mgr.config.preview_extensions);

    if let Some(asset_version) = target
        .asset
        .current_version_id
        .as_deref()
        .filter(|id| !id.is_empty())
    {
        let snapshot =
            VersionSnapshot::load(mgr.meta.as_ref(), target.asset_id(), asset_version, None).await;
        for item in items.iter_mut().filter(|i| !i.is_folder) {
            item.current_asset_version_file_version_mismatch = snapshot.is_mismatch(
                &snapshot_key(base, &item.key),
                item.is_archived,
                &item.version_id,
            );
        }
    }

    Ok(FileListResult { items, next_token })
}

async fn live_item(
    mgr: &FileManager,
    bucket: &str,
    base: &str,
    summary: ObjectSummary,
) -> FileResult<Option<FileListItem>> {
    let is_folder = is_folder_key(&summary.key);
    let (version_id, primary_type) = match mgr.objects().head(bucket, &summary.key).await {
        Ok(head) => {
            let primary_type = head
                .tags
                .get(PRIMARY_TYPE_TAG)
                .filter(|t| !is_folder && !t.is_empty())
                .cloned();
            (head.version_id, primary_type)
        }
        Err(e) if e.is_not_found() => {
            // archived or erased since the page was read
            debug!(key = %summary.key, "listed key vanished before its metadata was read");
            return Ok(None);
        }
        Err(e) => return Err(e.into()),
    };
    Ok(Some(FileListItem {
        file_name: file_name(&summary.key).to_string(),
        relative_path: relative_path(base, &summary.key),
        is_folder,
        size: (!is_folder).then_some(summary.size),
        date_created_current_version: summary.last_modified,
        version_id,
        storage_class: Some(summary.storage_class),
        is_archived: false,
        current_asset_version_file_version_mismatch: false,
        primary_type,
        preview_file: String::new(),
        key: summary.key,
    }))
}

/// Files under `prefix` whose latest chain entry is a tombstone.
async fn archived_items(
    mgr: &FileManager,
    bucket: &str,
    base: &str,
    prefix: &str,
    live: &HashSet<String>,
    max_items: usize,
) -> FileResult<Vec<FileListItem>> {
    let mut items = Vec::new();
    let mut token = None;
    loop {
        let page = mgr
            .objects()
            .list_versions(bucket, prefix, token.as_deref(), mgr.config.list_page_size)
            .await?;
        for tombstone in page.tombstones.iter().filter(|t| t.is_latest) {
            if items.len() >= max_items {
                return Ok(items);
            }
            if live.contains(&tombstone.key) || is_folder_key(&tombstone.key) {
                continue;
            }
            let size = page.versions_of(&tombstone.key).next().map(|v| v.size);
            items.push(FileListItem {
                file_name: file_name(&tombstone.key).to_string(),
                key: tombstone.key.clone(),
                relative_path: relative_path(base, &tombstone.key),
                is_folder: false,
                size,
                date_created_current_version: tombstone.last_modified,
                version_id: tombstone.version_id.clone(),
                storage_class: Some(STANDARD_STORAGE_CLASS.to_string()),
                is_archived: true,
                current_asset_version_file_version_mismatch: false,
                primary_type: None,
                preview_file: String::new(),
            });
        }
        token = page.next_token;
        if token.is_none() {
            return Ok(items);
        }
    }
}

/// Removes preview items from the listing and attaches the first live,
/// allowed preview to its base file. Previews whose base file is not
/// listed are logged as orphans.
fn pair_previews(items: &mut Vec<FileListItem>, base: &str, allowed: &[String]) {
    let (previews, files): (Vec<_>, Vec<_>) = std::mem::take(items)
        .into_iter()
        .partition(|i| is_preview_path(&i.key));
    *items = files;

    let index: HashMap<String, usize> = items
        .iter()
        .enumerate()
        .map(|(idx, item)| (item.key.clone(), idx))
        .collect();
    let mut previews = previews;
    previews.sort_by(|a, b| a.key.cmp(&b.key));

    let mut orphans = Vec::new();
    for preview in previews {
        let Some(&idx) = preview_base(&preview.key).and_then(|b| index.get(b)) else {
            orphans.push(preview.key);
            continue;
        };
        let item = &mut items[idx];
        if !preview.is_archived
            && item.preview_file.is_empty()
            && has_allowed_extension(&preview.key, allowed)
        {
            item.preview_file = relative_path(base, &preview.key);
        }
    }
    if !orphans.is_empty() {
        warn!(count = orphans.len(), ?orphans, "found orphaned preview files");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn item(key: &str, is_archived: bool) -> FileListItem {
        FileListItem {
            file_name: file_name(key).to_string(),
            key: key.to_string(),
            relative_path: relative_path("a/", key),
            is_folder: is_folder_key(key),
            size: Some(1),
            date_created_current_version: Utc::now(),
            version_id: "v".to_string(),
            storage_class: None,
            is_archived,
            current_asset_version_file_version_mismatch: false,
            primary_type: None,
            preview_file: String::new(),
        }
    }

    #[test]
    fn previews_attach_to_base_files_and_leave_the_listing() {
        let allowed = crate::config::EngineConfig::default().preview_extensions;
        let mut items = vec![
            item("a/m.obj", false),
            item("a/m.obj.previewFile.png", false),
            item("a/m.obj.previewFile.gif", true),
            item("a/gone.obj.previewFile.png", false),
            item("a/t.obj", false),
            item("a/t.obj.previewFile.bmp", false),
        ];
        pair_previews(&mut items, "a/", &allowed);

        let keys: Vec<_> = items.iter().map(|i| i.key.as_str()).collect();
        assert_eq!(keys, vec!["a/m.obj", "a/t.obj"]);
        assert_eq!(items[0].preview_file, "/m.obj.previewFile.png");
        assert_eq!(items[1].preview_file, "");
    }
}
