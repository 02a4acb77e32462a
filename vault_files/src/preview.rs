//! Pairing of `<name>.previewFile.<ext>` sidecars with their base file.

use std::collections::BTreeMap;

use serde::Serialize;
use vault_core::ObjectStore;

use crate::error::FileResult;
use crate::paths::{PREVIEW_MARKER, preview_extension};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewFile {
    pub key: String,
    pub is_archived: bool,
    /// Whether the entry describing the preview is the latest of its chain.
    pub is_latest: bool,
    /// Live version, or the tombstone for archived previews.
    pub version_id: String,
}

/// Previews of `base_key` in `bucket`, sorted by key.
///
/// Only keys of the form `<base_key>.previewFile.<ext>` in the same
/// directory match; archived previews are returned when `include_archived`
/// is set.
pub async fn find_previews(
    store: &dyn ObjectStore,
    bucket: &str,
    base_key: &str,
    include_archived: bool,
    page_size: usize,
) -> FileResult<Vec<PreviewFile>> {
    let prefix = format!("{base_key}{PREVIEW_MARKER}");
    let mut found: BTreeMap<String, PreviewFile> = BTreeMap::new();
    let mut token = None;
    loop {
        let page = store
            .list_versions(bucket, &prefix, token.as_deref(), page_size)
            .await?;
        for version in page.versions.iter().filter(|v| v.is_latest) {
            found.insert(
                version.key.clone(),
                PreviewFile {
                    key: version.key.clone(),
                    is_archived: false,
                    is_latest: true,
                    version_id: version.version_id.clone(),
                },
            );
        }
        if include_archived {
            for tombstone in page.tombstones.iter().filter(|t| t.is_latest) {
                found.insert(
                    tombstone.key.clone(),
                    PreviewFile {
                        key: tombstone.key.clone(),
                        is_archived: true,
                        is_latest: true,
                        version_id: tombstone.version_id.clone(),
                    },
                );
            }
        }
        token = page.next_token;
        if token.is_none() {
            break;
        }
    }
    Ok(found
        .into_values()
        .filter(|p| !p.key[prefix.len()..].contains('/'))
        .collect())
}

/// Whether `key` carries one of the allowed preview extensions.
pub fn has_allowed_extension(key: &str, allowed: &[String]) -> bool {
    preview_extension(key).is_some_and(|ext| allowed.iter().any(|a| a.eq_ignore_ascii_case(&ext)))
}

/// The preview shown for a base file: the lexicographically first live
/// preview with an allowed extension.
pub fn active_preview<'a>(previews: &'a [PreviewFile], allowed: &[String]) -> Option<&'a PreviewFile> {
    previews
        .iter()
        .filter(|p| !p.is_archived && has_allowed_extension(&p.key, allowed))
        .min_by(|a, b| a.key.cmp(&b.key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use vault_core::PutOptions;
    use vault_store_memory::MemoryStore;

    fn allowed() -> Vec<String> {
        crate::config::EngineConfig::default().preview_extensions
    }

    async fn put(store: &MemoryStore, key: &str) {
        store
            .put("b", key, Bytes::from_static(b"p"), PutOptions::default())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn finds_only_sidecars_of_the_base_file() {
        let store = MemoryStore::new();
        put(&store, "a/m.obj").await;
        put(&store, "a/m.obj.previewFile.png").await;
        put(&store, "a/m.obj.previewFile.txt").await;
        put(&store, "a/m.objx.previewFile.png").await;
        put(&store, "a/m.obj.previewFile.dir/x.png").await;
        put(&store, "a/m.obj.previewFile.gif").await;
        store
            .delete("b", "a/m.obj.previewFile.gif", None)
            .await
            .unwrap();

        let live = find_previews(&store, "b", "a/m.obj", false, 2).await.unwrap();
        let keys: Vec<_> = live.iter().map(|p| p.key.as_str()).collect();
        assert_eq!(keys, vec!["a/m.obj.previewFile.png", "a/m.obj.previewFile.txt"]);

        let all = find_previews(&store, "b", "a/m.obj", true, 1000).await.unwrap();
        assert_eq!(all.len(), 3);
        assert!(all[0].is_archived);
        assert_eq!(all[0].key, "a/m.obj.previewFile.gif");
    }

    #[test]
    fn active_preview_prefers_first_allowed_live_key() {
        let preview = |key: &str, is_archived| PreviewFile {
            key: key.to_string(),
            is_archived,
            is_latest: true,
            version_id: "v".to_string(),
        };
        let previews = vec![
            preview("m.previewFile.bmp", false),
            preview("m.previewFile.gif", true),
            preview("m.previewFile.PNG", false),
            preview("m.previewFile.jpg", false),
        ];
        let active = active_preview(&previews, &allowed()).map(|p| p.key.as_str());
        assert_eq!(active, Some("m.previewFile.PNG"));
        assert!(active_preview(&previews[..2], &allowed()).is_none());
    }
}
