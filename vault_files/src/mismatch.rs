//! Drift between what storage serves and what the asset's current version
//! pinned.

use std::collections::HashMap;

use tracing::warn;
use vault_core::MetadataStore;

/// Version ids recorded for the files of one asset version, keyed by the
/// file path relative to the asset base (no leading `/`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VersionSnapshot {
    files: HashMap<String, String>,
}

impl VersionSnapshot {
    /// Loads the snapshot of `asset_version_id`, narrowed to one file when
    /// `file_key` is given. A failed lookup yields an empty snapshot, which
    /// flags every file as mismatched.
    pub async fn load(
        meta: &dyn MetadataStore,
        asset_id: &str,
        asset_version_id: &str,
        file_key: Option<&str>,
    ) -> Self {
        match meta
            .query_version_files(asset_id, asset_version_id, file_key)
            .await
        {
            Ok(records) => records
                .into_iter()
                .map(|r| (r.file_key, r.version_id))
                .collect(),
            Err(e) => {
                warn!(asset_id, asset_version_id, "failed to load asset version files: {e:#}");
                Self::default()
            }
        }
    }

    pub fn pinned(&self, relative_key: &str) -> Option<&str> {
        self.files.get(relative_key).map(String::as_str)
    }

    /// Archived files always mismatch; live files mismatch unless the
    /// snapshot pins exactly their live version.
    pub fn is_mismatch(&self, relative_key: &str, is_archived: bool, live_version_id: &str) -> bool {
        if is_archived {
            return true;
        }
        self.pinned(relative_key) != Some(live_version_id)
    }
}

impl FromIterator<(String, String)> for VersionSnapshot {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            files: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vault_core::{AssetVersionFileRecord, MemoryMetadataStore};

    #[test]
    fn archived_files_always_mismatch() {
        let snapshot: VersionSnapshot = [("m.obj".to_string(), "v2".to_string())]
            .into_iter()
            .collect();
        for (archived, live, expected) in [
            (true, "v2", true),
            (true, "v3", true),
            (false, "v2", false),
            (false, "v3", true),
        ] {
            assert_eq!(snapshot.is_mismatch("m.obj", archived, live), expected);
        }
        assert!(snapshot.is_mismatch("other.obj", false, "v2"));
    }

    #[tokio::test]
    async fn loads_records_of_one_asset_version() {
        let meta = MemoryMetadataStore::new();
        for (ver, key, id) in [("1", "m.obj", "v2"), ("1", "dir/t.png", "v7"), ("2", "m.obj", "v3")] {
            meta.put_version_file(&AssetVersionFileRecord {
                asset_id: "a1".into(),
                asset_version_id: ver.into(),
                file_key: key.into(),
                version_id: id.into(),
                size: None,
                last_modified: None,
                etag: None,
            })
            .await
            .unwrap();
        }
        let snapshot = VersionSnapshot::load(&meta, "a1", "1", None).await;
        assert_eq!(snapshot.pinned("m.obj"), Some("v2"));
        assert_eq!(snapshot.pinned("dir/t.png"), Some("v7"));

        let one = VersionSnapshot::load(&meta, "a1", "2", Some("m.obj")).await;
        assert_eq!(one.pinned("m.obj"), Some("v3"));
        assert_eq!(one.pinned("dir/t.png"), None);
    }
}
