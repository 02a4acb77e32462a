//! Per-key version chain shared by the store implementations.
//!
//! A chain is kept oldest first; the last entry is the latest. Listing
//! helpers turn a sorted key range into the pages described on
//! [`ObjectStore`](crate::store::ObjectStore).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::store::{
    ObjectHead, ObjectPage, ObjectSummary, Tags, TombstoneEntry, VersionEntry, VersionPage,
};

pub const STANDARD_STORAGE_CLASS: &str = "STANDARD";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredVersion {
    pub version_id: String,
    pub last_modified: DateTime<Utc>,
    #[serde(default)]
    pub tombstone: bool,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub etag: String,
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub storage_class: String,
    #[serde(default)]
    pub tags: Tags,
}

impl StoredVersion {
    pub fn tombstone(version_id: String) -> Self {
        Self {
            version_id,
            last_modified: Utc::now(),
            tombstone: true,
            size: 0,
            etag: String::new(),
            content_type: None,
            storage_class: String::new(),
            tags: Tags::new(),
        }
    }

    pub fn to_head(&self, key: &str) -> ObjectHead {
        ObjectHead {
            key: key.to_string(),
            version_id: self.version_id.clone(),
            size: self.size,
            last_modified: self.last_modified,
            content_type: self.content_type.clone(),
            etag: self.etag.clone(),
            storage_class: self.storage_class.clone(),
            tags: self.tags.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionChain {
    pub entries: Vec<StoredVersion>,
}

impl VersionChain {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn latest(&self) -> Option<&StoredVersion> {
        self.entries.last()
    }

    /// The latest entry if it is a real version.
    pub fn live(&self) -> Option<&StoredVersion> {
        self.latest().filter(|entry| !entry.tombstone)
    }

    pub fn find(&self, version_id: &str) -> Option<&StoredVersion> {
        self.entries.iter().find(|e| e.version_id == version_id)
    }

    pub fn push(&mut self, entry: StoredVersion) {
        self.entries.push(entry);
    }

    /// Removes one entry, returning it.
    pub fn remove(&mut self, version_id: &str) -> Option<StoredVersion> {
        let idx = self
            .entries
            .iter()
            .position(|e| e.version_id == version_id)?;
        Some(self.entries.remove(idx))
    }

    fn summary(&self, key: &str) -> Option<ObjectSummary> {
        self.live().map(|v| ObjectSummary {
            key: key.to_string(),
            size: v.size,
            last_modified: v.last_modified,
            etag: v.etag.clone(),
            storage_class: v.storage_class.clone(),
        })
    }

    fn append_to(&self, key: &str, page: &mut VersionPage) {
        let latest = self.entries.len().saturating_sub(1);
        for (idx, entry) in self.entries.iter().enumerate().rev() {
            let is_latest = idx == latest;
            if entry.tombstone {
                page.tombstones.push(TombstoneEntry {
                    key: key.to_string(),
                    version_id: entry.version_id.clone(),
                    last_modified: entry.last_modified,
                    is_latest,
                    position: latest - idx,
                });
            } else {
                page.versions.push(VersionEntry {
                    key: key.to_string(),
                    version_id: entry.version_id.clone(),
                    size: entry.size,
                    last_modified: entry.last_modified,
                    etag: entry.etag.clone(),
                    storage_class: entry.storage_class.clone(),
                    is_latest,
                    position: latest - idx,
                });
            }
        }
    }
}

/// Drops the keys up to and including the page token.
fn after_token<'a, C>(
    chains: impl IntoIterator<Item = (&'a str, C)>,
    page_token: Option<&'a str>,
) -> impl Iterator<Item = (&'a str, C)> {
    chains
        .into_iter()
        .filter(move |(key, _)| page_token.is_none_or(|token| *key > token))
}

/// Builds a page of live objects. `chains` must be sorted by key and already
/// narrowed to the listed prefix.
pub fn list_page<'a, C: AsRef<VersionChain>>(
    chains: impl IntoIterator<Item = (&'a str, C)>,
    page_token: Option<&'a str>,
    page_size: usize,
) -> ObjectPage {
    let page_size = page_size.max(1);
    let mut page = ObjectPage::default();
    let mut live = after_token(chains, page_token)
        .filter_map(|(key, chain)| chain.as_ref().summary(key))
        .peekable();
    while let Some(summary) = live.next() {
        page.entries.push(summary);
        if page.entries.len() == page_size {
            if live.peek().is_some() {
                page.next_token = page.entries.last().map(|e| e.key.clone());
            }
            break;
        }
    }
    page
}

/// Builds a page of version-chain entries. Whole keys only: a key whose
/// chain would overflow the page starts the next one, unless the page is
/// still empty.
pub fn version_page<'a, C: AsRef<VersionChain>>(
    chains: impl IntoIterator<Item = (&'a str, C)>,
    page_token: Option<&'a str>,
    page_size: usize,
) -> VersionPage {
    let page_size = page_size.max(1);
    let mut page = VersionPage::default();
    let mut count = 0;
    let mut last_key: Option<&str> = None;
    for (key, chain) in after_token(chains, page_token) {
        let chain = chain.as_ref();
        if chain.is_empty() {
            continue;
        }
        if count > 0 && count + chain.entries.len() > page_size {
            page.next_token = last_key.map(str::to_string);
            break;
        }
        chain.append_to(key, &mut page);
        count += chain.entries.len();
        last_key = Some(key);
    }
    page
}

impl AsRef<VersionChain> for VersionChain {
    fn as_ref(&self) -> &VersionChain {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn version(id: &str) -> StoredVersion {
        StoredVersion {
            version_id: id.to_string(),
            last_modified: Utc::now(),
            tombstone: false,
            size: 1,
            etag: "e".into(),
            content_type: None,
            storage_class: STANDARD_STORAGE_CLASS.into(),
            tags: Tags::new(),
        }
    }

    fn chain(ids: &[&str]) -> VersionChain {
        let mut chain = VersionChain::default();
        for id in ids {
            if let Some(id) = id.strip_prefix('~') {
                chain.push(StoredVersion::tombstone(id.to_string()));
            } else {
                chain.push(version(id));
            }
        }
        chain
    }

    #[test]
    fn live_is_hidden_by_latest_tombstone() {
        assert_eq!(chain(&["v1", "v2"]).live().map(|v| v.version_id.as_str()), Some("v2"));
        assert!(chain(&["v1", "~t1"]).live().is_none());
        assert!(chain(&[]).live().is_none());
    }

    #[test]
    fn version_page_keeps_chains_whole() {
        let chains = vec![
            ("a", chain(&["v1", "v2"])),
            ("b", chain(&["v3", "~t1"])),
            ("c", chain(&["v4"])),
        ];
        let first = version_page(chains.iter().map(|(k, c)| (*k, c)), None, 3);
        assert_eq!(first.versions.len(), 2);
        assert_eq!(first.versions[0].version_id, "v2");
        assert!(first.versions[0].is_latest);
        assert!(!first.versions[1].is_latest);
        assert_eq!(first.next_token.as_deref(), Some("a"));

        let second = version_page(chains.iter().map(|(k, c)| (*k, c)), Some("a"), 3);
        assert_eq!(second.tombstones.len(), 1);
        assert!(second.tombstones[0].is_latest);
        assert_eq!(second.versions.len(), 2);
        assert_eq!(second.next_token, None);
    }

    #[test]
    fn list_page_skips_archived_keys() {
        let chains = vec![
            ("a", chain(&["v1"])),
            ("b", chain(&["v2", "~t1"])),
            ("c", chain(&["v3"])),
        ];
        let page = list_page(chains.iter().map(|(k, c)| (*k, c)), None, 10);
        let keys: Vec<_> = page.entries.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(keys, vec!["a", "c"]);
        assert!(page.next_token.is_none());
    }
}
