//! Mutating lifecycle operations. Each one is reached through the matching
//! [`FileManager`](crate::FileManager) method.

pub(crate) mod archive;
pub(crate) mod auxiliary;
pub(crate) mod delete;
pub(crate) mod folder;
pub(crate) mod primary;
pub(crate) mod revert;
pub(crate) mod transfer;

use crate::paths::normalize_prefix;

/// Whether `key` addresses the asset's own root folder.
pub(crate) fn is_asset_root(base_key: &str, key: &str) -> bool {
    normalize_prefix(key) == normalize_prefix(base_key)
}

/// `"Successfully ... 3 file(s) under prefix /renders/"` style suffix.
pub(crate) fn scope_suffix(file_path: &str, is_prefix: bool) -> String {
    if is_prefix {
        format!(" under prefix {file_path}")
    } else {
        format!(": {file_path}")
    }
}

/// `" and 2 associated preview files"`, or nothing.
pub(crate) fn preview_suffix(count: usize) -> String {
    if count == 0 {
        String::new()
    } else {
        format!(" and {count} associated preview files")
    }
}
