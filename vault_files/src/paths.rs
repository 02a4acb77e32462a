//! Key arithmetic: resolving caller paths against an asset's base prefix,
//! preview naming and request validation. Nothing here does I/O.

use crate::error::{FileError, FileResult};

/// Infix that turns `<name>` into a preview sidecar `<name>.previewFile.<ext>`.
pub const PREVIEW_MARKER: &str = ".previewFile.";

/// Appends a trailing `/` to a non-empty prefix that lacks one.
pub fn normalize_prefix(prefix: &str) -> String {
    if prefix.is_empty() || prefix.ends_with('/') {
        prefix.to_string()
    } else {
        format!("{prefix}/")
    }
}

/// Resolves `user_path` against `base_prefix` into an absolute store key.
///
/// A path that already carries the base prefix (with or without a leading
/// `/`) is returned unchanged, so resolving twice is the same as resolving
/// once.
pub fn resolve(base_prefix: &str, user_path: &str) -> String {
    let base = normalize_prefix(base_prefix);
    if user_path.starts_with(&base) {
        return user_path.to_string();
    }
    let path = user_path.strip_prefix('/').unwrap_or(user_path);
    if path.starts_with(&base) {
        path.to_string()
    } else {
        format!("{base}{path}")
    }
}

/// Caller-facing path of `key`: the part after the asset base, with a
/// leading `/`.
pub fn relative_path(base_prefix: &str, key: &str) -> String {
    let base = normalize_prefix(base_prefix);
    let rest = key.strip_prefix(base.as_str()).unwrap_or(key);
    format!("/{}", rest.trim_start_matches('/'))
}

/// Relative path without the leading `/`, as stored in version snapshots.
pub fn snapshot_key(base_prefix: &str, key: &str) -> String {
    relative_path(base_prefix, key)[1..].to_string()
}

pub fn is_folder_key(key: &str) -> bool {
    key.ends_with('/')
}

/// Last path segment; folders are named after their own segment.
pub fn file_name(key: &str) -> &str {
    key.trim_end_matches('/').rsplit('/').next().unwrap_or_default()
}

pub fn is_preview_path(path: &str) -> bool {
    path.contains(PREVIEW_MARKER)
}

/// Base file key of a preview key.
pub fn preview_base(key: &str) -> Option<&str> {
    key.split_once(PREVIEW_MARKER).map(|(base, _)| base)
}

/// Extension of a preview key, lower cased and with a leading dot.
pub fn preview_extension(key: &str) -> Option<String> {
    key.split_once(PREVIEW_MARKER)
        .map(|(_, ext)| format!(".{}", ext.to_lowercase()))
}

/// Destination of a preview sidecar when `src_key` becomes `dst_key`.
///
/// Only the base name part of the preview is substituted, so
/// `a/model.obj.previewFile.png` follows `a/model.obj -> b/chair.obj` to
/// `b/chair.obj.previewFile.png`.
pub fn rename_preview(preview_key: &str, src_key: &str, dst_key: &str) -> Option<String> {
    let suffix = preview_key.strip_prefix(src_key)?;
    suffix
        .starts_with(PREVIEW_MARKER)
        .then(|| format!("{dst_key}{suffix}"))
}

/// Prefix under which the auxiliary derivatives of `key` live.
pub fn auxiliary_prefix(key: &str) -> String {
    normalize_prefix(key)
}

fn check_segments(path: &str, field: &str) -> FileResult<()> {
    if path.split('/').any(|segment| segment == "..") {
        return Err(FileError::validation(format!(
            "{field} must not contain '..' segments"
        )));
    }
    Ok(())
}

/// A file path as supplied by callers: non-empty, rooted at `/`.
pub fn validate_file_path(path: &str, field: &str) -> FileResult<()> {
    let path = path.trim();
    if path.is_empty() {
        return Err(FileError::validation(format!("{field} is required")));
    }
    if !path.starts_with('/') {
        return Err(FileError::validation(format!("{field} must start with '/'")));
    }
    check_segments(path, field)
}

pub fn validate_folder_key(key: &str) -> FileResult<()> {
    let key = key.trim();
    if key.is_empty() {
        return Err(FileError::validation("relativeKey is required"));
    }
    if !key.ends_with('/') {
        return Err(FileError::validation(
            "relativeKey must end with a slash to represent a folder",
        ));
    }
    check_segments(key, "relativeKey")
}

/// Asset ids are 3 to 63 characters of `[-_a-zA-Z0-9]`.
pub fn validate_asset_id(id: &str, field: &str) -> FileResult<()> {
    let valid_len = (3..=63).contains(&id.len());
    let valid_chars = id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid_len && valid_chars {
        Ok(())
    } else {
        Err(FileError::validation(format!(
            "{field} must be 3-63 characters of letters, digits, '-' or '_'"
        )))
    }
}

pub fn validate_list_limit(value: usize, field: &str) -> FileResult<()> {
    if (1..=1000).contains(&value) {
        Ok(())
    } else {
        Err(FileError::validation(format!(
            "{field} must be between 1 and 1000"
        )))
    }
}
