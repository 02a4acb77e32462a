//! Requests accepted and results returned by [`FileManager`](crate::FileManager).
//!
//! Field names serialize in camelCase so results can be handed to API
//! clients as-is.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cascade::CascadeReport;
use crate::error::{FileError, FileResult};
use crate::paths::{validate_asset_id, validate_file_path, validate_folder_key, validate_list_limit};
use crate::versions::FileVersion;

/// Object tag holding a file's primary type.
pub const PRIMARY_TYPE_TAG: &str = "vams-primarytype";

const PRIMARY_TYPES: [&str; 8] = ["", "primary", "lod1", "lod2", "lod3", "lod4", "lod5", "other"];

/// The asset an operation targets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetRef {
    pub database_id: String,
    pub asset_id: String,
}

impl AssetRef {
    pub fn new(database_id: impl Into<String>, asset_id: impl Into<String>) -> Self {
        Self {
            database_id: database_id.into(),
            asset_id: asset_id.into(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteFileRequest {
    pub file_path: String,
    #[serde(default)]
    pub is_prefix: bool,
    #[serde(default)]
    pub confirm_permanent_delete: bool,
}

impl DeleteFileRequest {
    pub fn validate(&self) -> FileResult<()> {
        validate_file_path(&self.file_path, "filePath")
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveFileRequest {
    pub file_path: String,
    #[serde(default)]
    pub is_prefix: bool,
}

impl ArchiveFileRequest {
    pub fn validate(&self) -> FileResult<()> {
        validate_file_path(&self.file_path, "filePath")
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnarchiveFileRequest {
    pub file_path: String,
}

impl UnarchiveFileRequest {
    pub fn validate(&self) -> FileResult<()> {
        validate_file_path(&self.file_path, "filePath")
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevertFileRequest {
    pub file_path: String,
    pub version_id: String,
}

impl RevertFileRequest {
    pub fn validate(&self) -> FileResult<()> {
        validate_file_path(&self.file_path, "filePath")?;
        if self.version_id.trim().is_empty() {
            return Err(FileError::validation("versionId is required"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CopyFileRequest {
    pub source_path: String,
    pub destination_path: String,
    /// Copy into another asset of the same database.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination_asset_id: Option<String>,
}

impl CopyFileRequest {
    pub fn validate(&self) -> FileResult<()> {
        validate_file_path(&self.source_path, "sourcePath")?;
        validate_file_path(&self.destination_path, "destinationPath")?;
        if let Some(id) = &self.destination_asset_id {
            validate_asset_id(id, "destinationAssetId")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveFileRequest {
    pub source_path: String,
    pub destination_path: String,
}

impl MoveFileRequest {
    pub fn validate(&self) -> FileResult<()> {
        validate_file_path(&self.source_path, "sourcePath")?;
        validate_file_path(&self.destination_path, "destinationPath")
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetPrimaryTypeRequest {
    pub file_path: String,
    /// `""` removes the type.
    pub primary_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_type_other: Option<String>,
}

impl SetPrimaryTypeRequest {
    /// Validates the request and returns the tag value to store, `None`
    /// meaning the tag is removed. Values are compared lower cased.
    pub fn validate(&self) -> FileResult<Option<String>> {
        validate_file_path(&self.file_path, "filePath")?;
        let primary_type = self.primary_type.trim().to_lowercase();
        let other = self
            .primary_type_other
            .as_deref()
            .map(|o| o.trim().to_lowercase())
            .filter(|o| !o.is_empty());

        if !PRIMARY_TYPES.contains(&primary_type.as_str()) {
            return Err(FileError::validation(format!(
                "primaryType must be one of: {}",
                PRIMARY_TYPES.join(", ")
            )));
        }
        match (primary_type.as_str(), other) {
            ("other", None) => Err(FileError::validation(
                "primaryTypeOther is required when primaryType is 'other'",
            )),
            ("other", Some(other)) if other.chars().count() > 30 => Err(FileError::validation(
                "primaryTypeOther must be at most 30 characters",
            )),
            ("other", Some(other)) => Ok(Some(other)),
            (_, Some(_)) => Err(FileError::validation(
                "primaryTypeOther should only be provided when primaryType is 'other'",
            )),
            ("", None) => Ok(None),
            (value, None) => Ok(Some(value.to_string())),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateFolderRequest {
    /// Folder path relative to the asset, ending in `/`.
    pub relative_key: String,
}

impl CreateFolderRequest {
    pub fn validate(&self) -> FileResult<()> {
        validate_folder_key(&self.relative_key)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteAuxiliaryRequest {
    /// Treated as a prefix in the auxiliary container.
    pub file_path: String,
}

impl DeleteAuxiliaryRequest {
    pub fn validate(&self) -> FileResult<()> {
        validate_file_path(&self.file_path, "filePath")
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileInfoRequest {
    pub file_path: String,
    #[serde(default)]
    pub include_versions: bool,
}

impl FileInfoRequest {
    pub fn validate(&self) -> FileResult<()> {
        validate_file_path(&self.file_path, "filePath")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ListFilesRequest {
    pub max_items: usize,
    pub page_size: usize,
    pub starting_token: Option<String>,
    /// Narrows the listing to a sub-path of the asset.
    pub prefix: Option<String>,
    pub include_archived: bool,
}

impl Default for ListFilesRequest {
    fn default() -> Self {
        Self {
            max_items: 1000,
            page_size: 1000,
            starting_token: None,
            prefix: None,
            include_archived: false,
        }
    }
}

impl ListFilesRequest {
    pub fn validate(&self) -> FileResult<()> {
        validate_list_limit(self.max_items, "maxItems")?;
        validate_list_limit(self.page_size, "pageSize")
    }
}

/// Result of delete, archive, unarchive, copy and move.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileOperationResult {
    pub success: bool,
    pub message: String,
    /// Relative paths touched, cascaded previews and auxiliary files
    /// included.
    pub affected_files: Vec<String>,
    pub cascades: CascadeReport,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RevertFileResult {
    pub success: bool,
    pub message: String,
    pub file_path: String,
    pub reverted_from_version_id: String,
    pub new_version_id: String,
    pub cascades: CascadeReport,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SetPrimaryTypeResult {
    pub success: bool,
    pub message: String,
    pub file_path: String,
    pub primary_type: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateFolderResult {
    pub message: String,
    pub relative_key: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteAuxiliaryResult {
    pub success: bool,
    pub message: String,
    pub file_path: String,
    pub deleted_count: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteAssetPreviewResult {
    pub success: bool,
    pub message: String,
    pub asset_id: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileInfo {
    pub file_name: String,
    pub key: String,
    pub relative_path: String,
    pub is_folder: bool,
    pub size: Option<u64>,
    pub content_type: Option<String>,
    pub last_modified: Option<DateTime<Utc>>,
    pub etag: Option<String>,
    pub storage_class: Option<String>,
    pub is_archived: bool,
    pub primary_type: Option<String>,
    /// Relative path of the active preview, empty when there is none.
    pub preview_file: String,
    /// Only computed when the asset pins a current version.
    pub current_asset_version_file_version_mismatch: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub versions: Option<Vec<FileVersion>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileListItem {
    pub file_name: String,
    pub key: String,
    pub relative_path: String,
    pub is_folder: bool,
    /// Omitted for folders.
    pub size: Option<u64>,
    pub date_created_current_version: DateTime<Utc>,
    pub version_id: String,
    pub storage_class: Option<String>,
    pub is_archived: bool,
    pub current_asset_version_file_version_mismatch: bool,
    pub primary_type: Option<String>,
    pub preview_file: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileListResult {
    pub items: Vec<FileListItem>,
    pub next_token: Option<String>,
}
