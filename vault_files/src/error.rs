use vault_core::StoreError;

pub type FileResult<T> = std::result::Result<T, FileError>;

/// Failure of a file operation.
///
/// `Validation`, `Unauthorized` and `General` carry a message that is safe
/// to show to callers. `Transient` and `Internal` are logged in full and
/// surfaced through [`FileError::public_message`] only.
#[derive(Debug, thiserror::Error)]
pub enum FileError {
    #[error("invalid request: {0}")]
    Validation(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    General(String),
    #[error("storage temporarily unavailable: {0}")]
    Transient(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Unauthorized,
    General,
    Transient,
    Internal,
}

impl FileError {
    pub fn general(msg: impl Into<String>) -> Self {
        FileError::General(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        FileError::Validation(msg.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            FileError::Validation(_) => ErrorKind::Validation,
            FileError::Unauthorized(_) => ErrorKind::Unauthorized,
            FileError::General(_) => ErrorKind::General,
            FileError::Transient(_) => ErrorKind::Transient,
            FileError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// HTTP-style status for the error category.
    pub fn status_code(&self) -> u16 {
        match self.kind() {
            ErrorKind::Validation | ErrorKind::General => 400,
            ErrorKind::Unauthorized => 403,
            ErrorKind::Transient => 503,
            ErrorKind::Internal => 500,
        }
    }

    /// Message that can be returned to a caller without leaking internals.
    pub fn public_message(&self) -> String {
        match self {
            FileError::Validation(msg) => format!("Invalid request: {msg}"),
            FileError::Unauthorized(msg) | FileError::General(msg) => msg.clone(),
            FileError::Transient(_) => {
                "The storage service is busy. Please retry the request.".to_string()
            }
            FileError::Internal(_) => "An internal error occurred.".to_string(),
        }
    }
}

impl From<StoreError> for FileError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => FileError::general("File not found."),
            StoreError::Throttled(msg) => FileError::Transient(msg),
            StoreError::Other(err) => FileError::Internal(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_follow_the_taxonomy() {
        assert_eq!(FileError::validation("x").status_code(), 400);
        assert_eq!(FileError::Unauthorized("x".into()).status_code(), 403);
        assert_eq!(FileError::general("x").status_code(), 400);
        assert_eq!(FileError::Transient("x".into()).status_code(), 503);
        assert_eq!(
            FileError::Internal(anyhow::anyhow!("x")).status_code(),
            500
        );
    }

    #[test]
    fn internal_details_stay_private() {
        let err = FileError::from(StoreError::Other(anyhow::anyhow!("disk /dev/sda1 failed")));
        assert_eq!(err.kind(), ErrorKind::Internal);
        assert!(!err.public_message().contains("sda1"));

        let throttled = FileError::from(StoreError::Throttled("SlowDown".into()));
        assert_eq!(throttled.kind(), ErrorKind::Transient);
        assert!(!throttled.public_message().contains("SlowDown"));
    }
}
