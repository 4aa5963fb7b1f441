/// Errors reported by an [`crate::AttachmentStore`] backend.
#[derive(Debug, thiserror::Error)]
pub enum AttachmentStoreError {
    /// Nothing is stored at the path.
    #[error("attachment not found: {0}")]
    NotFound(String),

    /// The path is malformed or escapes the store root.
    #[error("invalid attachment path: {0}")]
    InvalidPath(String),

    #[error("attachment I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("attachment backend error: {0}")]
    Backend(String),
}

/// Errors from the attachment lifecycle.
#[derive(Debug, thiserror::Error)]
pub enum AttachmentError {
    #[error("upload to {path} failed")]
    Upload {
        path: String,
        #[source]
        source: AttachmentStoreError,
    },

    #[error("deletion of {path} failed")]
    Deletion {
        path: String,
        #[source]
        source: AttachmentStoreError,
    },

    /// An inline `data:` payload could not be decoded.
    #[error("invalid inline payload: {0}")]
    InvalidInline(String),
}

pub type AttachmentResult<T> = Result<T, AttachmentError>;
