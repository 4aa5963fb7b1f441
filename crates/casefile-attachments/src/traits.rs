use async_trait::async_trait;

use crate::error::AttachmentStoreError;

/// Blob storage addressed by caller-chosen hierarchical paths.
///
/// Implementations must report a missing blob as
/// [`AttachmentStoreError::NotFound`] so callers can tell it apart from
/// a real failure.
#[async_trait]
pub trait AttachmentStore: Send + Sync {
    /// Store `bytes` at `path` and return a retrievable url.
    async fn put(
        &self,
        path: &str,
        bytes: &[u8],
        content_type: &str,
    ) -> Result<String, AttachmentStoreError>;

    async fn get(&self, path: &str) -> Result<Vec<u8>, AttachmentStoreError>;

    async fn exists(&self, path: &str) -> Result<bool, AttachmentStoreError>;

    async fn delete(&self, path: &str) -> Result<(), AttachmentStoreError>;
}
