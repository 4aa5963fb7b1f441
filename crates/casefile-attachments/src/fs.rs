use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tracing::debug;

use crate::error::AttachmentStoreError;
use crate::path::contains_path_traversal;
use crate::traits::AttachmentStore;

/// Filesystem-backed attachment store.
///
/// A blob at storage path `p` lives at `{root}/p`. Writes go to
/// `{root}/.tmp/` first and are renamed into place. Urls have the form
/// `file://{absolute path}`.
pub struct FsAttachmentStore {
    root: PathBuf,
}

impl FsAttachmentStore {
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, AttachmentStoreError> {
        let root = root.into();
        fs::create_dir_all(root.join(".tmp")).await?;
        let root = fs::canonicalize(&root).await?;
        debug!(root = %root.display(), "opened attachment store");
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn blob_path(&self, path: &str) -> Result<PathBuf, AttachmentStoreError> {
        if path.is_empty()
            || path.starts_with('/')
            || path.starts_with(".tmp")
            || path.contains('\0')
            || contains_path_traversal(path)
        {
            return Err(AttachmentStoreError::InvalidPath(path.to_string()));
        }
        Ok(self.root.join(path))
    }

    fn temp_path(&self) -> PathBuf {
        self.root
            .join(".tmp")
            .join(uuid::Uuid::new_v4().to_string())
    }
}

fn not_found_or(e: std::io::Error, path: &str) -> AttachmentStoreError {
    if e.kind() == std::io::ErrorKind::NotFound {
        AttachmentStoreError::NotFound(path.to_string())
    } else {
        e.into()
    }
}

#[async_trait]
impl AttachmentStore for FsAttachmentStore {
    async fn put(
        &self,
        path: &str,
        bytes: &[u8],
        _content_type: &str,
    ) -> Result<String, AttachmentStoreError> {
        let target = self.blob_path(path)?;
        let temp = self.temp_path();

        if let Err(e) = fs::write(&temp, bytes).await {
            let _ = fs::remove_file(&temp).await;
            return Err(e.into());
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).await?;
        }
        if let Err(e) = fs::rename(&temp, &target).await {
            let _ = fs::remove_file(&temp).await;
            return Err(e.into());
        }

        Ok(format!("file://{}", target.display()))
    }

    async fn get(&self, path: &str) -> Result<Vec<u8>, AttachmentStoreError> {
        let target = self.blob_path(path)?;
        fs::read(&target).await.map_err(|e| not_found_or(e, path))
    }

    async fn exists(&self, path: &str) -> Result<bool, AttachmentStoreError> {
        let target = self.blob_path(path)?;
        Ok(fs::try_exists(&target).await?)
    }

    async fn delete(&self, path: &str) -> Result<(), AttachmentStoreError> {
        let target = self.blob_path(path)?;
        fs::remove_file(&target)
            .await
            .map_err(|e| not_found_or(e, path))
    }
}

impl std::fmt::Debug for FsAttachmentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FsAttachmentStore")
            .field("root", &self.root)
            .finish()
    }
}
