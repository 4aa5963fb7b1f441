use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::error::AttachmentStoreError;
use crate::traits::AttachmentStore;

struct StoredBlob {
    bytes: Vec<u8>,
    content_type: String,
}

/// In-memory attachment store for tests and embedding.
///
/// Urls have the form `mem://{path}`.
pub struct InMemoryAttachmentStore {
    blobs: RwLock<HashMap<String, StoredBlob>>,
}

impl InMemoryAttachmentStore {
    pub fn new() -> Self {
        Self {
            blobs: RwLock::new(HashMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.blobs.read().expect("lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.read().expect("lock poisoned").is_empty()
    }

    /// Sorted list of every stored path.
    pub fn paths(&self) -> Vec<String> {
        let blobs = self.blobs.read().expect("lock poisoned");
        let mut paths: Vec<String> = blobs.keys().cloned().collect();
        paths.sort();
        paths
    }

    pub fn content_type(&self, path: &str) -> Option<String> {
        let blobs = self.blobs.read().expect("lock poisoned");
        blobs.get(path).map(|b| b.content_type.clone())
    }
}

impl Default for InMemoryAttachmentStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AttachmentStore for InMemoryAttachmentStore {
    async fn put(
        &self,
        path: &str,
        bytes: &[u8],
        content_type: &str,
    ) -> Result<String, AttachmentStoreError> {
        if path.is_empty() {
            return Err(AttachmentStoreError::InvalidPath(path.to_string()));
        }
        let mut blobs = self.blobs.write().expect("lock poisoned");
        blobs.insert(
            path.to_string(),
            StoredBlob {
                bytes: bytes.to_vec(),
                content_type: content_type.to_string(),
            },
        );
        Ok(format!("mem://{path}"))
    }

    async fn get(&self, path: &str) -> Result<Vec<u8>, AttachmentStoreError> {
        let blobs = self.blobs.read().expect("lock poisoned");
        blobs
            .get(path)
            .map(|b| b.bytes.clone())
            .ok_or_else(|| AttachmentStoreError::NotFound(path.to_string()))
    }

    async fn exists(&self, path: &str) -> Result<bool, AttachmentStoreError> {
        let blobs = self.blobs.read().expect("lock poisoned");
        Ok(blobs.contains_key(path))
    }

    async fn delete(&self, path: &str) -> Result<(), AttachmentStoreError> {
        let mut blobs = self.blobs.write().expect("lock poisoned");
        blobs
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| AttachmentStoreError::NotFound(path.to_string()))
    }
}

impl std::fmt::Debug for InMemoryAttachmentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryAttachmentStore")
            .field("blob_count", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_get_delete() {
        let store = InMemoryAttachmentStore::new();
        let url = store.put("cases/c1/exhibits/a", b"abc", "text/plain").await.unwrap();
        assert_eq!(url, "mem://cases/c1/exhibits/a");
        assert_eq!(store.get("cases/c1/exhibits/a").await.unwrap(), b"abc");
        assert_eq!(store.content_type("cases/c1/exhibits/a").as_deref(), Some("text/plain"));

        store.delete("cases/c1/exhibits/a").await.unwrap();
        assert!(!store.exists("cases/c1/exhibits/a").await.unwrap());
    }

    #[tokio::test]
    async fn delete_missing_is_not_found() {
        let store = InMemoryAttachmentStore::new();
        let err = store.delete("nope").await.unwrap_err();
        assert!(matches!(err, AttachmentStoreError::NotFound(_)));
    }
}
