use std::sync::Arc;

use casefile_types::{
    is_blob_path, CaseId, Exhibit, ExhibitDraft, ExhibitId, ExhibitState, ProfileImage, SuspectId,
    UPLOAD_FAILED_PATH, UPLOAD_FAILED_URL,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{AttachmentError, AttachmentResult, AttachmentStoreError};
use crate::inline::InlinePayload;
use crate::path::{generate_storage_path, AttachmentOwner};
use crate::traits::AttachmentStore;

/// Where a blob ended up after [`AttachmentManager::upload`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct UploadedAttachment {
    pub url: String,
    pub storage_path: String,
    /// BLAKE3 digest of the stored bytes, hex encoded.
    pub content_hash: String,
    pub size: u64,
}

/// Result of [`AttachmentManager::delete`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    /// The store had nothing at the path. The desired end state holds.
    AlreadyAbsent,
    /// The path was empty or a sentinel, so no store call was made.
    Skipped,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MaterializeStatus {
    /// Not a pending capture; left as is.
    Unchanged,
    Stored { storage_path: String, content_hash: String },
    /// Degraded to the upload-failed placeholder.
    Failed { reason: String },
}

/// One exhibit after materialization, with what happened to it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExhibitOutcome {
    pub exhibit: Exhibit,
    pub status: MaterializeStatus,
}

impl ExhibitOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self.status, MaterializeStatus::Failed { .. })
    }
}

/// Per-exhibit outcomes of [`AttachmentManager::materialize_all`], in input order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MaterializeReport {
    pub outcomes: Vec<ExhibitOutcome>,
}

impl MaterializeReport {
    pub fn failures(&self) -> impl Iterator<Item = &ExhibitOutcome> {
        self.outcomes.iter().filter(|o| o.is_failed())
    }

    pub fn stored_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, MaterializeStatus::Stored { .. }))
            .count()
    }

    pub fn into_exhibits(self) -> Vec<Exhibit> {
        self.outcomes.into_iter().map(|o| o.exhibit).collect()
    }
}

/// Uploads, deletes and materializes attachments on top of an [`AttachmentStore`].
#[derive(Clone)]
pub struct AttachmentManager {
    store: Arc<dyn AttachmentStore>,
}

impl AttachmentManager {
    pub fn new(store: Arc<dyn AttachmentStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn AttachmentStore> {
        &self.store
    }

    /// Store `bytes` under a fresh path in `owner`'s prefix.
    pub async fn upload(
        &self,
        bytes: &[u8],
        original_name: &str,
        content_type: &str,
        owner: &AttachmentOwner,
    ) -> AttachmentResult<UploadedAttachment> {
        let storage_path = generate_storage_path(owner, original_name);
        let url = self
            .store
            .put(&storage_path, bytes, content_type)
            .await
            .map_err(|source| AttachmentError::Upload {
                path: storage_path.clone(),
                source,
            })?;

        let content_hash = hex::encode(blake3::hash(bytes).as_bytes());
        info!(%owner, path = %storage_path, size = bytes.len(), "attachment uploaded");
        Ok(UploadedAttachment {
            url,
            storage_path,
            content_hash,
            size: bytes.len() as u64,
        })
    }

    /// Delete the blob at `storage_path`.
    ///
    /// A store "not found" is success. Empty paths and sentinels are skipped.
    pub async fn delete(&self, storage_path: &str) -> AttachmentResult<DeleteOutcome> {
        if !is_blob_path(storage_path) {
            debug!(path = %storage_path, "no blob to delete");
            return Ok(DeleteOutcome::Skipped);
        }
        match self.store.delete(storage_path).await {
            Ok(()) => {
                info!(path = %storage_path, "attachment deleted");
                Ok(DeleteOutcome::Deleted)
            }
            Err(AttachmentStoreError::NotFound(_)) => {
                debug!(path = %storage_path, "attachment already absent");
                Ok(DeleteOutcome::AlreadyAbsent)
            }
            Err(source) => Err(AttachmentError::Deletion {
                path: storage_path.to_string(),
                source,
            }),
        }
    }

    /// Turn a pending capture into a stored blob.
    ///
    /// Never fails: on any error the exhibit is degraded to the
    /// `UPLOAD_FAILED` placeholder and the reason is reported in the outcome.
    pub async fn materialize_inline_capture(
        &self,
        mut exhibit: Exhibit,
        case_id: &CaseId,
    ) -> ExhibitOutcome {
        if !exhibit.is_pending_capture || exhibit.state() == ExhibitState::Failed {
            return ExhibitOutcome {
                exhibit,
                status: MaterializeStatus::Unchanged,
            };
        }

        debug!(exhibit = %exhibit.id, state = ?ExhibitState::Uploading, "materializing capture");
        let owner = AttachmentOwner::CaseExhibit(case_id.clone());
        let result = match InlinePayload::parse(&exhibit.url) {
            Ok(payload) => {
                let name = if exhibit.name.trim().is_empty() {
                    format!("capture.{}", payload.extension())
                } else {
                    exhibit.name.clone()
                };
                self.upload(&payload.bytes, &name, &payload.mime_type, &owner)
                    .await
                    .map(|uploaded| (uploaded, payload.mime_type))
            }
            Err(e) => Err(e),
        };

        match result {
            Ok((uploaded, mime_type)) => {
                exhibit.url = uploaded.url;
                exhibit.storage_path = uploaded.storage_path.clone();
                exhibit.mime_type = mime_type;
                exhibit.is_pending_capture = false;
                ExhibitOutcome {
                    exhibit,
                    status: MaterializeStatus::Stored {
                        storage_path: uploaded.storage_path,
                        content_hash: uploaded.content_hash,
                    },
                }
            }
            Err(e) => {
                warn!(exhibit = %exhibit.id, case = %case_id, error = %e, "capture upload failed; keeping placeholder");
                exhibit.url = UPLOAD_FAILED_URL.to_string();
                exhibit.storage_path = UPLOAD_FAILED_PATH.to_string();
                exhibit.is_pending_capture = false;
                ExhibitOutcome {
                    exhibit,
                    status: MaterializeStatus::Failed {
                        reason: error_chain(&e),
                    },
                }
            }
        }
    }

    /// Materialize every draft independently. Missing ids are filled in.
    pub async fn materialize_all(
        &self,
        drafts: Vec<ExhibitDraft>,
        case_id: &CaseId,
        now: DateTime<Utc>,
    ) -> MaterializeReport {
        let mut outcomes = Vec::with_capacity(drafts.len());
        for draft in drafts {
            let exhibit = draft.into_exhibit(now);
            outcomes.push(self.materialize_inline_capture(exhibit, case_id).await);
        }
        let report = MaterializeReport { outcomes };
        let failed = report.failures().count();
        if failed > 0 {
            warn!(case = %case_id, failed, "some captures could not be stored");
        }
        report
    }

    /// Upload a file directly as a new exhibit of `case_id`.
    pub async fn upload_exhibit(
        &self,
        case_id: &CaseId,
        name: &str,
        bytes: &[u8],
        mime_type: &str,
    ) -> AttachmentResult<Exhibit> {
        let owner = AttachmentOwner::CaseExhibit(case_id.clone());
        let uploaded = self.upload(bytes, name, mime_type, &owner).await?;
        Ok(Exhibit {
            id: ExhibitId::generate(),
            name: name.to_string(),
            url: uploaded.url,
            mime_type: mime_type.to_string(),
            storage_path: uploaded.storage_path,
            uploaded_at: Utc::now(),
            description: None,
            is_pending_capture: false,
        })
    }

    /// Upload an inline image as `suspect_id`'s profile image.
    pub async fn upload_profile_image(
        &self,
        suspect_id: &SuspectId,
        data_uri: &str,
    ) -> AttachmentResult<ProfileImage> {
        let payload = InlinePayload::parse(data_uri)?;
        let owner = AttachmentOwner::SuspectProfile(suspect_id.clone());
        let name = format!("profile.{}", payload.extension());
        let uploaded = self
            .upload(&payload.bytes, &name, &payload.mime_type, &owner)
            .await?;
        Ok(ProfileImage {
            url: uploaded.url,
            storage_path: uploaded.storage_path,
        })
    }
}

impl std::fmt::Debug for AttachmentManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttachmentManager").finish_non_exhaustive()
    }
}

fn error_chain(e: &dyn std::error::Error) -> String {
    let mut msg = e.to_string();
    let mut source = e.source();
    while let Some(inner) = source {
        msg.push_str(": ");
        msg.push_str(&inner.to_string());
        source = inner.source();
    }
    msg
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryAttachmentStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const PNG_URI: &str = "data:image/png;base64,aGVsbG8=";

    /// Wraps the in-memory store, failing puts whose path contains a marker
    /// and optionally every delete.
    struct FlakyStore {
        inner: InMemoryAttachmentStore,
        fail_put_containing: Option<&'static str>,
        fail_deletes: bool,
        delete_calls: AtomicUsize,
    }

    impl FlakyStore {
        fn new() -> Self {
            Self {
                inner: InMemoryAttachmentStore::new(),
                fail_put_containing: None,
                fail_deletes: false,
                delete_calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl AttachmentStore for FlakyStore {
        async fn put(&self, path: &str, bytes: &[u8], ct: &str) -> Result<String, AttachmentStoreError> {
            if self.fail_put_containing.is_some_and(|m| path.contains(m)) {
                return Err(AttachmentStoreError::Backend("quota exceeded".into()));
            }
            self.inner.put(path, bytes, ct).await
        }
        async fn get(&self, path: &str) -> Result<Vec<u8>, AttachmentStoreError> {
            self.inner.get(path).await
        }
        async fn exists(&self, path: &str) -> Result<bool, AttachmentStoreError> {
            self.inner.exists(path).await
        }
        async fn delete(&self, path: &str) -> Result<(), AttachmentStoreError> {
            self.delete_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_deletes {
                return Err(AttachmentStoreError::Backend("permission denied".into()));
            }
            self.inner.delete(path).await
        }
    }

    fn case_id() -> CaseId {
        CaseId::new("c1").unwrap()
    }

    fn manager(store: Arc<dyn AttachmentStore>) -> AttachmentManager {
        AttachmentManager::new(store)
    }

    // -----------------------------------------------------------------------
    // Upload / delete
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn upload_places_blob_under_owner_prefix() {
        let store = Arc::new(InMemoryAttachmentStore::new());
        let m = manager(store.clone());
        let owner = AttachmentOwner::CaseExhibit(case_id());

        let up = m.upload(b"evidence", "scene photo.jpg", "image/jpeg", &owner).await.unwrap();
        assert!(up.storage_path.starts_with("cases/c1/exhibits/"));
        assert!(up.storage_path.ends_with("-scene_photo.jpg"));
        assert_eq!(up.size, 8);
        assert_eq!(up.content_hash, hex::encode(blake3::hash(b"evidence").as_bytes()));
        assert_eq!(store.get(&up.storage_path).await.unwrap(), b"evidence");
    }

    #[tokio::test]
    async fn upload_failure_carries_cause() {
        let mut flaky = FlakyStore::new();
        flaky.fail_put_containing = Some("cases/");
        let m = manager(Arc::new(flaky));
        let owner = AttachmentOwner::CaseExhibit(case_id());

        let err = m.upload(b"x", "a.txt", "text/plain", &owner).await.unwrap_err();
        match err {
            AttachmentError::Upload { source, .. } => {
                assert!(matches!(source, AttachmentStoreError::Backend(_)))
            }
            other => panic!("expected upload error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn delete_absent_blob_is_success() {
        let m = manager(Arc::new(InMemoryAttachmentStore::new()));
        let outcome = m.delete("cases/c1/exhibits/gone").await.unwrap();
        assert_eq!(outcome, DeleteOutcome::AlreadyAbsent);
    }

    #[tokio::test]
    async fn delete_skips_sentinels_without_store_call() {
        let flaky = Arc::new(FlakyStore::new());
        let m = manager(flaky.clone());
        for path in ["", UPLOAD_FAILED_PATH, casefile_types::PENDING_CAPTURE_PATH] {
            assert_eq!(m.delete(path).await.unwrap(), DeleteOutcome::Skipped);
        }
        assert_eq!(flaky.delete_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn delete_backend_failure_is_deletion_error() {
        let mut flaky = FlakyStore::new();
        flaky.fail_deletes = true;
        let m = manager(Arc::new(flaky));
        let err = m.delete("cases/c1/exhibits/p1").await.unwrap_err();
        assert!(matches!(err, AttachmentError::Deletion { .. }));
    }

    // -----------------------------------------------------------------------
    // Materialization
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn capture_is_stored_and_flag_cleared() {
        let store = Arc::new(InMemoryAttachmentStore::new());
        let m = manager(store.clone());
        let exhibit = ExhibitDraft::pending_capture("cam shot.png", PNG_URI).into_exhibit(Utc::now());

        let out = m.materialize_inline_capture(exhibit, &case_id()).await;
        assert!(matches!(out.status, MaterializeStatus::Stored { .. }));
        assert_eq!(out.exhibit.state(), ExhibitState::Stored);
        assert!(!out.exhibit.is_pending_capture);
        assert!(out.exhibit.url.starts_with("mem://cases/c1/exhibits/"));
        assert_eq!(store.get(&out.exhibit.storage_path).await.unwrap(), b"hello");
    }

    #[tokio::test]
    async fn bad_capture_degrades_to_placeholder() {
        let m = manager(Arc::new(InMemoryAttachmentStore::new()));
        let exhibit = ExhibitDraft::pending_capture("cam", "data:image/png;base64,@@@")
            .into_exhibit(Utc::now());

        let out = m.materialize_inline_capture(exhibit, &case_id()).await;
        assert!(out.is_failed());
        assert_eq!(out.exhibit.storage_path, UPLOAD_FAILED_PATH);
        assert_eq!(out.exhibit.url, UPLOAD_FAILED_URL);
        assert_eq!(out.exhibit.state(), ExhibitState::Failed);
    }

    #[tokio::test]
    async fn stored_exhibit_is_left_alone() {
        let m = manager(Arc::new(InMemoryAttachmentStore::new()));
        let exhibit = ExhibitDraft {
            name: "doc.pdf".into(),
            url: "mem://cases/c1/exhibits/1-a-doc.pdf".into(),
            mime_type: "application/pdf".into(),
            storage_path: "cases/c1/exhibits/1-a-doc.pdf".into(),
            ..Default::default()
        }
        .into_exhibit(Utc::now());

        let out = m.materialize_inline_capture(exhibit.clone(), &case_id()).await;
        assert_eq!(out.status, MaterializeStatus::Unchanged);
        assert_eq!(out.exhibit, exhibit);
    }

    #[tokio::test]
    async fn one_failure_does_not_block_the_rest() {
        let mut flaky = FlakyStore::new();
        flaky.fail_put_containing = Some("broken");
        let m = manager(Arc::new(flaky));

        let drafts = vec![
            ExhibitDraft::pending_capture("first.png", PNG_URI),
            ExhibitDraft::pending_capture("broken.png", PNG_URI),
            ExhibitDraft::pending_capture("third.png", PNG_URI),
        ];
        let report = m.materialize_all(drafts, &case_id(), Utc::now()).await;

        assert_eq!(report.outcomes.len(), 3);
        assert_eq!(report.stored_count(), 2);
        assert_eq!(report.failures().count(), 1);
        assert!(report.outcomes[1].is_failed());

        let exhibits = report.into_exhibits();
        assert_eq!(exhibits[0].state(), ExhibitState::Stored);
        assert_eq!(exhibits[1].state(), ExhibitState::Failed);
        assert_ne!(exhibits[0].id, exhibits[2].id);
    }

    // -----------------------------------------------------------------------
    // Direct uploads
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn upload_exhibit_builds_stored_record() {
        let m = manager(Arc::new(InMemoryAttachmentStore::new()));
        let e = m.upload_exhibit(&case_id(), "statement.pdf", b"%PDF", "application/pdf").await.unwrap();
        assert_eq!(e.state(), ExhibitState::Stored);
        assert_eq!(e.mime_type, "application/pdf");
    }

    #[tokio::test]
    async fn profile_image_goes_under_suspect_prefix() {
        let m = manager(Arc::new(InMemoryAttachmentStore::new()));
        let sid = SuspectId::new("s1").unwrap();
        let img = m.upload_profile_image(&sid, PNG_URI).await.unwrap();
        assert!(img.storage_path.starts_with("suspects/s1/profileImage/"));
        assert!(img.storage_path.ends_with("-profile.png"));
    }

    #[tokio::test]
    async fn profile_image_rejects_non_inline() {
        let m = manager(Arc::new(InMemoryAttachmentStore::new()));
        let sid = SuspectId::new("s1").unwrap();
        let err = m.upload_profile_image(&sid, "https://x/y.png").await.unwrap_err();
        assert!(matches!(err, AttachmentError::InvalidInline(_)));
    }
}
