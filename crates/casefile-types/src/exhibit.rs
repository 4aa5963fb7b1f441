use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::ExhibitId;

/// Storage path written onto an exhibit whose inline capture could not be stored.
pub const UPLOAD_FAILED_PATH: &str = "UPLOAD_FAILED";

/// Url written onto an exhibit whose inline capture could not be stored.
pub const UPLOAD_FAILED_URL: &str = "upload_failed_placeholder.png";

/// Storage path some older clients wrote onto captures awaiting upload.
pub const PENDING_CAPTURE_PATH: &str = "PENDING_CAMERA_UPLOAD";

/// Where an exhibit is in its upload lifecycle.
///
/// `Uploading` is only observed inside the attachment manager; a persisted
/// exhibit is always in one of the other three states.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExhibitState {
    PendingCapture,
    Uploading,
    Stored,
    Failed,
}

/// A binary attachment belonging to a case.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Exhibit {
    pub id: ExhibitId,
    pub name: String,
    /// Retrievable url, or an inline `data:` URI while a capture is pending.
    pub url: String,
    pub mime_type: String,
    /// Empty while a capture is pending.
    #[serde(default)]
    pub storage_path: String,
    pub uploaded_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub is_pending_capture: bool,
}

impl Exhibit {
    pub fn state(&self) -> ExhibitState {
        if self.storage_path == UPLOAD_FAILED_PATH {
            ExhibitState::Failed
        } else if self.is_pending_capture {
            ExhibitState::PendingCapture
        } else {
            ExhibitState::Stored
        }
    }

    /// The storage path, if it names a real blob.
    pub fn blob_path(&self) -> Option<&str> {
        is_blob_path(&self.storage_path).then_some(self.storage_path.as_str())
    }
}

/// True when `path` names a stored blob rather than being empty or a sentinel.
pub fn is_blob_path(path: &str) -> bool {
    !path.is_empty() && path != UPLOAD_FAILED_PATH && path != PENDING_CAPTURE_PATH
}

/// An exhibit as submitted by a client.
///
/// Clients may omit the id and upload time; the coordinator fills them in.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExhibitDraft {
    #[serde(default)]
    pub id: Option<ExhibitId>,
    pub name: String,
    pub url: String,
    pub mime_type: String,
    #[serde(default)]
    pub storage_path: String,
    #[serde(default)]
    pub uploaded_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub is_pending_capture: bool,
}

impl ExhibitDraft {
    /// A camera capture whose bytes are carried inline as a `data:` URI.
    pub fn pending_capture(name: impl Into<String>, data_uri: impl Into<String>) -> Self {
        let data_uri = data_uri.into();
        let mime_type = data_uri
            .strip_prefix("data:")
            .and_then(|rest| rest.split(';').next())
            .filter(|m| !m.is_empty())
            .unwrap_or("application/octet-stream")
            .to_string();
        Self {
            name: name.into(),
            url: data_uri,
            mime_type,
            is_pending_capture: true,
            ..Default::default()
        }
    }

    /// Fill missing id and upload time, producing a record.
    pub fn into_exhibit(self, now: DateTime<Utc>) -> Exhibit {
        Exhibit {
            id: self.id.unwrap_or_else(ExhibitId::generate),
            name: self.name,
            url: self.url,
            mime_type: self.mime_type,
            storage_path: self.storage_path,
            uploaded_at: self.uploaded_at.unwrap_or(now),
            description: self.description,
            is_pending_capture: self.is_pending_capture,
        }
    }
}

impl From<Exhibit> for ExhibitDraft {
    fn from(e: Exhibit) -> Self {
        Self {
            id: Some(e.id),
            name: e.name,
            url: e.url,
            mime_type: e.mime_type,
            storage_path: e.storage_path,
            uploaded_at: Some(e.uploaded_at),
            description: e.description,
            is_pending_capture: e.is_pending_capture,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stored(path: &str) -> Exhibit {
        ExhibitDraft {
            name: "photo.jpg".into(),
            url: "mem://photo".into(),
            mime_type: "image/jpeg".into(),
            storage_path: path.into(),
            ..Default::default()
        }
        .into_exhibit(Utc::now())
    }

    #[test]
    fn state_follows_path_and_flag() {
        assert_eq!(stored("cases/c/exhibits/1-a-photo.jpg").state(), ExhibitState::Stored);
        assert_eq!(stored(UPLOAD_FAILED_PATH).state(), ExhibitState::Failed);

        let pending = ExhibitDraft::pending_capture("cam.png", "data:image/png;base64,AAAA")
            .into_exhibit(Utc::now());
        assert_eq!(pending.state(), ExhibitState::PendingCapture);
    }

    #[test]
    fn sentinels_are_not_blob_paths() {
        assert!(stored("").blob_path().is_none());
        assert!(stored(UPLOAD_FAILED_PATH).blob_path().is_none());
        assert!(stored(PENDING_CAPTURE_PATH).blob_path().is_none());
        assert_eq!(stored("p1").blob_path(), Some("p1"));
    }

    #[test]
    fn pending_capture_reads_mime_from_uri() {
        let d = ExhibitDraft::pending_capture("cam", "data:image/webp;base64,AAAA");
        assert_eq!(d.mime_type, "image/webp");
        let d = ExhibitDraft::pending_capture("cam", "not-a-uri");
        assert_eq!(d.mime_type, "application/octet-stream");
    }

    #[test]
    fn into_exhibit_fills_missing_id_and_time() {
        let now = Utc::now();
        let a = ExhibitDraft::default().into_exhibit(now);
        let b = ExhibitDraft::default().into_exhibit(now);
        assert_ne!(a.id, b.id);
        assert_eq!(a.uploaded_at, now);
    }

    #[test]
    fn into_exhibit_keeps_given_id() {
        let id = ExhibitId::new("ex-1").unwrap();
        let e = ExhibitDraft {
            id: Some(id.clone()),
            ..Default::default()
        }
        .into_exhibit(Utc::now());
        assert_eq!(e.id, id);
    }

    #[test]
    fn draft_round_trips_through_record() {
        let e = stored("p1");
        let d = ExhibitDraft::from(e.clone());
        assert_eq!(d.into_exhibit(Utc::now()), e);
    }
}
