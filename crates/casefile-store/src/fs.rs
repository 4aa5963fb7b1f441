use std::path::{Path, PathBuf};

use async_trait::async_trait;
use casefile_types::{Case, CaseId, Suspect, SuspectId};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::error::{StoreError, StoreResult};
use crate::traits::{RecordStore, WriteOp, WriteTarget};

const CASES: &str = "cases";
const SUSPECTS: &str = "suspects";

/// Filesystem-backed record store.
///
/// Layout: `{root}/cases/{id}.json` and `{root}/suspects/{id}.json`. Each
/// document is written to `{root}/.tmp/` first and renamed into place, so a
/// reader never sees a half-written document.
///
/// Writes from this process are serialized by a mutex so read-modify-write
/// ops do not lose updates. `apply_batch` uses the default one-at-a-time
/// behavior and is **not** atomic.
pub struct FsRecordStore {
    root: PathBuf,
    write_lock: Mutex<()>,
}

impl FsRecordStore {
    pub async fn open(root: impl Into<PathBuf>) -> StoreResult<Self> {
        let root = root.into();
        fs::create_dir_all(root.join(CASES)).await?;
        fs::create_dir_all(root.join(SUSPECTS)).await?;
        fs::create_dir_all(root.join(".tmp")).await?;
        debug!(root = %root.display(), "opened record store");
        Ok(Self {
            root,
            write_lock: Mutex::new(()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn doc_path(&self, collection: &'static str, id: &str) -> StoreResult<PathBuf> {
        let safe = !id.is_empty()
            && !id.starts_with('.')
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !safe {
            return Err(StoreError::Backend(format!(
                "unsafe document id in {collection}: {id:?}"
            )));
        }
        Ok(self.root.join(collection).join(format!("{id}.json")))
    }

    fn temp_path(&self) -> PathBuf {
        self.root
            .join(".tmp")
            .join(uuid::Uuid::new_v4().to_string())
    }

    async fn read_doc<T: DeserializeOwned>(&self, path: &Path) -> StoreResult<Option<T>> {
        match fs::read(path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_doc<T: Serialize + Sync>(&self, path: &Path, doc: &T) -> StoreResult<()> {
        let bytes = serde_json::to_vec_pretty(doc)?;
        let temp = self.temp_path();
        if let Err(e) = fs::write(&temp, &bytes).await {
            let _ = fs::remove_file(&temp).await;
            return Err(e.into());
        }
        if let Err(e) = fs::rename(&temp, path).await {
            let _ = fs::remove_file(&temp).await;
            return Err(e.into());
        }
        Ok(())
    }

    async fn remove_doc(&self, path: &Path) -> StoreResult<bool> {
        match fs::remove_file(path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn list_docs<T: DeserializeOwned>(&self, collection: &'static str) -> StoreResult<Vec<T>> {
        let mut docs = Vec::new();
        let mut entries = fs::read_dir(self.root.join(collection)).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match self.read_doc::<T>(&path).await {
                Ok(Some(doc)) => docs.push(doc),
                Ok(None) => {}
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping unreadable document");
                }
            }
        }
        Ok(docs)
    }
}

#[async_trait]
impl RecordStore for FsRecordStore {
    async fn get_case(&self, id: &CaseId) -> StoreResult<Option<Case>> {
        let path = self.doc_path(CASES, id.as_str())?;
        self.read_doc(&path).await
    }

    async fn put_case(&self, case: &Case) -> StoreResult<()> {
        let path = self.doc_path(CASES, case.id.as_str())?;
        let _guard = self.write_lock.lock().await;
        self.write_doc(&path, case).await
    }

    async fn delete_case(&self, id: &CaseId) -> StoreResult<bool> {
        let path = self.doc_path(CASES, id.as_str())?;
        let _guard = self.write_lock.lock().await;
        self.remove_doc(&path).await
    }

    async fn list_cases(&self) -> StoreResult<Vec<Case>> {
        let mut cases: Vec<Case> = self.list_docs(CASES).await?;
        cases.sort_by(|a, b| b.reference_number.cmp(&a.reference_number));
        Ok(cases)
    }

    async fn get_suspect(&self, id: &SuspectId) -> StoreResult<Option<Suspect>> {
        let path = self.doc_path(SUSPECTS, id.as_str())?;
        self.read_doc(&path).await
    }

    async fn put_suspect(&self, suspect: &Suspect) -> StoreResult<()> {
        let path = self.doc_path(SUSPECTS, suspect.id.as_str())?;
        let _guard = self.write_lock.lock().await;
        self.write_doc(&path, suspect).await
    }

    async fn delete_suspect(&self, id: &SuspectId) -> StoreResult<bool> {
        let path = self.doc_path(SUSPECTS, id.as_str())?;
        let _guard = self.write_lock.lock().await;
        self.remove_doc(&path).await
    }

    async fn list_suspects(&self) -> StoreResult<Vec<Suspect>> {
        let mut suspects: Vec<Suspect> = self.list_docs(SUSPECTS).await?;
        suspects.sort_by(|a, b| a.full_name.cmp(&b.full_name));
        Ok(suspects)
    }

    async fn apply(&self, op: &WriteOp) -> StoreResult<bool> {
        let _guard = self.write_lock.lock().await;
        match op.target() {
            WriteTarget::Case(id) => {
                let path = self.doc_path(CASES, id.as_str())?;
                let mut case: Case = self.read_doc(&path).await?.ok_or_else(|| {
                    StoreError::NotFound {
                        collection: CASES,
                        id: id.to_string(),
                    }
                })?;
                let changed = op.apply_to_case(&mut case);
                if changed {
                    self.write_doc(&path, &case).await?;
                }
                Ok(changed)
            }
            WriteTarget::Suspect(id) => {
                let path = self.doc_path(SUSPECTS, id.as_str())?;
                let mut suspect: Suspect = self.read_doc(&path).await?.ok_or_else(|| {
                    StoreError::NotFound {
                        collection: SUSPECTS,
                        id: id.to_string(),
                    }
                })?;
                let changed = op.apply_to_suspect(&mut suspect);
                if changed {
                    self.write_doc(&path, &suspect).await?;
                }
                Ok(changed)
            }
        }
    }
}

impl std::fmt::Debug for FsRecordStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FsRecordStore")
            .field("root", &self.root)
            .finish()
    }
}
