use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use casefile_types::{Case, CaseId, ReferenceNumber, Suspect, SuspectId};

use crate::error::{StoreError, StoreResult};
use crate::traits::{RecordStore, WriteOp, WriteTarget};

#[derive(Default)]
struct Collections {
    cases: HashMap<CaseId, Case>,
    suspects: HashMap<SuspectId, Suspect>,
}

impl Collections {
    fn has_target(&self, target: &WriteTarget) -> bool {
        match target {
            WriteTarget::Case(id) => self.cases.contains_key(id),
            WriteTarget::Suspect(id) => self.suspects.contains_key(id),
        }
    }

    fn apply(&mut self, op: &WriteOp) -> StoreResult<bool> {
        match op.target() {
            WriteTarget::Case(id) => {
                let case = self.cases.get_mut(&id).ok_or_else(|| StoreError::NotFound {
                    collection: "cases",
                    id: id.to_string(),
                })?;
                Ok(op.apply_to_case(case))
            }
            WriteTarget::Suspect(id) => {
                let suspect = self
                    .suspects
                    .get_mut(&id)
                    .ok_or_else(|| StoreError::NotFound {
                        collection: "suspects",
                        id: id.to_string(),
                    })?;
                Ok(op.apply_to_suspect(suspect))
            }
        }
    }
}

/// In-memory, HashMap-based record store.
///
/// Intended for tests and embedding. Both collections sit behind one
/// `RwLock`, which is what makes [`RecordStore::apply_batch`] atomic here:
/// every target is checked before any op is applied.
pub struct InMemoryRecordStore {
    inner: RwLock<Collections>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Collections::default()),
        }
    }

    pub fn case_count(&self) -> usize {
        self.inner.read().expect("lock poisoned").cases.len()
    }

    pub fn suspect_count(&self) -> usize {
        self.inner.read().expect("lock poisoned").suspects.len()
    }
}

impl Default for InMemoryRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn get_case(&self, id: &CaseId) -> StoreResult<Option<Case>> {
        let inner = self.inner.read().expect("lock poisoned");
        Ok(inner.cases.get(id).cloned())
    }

    async fn put_case(&self, case: &Case) -> StoreResult<()> {
        let mut inner = self.inner.write().expect("lock poisoned");
        inner.cases.insert(case.id.clone(), case.clone());
        Ok(())
    }

    async fn delete_case(&self, id: &CaseId) -> StoreResult<bool> {
        let mut inner = self.inner.write().expect("lock poisoned");
        Ok(inner.cases.remove(id).is_some())
    }

    async fn list_cases(&self) -> StoreResult<Vec<Case>> {
        let inner = self.inner.read().expect("lock poisoned");
        let mut cases: Vec<Case> = inner.cases.values().cloned().collect();
        cases.sort_by(|a, b| b.reference_number.cmp(&a.reference_number));
        Ok(cases)
    }

    async fn get_suspect(&self, id: &SuspectId) -> StoreResult<Option<Suspect>> {
        let inner = self.inner.read().expect("lock poisoned");
        Ok(inner.suspects.get(id).cloned())
    }

    async fn put_suspect(&self, suspect: &Suspect) -> StoreResult<()> {
        let mut inner = self.inner.write().expect("lock poisoned");
        inner.suspects.insert(suspect.id.clone(), suspect.clone());
        Ok(())
    }

    async fn delete_suspect(&self, id: &SuspectId) -> StoreResult<bool> {
        let mut inner = self.inner.write().expect("lock poisoned");
        Ok(inner.suspects.remove(id).is_some())
    }

    async fn list_suspects(&self) -> StoreResult<Vec<Suspect>> {
        let inner = self.inner.read().expect("lock poisoned");
        let mut suspects: Vec<Suspect> = inner.suspects.values().cloned().collect();
        suspects.sort_by(|a, b| a.full_name.cmp(&b.full_name));
        Ok(suspects)
    }

    async fn apply(&self, op: &WriteOp) -> StoreResult<bool> {
        let mut inner = self.inner.write().expect("lock poisoned");
        inner.apply(op)
    }

    async fn apply_batch(&self, ops: &[WriteOp]) -> StoreResult<Vec<bool>> {
        let mut inner = self.inner.write().expect("lock poisoned");
        if let Some(missing) = ops.iter().map(WriteOp::target).find(|t| !inner.has_target(t)) {
            return Err(StoreError::BatchRejected(format!(
                "target does not exist: {missing:?}"
            )));
        }
        ops.iter().map(|op| inner.apply(op)).collect()
    }

    async fn find_case_by_reference(
        &self,
        reference: &ReferenceNumber,
    ) -> StoreResult<Option<Case>> {
        let inner = self.inner.read().expect("lock poisoned");
        Ok(inner
            .cases
            .values()
            .find(|c| &c.reference_number == reference)
            .cloned())
    }
}

impl std::fmt::Debug for InMemoryRecordStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryRecordStore")
            .field("case_count", &self.case_count())
            .field("suspect_count", &self.suspect_count())
            .finish()
    }
}
