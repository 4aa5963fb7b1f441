use async_trait::async_trait;
use chrono::{DateTime, Utc};
use casefile_types::{Actor, Case, CaseId, ReferenceNumber, Suspect, SuspectId};

use crate::error::StoreResult;

/// A field-level write against one document.
///
/// Link fields are sets on both sides, so adding a present element or
/// removing an absent one is a no-op. An op that changes the set also
/// refreshes the target's `updated_at`/`updated_by` stamp; a no-op leaves
/// the document untouched.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WriteOp {
    AddSuspectLink {
        case_id: CaseId,
        suspect_id: SuspectId,
        actor: Actor,
        at: DateTime<Utc>,
    },
    RemoveSuspectLink {
        case_id: CaseId,
        suspect_id: SuspectId,
        actor: Actor,
        at: DateTime<Utc>,
    },
    AddCaseReference {
        suspect_id: SuspectId,
        reference: String,
        actor: Actor,
        at: DateTime<Utc>,
    },
    RemoveCaseReference {
        suspect_id: SuspectId,
        reference: String,
        actor: Actor,
        at: DateTime<Utc>,
    },
}

/// Which document a [`WriteOp`] targets.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum WriteTarget {
    Case(CaseId),
    Suspect(SuspectId),
}

impl WriteOp {
    pub fn target(&self) -> WriteTarget {
        match self {
            Self::AddSuspectLink { case_id, .. } | Self::RemoveSuspectLink { case_id, .. } => {
                WriteTarget::Case(case_id.clone())
            }
            Self::AddCaseReference { suspect_id, .. }
            | Self::RemoveCaseReference { suspect_id, .. } => {
                WriteTarget::Suspect(suspect_id.clone())
            }
        }
    }

    /// Apply to a case document. Returns whether the link set changed.
    ///
    /// Ops that target suspects leave the case alone and return `false`.
    pub fn apply_to_case(&self, case: &mut Case) -> bool {
        let (changed, actor, at) = match self {
            Self::AddSuspectLink {
                suspect_id,
                actor,
                at,
                ..
            } => (case.suspect_links.insert(suspect_id.clone()), actor, at),
            Self::RemoveSuspectLink {
                suspect_id,
                actor,
                at,
                ..
            } => (case.suspect_links.remove(suspect_id), actor, at),
            _ => return false,
        };
        if changed {
            case.stamp.touch(actor, *at);
        }
        changed
    }

    /// Apply to a suspect document. Returns whether the reference set changed.
    pub fn apply_to_suspect(&self, suspect: &mut Suspect) -> bool {
        let (changed, actor, at) = match self {
            Self::AddCaseReference {
                reference,
                actor,
                at,
                ..
            } => (
                suspect
                    .linked_case_reference_numbers
                    .insert(reference.clone()),
                actor,
                at,
            ),
            Self::RemoveCaseReference {
                reference,
                actor,
                at,
                ..
            } => (
                suspect.linked_case_reference_numbers.remove(reference),
                actor,
                at,
            ),
            _ => return false,
        };
        if changed {
            suspect.stamp.touch(actor, *at);
        }
        changed
    }
}

/// Typed access to the `cases` and `suspects` collections.
///
/// Implementations must satisfy:
/// - `put_*` replaces the whole document atomically.
/// - `delete_*` on an absent document returns `Ok(false)`.
/// - `apply` on an absent document returns [`crate::StoreError::NotFound`].
/// - Query methods reflect every write that has returned.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Reserve a fresh case id. Nothing is written.
    fn allocate_case_id(&self) -> CaseId {
        CaseId::generate()
    }

    /// Reserve a fresh suspect id. Nothing is written.
    fn allocate_suspect_id(&self) -> SuspectId {
        SuspectId::generate()
    }

    async fn get_case(&self, id: &CaseId) -> StoreResult<Option<Case>>;

    async fn put_case(&self, case: &Case) -> StoreResult<()>;

    async fn delete_case(&self, id: &CaseId) -> StoreResult<bool>;

    async fn list_cases(&self) -> StoreResult<Vec<Case>>;

    async fn get_suspect(&self, id: &SuspectId) -> StoreResult<Option<Suspect>>;

    async fn put_suspect(&self, suspect: &Suspect) -> StoreResult<()>;

    async fn delete_suspect(&self, id: &SuspectId) -> StoreResult<bool>;

    async fn list_suspects(&self) -> StoreResult<Vec<Suspect>>;

    /// Apply one field-level write. Returns whether the document changed.
    async fn apply(&self, op: &WriteOp) -> StoreResult<bool>;

    /// Apply several writes.
    ///
    /// The default applies them one at a time and stops at the first error,
    /// so earlier ops stay applied. Backends that can validate every target
    /// up front override this to make the batch all-or-nothing.
    async fn apply_batch(&self, ops: &[WriteOp]) -> StoreResult<Vec<bool>> {
        let mut changed = Vec::with_capacity(ops.len());
        for op in ops {
            changed.push(self.apply(op).await?);
        }
        Ok(changed)
    }

    /// Find the case carrying `reference`, if any.
    async fn find_case_by_reference(
        &self,
        reference: &ReferenceNumber,
    ) -> StoreResult<Option<Case>> {
        Ok(self
            .list_cases()
            .await?
            .into_iter()
            .find(|c| &c.reference_number == reference))
    }

    /// Every case whose suspect links contain `id`.
    async fn find_cases_linking_suspect(&self, id: &SuspectId) -> StoreResult<Vec<Case>> {
        Ok(self
            .list_cases()
            .await?
            .into_iter()
            .filter(|c| c.suspect_links.contains(id))
            .collect())
    }

    /// Every suspect tagged with the reference-number string `reference`.
    async fn find_suspects_by_case_reference(&self, reference: &str) -> StoreResult<Vec<Suspect>> {
        Ok(self
            .list_suspects()
            .await?
            .into_iter()
            .filter(|s| s.linked_case_reference_numbers.contains(reference))
            .collect())
    }
}
