use std::fmt;

use casefile_store::WriteOp;
use casefile_types::{Actor, Case, CaseId, ReferenceNumber, SuspectId, SuspectLinks};
use chrono::{DateTime, Utc};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DeltaKind {
    Link,
    Unlink,
}

/// One change to the link between a case and a suspect.
///
/// Carries both the case id and its reference number because each side
/// stores the other by a different key.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct LinkDelta {
    pub kind: DeltaKind,
    pub case_id: CaseId,
    pub reference: ReferenceNumber,
    pub suspect_id: SuspectId,
}

impl LinkDelta {
    pub fn link(case: &Case, suspect_id: SuspectId) -> Self {
        Self {
            kind: DeltaKind::Link,
            case_id: case.id.clone(),
            reference: case.reference_number,
            suspect_id,
        }
    }

    pub fn unlink(case: &Case, suspect_id: SuspectId) -> Self {
        Self {
            kind: DeltaKind::Unlink,
            ..Self::link(case, suspect_id)
        }
    }

    /// The write that applies this delta to the suspect document.
    pub fn suspect_side_op(&self, actor: &Actor, at: DateTime<Utc>) -> WriteOp {
        let suspect_id = self.suspect_id.clone();
        let reference = self.reference.to_string();
        let actor = actor.clone();
        match self.kind {
            DeltaKind::Link => WriteOp::AddCaseReference {
                suspect_id,
                reference,
                actor,
                at,
            },
            DeltaKind::Unlink => WriteOp::RemoveCaseReference {
                suspect_id,
                reference,
                actor,
                at,
            },
        }
    }

    /// The write that applies this delta to the case document.
    pub fn case_side_op(&self, actor: &Actor, at: DateTime<Utc>) -> WriteOp {
        let case_id = self.case_id.clone();
        let suspect_id = self.suspect_id.clone();
        let actor = actor.clone();
        match self.kind {
            DeltaKind::Link => WriteOp::AddSuspectLink {
                case_id,
                suspect_id,
                actor,
                at,
            },
            DeltaKind::Unlink => WriteOp::RemoveSuspectLink {
                case_id,
                suspect_id,
                actor,
                at,
            },
        }
    }
}

impl fmt::Display for LinkDelta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verb = match self.kind {
            DeltaKind::Link => "link",
            DeltaKind::Unlink => "unlink",
        };
        write!(f, "{verb} case {} with suspect {}", self.reference, self.suspect_id)
    }
}

/// Suspect ids added to and removed from a link set.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LinkDiff {
    pub added: Vec<SuspectId>,
    pub removed: Vec<SuspectId>,
}

pub fn diff_links(old: &SuspectLinks, new: &SuspectLinks) -> LinkDiff {
    LinkDiff {
        added: new.ids().filter(|id| !old.contains(id)).cloned().collect(),
        removed: old.ids().filter(|id| !new.contains(id)).cloned().collect(),
    }
}

/// The link changes a record mutation implies, computed without touching a store.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LinkPlan {
    pub deltas: Vec<LinkDelta>,
}

impl LinkPlan {
    pub fn for_created_case(case: &Case) -> Self {
        Self {
            deltas: case
                .suspect_links
                .ids()
                .map(|id| LinkDelta::link(case, id.clone()))
                .collect(),
        }
    }

    /// Only links added by the update are planned. Links the update removed
    /// stay on the suspect side.
    pub fn for_updated_case(old: &Case, new: &Case) -> Self {
        let diff = diff_links(&old.suspect_links, &new.suspect_links);
        Self {
            deltas: diff
                .added
                .into_iter()
                .map(|id| LinkDelta::link(new, id))
                .collect(),
        }
    }

    pub fn for_deleted_case(case: &Case) -> Self {
        Self {
            deltas: case
                .suspect_links
                .ids()
                .map(|id| LinkDelta::unlink(case, id.clone()))
                .collect(),
        }
    }

    /// `cases` are the cases currently linking `suspect_id`.
    pub fn for_deleted_suspect(suspect_id: &SuspectId, cases: &[Case]) -> Self {
        Self {
            deltas: cases
                .iter()
                .filter(|c| c.suspect_links.contains(suspect_id))
                .map(|c| LinkDelta::unlink(c, suspect_id.clone()))
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.deltas.is_empty()
    }

    pub fn len(&self) -> usize {
        self.deltas.len()
    }
}
