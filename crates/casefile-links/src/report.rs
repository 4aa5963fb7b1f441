use thiserror::Error;

use crate::delta::LinkDelta;

/// A link delta that could not be applied.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("failed to {delta}: {reason}")]
pub struct LinkPropagationError {
    pub delta: LinkDelta,
    pub reason: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeltaOutcome {
    /// Written. `changed` is false when the link was already in place.
    Applied { changed: bool },
    /// The target record no longer exists.
    SkippedMissing,
    Failed(LinkPropagationError),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeltaResult {
    pub delta: LinkDelta,
    pub outcome: DeltaOutcome,
}

/// Outcomes of one propagation step, in delta order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PropagationReport {
    pub results: Vec<DeltaResult>,
}

impl PropagationReport {
    pub(crate) fn push(&mut self, delta: LinkDelta, outcome: DeltaOutcome) {
        self.results.push(DeltaResult { delta, outcome });
    }

    pub fn applied(&self) -> impl Iterator<Item = &LinkDelta> {
        self.results
            .iter()
            .filter(|r| matches!(r.outcome, DeltaOutcome::Applied { .. }))
            .map(|r| &r.delta)
    }

    /// Applied deltas that actually changed the target record.
    pub fn changed(&self) -> impl Iterator<Item = &LinkDelta> {
        self.results
            .iter()
            .filter(|r| r.outcome == DeltaOutcome::Applied { changed: true })
            .map(|r| &r.delta)
    }

    pub fn skipped(&self) -> impl Iterator<Item = &LinkDelta> {
        self.results
            .iter()
            .filter(|r| r.outcome == DeltaOutcome::SkippedMissing)
            .map(|r| &r.delta)
    }

    pub fn failed(&self) -> impl Iterator<Item = &LinkPropagationError> {
        self.results.iter().filter_map(|r| match &r.outcome {
            DeltaOutcome::Failed(e) => Some(e),
            _ => None,
        })
    }

    /// True when nothing failed. Skipped deltas are not failures.
    pub fn is_clean(&self) -> bool {
        self.failed().next().is_none()
    }

    /// Turn the first failure into an error, for callers that want strictness.
    pub fn into_result(self) -> Result<Self, LinkPropagationError> {
        let first = self.failed().next().cloned();
        match first {
            Some(e) => Err(e),
            None => Ok(self),
        }
    }
}

/// Result of deleting a case or a suspect.
///
/// Deletion reports rather than fails once the record is known to exist:
/// `success` tracks the primary document, while link and blob cleanup
/// problems are listed alongside.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeleteOutcome {
    pub success: bool,
    pub message: Option<String>,
    pub report: PropagationReport,
    /// Storage paths whose blobs could not be deleted.
    pub blob_failures: Vec<String>,
}

impl DeleteOutcome {
    pub fn is_clean(&self) -> bool {
        self.success && self.report.is_clean() && self.blob_failures.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delta::DeltaKind;
    use casefile_types::{CaseId, ReferenceNumber, SuspectId};

    fn delta(s: &str) -> LinkDelta {
        LinkDelta {
            kind: DeltaKind::Link,
            case_id: CaseId::new("c1").unwrap(),
            reference: ReferenceNumber::new(1, 2024).unwrap(),
            suspect_id: SuspectId::new(s).unwrap(),
        }
    }

    #[test]
    fn skipped_is_still_clean() {
        let mut report = PropagationReport::default();
        report.push(delta("s1"), DeltaOutcome::Applied { changed: true });
        report.push(delta("s2"), DeltaOutcome::SkippedMissing);
        assert!(report.is_clean());
        assert_eq!(report.applied().count(), 1);
        assert_eq!(report.skipped().count(), 1);
        assert!(report.into_result().is_ok());
    }

    #[test]
    fn failure_surfaces_through_into_result() {
        let mut report = PropagationReport::default();
        report.push(delta("s1"), DeltaOutcome::Applied { changed: true });
        let err = LinkPropagationError {
            delta: delta("s2"),
            reason: "backend unavailable".into(),
        };
        report.push(delta("s2"), DeltaOutcome::Failed(err.clone()));

        assert!(!report.is_clean());
        assert_eq!(report.clone().into_result().unwrap_err(), err);
        assert_eq!(
            err.to_string(),
            "failed to link case 001/2024 with suspect s2: backend unavailable"
        );
    }

    #[test]
    fn unchanged_links_are_applied_but_not_changed() {
        let mut report = PropagationReport::default();
        report.push(delta("s1"), DeltaOutcome::Applied { changed: true });
        report.push(delta("s2"), DeltaOutcome::Applied { changed: false });
        assert_eq!(report.applied().count(), 2);
        let changed: Vec<_> = report.changed().map(|d| d.suspect_id.as_str()).collect();
        assert_eq!(changed, vec!["s1"]);
        let report = report.into_result().unwrap();
        assert_eq!(report.results.len(), 2);
    }
}
