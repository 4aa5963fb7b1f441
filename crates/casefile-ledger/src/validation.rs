use std::collections::HashSet;

use casefile_types::AuditLogEntry;

use crate::chain::compute_entry_hash;
use crate::error::LedgerError;
use crate::traits::AuditReader;

/// Result of ledger validation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidationReport {
    pub entry_count: u64,
    pub violations: Vec<Violation>,
}

impl ValidationReport {
    /// Returns `true` if all checks passed.
    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Violation {
    pub seq: u64,
    pub kind: ViolationKind,
    pub description: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ViolationKind {
    SequenceGap,
    HashChainBreak,
    HashMismatch,
    DuplicateId,
    TimestampRegression,
}

/// Checks sequence, hash-chain and timestamp invariants of a ledger.
pub struct ChainValidator;

impl ChainValidator {
    pub fn validate_entries(entries: &[AuditLogEntry]) -> Result<ValidationReport, LedgerError> {
        let mut violations = Vec::new();
        let mut seen_ids = HashSet::new();

        for (index, entry) in entries.iter().enumerate() {
            let expected_seq = (index + 1) as u64;
            if entry.seq != expected_seq {
                violations.push(Violation {
                    seq: entry.seq,
                    kind: ViolationKind::SequenceGap,
                    description: format!("expected seq {expected_seq}, found {}", entry.seq),
                });
            }

            let expected_prev = index
                .checked_sub(1)
                .map(|prev| entries[prev].entry_hash.as_str());
            if entry.prev_hash.as_deref() != expected_prev {
                violations.push(Violation {
                    seq: entry.seq,
                    kind: ViolationKind::HashChainBreak,
                    description: "previous hash link mismatch".into(),
                });
            }

            if compute_entry_hash(entry)? != entry.entry_hash {
                violations.push(Violation {
                    seq: entry.seq,
                    kind: ViolationKind::HashMismatch,
                    description: "entry hash does not match content".into(),
                });
            }

            if !seen_ids.insert(entry.id.clone()) {
                violations.push(Violation {
                    seq: entry.seq,
                    kind: ViolationKind::DuplicateId,
                    description: format!("entry id {} appears twice", entry.id),
                });
            }

            if let Some(prev) = index.checked_sub(1).map(|i| &entries[i]) {
                if entry.timestamp < prev.timestamp {
                    violations.push(Violation {
                        seq: entry.seq,
                        kind: ViolationKind::TimestampRegression,
                        description: "timestamp earlier than previous entry".into(),
                    });
                }
            }
        }

        Ok(ValidationReport {
            entry_count: entries.len() as u64,
            violations,
        })
    }

    pub async fn validate<R: AuditReader + ?Sized>(reader: &R) -> Result<ValidationReport, LedgerError> {
        let entries = reader.entries().await?;
        Self::validate_entries(&entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::tests::record;
    use crate::memory::InMemoryAuditLedger;
    use crate::traits::AuditWriter;
    use casefile_types::AuditAction;

    async fn ledger_with(n: usize) -> InMemoryAuditLedger {
        let ledger = InMemoryAuditLedger::new();
        for i in 0..n {
            ledger
                .append(record(AuditAction::Update, &format!("change {i}")))
                .await
                .unwrap();
        }
        ledger
    }

    #[tokio::test]
    async fn valid_ledger_passes() {
        let ledger = ledger_with(4).await;
        let report = ChainValidator::validate(&ledger).await.unwrap();
        assert!(report.is_valid(), "{:?}", report.violations);
        assert_eq!(report.entry_count, 4);
    }

    #[tokio::test]
    async fn empty_ledger_is_valid() {
        let ledger = InMemoryAuditLedger::new();
        assert!(ChainValidator::validate(&ledger).await.unwrap().is_valid());
    }

    #[tokio::test]
    async fn edited_entry_is_detected() {
        let mut entries = ledger_with(3).await.entries().await.unwrap();
        entries[1].details = "rewritten history".into();
        let report = ChainValidator::validate_entries(&entries).unwrap();
        assert!(report
            .violations
            .iter()
            .any(|v| v.seq == 2 && v.kind == ViolationKind::HashMismatch));
    }

    #[tokio::test]
    async fn removed_entry_is_detected() {
        let mut entries = ledger_with(3).await.entries().await.unwrap();
        entries.remove(1);
        let report = ChainValidator::validate_entries(&entries).unwrap();
        let kinds: Vec<_> = report.violations.iter().map(|v| v.kind).collect();
        assert!(kinds.contains(&ViolationKind::SequenceGap));
        assert!(kinds.contains(&ViolationKind::HashChainBreak));
    }
}
