use std::sync::RwLock;

use async_trait::async_trait;
use casefile_types::{AuditLogEntry, AuditRecord};
use chrono::Utc;
use tracing::debug;

use crate::chain::next_entry;
use crate::error::LedgerResult;
use crate::traits::{AuditReader, AuditWriter};

/// In-memory audit ledger for tests, local demos, and embedding.
pub struct InMemoryAuditLedger {
    entries: RwLock<Vec<AuditLogEntry>>,
}

impl InMemoryAuditLedger {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().expect("lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().expect("lock poisoned").is_empty()
    }

    /// Snapshot of every entry, in append order.
    pub fn snapshot(&self) -> Vec<AuditLogEntry> {
        self.entries.read().expect("lock poisoned").clone()
    }
}

impl Default for InMemoryAuditLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AuditWriter for InMemoryAuditLedger {
    async fn append(&self, record: AuditRecord) -> LedgerResult<AuditLogEntry> {
        let mut entries = self.entries.write().expect("lock poisoned");
        let entry = next_entry(entries.last(), record, Utc::now())?;
        debug!(seq = entry.seq, action = %entry.action, entity = %entry.entity_type, "audit append");
        entries.push(entry.clone());
        Ok(entry)
    }
}

#[async_trait]
impl AuditReader for InMemoryAuditLedger {
    async fn entries(&self) -> LedgerResult<Vec<AuditLogEntry>> {
        Ok(self.snapshot())
    }

    async fn count(&self) -> LedgerResult<u64> {
        Ok(self.len() as u64)
    }
}

impl std::fmt::Debug for InMemoryAuditLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryAuditLedger")
            .field("entry_count", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::tests::record;
    use casefile_types::AuditAction;

    #[tokio::test]
    async fn append_assigns_increasing_seq() {
        let ledger = InMemoryAuditLedger::new();
        let a = ledger.append(record(AuditAction::Create, "a")).await.unwrap();
        let b = ledger.append(record(AuditAction::Update, "b")).await.unwrap();
        assert_eq!((a.seq, b.seq), (1, 2));
        assert!(b.timestamp >= a.timestamp);
        assert_ne!(a.id, b.id);
    }

    #[tokio::test]
    async fn count_only_grows() {
        let ledger = InMemoryAuditLedger::new();
        let mut last = ledger.count().await.unwrap();
        for i in 0..5 {
            ledger
                .append(record(AuditAction::Update, &i.to_string()))
                .await
                .unwrap();
            let now = ledger.count().await.unwrap();
            assert!(now > last);
            last = now;
        }
        assert_eq!(last, 5);
    }

    #[tokio::test]
    async fn entries_preserve_record_fields() {
        let ledger = InMemoryAuditLedger::new();
        ledger.append(record(AuditAction::Delete, "removed")).await.unwrap();
        let entries = ledger.entries().await.unwrap();
        assert_eq!(entries[0].actor_name, "DC Rivera");
        assert_eq!(entries[0].entity_identifier, "007/2024");
        assert_eq!(entries[0].details, "removed");
    }
}
