use async_trait::async_trait;
use casefile_types::{AuditLogEntry, AuditRecord};

use crate::error::LedgerResult;
use crate::query::AuditQuery;

/// Write boundary for the audit ledger. Append is the only mutation.
#[async_trait]
pub trait AuditWriter: Send + Sync {
    /// Append `record`, assigning id, seq, timestamp and chain hashes.
    async fn append(&self, record: AuditRecord) -> LedgerResult<AuditLogEntry>;
}

/// Read boundary for the audit ledger.
#[async_trait]
pub trait AuditReader: Send + Sync {
    /// Every entry in append order.
    async fn entries(&self) -> LedgerResult<Vec<AuditLogEntry>>;

    async fn count(&self) -> LedgerResult<u64>;

    /// Entries matching `query`, newest first.
    async fn query(&self, query: &AuditQuery) -> LedgerResult<Vec<AuditLogEntry>> {
        Ok(query.apply(self.entries().await?))
    }
}
