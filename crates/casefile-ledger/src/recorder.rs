use std::sync::Arc;

use casefile_types::{Actor, AuditAction, AuditLogEntry, AuditRecord, EntityType};
use tracing::{debug, error};

use crate::traits::AuditWriter;

/// Best-effort write path to the audit ledger.
///
/// A failed append is logged at `error` level and reported as `None`. It
/// never fails the caller: the business mutation has already happened.
#[derive(Clone)]
pub struct AuditRecorder {
    writer: Arc<dyn AuditWriter>,
}

impl AuditRecorder {
    pub fn new(writer: Arc<dyn AuditWriter>) -> Self {
        Self { writer }
    }

    pub async fn record(
        &self,
        action: AuditAction,
        entity_type: EntityType,
        entity_id: &str,
        entity_identifier: &str,
        actor: &Actor,
        details: impl Into<String>,
    ) -> Option<AuditLogEntry> {
        let record = AuditRecord {
            action,
            entity_type,
            entity_id: entity_id.to_string(),
            entity_identifier: entity_identifier.to_string(),
            actor: actor.clone(),
            details: details.into(),
        };
        match self.writer.append(record).await {
            Ok(entry) => {
                debug!(seq = entry.seq, %action, %entity_type, entity_id, "audit recorded");
                Some(entry)
            }
            Err(e) => {
                error!(
                    %action,
                    %entity_type,
                    entity_id,
                    entity_identifier,
                    actor = %actor.id,
                    error = %e,
                    "audit write failed; entry lost"
                );
                None
            }
        }
    }
}

impl std::fmt::Debug for AuditRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditRecorder").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{LedgerError, LedgerResult};
    use crate::memory::InMemoryAuditLedger;
    use async_trait::async_trait;

    struct DownLedger;

    #[async_trait]
    impl AuditWriter for DownLedger {
        async fn append(&self, _record: AuditRecord) -> LedgerResult<AuditLogEntry> {
            Err(LedgerError::Unavailable("disk full".into()))
        }
    }

    #[tokio::test]
    async fn records_through_writer() {
        let ledger = Arc::new(InMemoryAuditLedger::new());
        let recorder = AuditRecorder::new(ledger.clone());
        let actor = Actor::new("u1", "PC Abara");

        let entry = recorder
            .record(AuditAction::Create, EntityType::Case, "c1", "001/2024", &actor, "Case created")
            .await
            .expect("entry written");
        assert_eq!(entry.actor_name, "PC Abara");
        assert_eq!(ledger.len(), 1);
    }

    #[tokio::test]
    async fn failure_yields_none() {
        let recorder = AuditRecorder::new(Arc::new(DownLedger));
        let out = recorder
            .record(AuditAction::Delete, EntityType::Suspect, "s1", "X", &Actor::system(), "gone")
            .await;
        assert!(out.is_none());
    }
}
