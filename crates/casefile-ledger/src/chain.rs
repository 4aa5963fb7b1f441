use casefile_types::{AuditAction, AuditEntryId, AuditLogEntry, AuditRecord, EntityType};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::LedgerResult;

const DOMAIN: &[u8] = b"casefile.audit.v1";

/// The hashed view of an entry: everything except `entry_hash` itself.
#[derive(Serialize)]
struct HashedBody<'a> {
    id: &'a AuditEntryId,
    seq: u64,
    timestamp: &'a DateTime<Utc>,
    action: AuditAction,
    actor_id: &'a str,
    actor_name: &'a str,
    entity_type: EntityType,
    entity_id: &'a str,
    entity_identifier: &'a str,
    details: &'a str,
    prev_hash: Option<&'a str>,
}

/// BLAKE3 hash of an entry's content and its link to the previous entry.
pub fn compute_entry_hash(entry: &AuditLogEntry) -> LedgerResult<String> {
    let body = HashedBody {
        id: &entry.id,
        seq: entry.seq,
        timestamp: &entry.timestamp,
        action: entry.action,
        actor_id: &entry.actor_id,
        actor_name: &entry.actor_name,
        entity_type: entry.entity_type,
        entity_id: &entry.entity_id,
        entity_identifier: &entry.entity_identifier,
        details: &entry.details,
        prev_hash: entry.prev_hash.as_deref(),
    };
    let data = serde_json::to_vec(&body)?;

    let mut hasher = blake3::Hasher::new();
    hasher.update(DOMAIN);
    hasher.update(b":");
    hasher.update(&data);
    Ok(hex::encode(hasher.finalize().as_bytes()))
}

/// Turn a record into a ledger entry at position `seq`.
pub fn seal(
    record: AuditRecord,
    seq: u64,
    timestamp: DateTime<Utc>,
    prev_hash: Option<String>,
) -> LedgerResult<AuditLogEntry> {
    let mut entry = AuditLogEntry {
        id: AuditEntryId::generate(),
        seq,
        timestamp,
        action: record.action,
        actor_id: record.actor.id,
        actor_name: record.actor.name,
        entity_type: record.entity_type,
        entity_id: record.entity_id,
        entity_identifier: record.entity_identifier,
        details: record.details,
        prev_hash,
        entry_hash: String::new(),
    };
    entry.entry_hash = compute_entry_hash(&entry)?;
    Ok(entry)
}

/// Seal `record` as the entry following `tail`.
///
/// Timestamps never go backwards: if the clock is behind the tail's
/// timestamp, the tail's timestamp is reused.
pub(crate) fn next_entry(
    tail: Option<&AuditLogEntry>,
    record: AuditRecord,
    now: DateTime<Utc>,
) -> LedgerResult<AuditLogEntry> {
    let seq = tail.map_or(1, |t| t.seq + 1);
    let timestamp = tail.map_or(now, |t| now.max(t.timestamp));
    seal(record, seq, timestamp, tail.map(|t| t.entry_hash.clone()))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use casefile_types::Actor;

    pub(crate) fn record(action: AuditAction, details: &str) -> AuditRecord {
        AuditRecord {
            action,
            entity_type: EntityType::Case,
            entity_id: "c1".into(),
            entity_identifier: "007/2024".into(),
            actor: Actor::new("u1", "DC Rivera"),
            details: details.into(),
        }
    }

    #[test]
    fn hash_is_deterministic() {
        let e = seal(record(AuditAction::Create, "created"), 1, Utc::now(), None).unwrap();
        assert_eq!(compute_entry_hash(&e).unwrap(), e.entry_hash);
        assert_eq!(e.entry_hash.len(), 64);
    }

    #[test]
    fn hash_covers_details() {
        let mut e = seal(record(AuditAction::Update, "a"), 1, Utc::now(), None).unwrap();
        e.details = "b".into();
        assert_ne!(compute_entry_hash(&e).unwrap(), e.entry_hash);
    }

    #[test]
    fn hash_covers_prev_link() {
        let mut e = seal(record(AuditAction::Update, "a"), 2, Utc::now(), Some("00".into())).unwrap();
        e.prev_hash = Some("11".into());
        assert_ne!(compute_entry_hash(&e).unwrap(), e.entry_hash);
    }

    #[test]
    fn next_entry_links_to_tail() {
        let first = next_entry(None, record(AuditAction::Create, "a"), Utc::now()).unwrap();
        assert_eq!(first.seq, 1);
        assert!(first.prev_hash.is_none());

        let earlier = first.timestamp - chrono::Duration::seconds(10);
        let second = next_entry(Some(&first), record(AuditAction::Update, "b"), earlier).unwrap();
        assert_eq!(second.seq, 2);
        assert_eq!(second.prev_hash.as_deref(), Some(first.entry_hash.as_str()));
        assert_eq!(second.timestamp, first.timestamp);
    }

    #[test]
    fn hash_survives_json_round_trip() {
        let e = seal(record(AuditAction::Delete, "gone"), 3, Utc::now(), None).unwrap();
        let json = serde_json::to_vec(&e).unwrap();
        let back: AuditLogEntry = serde_json::from_slice(&json).unwrap();
        assert_eq!(compute_entry_hash(&back).unwrap(), e.entry_hash);
    }
}
