use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::actor::Actor;
use crate::ids::AuditEntryId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    Create,
    Update,
    Delete,
    View,
    Login,
    Logout,
    FileUpload,
    FileDelete,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "CREATE",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
            Self::View => "VIEW",
            Self::Login => "LOGIN",
            Self::Logout => "LOGOUT",
            Self::FileUpload => "FILE_UPLOAD",
            Self::FileDelete => "FILE_DELETE",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityType {
    Suspect,
    Case,
    User,
    System,
}

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Suspect => "SUSPECT",
            Self::Case => "CASE",
            Self::User => "USER",
            Self::System => "SYSTEM",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A mutation fact waiting to be appended to the ledger.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditRecord {
    pub action: AuditAction,
    pub entity_type: EntityType,
    pub entity_id: String,
    /// Human label such as a reference number or suspect name.
    pub entity_identifier: String,
    pub actor: Actor,
    pub details: String,
}

/// An entry in the audit ledger. Never modified once written.
///
/// `seq`, `timestamp` and the hashes are assigned by the ledger. Each entry's
/// hash covers its content and the previous entry's hash, so any edit or
/// removal inside a stored ledger is detectable.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditLogEntry {
    pub id: AuditEntryId,
    pub seq: u64,
    pub timestamp: DateTime<Utc>,
    pub action: AuditAction,
    pub actor_id: String,
    pub actor_name: String,
    pub entity_type: EntityType,
    pub entity_id: String,
    pub entity_identifier: String,
    pub details: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prev_hash: Option<String>,
    pub entry_hash: String,
}
