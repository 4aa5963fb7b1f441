use casefile_types::{AuditLogEntry, EntityType};
use serde::{Deserialize, Serialize};

/// Read-side filter over audit entries.
///
/// Free text matches case-insensitively against actor name and id, entity
/// identifier, id and type, action, and details. Results are sorted newest
/// first, with `seq` breaking timestamp ties.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditQuery {
    pub text: Option<String>,
    pub entity_type: Option<EntityType>,
    pub entity_id: Option<String>,
    pub limit: Option<usize>,
}

impl AuditQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        let text = text.into();
        self.text = (!text.trim().is_empty()).then_some(text);
        self
    }

    pub fn entity(mut self, entity_type: EntityType, entity_id: impl Into<String>) -> Self {
        self.entity_type = Some(entity_type);
        self.entity_id = Some(entity_id.into());
        self
    }

    pub fn entity_type(mut self, entity_type: EntityType) -> Self {
        self.entity_type = Some(entity_type);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn matches(&self, entry: &AuditLogEntry) -> bool {
        if self.entity_type.is_some_and(|t| t != entry.entity_type) {
            return false;
        }
        if self.entity_id.as_deref().is_some_and(|id| id != entry.entity_id) {
            return false;
        }
        match &self.text {
            None => true,
            Some(text) => {
                let needle = text.trim().to_lowercase();
                [
                    entry.actor_name.as_str(),
                    entry.actor_id.as_str(),
                    entry.entity_identifier.as_str(),
                    entry.entity_id.as_str(),
                    entry.entity_type.as_str(),
                    entry.action.as_str(),
                    entry.details.as_str(),
                ]
                .iter()
                .any(|field| field.to_lowercase().contains(&needle))
            }
        }
    }

    /// Filter, sort newest first, and truncate.
    pub fn apply(&self, entries: Vec<AuditLogEntry>) -> Vec<AuditLogEntry> {
        let mut out: Vec<AuditLogEntry> = entries.into_iter().filter(|e| self.matches(e)).collect();
        out.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.seq.cmp(&a.seq)));
        if let Some(limit) = self.limit {
            out.truncate(limit);
        }
        out
    }
}
