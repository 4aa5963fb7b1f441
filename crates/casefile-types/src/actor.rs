use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The officer performing an operation.
///
/// Identity is verified upstream; this crate only carries it.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Actor {
    pub id: String,
    pub name: String,
}

impl Actor {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }

    /// Actor used for maintenance writes not attributable to a person.
    pub fn system() -> Self {
        Self::new("system", "System")
    }
}

/// Creation and last-modification stamps carried by every record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditStamp {
    pub created_at: DateTime<Utc>,
    pub created_by: Actor,
    pub updated_at: DateTime<Utc>,
    pub updated_by: Actor,
}

impl AuditStamp {
    pub fn new(actor: &Actor, at: DateTime<Utc>) -> Self {
        Self {
            created_at: at,
            created_by: actor.clone(),
            updated_at: at,
            updated_by: actor.clone(),
        }
    }

    pub fn touch(&mut self, actor: &Actor, at: DateTime<Utc>) {
        self.updated_at = at;
        self.updated_by = actor.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn touch_keeps_creation() {
        let alice = Actor::new("u1", "Alice");
        let bob = Actor::new("u2", "Bob");
        let t0 = Utc::now();
        let mut stamp = AuditStamp::new(&alice, t0);
        let t1 = t0 + chrono::Duration::seconds(5);
        stamp.touch(&bob, t1);

        assert_eq!(stamp.created_by, alice);
        assert_eq!(stamp.created_at, t0);
        assert_eq!(stamp.updated_by, bob);
        assert_eq!(stamp.updated_at, t1);
    }

    #[test]
    fn stamp_serializes_camel_case() {
        let stamp = AuditStamp::new(&Actor::system(), Utc::now());
        let json = serde_json::to_value(&stamp).unwrap();
        assert!(json.get("createdAt").is_some());
        assert_eq!(json["updatedBy"]["name"], "System");
    }
}
