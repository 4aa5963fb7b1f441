use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::actor::AuditStamp;
use crate::exhibit::{Exhibit, ExhibitDraft};
use crate::ids::{CaseId, SuspectId};
use crate::reference::ReferenceNumber;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CaseStatus {
    #[default]
    Open,
    Pending,
    Closed,
    #[serde(rename = "Under Investigation")]
    UnderInvestigation,
    #[serde(rename = "Cold Case")]
    ColdCase,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CasePriority {
    Low,
    #[default]
    Medium,
    High,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Complainant {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Witness {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub statement: Option<String>,
}

/// Kind tag on a case-to-suspect link. Only suspects are linked today.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkKind {
    #[default]
    Suspect,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SuspectLink {
    pub id: SuspectId,
    #[serde(rename = "type", default)]
    pub kind: LinkKind,
}

/// The set of suspects a case links to. Serialized as an array.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SuspectLinks(BTreeSet<SuspectLink>);

impl SuspectLinks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if the suspect was not already linked.
    pub fn insert(&mut self, id: SuspectId) -> bool {
        self.0.insert(SuspectLink {
            id,
            kind: LinkKind::Suspect,
        })
    }

    /// Returns `true` if the suspect was linked.
    pub fn remove(&mut self, id: &SuspectId) -> bool {
        let before = self.0.len();
        self.0.retain(|link| &link.id != id);
        self.0.len() != before
    }

    pub fn contains(&self, id: &SuspectId) -> bool {
        self.0.iter().any(|link| &link.id == id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &SuspectId> {
        self.0.iter().map(|link| &link.id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<SuspectId> for SuspectLinks {
    fn from_iter<I: IntoIterator<Item = SuspectId>>(iter: I) -> Self {
        let mut links = Self::new();
        for id in iter {
            links.insert(id);
        }
        links
    }
}

/// A criminal case file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Case {
    pub id: CaseId,
    pub reference_number: ReferenceNumber,
    #[serde(default)]
    pub offence: String,
    #[serde(default)]
    pub brief_facts: String,
    #[serde(default)]
    pub assigned_investigator: String,
    #[serde(default)]
    pub status: CaseStatus,
    #[serde(default)]
    pub priority: CasePriority,
    pub date_reported: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_occurred: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location_of_offence: Option<String>,
    #[serde(default)]
    pub complainant: Complainant,
    #[serde(default)]
    pub witnesses: Vec<Witness>,
    #[serde(default)]
    pub suspect_links: SuspectLinks,
    #[serde(default)]
    pub exhibits: Vec<Exhibit>,
    #[serde(flatten)]
    pub stamp: AuditStamp,
}

impl Case {
    /// Storage paths of every exhibit that names a real blob.
    pub fn blob_paths(&self) -> impl Iterator<Item = &str> {
        self.exhibits.iter().filter_map(Exhibit::blob_path)
    }
}

/// The editable form of a case, as submitted by a client.
///
/// `sequence` and `year` are kept wide and optional so that missing or
/// out-of-range input can be reported as a validation error on the field
/// instead of failing deserialization.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CaseDraft {
    pub sequence: Option<i64>,
    pub year: Option<i64>,
    pub offence: String,
    pub brief_facts: String,
    pub assigned_investigator: String,
    pub status: CaseStatus,
    pub priority: CasePriority,
    pub date_reported: Option<DateTime<Utc>>,
    pub date_occurred: Option<DateTime<Utc>>,
    pub location_of_offence: Option<String>,
    pub complainant: Complainant,
    pub witnesses: Vec<Witness>,
    pub suspect_links: SuspectLinks,
    pub exhibits: Vec<ExhibitDraft>,
}

impl CaseDraft {
    pub fn new(sequence: i64, year: i64) -> Self {
        Self {
            sequence: Some(sequence),
            year: Some(year),
            ..Default::default()
        }
    }

    pub fn with_suspect(mut self, id: SuspectId) -> Self {
        self.suspect_links.insert(id);
        self
    }

    pub fn with_exhibit(mut self, exhibit: ExhibitDraft) -> Self {
        self.exhibits.push(exhibit);
        self
    }

    /// Draft that reproduces `case` as it is stored.
    pub fn from_case(case: &Case) -> Self {
        Self {
            sequence: Some(i64::from(case.reference_number.sequence())),
            year: Some(i64::from(case.reference_number.year())),
            offence: case.offence.clone(),
            brief_facts: case.brief_facts.clone(),
            assigned_investigator: case.assigned_investigator.clone(),
            status: case.status,
            priority: case.priority,
            date_reported: Some(case.date_reported),
            date_occurred: case.date_occurred,
            location_of_offence: case.location_of_offence.clone(),
            complainant: case.complainant.clone(),
            witnesses: case.witnesses.clone(),
            suspect_links: case.suspect_links.clone(),
            exhibits: case.exhibits.iter().cloned().map(ExhibitDraft::from).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::Actor;

    fn sid(s: &str) -> SuspectId {
        SuspectId::new(s).unwrap()
    }

    #[test]
    fn links_have_set_semantics() {
        let mut links = SuspectLinks::new();
        assert!(links.insert(sid("s1")));
        assert!(!links.insert(sid("s1")));
        assert_eq!(links.len(), 1);

        assert!(links.remove(&sid("s1")));
        assert!(!links.remove(&sid("s1")));
        assert!(links.is_empty());
    }

    #[test]
    fn links_serialize_with_type_tag() {
        let links: SuspectLinks = [sid("s1")].into_iter().collect();
        let json = serde_json::to_value(&links).unwrap();
        assert_eq!(json, serde_json::json!([{ "id": "s1", "type": "suspect" }]));
    }

    #[test]
    fn duplicate_links_collapse_on_read() {
        let json = r#"[{"id":"s1","type":"suspect"},{"id":"s1","type":"suspect"}]"#;
        let links: SuspectLinks = serde_json::from_str(json).unwrap();
        assert_eq!(links.len(), 1);
    }

    #[test]
    fn status_uses_display_names() {
        let json = serde_json::to_string(&CaseStatus::UnderInvestigation).unwrap();
        assert_eq!(json, "\"Under Investigation\"");
        let back: CaseStatus = serde_json::from_str("\"Cold Case\"").unwrap();
        assert_eq!(back, CaseStatus::ColdCase);
    }

    #[test]
    fn case_document_round_trips() {
        let now = Utc::now();
        let case = Case {
            id: CaseId::new("c1").unwrap(),
            reference_number: ReferenceNumber::new(7, 2024).unwrap(),
            offence: "Burglary".into(),
            brief_facts: String::new(),
            assigned_investigator: "DC Smith".into(),
            status: CaseStatus::Open,
            priority: CasePriority::High,
            date_reported: now,
            date_occurred: None,
            location_of_offence: None,
            complainant: Complainant::default(),
            witnesses: vec![],
            suspect_links: [sid("s1")].into_iter().collect(),
            exhibits: vec![],
            stamp: AuditStamp::new(&Actor::system(), now),
        };

        let json = serde_json::to_value(&case).unwrap();
        assert_eq!(json["referenceNumber"], "007/2024");
        assert!(json.get("createdAt").is_some());

        let back: Case = serde_json::from_value(json).unwrap();
        assert_eq!(back, case);
    }

    #[test]
    fn draft_accepts_missing_fields() {
        let draft: CaseDraft = serde_json::from_str("{}").unwrap();
        assert!(draft.sequence.is_none());
        assert!(draft.year.is_none());
    }
}
