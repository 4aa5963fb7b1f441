use std::sync::Arc;

use casefile_store::RecordStore;
use casefile_types::{ReferenceNumber, SuspectId};
use serde::Serialize;
use tracing::{debug, warn};

/// A suspect already tagged with a case reference number.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SuspectMatch {
    pub id: SuspectId,
    pub display_name: String,
}

/// Read-only lookup of suspects that declare a case reference number.
#[derive(Clone)]
pub struct AutoLinkMatcher {
    store: Arc<dyn RecordStore>,
}

impl AutoLinkMatcher {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Suspects whose linked reference numbers contain `reference`.
    ///
    /// Well-formed input is normalized first, so `7/2024` finds suspects
    /// tagged `007/2024`. Blank input and store failures yield no matches.
    pub async fn find_suspects_for_reference_number(&self, reference: &str) -> Vec<SuspectMatch> {
        let trimmed = reference.trim();
        if trimmed.is_empty() {
            return Vec::new();
        }
        let key = trimmed
            .parse::<ReferenceNumber>()
            .map(|r| r.to_string())
            .unwrap_or_else(|_| trimmed.to_string());

        match self.store.find_suspects_by_case_reference(&key).await {
            Ok(suspects) => {
                debug!(reference = %key, matches = suspects.len(), "auto-link lookup");
                suspects
                    .into_iter()
                    .map(|s| SuspectMatch {
                        display_name: s.display_name().to_string(),
                        id: s.id,
                    })
                    .collect()
            }
            Err(e) => {
                warn!(reference = %key, error = %e, "auto-link lookup failed");
                Vec::new()
            }
        }
    }
}

impl std::fmt::Debug for AutoLinkMatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AutoLinkMatcher").finish_non_exhaustive()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use casefile_store::InMemoryRecordStore;
    use casefile_types::{Actor, AuditStamp, Suspect};
    use chrono::Utc;

    pub(crate) fn suspect(id: &str, name: &str, refs: &[&str]) -> Suspect {
        let now = Utc::now();
        Suspect {
            id: SuspectId::new(id).unwrap(),
            full_name: name.into(),
            nickname: None,
            gender: Default::default(),
            date_of_birth: None,
            nationality: None,
            occupation: None,
            phone_numbers: vec![],
            offences: vec![],
            custody_status: None,
            custody_location: None,
            linked_case_reference_numbers: refs.iter().map(|r| r.to_string()).collect(),
            profile_image: None,
            stamp: AuditStamp::new(&Actor::system(), now),
        }
    }

    async fn matcher_with(suspects: &[Suspect]) -> AutoLinkMatcher {
        let store = Arc::new(InMemoryRecordStore::new());
        for s in suspects {
            store.put_suspect(s).await.unwrap();
        }
        AutoLinkMatcher::new(store)
    }

    #[tokio::test]
    async fn finds_tagged_suspects() {
        let m = matcher_with(&[
            suspect("s1", "Jane Doe", &["012/2024"]),
            suspect("s2", "John Roe", &["013/2024"]),
        ])
        .await;
        let found = m.find_suspects_for_reference_number("012/2024").await;
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].display_name, "Jane Doe");
    }

    #[tokio::test]
    async fn input_is_normalized() {
        let m = matcher_with(&[suspect("s1", "Jane Doe", &["007/2024"])]).await;
        assert_eq!(m.find_suspects_for_reference_number(" 7/2024 ").await.len(), 1);
    }

    #[tokio::test]
    async fn blank_input_matches_nothing() {
        let m = matcher_with(&[suspect("s1", "", &[""])]).await;
        assert!(m.find_suspects_for_reference_number("   ").await.is_empty());
    }

    #[tokio::test]
    async fn unnamed_suspects_get_placeholder() {
        let m = matcher_with(&[suspect("s1", "  ", &["001/2023"])]).await;
        let found = m.find_suspects_for_reference_number("001/2023").await;
        assert_eq!(found[0].display_name, casefile_types::UNNAMED_SUSPECT);
    }
}
