use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Declares an opaque string identifier.
///
/// Record stores assign these; the application never interprets their
/// contents. Freshly generated ids are UUID v7 so they sort by creation time.
macro_rules! opaque_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Generate a new time-ordered identifier (UUID v7).
            pub fn generate() -> Self {
                Self(uuid::Uuid::now_v7().simple().to_string())
            }

            /// Wrap an existing identifier. Blank strings are rejected.
            pub fn new(raw: impl Into<String>) -> Result<Self, TypeError> {
                let raw = raw.into();
                if raw.trim().is_empty() {
                    return Err(TypeError::EmptyIdentifier {
                        kind: stringify!($name),
                    });
                }
                Ok(Self(raw))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// First 8 characters, for log lines and user messages.
            pub fn short_id(&self) -> String {
                self.0.chars().take(8).collect()
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({})"), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl FromStr for $name {
            type Err = TypeError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::new(s)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

opaque_id!(
    /// Store-assigned identifier of a [`crate::Case`].
    CaseId
);
opaque_id!(
    /// Store-assigned identifier of a [`crate::Suspect`].
    SuspectId
);
opaque_id!(
    /// Client-generated identifier of an [`crate::Exhibit`], unique within its case.
    ExhibitId
);
opaque_id!(
    /// Ledger-assigned identifier of an [`crate::AuditLogEntry`].
    AuditEntryId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_are_unique() {
        let a = CaseId::generate();
        let b = CaseId::generate();
        assert_ne!(a, b);
    }

    #[test]
    fn generated_ids_sort_by_creation() {
        let first = SuspectId::generate();
        let second = SuspectId::generate();
        assert!(first < second);
    }

    #[test]
    fn blank_id_is_rejected() {
        let err = CaseId::new("   ").unwrap_err();
        assert_eq!(err, TypeError::EmptyIdentifier { kind: "CaseId" });
    }

    #[test]
    fn short_id_is_8_chars() {
        let id = ExhibitId::generate();
        assert_eq!(id.short_id().len(), 8);
    }

    #[test]
    fn short_id_of_short_value() {
        let id = SuspectId::new("abc").unwrap();
        assert_eq!(id.short_id(), "abc");
    }

    #[test]
    fn debug_names_the_kind() {
        let id = SuspectId::new("s-1").unwrap();
        assert_eq!(format!("{id:?}"), "SuspectId(s-1)");
        assert_eq!(id.to_string(), "s-1");
    }

    #[test]
    fn serializes_as_plain_string() {
        let id = CaseId::new("case-42").unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"case-42\"");
        let parsed: CaseId = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn from_str_parses() {
        let id: AuditEntryId = "entry-1".parse().unwrap();
        assert_eq!(id.as_str(), "entry-1");
    }
}
