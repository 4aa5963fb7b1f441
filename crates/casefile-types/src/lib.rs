//! Foundation types for Casefile.
//!
//! This crate provides the record, identity and audit types shared by every
//! other Casefile crate. It performs no I/O.
//!
//! # Key Types
//!
//! - [`Case`] / [`CaseDraft`]: a criminal case file and its editable form
//! - [`Suspect`] / [`SuspectDraft`]: a person of interest and its editable form
//! - [`Exhibit`] / [`ExhibitDraft`]: an attachment belonging to a case
//! - [`ReferenceNumber`]: the human-facing `NNN/YYYY` case identifier, used
//!   as the join key from the suspect side
//! - [`AuditRecord`] / [`AuditLogEntry`]: a mutation fact before and after
//!   it has been appended to the ledger
//! - [`Actor`] / [`AuditStamp`]: who touched a record, and when

pub mod actor;
pub mod audit;
pub mod case;
pub mod error;
pub mod exhibit;
pub mod ids;
pub mod reference;
pub mod suspect;

pub use actor::{Actor, AuditStamp};
pub use audit::{AuditAction, AuditLogEntry, AuditRecord, EntityType};
pub use case::{
    Case, CaseDraft, CasePriority, CaseStatus, Complainant, LinkKind, SuspectLink, SuspectLinks,
    Witness,
};
pub use error::TypeError;
pub use exhibit::{
    is_blob_path, Exhibit, ExhibitDraft, ExhibitState, PENDING_CAPTURE_PATH, UPLOAD_FAILED_PATH,
    UPLOAD_FAILED_URL,
};
pub use ids::{AuditEntryId, CaseId, ExhibitId, SuspectId};
pub use reference::ReferenceNumber;
pub use suspect::{
    CustodyStatus, Gender, ProfileImage, ProfileImageChange, Suspect, SuspectDraft,
    UNNAMED_SUSPECT,
};
