//! Attachment storage for Casefile.
//!
//! Exhibits belong to cases and profile images belong to suspects. Both are
//! binary blobs kept in an [`AttachmentStore`] under a hierarchical path:
//!
//! - `cases/{caseId}/exhibits/{ms}-{token}-{name}`
//! - `suspects/{suspectId}/profileImage/{ms}-{token}-{name}`
//!
//! The [`AttachmentManager`] owns the lifecycle on top of the store: it
//! uploads, deletes (treating an already-absent blob as success), and turns
//! inline camera captures into stored blobs without letting one bad capture
//! fail the rest.

pub mod error;
pub mod fs;
pub mod inline;
pub mod manager;
pub mod memory;
pub mod path;
pub mod traits;

pub use error::{AttachmentError, AttachmentResult, AttachmentStoreError};
pub use fs::FsAttachmentStore;
pub use inline::InlinePayload;
pub use manager::{
    AttachmentManager, DeleteOutcome, ExhibitOutcome, MaterializeReport, MaterializeStatus,
    UploadedAttachment,
};
pub use memory::InMemoryAttachmentStore;
pub use path::{sanitize_file_name, AttachmentOwner};
pub use traits::AttachmentStore;
