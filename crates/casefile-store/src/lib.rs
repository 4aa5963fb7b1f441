//! Record store for Casefile.
//!
//! Two collections are kept: `cases` and `suspects`, each keyed by an opaque
//! store-assigned id. Documents are JSON-shaped records from
//! `casefile-types`.
//!
//! # Storage Backends
//!
//! All backends implement the [`RecordStore`] trait:
//!
//! - [`InMemoryRecordStore`] -- `HashMap`-based store for tests and embedding
//! - [`FsRecordStore`] -- one JSON file per document under a data directory
//!
//! # Design Rules
//!
//! 1. Writes are atomic per document. No cross-document transactions.
//! 2. Field-level link updates go through [`WriteOp`] so set semantics are
//!    applied in one place regardless of backend.
//! 3. [`RecordStore::apply_batch`] is atomic only where the backend says so.
//! 4. All I/O errors are propagated, never silently ignored.

pub mod error;
pub mod fs;
pub mod memory;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use fs::FsRecordStore;
pub use memory::InMemoryRecordStore;
pub use traits::{RecordStore, WriteOp, WriteTarget};
