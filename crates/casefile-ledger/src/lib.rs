//! Append-only audit ledger for Casefile.
//!
//! This crate records "what happened, who did it, to what" for every
//! mutation the coordinator performs. It provides:
//! - `AuditWriter` / `AuditReader` trait boundaries (no update or delete)
//! - `InMemoryAuditLedger` for tests and embedding
//! - `FileAuditLedger`, a length + CRC32 framed append-only file
//! - BLAKE3 hash chaining of entries and chain validation
//! - `AuditRecorder`, the best-effort write path used by the coordinator
//! - `AuditQuery`, the free-text read path used by reporting

pub mod chain;
pub mod error;
pub mod file;
pub mod memory;
pub mod query;
pub mod recorder;
pub mod traits;
pub mod validation;

pub use chain::{compute_entry_hash, seal};
pub use error::{LedgerError, LedgerResult};
pub use file::FileAuditLedger;
pub use memory::InMemoryAuditLedger;
pub use query::AuditQuery;
pub use recorder::AuditRecorder;
pub use traits::{AuditReader, AuditWriter};
pub use validation::{ChainValidator, ValidationReport, Violation, ViolationKind};
