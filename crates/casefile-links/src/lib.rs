//! Cross-entity consistency for Casefile.
//!
//! A case lists the suspects it links by id; a suspect lists the cases it
//! belongs to by reference number. This crate keeps the two sides in step
//! across create, update and delete of either record, drives attachment
//! cleanup, and writes the audit trail.
//!
//! # Key Types
//!
//! - [`CrossLinkCoordinator`]: the entry point for every mutation
//! - [`LinkPlan`] / [`LinkDelta`]: pure description of link changes
//! - [`PropagationReport`]: per-delta outcomes of a propagation step
//! - [`AutoLinkMatcher`] / [`SuggestionSession`]: advisory link suggestions
//!
//! # Consistency Model
//!
//! There are no cross-document transactions. The primary write happens
//! first; link propagation follows as independent idempotent writes whose
//! failures are logged and reported, never rolled back. Unlinks performed on
//! deletion are grouped into one batch, atomic where the store supports it.

pub mod config;
pub mod coordinator;
pub mod delta;
pub mod error;
pub mod matcher;
pub mod report;
pub mod suggest;

pub use config::CoordinatorConfig;
pub use coordinator::{CaseWrite, CrossLinkCoordinator, LinkOutcome, LinkResult};
pub use delta::{diff_links, DeltaKind, LinkDelta, LinkDiff, LinkPlan};
pub use error::{CoordinatorError, CoordinatorResult};
pub use matcher::{AutoLinkMatcher, SuspectMatch};
pub use report::{DeleteOutcome, DeltaOutcome, DeltaResult, LinkPropagationError, PropagationReport};
pub use suggest::{spawn_suggestion_task, LinkSuggestion, SuggestionSession};
