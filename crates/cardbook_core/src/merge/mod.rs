//! Merge engine for extracted company groups.
//!
//! # Responsibility
//! - Split an extraction batch into clean (auto-mergeable) groups and
//!   duplicate entries needing a user decision.
//! - Apply clean groups to the working set through the name-match upsert and
//!   persist every touched group.
//!
//! # Invariants
//! - Every incoming person lands in exactly one of clean data or duplicates.
//! - `partition` never mutates the working set or touches the store.

pub mod duplicate;
pub mod engine;

pub use duplicate::{DuplicateAction, DuplicateEntry, IncomingPerson};
pub use engine::{merge_clean, partition, persist_group, MergeReport, Partition, Persisted};
