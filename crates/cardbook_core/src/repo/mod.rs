//! Repository layer: record store and settings persistence.
//!
//! # Responsibility
//! - Define persistence contracts consumed by merge and resolution services.
//! - Isolate SQLite and document encoding details from business logic.
//!
//! # Invariants
//! - Repository APIs return semantic errors in addition to DB transport errors.

pub mod record_store;
pub mod settings_repo;
