//! Core domain logic for the business-card address book.
//! This crate is the single source of truth for merge and duplicate
//! resolution invariants.

pub mod db;
pub mod extraction;
pub mod logging;
pub mod merge;
pub mod model;
pub mod repo;
pub mod search;
pub mod service;

pub use extraction::{DemoExtractor, ExtractionError, Extractor};
pub use logging::{default_log_level, init_logging, logging_status};
pub use merge::{DuplicateAction, DuplicateEntry, IncomingPerson, Partition, Persisted};
pub use model::company_group::{CompanyGroup, GroupId, GroupKey};
pub use model::normalize_key;
pub use model::person::{Person, PersonKey};
pub use model::settings::ExtractionSettings;
pub use model::working_set::{PersonRef, WorkingSet};
pub use repo::record_store::{
    FeedCallback, RecordStore, SqliteRecordStore, StoreError, StoreResult, SubscriptionId,
};
pub use repo::settings_repo::{SettingsError, SettingsRepository, SqliteSettingsRepository};
pub use service::card_book_service::{CardBookError, CardBookService, ScanOutcome};
pub use service::duplicate_resolver::{
    scan_for_duplicates, CommitFailure, CommitReport, DuplicateResolver, ResolverError,
};
pub use service::edit_reconciler::{EditError, EditForm, EditOutcome, EditTarget};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
