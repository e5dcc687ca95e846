//! Address-book coordinator.
//!
//! # Responsibility
//! - Own the working set, the duplicate resolver and the change-feed
//!   receiver; route scan, review and edit flows through them.
//! - Serialize flows: nothing else mutates the working set while a review
//!   session is open.
//!
//! # Invariants
//! - The change feed is the only authoritative replacement of the working
//!   set; snapshots arriving during a review are applied once it ends.
//! - A scan batch is all-or-nothing at the extraction step.
//! - On any store failure of a scan or edit flow the working set is left as
//!   it was before the flow started.

use crate::extraction::{strip_data_url_prefix, ExtractionError, Extractor};
use crate::merge::duplicate::DuplicateAction;
use crate::merge::engine::{merge_clean, partition, Persisted};
use crate::model::company_group::CompanyGroup;
use crate::model::working_set::WorkingSet;
use crate::repo::record_store::{RecordStore, StoreError, SubscriptionId};
use crate::search::filter::filter_groups;
use crate::service::duplicate_resolver::{
    scan_for_duplicates, CommitReport, DuplicatePreview, DuplicateResolver, ResolverError,
};
use crate::service::edit_reconciler::{
    apply_edit, delete_person, EditError, EditForm, EditOutcome, EditTarget,
};
use log::{debug, error, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::mpsc::{channel, Receiver};
use std::sync::{Arc, Mutex};

/// Coordinator error. Every variant renders as one user-facing line.
#[derive(Debug)]
pub enum CardBookError {
    Review(ResolverError),
    /// Extraction failed for one image; the whole batch was dropped.
    Extraction {
        image_index: usize,
        error: ExtractionError,
    },
    Store(StoreError),
    Edit(EditError),
    /// Some groups of a commit failed; the review stays open.
    CommitIncomplete(CommitReport),
}

impl Display for CardBookError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Review(err) => write!(f, "{err}"),
            Self::Extraction { image_index, error } => {
                write!(f, "image {}: {error}", image_index + 1)
            }
            Self::Store(err) => write!(f, "save failed: {err}"),
            Self::Edit(err) => write!(f, "edit failed: {err}"),
            Self::CommitIncomplete(report) => write!(f, "{}", report.summary()),
        }
    }
}

impl Error for CardBookError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Review(err) => Some(err),
            Self::Extraction { error, .. } => Some(error),
            Self::Store(err) => Some(err),
            Self::Edit(err) => Some(err),
            Self::CommitIncomplete(_) => None,
        }
    }
}

impl From<ResolverError> for CardBookError {
    fn from(value: ResolverError) -> Self {
        Self::Review(value)
    }
}

impl From<StoreError> for CardBookError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

impl From<EditError> for CardBookError {
    fn from(value: EditError) -> Self {
        Self::Edit(value)
    }
}

/// Summary of one scan batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanOutcome {
    pub images: usize,
    pub groups_extracted: usize,
    /// People merged without conflict.
    pub people_merged: usize,
    /// Entries opened for review; zero means no review session was started.
    pub duplicates: usize,
}

/// Address-book facade over the record store.
pub struct CardBookService {
    store: Arc<dyn RecordStore>,
    working: WorkingSet,
    resolver: DuplicateResolver,
    feed: Receiver<Vec<CompanyGroup>>,
    deferred_feed: Option<Vec<CompanyGroup>>,
    subscription: SubscriptionId,
}

impl CardBookService {
    /// Subscribes to `store` and loads the current groups.
    pub fn new(store: Arc<dyn RecordStore>) -> Result<Self, CardBookError> {
        let (sender, receiver) = channel::<Vec<CompanyGroup>>();
        let sender = Mutex::new(sender);
        let subscription = store.subscribe(Box::new(move |groups: &[CompanyGroup]| {
            if let Ok(sender) = sender.lock() {
                let _ = sender.send(groups.to_vec());
            }
        }))?;

        let mut service = Self {
            store,
            working: WorkingSet::new(),
            resolver: DuplicateResolver::new(),
            feed: receiver,
            deferred_feed: None,
            subscription,
        };
        service.sync_feed();
        Ok(service)
    }

    pub fn groups(&self) -> &[CompanyGroup] {
        self.working.groups()
    }

    pub fn working_set(&self) -> &WorkingSet {
        &self.working
    }

    pub fn resolver(&self) -> &DuplicateResolver {
        &self.resolver
    }

    pub fn is_reviewing(&self) -> bool {
        self.resolver.is_reviewing()
    }

    /// Applies the newest change-feed snapshot, if any.
    ///
    /// Returns whether the working set was replaced. During a review the
    /// snapshot is held back and applied when the review ends.
    pub fn sync_feed(&mut self) -> bool {
        let mut latest = None;
        while let Ok(groups) = self.feed.try_recv() {
            latest = Some(groups);
        }
        if let Some(groups) = latest {
            self.deferred_feed = Some(groups);
        }

        if self.resolver.is_reviewing() {
            return false;
        }
        match self.deferred_feed.take() {
            Some(groups) => {
                debug!(
                    "event=feed_apply module=service status=ok groups={}",
                    groups.len()
                );
                self.working.replace_all(groups);
                true
            }
            None => false,
        }
    }

    /// Extracts every image in order, then merges the whole batch.
    ///
    /// Clean people are merged and persisted immediately. Conflicts open a
    /// review session.
    pub fn import_scan(
        &mut self,
        images: &[&str],
        extractor: &dyn Extractor,
    ) -> Result<ScanOutcome, CardBookError> {
        self.ensure_idle()?;
        self.sync_feed();

        let mut batch = Vec::new();
        for (image_index, image) in images.iter().enumerate() {
            let groups = extractor
                .process(strip_data_url_prefix(image))
                .map_err(|error| {
                    warn!(
                        "event=scan_extract module=service status=error image_index={image_index} error={error}"
                    );
                    CardBookError::Extraction { image_index, error }
                })?;
            batch.extend(groups);
        }

        let groups_extracted = batch.len();
        let split = partition(batch, &self.working);
        let duplicates = split.duplicates;

        let before = self.working.snapshot();
        let merged = match merge_clean(split.clean_data, &mut self.working, self.store.as_ref()) {
            Ok(report) => report,
            Err(err) => {
                error!("event=scan_merge module=service status=error error={err}");
                self.working.replace_all(before);
                return Err(err.into());
            }
        };

        let outcome = ScanOutcome {
            images: images.len(),
            groups_extracted,
            people_merged: merged.people_merged,
            duplicates: duplicates.len(),
        };
        if !duplicates.is_empty() {
            self.resolver.open(duplicates, &self.working)?;
        }

        info!(
            "event=scan_import module=service status=ok images={} merged={} duplicates={}",
            outcome.images, outcome.people_merged, outcome.duplicates
        );
        Ok(outcome)
    }

    /// Scans the whole working set for repeated names.
    ///
    /// Opens a review session when any are found and returns their count.
    pub fn find_duplicates(&mut self) -> Result<usize, CardBookError> {
        self.ensure_idle()?;
        self.sync_feed();

        let duplicates = scan_for_duplicates(&self.working);
        if duplicates.is_empty() {
            return Ok(0);
        }
        Ok(self.resolver.open(duplicates, &self.working)?)
    }

    pub fn duplicate_preview(&self, index: usize) -> Option<DuplicatePreview<'_>> {
        self.resolver.preview(index, &self.working)
    }

    pub fn resolve_duplicate(
        &mut self,
        index: usize,
        action: DuplicateAction,
    ) -> Result<(), CardBookError> {
        Ok(self.resolver.resolve_one(index, action, &mut self.working)?)
    }

    /// Persists the review. A partial failure keeps the review open.
    pub fn commit_resolution(&mut self) -> Result<CommitReport, CardBookError> {
        let report = self
            .resolver
            .commit(&mut self.working, self.store.as_ref())?;
        if !report.is_complete() {
            return Err(CardBookError::CommitIncomplete(report));
        }
        self.sync_feed();
        Ok(report)
    }

    /// Rolls the working set back to its state before the review opened.
    pub fn cancel_resolution(&mut self) -> Result<(), CardBookError> {
        self.resolver.cancel(&mut self.working)?;
        self.sync_feed();
        Ok(())
    }

    /// Captures the person at `person_index` of `company` for editing.
    pub fn begin_edit(
        &self,
        company: &str,
        person_index: usize,
    ) -> Result<EditTarget, CardBookError> {
        Ok(EditTarget::capture(&self.working, company, person_index)?)
    }

    pub fn apply_edit(
        &mut self,
        target: &EditTarget,
        form: &EditForm,
    ) -> Result<EditOutcome, CardBookError> {
        self.ensure_idle()?;
        self.sync_feed();
        Ok(apply_edit(
            &mut self.working,
            self.store.as_ref(),
            target,
            form,
        )?)
    }

    pub fn delete_person(&mut self, target: &EditTarget) -> Result<Persisted, CardBookError> {
        self.ensure_idle()?;
        self.sync_feed();
        Ok(delete_person(
            &mut self.working,
            self.store.as_ref(),
            target,
        )?)
    }

    pub fn search(&self, query: &str) -> Vec<CompanyGroup> {
        filter_groups(self.working.groups(), query)
    }

    fn ensure_idle(&self) -> Result<(), CardBookError> {
        if self.resolver.is_reviewing() {
            return Err(ResolverError::SessionActive.into());
        }
        Ok(())
    }
}

impl Drop for CardBookService {
    fn drop(&mut self) {
        if let Err(err) = self.store.unsubscribe(self.subscription) {
            warn!("event=feed_unsubscribe module=service status=error error={err}");
        }
    }
}
