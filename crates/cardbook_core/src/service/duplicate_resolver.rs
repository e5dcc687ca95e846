//! Duplicate resolution session.
//!
//! # Responsibility
//! - Hold the conflict list, a backup of the working set and the set of
//!   groups awaiting persistence for one review session.
//! - Apply per-entry merge/discard decisions in place and commit or roll
//!   back the whole batch.
//!
//! # Invariants
//! - At most one session is open; `open` while reviewing is rejected.
//! - A resolved entry's slot becomes `None`; indexes of other entries are
//!   stable for the session lifetime.
//! - The backup is a deep copy and is only discarded after a fully
//!   successful commit or a cancel.
//! - A group leaves the modified set only once its save/delete is confirmed.

use crate::merge::duplicate::{DuplicateAction, DuplicateEntry, IncomingPerson};
use crate::model::company_group::{CompanyGroup, GroupId, GroupKey};
use crate::model::normalize_key;
use crate::model::person::Person;
use crate::model::working_set::{PersonRef, WorkingSet};
use crate::repo::record_store::{RecordStore, StoreError};
use log::{error, info, warn};
use std::collections::{BTreeSet, HashMap};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Resolver state-machine error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolverError {
    /// A session is already open; commit or cancel it first.
    SessionActive,
    /// No session is open.
    NoSession,
    IndexOutOfRange(usize),
    AlreadyResolved(usize),
    /// A record referenced by the entry is no longer in the working set.
    StaleEntry(usize),
}

impl Display for ResolverError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SessionActive => {
                write!(f, "a duplicate review is already open; save or cancel it first")
            }
            Self::NoSession => write!(f, "no duplicate review is open"),
            Self::IndexOutOfRange(index) => write!(f, "duplicate #{index} does not exist"),
            Self::AlreadyResolved(index) => write!(f, "duplicate #{index} is already resolved"),
            Self::StaleEntry(index) => {
                write!(f, "duplicate #{index} refers to a record that no longer exists")
            }
        }
    }
}

impl Error for ResolverError {}

/// One group whose save or delete failed during commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitFailure {
    pub group: GroupKey,
    pub company: String,
    pub error: String,
}

/// Per-group outcome of a commit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitReport {
    pub saved: Vec<(GroupKey, GroupId)>,
    pub deleted: Vec<GroupKey>,
    pub failures: Vec<CommitFailure>,
}

impl CommitReport {
    /// Returns whether every pending group was persisted.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// One-line summary suitable for a user-facing message.
    pub fn summary(&self) -> String {
        if self.is_complete() {
            return format!(
                "saved {} group(s), deleted {} group(s)",
                self.saved.len(),
                self.deleted.len()
            );
        }
        let companies = self
            .failures
            .iter()
            .map(|failure| failure.company.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "{} of {} group(s) failed to save: {}",
            self.failures.len(),
            self.failures.len() + self.saved.len() + self.deleted.len(),
            companies
        )
    }
}

/// Borrowed view of one unresolved entry for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DuplicatePreview<'a> {
    pub index: usize,
    pub existing: &'a Person,
    pub incoming: &'a Person,
    pub company_a: &'a str,
    pub company_b: &'a str,
}

struct ReviewSession {
    entries: Vec<Option<DuplicateEntry>>,
    backup: Vec<CompanyGroup>,
    modified: BTreeSet<GroupKey>,
}

enum CommitOp {
    Save(CompanyGroup),
    Delete(Option<GroupId>),
}

enum CommitOutcome {
    Saved(GroupId),
    Deleted,
}

/// Stateful duplicate resolver (`Idle` when no session is held).
#[derive(Default)]
pub struct DuplicateResolver {
    session: Option<ReviewSession>,
}

impl DuplicateResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_reviewing(&self) -> bool {
        self.session.is_some()
    }

    /// Opens a review session over `duplicates`, backing up `working`.
    ///
    /// Returns the number of entries under review.
    pub fn open(
        &mut self,
        duplicates: Vec<DuplicateEntry>,
        working: &WorkingSet,
    ) -> Result<usize, ResolverError> {
        if self.session.is_some() {
            return Err(ResolverError::SessionActive);
        }

        let count = duplicates.len();
        self.session = Some(ReviewSession {
            entries: duplicates.into_iter().map(Some).collect(),
            backup: working.snapshot(),
            modified: BTreeSet::new(),
        });
        info!("event=review_open module=resolver status=ok duplicates={count}");
        Ok(count)
    }

    /// All entry slots of the open session; resolved slots are `None`.
    pub fn entries(&self) -> &[Option<DuplicateEntry>] {
        match &self.session {
            Some(session) => &session.entries,
            None => &[],
        }
    }

    /// Unresolved entries with their stable indexes.
    pub fn pending(&self) -> impl Iterator<Item = (usize, &DuplicateEntry)> + '_ {
        self.entries()
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| slot.as_ref().map(|entry| (index, entry)))
    }

    pub fn pending_count(&self) -> usize {
        self.pending().count()
    }

    /// Groups changed in memory and not yet confirmed by the store.
    pub fn modified_groups(&self) -> Vec<GroupKey> {
        self.session
            .as_ref()
            .map(|session| session.modified.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Display data for one unresolved entry.
    pub fn preview<'a>(
        &'a self,
        index: usize,
        working: &'a WorkingSet,
    ) -> Option<DuplicatePreview<'a>> {
        let entry = self.entries().get(index)?.as_ref()?;
        Some(DuplicatePreview {
            index,
            existing: working.person(entry.existing)?,
            incoming: entry.incoming_person(working)?,
            company_a: &entry.display_company_a,
            company_b: &entry.display_company_b,
        })
    }

    /// Applies one decision in place and retires the entry's slot.
    pub fn resolve_one(
        &mut self,
        index: usize,
        action: DuplicateAction,
        working: &mut WorkingSet,
    ) -> Result<(), ResolverError> {
        let session = self.session.as_mut().ok_or(ResolverError::NoSession)?;
        let entry = session
            .entries
            .get(index)
            .ok_or(ResolverError::IndexOutOfRange(index))?
            .as_ref()
            .ok_or(ResolverError::AlreadyResolved(index))?
            .clone();

        if working.person(entry.existing).is_none() {
            return Err(ResolverError::StaleEntry(index));
        }
        if let IncomingPerson::Stored(at) = &entry.incoming {
            if working.person(*at).is_none() {
                return Err(ResolverError::StaleEntry(index));
            }
        }

        if action == DuplicateAction::Merge {
            let incoming = entry
                .incoming_person(working)
                .cloned()
                .ok_or(ResolverError::StaleEntry(index))?;
            let existing = working
                .person_mut(entry.existing)
                .ok_or(ResolverError::StaleEntry(index))?;
            existing.combine_from(&incoming);
            session.modified.insert(entry.existing.group);
        }

        if let IncomingPerson::Stored(at) = entry.incoming {
            remove_occurrence(working, at).ok_or(ResolverError::StaleEntry(index))?;
            session.modified.insert(at.group);
        }

        session.entries[index] = None;
        info!(
            "event=review_resolve module=resolver status=ok index={index} action={:?} modified_groups={}",
            action,
            session.modified.len()
        );
        Ok(())
    }

    /// Persists every modified group concurrently.
    ///
    /// Empty groups are deleted (remote delete only when they have an id) and
    /// removed from `working`; others are saved and receive their assigned id.
    /// On full success the session closes. Otherwise the session stays open
    /// with only the failed groups pending and the backup kept, so the caller
    /// can retry `commit` or `cancel`.
    pub fn commit(
        &mut self,
        working: &mut WorkingSet,
        store: &dyn RecordStore,
    ) -> Result<CommitReport, ResolverError> {
        let session = self.session.as_mut().ok_or(ResolverError::NoSession)?;

        let mut ops: Vec<(GroupKey, String, CommitOp)> = Vec::new();
        let mut vanished: Vec<GroupKey> = Vec::new();
        for key in &session.modified {
            match working.group(*key) {
                Some(group) if group.is_empty() => {
                    ops.push((*key, group.company.clone(), CommitOp::Delete(group.id.clone())))
                }
                Some(group) => {
                    ops.push((*key, group.company.clone(), CommitOp::Save(group.clone())))
                }
                None => vanished.push(*key),
            }
        }
        for key in vanished {
            session.modified.remove(&key);
        }

        let outcomes = run_concurrently(&ops, store);

        let mut report = CommitReport::default();
        for ((key, company, _), outcome) in ops.iter().zip(outcomes) {
            match outcome {
                Ok(CommitOutcome::Saved(id)) => {
                    if let Some(group) = working.group_mut(*key) {
                        group.id = Some(id.clone());
                    }
                    session.modified.remove(key);
                    report.saved.push((*key, id));
                }
                Ok(CommitOutcome::Deleted) => {
                    working.remove_group(*key);
                    session.modified.remove(key);
                    report.deleted.push(*key);
                }
                Err(err) => {
                    error!(
                        "event=review_commit module=resolver status=error group_key={key} error={err}"
                    );
                    report.failures.push(CommitFailure {
                        group: *key,
                        company: company.clone(),
                        error: err,
                    });
                }
            }
        }

        if report.is_complete() {
            self.session = None;
            info!(
                "event=review_commit module=resolver status=ok saved={} deleted={}",
                report.saved.len(),
                report.deleted.len()
            );
        } else {
            warn!(
                "event=review_commit module=resolver status=partial saved={} deleted={} failed={}",
                report.saved.len(),
                report.deleted.len(),
                report.failures.len()
            );
        }
        Ok(report)
    }

    /// Restores `working` from the backup and closes the session.
    ///
    /// No store calls are made.
    pub fn cancel(&mut self, working: &mut WorkingSet) -> Result<(), ResolverError> {
        let session = self.session.take().ok_or(ResolverError::NoSession)?;
        let discarded = session.modified.len();
        working.replace_all(session.backup);
        info!("event=review_cancel module=resolver status=ok discarded_groups={discarded}");
        Ok(())
    }
}

/// Finds repeated person names across the whole working set.
///
/// The first occurrence of a name (working-set order) is the anchor; every
/// later occurrence yields one entry against it. Blank names are ignored.
pub fn scan_for_duplicates(working: &WorkingSet) -> Vec<DuplicateEntry> {
    let mut order: Vec<String> = Vec::new();
    let mut occurrences: HashMap<String, Vec<(PersonRef, &str)>> = HashMap::new();

    for group in working.groups().iter().filter(|group| !group.is_placeholder()) {
        for person in &group.people {
            let name = normalize_key(&person.name);
            if name.is_empty() {
                continue;
            }
            let at = PersonRef {
                group: group.key,
                person: person.key,
            };
            occurrences
                .entry(name.clone())
                .or_insert_with(|| {
                    order.push(name);
                    Vec::new()
                })
                .push((at, group.company.as_str()));
        }
    }

    let mut duplicates = Vec::new();
    for name in &order {
        let Some(found) = occurrences.get(name) else {
            continue;
        };
        let Some(((anchor, anchor_company), rest)) = found.split_first() else {
            continue;
        };
        for (candidate, candidate_company) in rest {
            duplicates.push(DuplicateEntry {
                company_name: anchor_company.to_string(),
                existing: *anchor,
                incoming: IncomingPerson::Stored(*candidate),
                display_company_a: anchor_company.to_string(),
                display_company_b: candidate_company.to_string(),
            });
        }
    }

    info!(
        "event=duplicate_scan module=resolver status=ok people={} duplicates={}",
        working.person_count(),
        duplicates.len()
    );
    duplicates
}

fn remove_occurrence(working: &mut WorkingSet, at: PersonRef) -> Option<Person> {
    working.group_mut(at.group)?.remove_person(at.person)
}

fn run_concurrently(
    ops: &[(GroupKey, String, CommitOp)],
    store: &dyn RecordStore,
) -> Vec<Result<CommitOutcome, String>> {
    std::thread::scope(|scope| {
        let handles: Vec<_> = ops
            .iter()
            .map(|(_, _, op)| scope.spawn(move || apply_op(op, store)))
            .collect();
        handles
            .into_iter()
            .map(|handle| {
                handle
                    .join()
                    .unwrap_or_else(|_| Err("persistence task panicked".to_string()))
            })
            .collect()
    })
}

fn apply_op(op: &CommitOp, store: &dyn RecordStore) -> Result<CommitOutcome, String> {
    let result: Result<CommitOutcome, StoreError> = match op {
        CommitOp::Save(group) => store.save(group).map(CommitOutcome::Saved),
        CommitOp::Delete(Some(id)) => store.delete(id).map(|()| CommitOutcome::Deleted),
        CommitOp::Delete(None) => Ok(CommitOutcome::Deleted),
    };
    result.map_err(|err| err.to_string())
}
