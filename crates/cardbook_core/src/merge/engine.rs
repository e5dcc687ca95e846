//! Partition and clean-merge operations.

use super::duplicate::{DuplicateEntry, IncomingPerson};
use crate::model::company_group::{CompanyGroup, GroupId, GroupKey};
use crate::model::working_set::{PersonRef, WorkingSet};
use crate::repo::record_store::{RecordStore, StoreResult};
use log::{debug, info};

/// Result of splitting an extraction batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Partition {
    /// Wholly new companies, or single-person groups under an existing company.
    pub clean_data: Vec<CompanyGroup>,
    pub duplicates: Vec<DuplicateEntry>,
}

impl Partition {
    /// Number of people carried by `clean_data`.
    pub fn clean_person_count(&self) -> usize {
        self.clean_data.iter().map(|group| group.people.len()).sum()
    }
}

/// Outcome of `merge_clean`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
    pub people_merged: usize,
    /// Keys of groups that were persisted, in first-touch order.
    pub groups_saved: Vec<GroupKey>,
}

/// Outcome of persisting one working-set group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Persisted {
    Saved(GroupId),
    /// Group was empty; removed locally and deleted remotely when it had an id.
    Deleted(Option<GroupId>),
    /// Group key no longer present in the working set.
    Missing,
}

/// Splits `new_groups` into clean data and duplicates against `current`.
pub fn partition(new_groups: Vec<CompanyGroup>, current: &WorkingSet) -> Partition {
    let mut result = Partition::default();

    for incoming in new_groups {
        let Some(matched) = current.find_company(&incoming.company) else {
            result.clean_data.push(incoming);
            continue;
        };

        for person in incoming.people {
            match matched.position_by_name(&person.name) {
                Some(index) => result.duplicates.push(DuplicateEntry {
                    company_name: matched.company.clone(),
                    existing: PersonRef {
                        group: matched.key,
                        person: matched.people[index].key,
                    },
                    display_company_a: matched.company.clone(),
                    display_company_b: incoming.company.clone(),
                    incoming: IncomingPerson::Scanned {
                        person,
                        company: incoming.company.clone(),
                    },
                }),
                None => result
                    .clean_data
                    .push(CompanyGroup::with_people(matched.company.clone(), vec![person])),
            }
        }
    }

    debug!(
        "event=partition module=merge status=ok clean_groups={} clean_people={} duplicates={}",
        result.clean_data.len(),
        result.clean_person_count(),
        result.duplicates.len()
    );
    result
}

/// Upserts every clean group into the working set and persists touched groups.
///
/// Same-name people are replaced wholesale (no field-level merge). Applying the
/// same clean data twice yields the same person set.
///
/// # Errors
/// Returns the first store failure; groups persisted before it stay persisted
/// and retrying with the same data is safe.
pub fn merge_clean(
    clean_data: Vec<CompanyGroup>,
    working: &mut WorkingSet,
    store: &dyn RecordStore,
) -> StoreResult<MergeReport> {
    let mut report = MergeReport::default();

    for incoming in clean_data {
        if incoming.people.is_empty() {
            continue;
        }

        let existing_key = working
            .find_company(&incoming.company)
            .map(|group| group.key);
        let target_key = match existing_key {
            Some(key) => key,
            None => working.push(CompanyGroup::new(incoming.company.clone())),
        };
        let Some(target) = working.group_mut(target_key) else {
            continue;
        };

        report.people_merged += incoming.people.len();
        for person in incoming.people {
            target.upsert_person(person);
        }
        if !report.groups_saved.contains(&target_key) {
            report.groups_saved.push(target_key);
        }
    }

    for key in &report.groups_saved {
        persist_group(working, *key, store)?;
    }

    info!(
        "event=merge_clean module=merge status=ok people={} groups={}",
        report.people_merged,
        report.groups_saved.len()
    );
    Ok(report)
}

/// Saves one working-set group, or deletes it when it has no people.
///
/// A newly assigned id is written back to the working-set group.
pub fn persist_group(
    working: &mut WorkingSet,
    key: GroupKey,
    store: &dyn RecordStore,
) -> StoreResult<Persisted> {
    let Some(group) = working.group(key) else {
        return Ok(Persisted::Missing);
    };

    if group.is_empty() {
        let id = group.id.clone();
        if let Some(id) = &id {
            store.delete(id)?;
        }
        working.remove_group(key);
        return Ok(Persisted::Deleted(id));
    }

    let id = store.save(group)?;
    if let Some(group) = working.group_mut(key) {
        group.id = Some(id.clone());
    }
    Ok(Persisted::Saved(id))
}
