//! Local-edit reconciler for single-record edits and deletes.
//!
//! # Responsibility
//! - Parse edit-form input into a person record.
//! - Apply rename/move/replace edits through the same name-match upsert the
//!   merge engine uses, then persist the touched groups.
//!
//! # Invariants
//! - The edit target is re-resolved by person key at apply time; a captured
//!   index is never trusted on its own.
//! - A group emptied by an edit is deleted, never saved empty.
//! - On a store failure the working set is restored to its pre-edit state.

use crate::merge::engine::{persist_group, Persisted};
use crate::model::company_group::{CompanyGroup, GroupKey};
use crate::model::normalize_key;
use crate::model::person::{Person, PersonKey};
use crate::model::working_set::WorkingSet;
use crate::repo::record_store::{RecordStore, StoreError};
use log::{debug, info};
use once_cell::sync::Lazy;
use regex::Regex;
use std::error::Error;
use std::fmt::{Display, Formatter};

static PHONE_SEPARATOR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[,，]").expect("valid phone separator regex"));

/// Raw edit-form submission. All fields are free text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditForm {
    pub company: String,
    pub name: String,
    pub title: String,
    pub email: String,
    /// Comma or full-width comma separated phone numbers.
    pub phone: String,
    pub address: String,
    pub note: String,
}

impl EditForm {
    /// Prefills a form from an existing record.
    pub fn from_person(company: &str, person: &Person) -> Self {
        Self {
            company: company.to_string(),
            name: person.name.clone(),
            title: person.title.clone(),
            email: person.email.clone(),
            phone: person.phones.join(", "),
            address: person.address.clone(),
            note: person.note.clone().unwrap_or_default(),
        }
    }

    /// Trimmed target company name.
    pub fn company_name(&self) -> &str {
        self.company.trim()
    }

    /// Builds the edited record, keeping the occurrence `key`.
    pub fn to_person(&self, key: PersonKey) -> Person {
        let note = self.note.trim();
        Person {
            key,
            name: self.name.trim().to_string(),
            title: self.title.trim().to_string(),
            email: self.email.trim().to_string(),
            phones: parse_phone_list(&self.phone),
            address: self.address.trim().to_string(),
            note: (!note.is_empty()).then(|| note.to_string()),
        }
    }
}

/// Splits a phone field on `,`/`，`, trimming and dropping empty tokens.
pub fn parse_phone_list(input: &str) -> Vec<String> {
    PHONE_SEPARATOR_RE
        .split(input)
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect()
}

/// Person selected for editing, captured when the edit starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditTarget {
    pub original_company: String,
    pub person_index: usize,
    pub person_key: PersonKey,
}

impl EditTarget {
    /// Captures the person at `person_index` of the group named exactly
    /// `company`.
    pub fn capture(
        working: &WorkingSet,
        company: &str,
        person_index: usize,
    ) -> Result<Self, EditError> {
        let group = working
            .find_company_exact(company)
            .ok_or_else(|| EditError::CompanyNotFound(company.to_string()))?;
        let person = group
            .people
            .get(person_index)
            .ok_or_else(|| EditError::PersonNotFound {
                company: company.to_string(),
                index: person_index,
            })?;
        Ok(Self {
            original_company: group.company.clone(),
            person_index,
            person_key: person.key,
        })
    }
}

#[derive(Debug)]
pub enum EditError {
    CompanyNotFound(String),
    PersonNotFound { company: String, index: usize },
    /// The captured person no longer exists in the working set.
    StaleTarget(PersonKey),
    Store(StoreError),
}

impl Display for EditError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CompanyNotFound(company) => write!(f, "company not found: `{company}`"),
            Self::PersonNotFound { company, index } => {
                write!(f, "no person #{index} in company `{company}`")
            }
            Self::StaleTarget(key) => {
                write!(f, "the edited card {key} was changed or removed elsewhere")
            }
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

impl Error for EditError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Store(err) => Some(err),
            _ => None,
        }
    }
}

impl From<StoreError> for EditError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

/// Result of `apply_edit`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditOutcome {
    /// Replaced within its own group.
    InPlace(Persisted),
    /// Removed from the source company and upserted into another one.
    Moved { source: Persisted, target: Persisted },
}

/// Applies an edit-form submission to `target`.
///
/// The company is compared with the group the person currently sits in.
///
/// - Same company: the record is replaced in place; any other occurrence with
///   the same normalized name in that group is folded away. A company
///   differing only by case renames the group.
/// - Different company: the record is upserted into the group matching the
///   new company (created when absent) and saved, then removed from its old
///   group, which is deleted if it empties.
pub fn apply_edit(
    working: &mut WorkingSet,
    store: &dyn RecordStore,
    target: &EditTarget,
    form: &EditForm,
) -> Result<EditOutcome, EditError> {
    let (source_key, index) = locate(working, target)?;
    let before = working.snapshot();

    let result = apply_edit_at(working, store, target, form, source_key, index);
    if result.is_err() {
        working.replace_all(before);
    }
    result
}

/// Deletes the targeted person, deleting its group when it empties.
pub fn delete_person(
    working: &mut WorkingSet,
    store: &dyn RecordStore,
    target: &EditTarget,
) -> Result<Persisted, EditError> {
    let (group_key, index) = locate(working, target)?;
    let before = working.snapshot();

    if let Some(group) = working.group_mut(group_key) {
        group.people.remove(index);
    }
    match persist_group(working, group_key, store) {
        Ok(persisted) => {
            info!("event=person_delete module=edit status=ok");
            Ok(persisted)
        }
        Err(err) => {
            working.replace_all(before);
            Err(err.into())
        }
    }
}

fn apply_edit_at(
    working: &mut WorkingSet,
    store: &dyn RecordStore,
    target: &EditTarget,
    form: &EditForm,
    source_key: GroupKey,
    index: usize,
) -> Result<EditOutcome, EditError> {
    let new_company = form.company_name();
    let edited = form.to_person(target.person_key);

    let source = working
        .group_mut(source_key)
        .ok_or(EditError::StaleTarget(target.person_key))?;

    let stays =
        new_company == source.company || normalize_key(new_company) == source.match_key();
    if stays {
        if source.company != new_company {
            source.company = new_company.to_string();
        }
        replace_in_place(source, index, edited);
        let persisted = persist_group(working, source_key, store)?;
        info!("event=person_edit module=edit status=ok mode=in_place");
        return Ok(EditOutcome::InPlace(persisted));
    }

    // The target is saved before the source loses the person.
    let existing_key = working.find_company(new_company).map(|group| group.key);
    let target_key = match existing_key {
        Some(key) => key,
        None => working.push(CompanyGroup::new(new_company)),
    };
    if let Some(group) = working.group_mut(target_key) {
        group.upsert_person(edited);
    }
    let target_persisted = persist_group(working, target_key, store)?;

    if let Some(group) = working.group_mut(source_key) {
        group.remove_person(target.person_key);
    }
    let source_persisted = persist_group(working, source_key, store)?;

    info!("event=person_edit module=edit status=ok mode=moved");
    Ok(EditOutcome::Moved {
        source: source_persisted,
        target: target_persisted,
    })
}

fn replace_in_place(group: &mut CompanyGroup, index: usize, edited: Person) {
    let key = edited.key;
    let name = edited.match_key();
    group.people[index] = edited;
    group
        .people
        .retain(|person| person.key == key || person.match_key() != name);
}

fn locate(working: &WorkingSet, target: &EditTarget) -> Result<(GroupKey, usize), EditError> {
    for group in working.groups() {
        if let Some(index) = group.position_by_key(target.person_key) {
            if index != target.person_index || group.company != target.original_company {
                debug!(
                    "event=edit_target_moved module=edit status=ok captured_index={} current_index={}",
                    target.person_index, index
                );
            }
            return Ok((group.key, index));
        }
    }
    Err(EditError::StaleTarget(target.person_key))
}
