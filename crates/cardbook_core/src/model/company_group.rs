//! Company group domain model.
//!
//! # Responsibility
//! - Group the people filed under one company.
//! - Provide the name-match upsert used by clean merges and manual edits.
//!
//! # Invariants
//! - `people` is unique by normalized name at every stable point.
//! - A group with zero people is never saved; it is deleted instead.
//! - `key` is local and never persisted; `id` is assigned by the record store.

use super::person::{Person, PersonKey};
use super::{lenient, normalize_key};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Document id assigned by the record store.
pub type GroupId = String;

/// Local surrogate identity of one group in the working set.
pub type GroupKey = Uuid;

/// Company name shown for records that could not be decoded.
pub const UNREADABLE_COMPANY: &str = "Error: record could not be decoded";

/// One company and its people.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyGroup {
    /// `None` until the group has been persisted once.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<GroupId>,
    #[serde(skip, default = "Uuid::new_v4")]
    pub key: GroupKey,
    #[serde(default, deserialize_with = "lenient")]
    pub company: String,
    #[serde(default, deserialize_with = "lenient")]
    pub people: Vec<Person>,
    /// Set only on placeholders for undecodable remote records.
    #[serde(skip)]
    pub load_error: Option<String>,
}

/// Result of a name-match upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    /// An existing occurrence with the same normalized name was overwritten.
    Replaced(PersonKey),
    /// No match; the person was appended.
    Appended(PersonKey),
}

impl CompanyGroup {
    /// Creates an unsaved group without people.
    pub fn new(company: impl Into<String>) -> Self {
        Self {
            id: None,
            key: Uuid::new_v4(),
            company: company.into(),
            people: Vec::new(),
            load_error: None,
        }
    }

    /// Creates an unsaved group holding `people` as given.
    pub fn with_people(company: impl Into<String>, people: Vec<Person>) -> Self {
        let mut group = Self::new(company);
        group.people = people;
        group
    }

    /// Placeholder for a stored record whose payload could not be decoded.
    pub fn unreadable(id: GroupId, error: impl Into<String>) -> Self {
        let mut group = Self::new(UNREADABLE_COMPANY);
        group.id = Some(id);
        group.load_error = Some(error.into());
        group
    }

    /// Returns whether this group is a load-error placeholder.
    pub fn is_placeholder(&self) -> bool {
        self.load_error.is_some()
    }

    /// Normalized matching key for the company name.
    pub fn match_key(&self) -> String {
        normalize_key(&self.company)
    }

    /// Returns whether `company` names this group under normalized matching.
    pub fn matches_company(&self, company: &str) -> bool {
        self.match_key() == normalize_key(company)
    }

    /// Index of the first person whose normalized name equals `name`'s.
    pub fn position_by_name(&self, name: &str) -> Option<usize> {
        let wanted = normalize_key(name);
        self.people
            .iter()
            .position(|person| person.match_key() == wanted)
    }

    /// Index of the occurrence identified by `key`.
    pub fn position_by_key(&self, key: PersonKey) -> Option<usize> {
        self.people.iter().position(|person| person.key == key)
    }

    pub fn person(&self, key: PersonKey) -> Option<&Person> {
        self.people.iter().find(|person| person.key == key)
    }

    pub fn person_mut(&mut self, key: PersonKey) -> Option<&mut Person> {
        self.people.iter_mut().find(|person| person.key == key)
    }

    /// Removes exactly the occurrence identified by `key`.
    ///
    /// Other occurrences sharing the same name are left in place.
    pub fn remove_person(&mut self, key: PersonKey) -> Option<Person> {
        let index = self.position_by_key(key)?;
        Some(self.people.remove(index))
    }

    /// Inserts `person`, overwriting a same-name occurrence when present.
    ///
    /// The overwritten occurrence keeps its key so outstanding references
    /// stay valid.
    pub fn upsert_person(&mut self, person: Person) -> Upsert {
        match self.position_by_name(&person.name) {
            Some(index) => {
                let slot = &mut self.people[index];
                slot.overwrite_with(&person);
                Upsert::Replaced(slot.key)
            }
            None => {
                let key = person.key;
                self.people.push(person);
                Upsert::Appended(key)
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.people.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::{CompanyGroup, Upsert};
    use crate::model::person::Person;

    #[test]
    fn upsert_overwrites_by_normalized_name() {
        let mut group = CompanyGroup::with_people("Acme", vec![Person::new("Alice")]);
        let original_key = group.people[0].key;

        let outcome = group.upsert_person(Person::new(" alice ").with_phones(["999"]));
        assert_eq!(outcome, Upsert::Replaced(original_key));
        assert_eq!(group.people.len(), 1);
        assert_eq!(group.people[0].phones, vec!["999".to_string()]);
    }

    #[test]
    fn upsert_appends_unknown_names() {
        let mut group = CompanyGroup::with_people("Acme", vec![Person::new("Alice")]);
        let bob = Person::new("Bob");
        let bob_key = bob.key;

        assert_eq!(group.upsert_person(bob), Upsert::Appended(bob_key));
        assert_eq!(group.people.len(), 2);
    }

    #[test]
    fn remove_person_uses_identity_not_name() {
        let first = Person::new("Carl");
        let second = Person::new("carl");
        let second_key = second.key;
        let first_key = first.key;
        let mut group = CompanyGroup::with_people("A", vec![first, second]);

        let removed = group.remove_person(second_key).expect("second occurrence");
        assert_eq!(removed.key, second_key);
        assert_eq!(group.people.len(), 1);
        assert_eq!(group.people[0].key, first_key);
        assert!(group.remove_person(second_key).is_none());
    }

    #[test]
    fn matches_company_ignores_case_and_padding() {
        let group = CompanyGroup::new("Acme Corp");
        assert!(group.matches_company("  acme corp"));
        assert!(!group.matches_company("Acme"));
    }

    #[test]
    fn unreadable_placeholder_has_no_people() {
        let group = CompanyGroup::unreadable("doc-1".to_string(), "bad json");
        assert!(group.is_placeholder());
        assert!(group.is_empty());
        assert_eq!(group.id.as_deref(), Some("doc-1"));
    }
}
