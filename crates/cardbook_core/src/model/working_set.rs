//! In-memory working set of company groups.
//!
//! # Responsibility
//! - Own the provisional local copy of all groups.
//! - Offer key-based lookups so components never hold long-lived borrows.
//!
//! # Invariants
//! - No two groups share a normalized company name.
//! - Local mutations are provisional; `replace_all` from the change feed is
//!   authoritative.

use super::company_group::{CompanyGroup, GroupKey};
use super::normalize_key;
use super::person::{Person, PersonKey};

/// Locates one person occurrence inside the working set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PersonRef {
    pub group: GroupKey,
    pub person: PersonKey,
}

/// Explicitly owned collection of company groups.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkingSet {
    groups: Vec<CompanyGroup>,
}

impl WorkingSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_groups(groups: Vec<CompanyGroup>) -> Self {
        Self { groups }
    }

    pub fn groups(&self) -> &[CompanyGroup] {
        &self.groups
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Total number of people across all groups.
    pub fn person_count(&self) -> usize {
        self.groups.iter().map(|group| group.people.len()).sum()
    }

    pub fn group(&self, key: GroupKey) -> Option<&CompanyGroup> {
        self.groups.iter().find(|group| group.key == key)
    }

    pub fn group_mut(&mut self, key: GroupKey) -> Option<&mut CompanyGroup> {
        self.groups.iter_mut().find(|group| group.key == key)
    }

    /// First non-placeholder group whose normalized company name matches.
    pub fn find_company(&self, company: &str) -> Option<&CompanyGroup> {
        let wanted = normalize_key(company);
        self.groups
            .iter()
            .find(|group| !group.is_placeholder() && group.match_key() == wanted)
    }

    /// Group whose company name equals `company` exactly.
    pub fn find_company_exact(&self, company: &str) -> Option<&CompanyGroup> {
        self.groups
            .iter()
            .find(|group| !group.is_placeholder() && group.company == company)
    }

    pub fn person(&self, at: PersonRef) -> Option<&Person> {
        self.group(at.group)?.person(at.person)
    }

    pub fn person_mut(&mut self, at: PersonRef) -> Option<&mut Person> {
        self.group_mut(at.group)?.person_mut(at.person)
    }

    /// Appends a group and returns its local key.
    pub fn push(&mut self, group: CompanyGroup) -> GroupKey {
        let key = group.key;
        self.groups.push(group);
        key
    }

    pub fn remove_group(&mut self, key: GroupKey) -> Option<CompanyGroup> {
        let index = self.groups.iter().position(|group| group.key == key)?;
        Some(self.groups.remove(index))
    }

    /// Deep, independent copy of every group.
    pub fn snapshot(&self) -> Vec<CompanyGroup> {
        self.groups.clone()
    }

    /// Replaces the whole set, e.g. from a backup or a change-feed push.
    pub fn replace_all(&mut self, groups: Vec<CompanyGroup>) {
        self.groups = groups;
    }
}
