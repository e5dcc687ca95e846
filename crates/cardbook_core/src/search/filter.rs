//! Case-insensitive substring filter over company groups.
//!
//! # Invariants
//! - A company-name match returns the whole group unchanged.
//! - Otherwise only matching people are kept; groups with none are dropped.
//! - A blank query returns every group.

use crate::model::company_group::CompanyGroup;
use crate::model::person::Person;

/// Filters `groups` by `query`, preserving group and person order.
pub fn filter_groups(groups: &[CompanyGroup], query: &str) -> Vec<CompanyGroup> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return groups.to_vec();
    }

    groups
        .iter()
        .filter_map(|group| {
            if group.company.to_lowercase().contains(&needle) {
                return Some(group.clone());
            }
            let people: Vec<Person> = group
                .people
                .iter()
                .filter(|person| person_matches(person, &needle))
                .cloned()
                .collect();
            if people.is_empty() {
                return None;
            }
            let mut narrowed = group.clone();
            narrowed.people = people;
            Some(narrowed)
        })
        .collect()
}

fn person_matches(person: &Person, needle: &str) -> bool {
    let contains = |value: &str| value.to_lowercase().contains(needle);
    contains(&person.name)
        || contains(&person.title)
        || contains(&person.email)
        || contains(&person.address)
        || person.note.as_deref().is_some_and(|note| contains(note))
        || person.phones.iter().any(|phone| contains(phone))
}
