//! Duplicate entry model shared by the merge engine and the resolver.

use crate::model::company_group::CompanyGroup;
use crate::model::person::Person;
use crate::model::working_set::{PersonRef, WorkingSet};

/// User decision for one duplicate entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicateAction {
    /// Fold the incoming record into the existing one, then drop it.
    Merge,
    /// Drop the incoming record; the existing one is untouched.
    Discard,
}

/// The colliding side of a duplicate entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IncomingPerson {
    /// Freshly extracted and not yet part of the working set.
    Scanned { person: Person, company: String },
    /// Another occurrence already stored in the working set.
    Stored(PersonRef),
}

/// A detected name collision pending resolution.
///
/// Entries reference working-set records by key; resolving one mutates the
/// referenced records in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateEntry {
    /// Company of the existing record.
    pub company_name: String,
    /// The kept side.
    pub existing: PersonRef,
    pub incoming: IncomingPerson,
    /// Company shown for the kept side.
    pub display_company_a: String,
    /// Company shown for the incoming side; differs from
    /// `display_company_a` for cross-company duplicates.
    pub display_company_b: String,
}

impl DuplicateEntry {
    /// Returns whether both sides are filed under different companies.
    pub fn is_cross_company(&self) -> bool {
        self.display_company_a != self.display_company_b
    }

    /// Resolves the incoming record, either from the entry or the working set.
    pub fn incoming_person<'a>(&'a self, working: &'a WorkingSet) -> Option<&'a Person> {
        match &self.incoming {
            IncomingPerson::Scanned { person, .. } => Some(person),
            IncomingPerson::Stored(at) => working.person(*at),
        }
    }

    /// Group owning the incoming record, when it lives in the working set.
    pub fn incoming_group<'a>(&self, working: &'a WorkingSet) -> Option<&'a CompanyGroup> {
        match &self.incoming {
            IncomingPerson::Scanned { .. } => None,
            IncomingPerson::Stored(at) => working.group(at.group),
        }
    }
}
