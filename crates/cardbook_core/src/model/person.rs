//! Person (one scanned business card) domain model.
//!
//! # Responsibility
//! - Define the contact record extracted from one card.
//! - Provide the field-level combine rule used by duplicate merges.
//!
//! # Invariants
//! - `key` identifies this occurrence; equal names do not imply equal keys.
//! - `phones` keeps insertion order; `combine_from` never introduces a
//!   repeated phone string.

use super::{lenient, normalize_key};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

/// Surrogate identity of one person occurrence.
///
/// Used for identity-based removal when several occurrences share a name.
pub type PersonKey = Uuid;

/// Contact record extracted from a business card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    /// Generated when absent in input.
    #[serde(default = "Uuid::new_v4", deserialize_with = "key_or_new")]
    pub key: PersonKey,
    #[serde(default, deserialize_with = "lenient")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient")]
    pub title: String,
    #[serde(default, deserialize_with = "lenient")]
    pub email: String,
    /// Model output may give a bare string for a single number.
    #[serde(default, deserialize_with = "phone_list")]
    pub phones: Vec<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl Person {
    /// Creates a person with a fresh key and only the name set.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            key: Uuid::new_v4(),
            name: name.into(),
            title: String::new(),
            email: String::new(),
            phones: Vec::new(),
            address: String::new(),
            note: None,
        }
    }

    /// Builder helper for phones, mostly used by callers assembling fixtures.
    pub fn with_phones<I, S>(mut self, phones: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.phones = phones.into_iter().map(Into::into).collect();
        self
    }

    /// Normalized matching key for this person.
    pub fn match_key(&self) -> String {
        normalize_key(&self.name)
    }

    /// Returns whether both records describe the same person.
    pub fn same_person(&self, other: &Person) -> bool {
        self.match_key() == other.match_key()
    }

    /// Folds `other` into `self` for a duplicate merge.
    ///
    /// - `phones` becomes the ordered union: own phones first, then phones of
    ///   `other` not yet present.
    /// - Scalar fields keep their value when non-empty, otherwise take the
    ///   value from `other`.
    /// - `key` and `name` are left untouched.
    pub fn combine_from(&mut self, other: &Person) {
        self.phones = phone_union(&self.phones, &other.phones);
        fill_if_empty(&mut self.title, &other.title);
        fill_if_empty(&mut self.email, &other.email);
        fill_if_empty(&mut self.address, &other.address);
        let has_note = self
            .note
            .as_deref()
            .is_some_and(|note| !note.trim().is_empty());
        if !has_note && other.note.is_some() {
            self.note = other.note.clone();
        }
    }

    /// Replaces all data fields with `other` while keeping this occurrence key.
    pub fn overwrite_with(&mut self, other: &Person) {
        let key = self.key;
        *self = other.clone();
        self.key = key;
    }
}

/// Ordered set union of two phone lists.
pub fn phone_union(existing: &[String], incoming: &[String]) -> Vec<String> {
    let mut merged: Vec<String> = Vec::with_capacity(existing.len() + incoming.len());
    for phone in existing.iter().chain(incoming) {
        if !merged.contains(phone) {
            merged.push(phone.clone());
        }
    }
    merged
}

fn fill_if_empty(target: &mut String, fallback: &str) {
    if target.trim().is_empty() && !fallback.is_empty() {
        *target = fallback.to_string();
    }
}

fn key_or_new<'de, D>(deserializer: D) -> Result<PersonKey, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<PersonKey>::deserialize(deserializer)?.unwrap_or_else(Uuid::new_v4))
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PhoneField {
    One(String),
    Many(Vec<String>),
}

fn phone_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<PhoneField>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(PhoneField::One(phone)) => {
            let phone = phone.trim();
            if phone.is_empty() {
                Vec::new()
            } else {
                vec![phone.to_string()]
            }
        }
        Some(PhoneField::Many(phones)) => phones,
    })
}
