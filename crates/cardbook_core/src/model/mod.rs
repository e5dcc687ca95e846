//! Address-book domain model.
//!
//! # Responsibility
//! - Define the person/company records shared by scan, merge and edit flows.
//! - Own the matching key rules (`normalize_key`) used for identity.
//!
//! # Invariants
//! - Person and company identity for matching is the normalized name, never
//!   the surrogate keys.
//! - Surrogate keys (`PersonKey`, `GroupKey`) identify one occurrence and are
//!   never reused for another record.

pub mod company_group;
pub mod person;
pub mod settings;
pub mod working_set;

/// Normalizes a company or person name for matching.
///
/// Matching is case-insensitive after trimming surrounding whitespace.
pub fn normalize_key(value: &str) -> String {
    value.trim().to_lowercase()
}

/// Deserializes a field that may be missing or `null` in untrusted input.
pub(crate) fn lenient<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Default + serde::Deserialize<'de>,
{
    use serde::Deserialize;
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::normalize_key;

    #[test]
    fn normalize_key_trims_and_lowercases() {
        assert_eq!(normalize_key("  Acme Corp "), "acme corp");
        assert_eq!(normalize_key("ALICE"), normalize_key("alice"));
    }

    #[test]
    fn normalize_key_handles_blank_values() {
        assert_eq!(normalize_key("   "), "");
    }
}
