//! Field-level validation accumulator.
//!
//! A [`Validator`] collects at most one message per field. Checks are run in
//! order and the first failing check for a field wins, so callers list the
//! most fundamental rule ("must be provided") before the finer ones.

use std::collections::{BTreeMap, HashSet};
use std::hash::Hash;

/// Collects validation errors keyed by field name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Validator {
    errors: BTreeMap<String, String>,
}

impl Validator {
    /// Creates an empty validator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true when no errors have been recorded.
    #[must_use]
    pub fn valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Records `message` for `field` unless the field already has an error.
    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors
            .entry(field.into())
            .or_insert_with(|| message.into());
    }

    /// Records `message` for `field` when `ok` is false.
    pub fn check(&mut self, ok: bool, field: &str, message: &str) {
        if !ok {
            self.add_error(field, message);
        }
    }

    /// Returns the recorded errors.
    #[must_use]
    pub const fn errors(&self) -> &BTreeMap<String, String> {
        &self.errors
    }

    /// Consumes the validator, returning the recorded errors.
    #[must_use]
    pub fn into_errors(self) -> BTreeMap<String, String> {
        self.errors
    }
}

/// Returns true if `value` is one of `permitted`.
pub fn permitted_value<T: PartialEq + ?Sized>(value: &T, permitted: &[&T]) -> bool {
    permitted.iter().any(|candidate| *candidate == value)
}

/// Returns true if every element of `values` is distinct.
pub fn unique<T: Eq + Hash>(values: &[T]) -> bool {
    let mut seen = HashSet::with_capacity(values.len());
    values.iter().all(|value| seen.insert(value))
}
