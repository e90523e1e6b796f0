//! Field-level diff: compare a candidate field set against stored state.
//!
//! Field sets are represented as `BTreeMap<String, serde_json::Value>`.
//! Equality is structural and recursive: nested maps and arrays compare by
//! content, arrays by element order.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use vellum_types::Fields;

/// The result of comparing a candidate field set against a reference.
///
/// `added` carries the incoming values; `updated` and `removed` carry the
/// values the reference held before the change. Storing prior values on both
/// sides makes every diff losslessly invertible, which is what backward
/// revision reconstruction relies on.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDiff {
    /// Fields newly present in the candidate (field → new value).
    #[serde(default)]
    pub added: BTreeMap<String, Value>,
    /// Fields whose value changed (field → previous value).
    #[serde(default)]
    pub updated: BTreeMap<String, Value>,
    /// Fields that disappeared from the candidate (field → previous value).
    #[serde(default)]
    pub removed: BTreeMap<String, Value>,
}

impl FieldDiff {
    /// Create an empty diff.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if all three maps are empty.
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.updated.is_empty() && self.removed.is_empty()
    }

    /// Total number of changed fields.
    pub fn len(&self) -> usize {
        self.added.len() + self.updated.len() + self.removed.len()
    }

    /// Apply this diff forward, turning the reference state into the
    /// candidate state.
    ///
    /// `updated` stores previous values, so the post-change values are taken
    /// from `candidate`.
    pub fn apply_forward(&self, state: &mut Fields, candidate: &Fields) {
        for (key, value) in &self.added {
            state.insert(key.clone(), value.clone());
        }
        for key in self.updated.keys() {
            if let Some(value) = candidate.get(key) {
                state.insert(key.clone(), value.clone());
            }
        }
        for key in self.removed.keys() {
            state.remove(key);
        }
    }

    /// Apply this diff backward, turning the candidate state back into the
    /// reference state: drop the added fields, restore previous values for
    /// updated fields, reinsert the removed fields.
    pub fn apply_inverse(&self, state: &mut Fields) {
        for key in self.added.keys() {
            state.remove(key);
        }
        for (key, previous) in &self.updated {
            state.insert(key.clone(), previous.clone());
        }
        for (key, previous) in &self.removed {
            state.insert(key.clone(), previous.clone());
        }
    }
}

/// Compute the diff between a candidate field set and a reference field set.
///
/// Fields named in `ignore` are excluded from both sides before comparison.
/// Fields present only in `candidate` are added, fields present only in
/// `reference` are removed, and fields present in both with different values
/// are updated (keyed to the reference's value).
pub fn diff_fields(candidate: &Fields, reference: &Fields, ignore: &[String]) -> FieldDiff {
    let ignored = |key: &str| ignore.iter().any(|f| f == key);
    let mut diff = FieldDiff::new();

    for (key, new_val) in candidate {
        if ignored(key) {
            continue;
        }
        match reference.get(key) {
            Some(old_val) => {
                if old_val != new_val {
                    diff.updated.insert(key.clone(), old_val.clone());
                }
            }
            None => {
                diff.added.insert(key.clone(), new_val.clone());
            }
        }
    }

    for (key, old_val) in reference {
        if ignored(key) {
            continue;
        }
        if !candidate.contains_key(key) {
            diff.removed.insert(key.clone(), old_val.clone());
        }
    }

    diff
}
