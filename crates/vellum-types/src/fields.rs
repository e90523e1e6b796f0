use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Schemaless document body: field name → JSON value.
///
/// Deep equality over `Value` (recursive for nested maps and arrays) is the
/// equality notion used everywhere a candidate is compared to stored state.
pub type Fields = BTreeMap<String, Value>;

/// Equality filter over top-level document fields.
///
/// A document matches when every `(field, value)` pair is present verbatim.
/// The empty filter matches every document.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filter(BTreeMap<String, Value>);

impl Filter {
    /// The empty filter.
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Add an equality condition, builder style.
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(field.into(), value.into());
        self
    }

    /// Add an equality condition in place.
    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(field.into(), value.into());
    }

    /// Returns `true` if `fields` satisfies every condition.
    pub fn matches(&self, fields: &Fields) -> bool {
        self.0.iter().all(|(k, v)| fields.get(k) == Some(v))
    }

    /// Returns `true` when no conditions are set.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of conditions.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Iterate over the conditions.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }
}

impl From<BTreeMap<String, Value>> for Filter {
    fn from(conditions: BTreeMap<String, Value>) -> Self {
        Self(conditions)
    }
}

impl FromIterator<(String, Value)> for Filter {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
