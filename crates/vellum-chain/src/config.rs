use vellum_types::{Fields, Filter};

use crate::error::{HistoryError, HistoryResult};

/// Default key under which the metadata envelope is embedded in a record.
pub const DEFAULT_METADATA_KEY: &str = "__vellum";

/// Default number of revisions between full snapshots.
pub const DEFAULT_SNAPSHOT_INTERVAL: u32 = 5;

/// Per-collection configuration of the versioning engine.
///
/// Passed explicitly to every component; nothing is registered globally.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChainConfig {
    /// Field names whose values identify a logical document. Every document
    /// written through the engine must carry all of them.
    pub primary_key: Vec<String>,
    /// Key under which the metadata envelope lives inside a stored record.
    /// Must not collide with any business field name.
    pub metadata_key: String,
    /// A full snapshot is recorded once this many revisions accumulate
    /// since the last one.
    pub snapshot_interval: u32,
}

impl ChainConfig {
    /// Configuration with the default metadata key and snapshot interval.
    pub fn new<I, K>(primary_key: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        Self {
            primary_key: primary_key.into_iter().map(Into::into).collect(),
            metadata_key: DEFAULT_METADATA_KEY.to_string(),
            snapshot_interval: DEFAULT_SNAPSHOT_INTERVAL,
        }
    }

    /// Override the metadata envelope key.
    pub fn with_metadata_key(mut self, key: impl Into<String>) -> Self {
        self.metadata_key = key.into();
        self
    }

    /// Override the snapshot interval.
    pub fn with_snapshot_interval(mut self, interval: u32) -> Self {
        self.snapshot_interval = interval;
        self
    }

    /// Check the configuration is usable.
    pub fn validate(&self) -> HistoryResult<()> {
        if self.primary_key.is_empty() {
            return Err(HistoryError::Configuration {
                reason: "primary key field set is empty".into(),
            });
        }
        if self.primary_key.iter().any(|field| field.is_empty()) {
            return Err(HistoryError::Configuration {
                reason: "primary key contains an empty field name".into(),
            });
        }
        if self.metadata_key.is_empty() {
            return Err(HistoryError::Configuration {
                reason: "metadata key is empty".into(),
            });
        }
        if self.primary_key.iter().any(|field| *field == self.metadata_key) {
            return Err(HistoryError::Configuration {
                reason: format!("metadata key '{}' overlaps the primary key", self.metadata_key),
            });
        }
        if self.snapshot_interval == 0 {
            return Err(HistoryError::Configuration {
                reason: "snapshot interval must be at least 1".into(),
            });
        }
        Ok(())
    }

    /// Build the filter that addresses the logical document `fields` belongs
    /// to. Every primary-key field must resolve to a non-null value.
    pub fn pk_filter(&self, fields: &Fields) -> HistoryResult<Filter> {
        let mut filter = Filter::new();
        for key in &self.primary_key {
            match fields.get(key) {
                Some(value) if !value.is_null() => filter.insert(key.clone(), value.clone()),
                _ => {
                    return Err(HistoryError::Configuration {
                        reason: format!("primary key field '{key}' does not resolve on the document"),
                    })
                }
            }
        }
        Ok(filter)
    }
}

/// The pair of store collections one logical entity type occupies.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CollectionTarget {
    /// Collection holding the live records.
    pub live: String,
    /// Collection holding the append-only delta records.
    pub deltas: String,
}

impl CollectionTarget {
    /// Derive the live/delta collection pair from a base collection name.
    pub fn for_collection(name: &str) -> Self {
        Self {
            live: name.to_string(),
            deltas: format!("{name}_deltas"),
        }
    }
}
