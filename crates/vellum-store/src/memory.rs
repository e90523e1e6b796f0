use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

use tracing::{debug, warn};

use vellum_types::{Fields, Filter, RecordId, Stamp};

use crate::clock::StoreClock;
use crate::document::Document;
use crate::error::{StoreError, StoreResult};
use crate::traits::{DocumentStore, DocumentTxn};

/// In-memory transactional document store.
///
/// Intended for tests and embedding. Committed state lives behind a
/// `RwLock`. Transactions read committed state, record each read as an
/// observation, buffer their writes, and revalidate every observation under
/// the write lock at commit: the first committer wins, the loser aborts
/// with [`StoreError::WriteConflict`].
pub struct MemoryStore {
    clock: StoreClock,
    inner: Arc<RwLock<StoreState>>,
}

#[derive(Default)]
struct StoreState {
    collections: HashMap<String, BTreeMap<RecordId, Versioned>>,
    commit_seq: u64,
}

#[derive(Clone)]
struct Versioned {
    fields: Fields,
    commit: u64,
}

impl StoreState {
    fn get(&self, collection: &str, id: &RecordId) -> Option<&Versioned> {
        self.collections.get(collection).and_then(|records| records.get(id))
    }

    fn commit_of(&self, collection: &str, id: &RecordId) -> Option<u64> {
        self.get(collection, id).map(|v| v.commit)
    }

    fn matching<'a>(
        &'a self,
        collection: &str,
        filter: &'a Filter,
    ) -> impl Iterator<Item = (&'a RecordId, &'a Versioned)> {
        self.collections
            .get(collection)
            .into_iter()
            .flat_map(|records| records.iter())
            .filter(move |(_, v)| filter.matches(&v.fields))
    }
}

impl MemoryStore {
    /// Create an empty store with node id 0.
    pub fn new() -> Self {
        Self::with_node_id(0)
    }

    /// Create an empty store whose clock stamps carry `node_id`.
    pub fn with_node_id(node_id: u16) -> Self {
        Self {
            clock: StoreClock::new(node_id),
            inner: Arc::new(RwLock::new(StoreState::default())),
        }
    }

    /// Number of committed records in a collection.
    pub fn len(&self, collection: &str) -> usize {
        self.inner
            .read()
            .expect("lock poisoned")
            .collections
            .get(collection)
            .map(|records| records.len())
            .unwrap_or(0)
    }

    /// Returns `true` if the collection holds no committed records.
    pub fn is_empty(&self, collection: &str) -> bool {
        self.len(collection) == 0
    }

    /// Sorted ids of all committed records in a collection.
    pub fn ids(&self, collection: &str) -> Vec<RecordId> {
        self.inner
            .read()
            .expect("lock poisoned")
            .collections
            .get(collection)
            .map(|records| records.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Remove a committed record directly, bypassing transactions.
    ///
    /// Test support for simulating external tampering; regular callers never
    /// delete records.
    pub fn remove(&self, collection: &str, id: &RecordId) -> bool {
        self.inner
            .write()
            .expect("lock poisoned")
            .collections
            .get_mut(collection)
            .map(|records| records.remove(id).is_some())
            .unwrap_or(false)
    }

    /// Drop all committed state.
    pub fn clear(&self) {
        let mut state = self.inner.write().expect("lock poisoned");
        state.collections.clear();
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentStore for MemoryStore {
    type Txn = MemoryTxn;

    fn begin(&self) -> StoreResult<MemoryTxn> {
        Ok(MemoryTxn {
            inner: Arc::clone(&self.inner),
            stamp: self.clock.now(),
            reads: Vec::new(),
            writes: Vec::new(),
        })
    }

    fn get(&self, collection: &str, id: &RecordId) -> StoreResult<Option<Document>> {
        let state = self.inner.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(state
            .get(collection, id)
            .map(|v| Document::new(id.clone(), v.fields.clone())))
    }

    fn find_one(&self, collection: &str, filter: &Filter) -> StoreResult<Option<Document>> {
        let state = self.inner.read().map_err(|_| StoreError::LockPoisoned)?;
        let found = state
            .matching(collection, filter)
            .next()
            .map(|(id, v)| Document::new(id.clone(), v.fields.clone()));
        Ok(found)
    }

    fn find(&self, collection: &str, filter: &Filter) -> StoreResult<Vec<Document>> {
        let state = self.inner.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(state
            .matching(collection, filter)
            .map(|(id, v)| Document::new(id.clone(), v.fields.clone()))
            .collect())
    }

    fn now(&self) -> Stamp {
        self.clock.now()
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.read().expect("lock poisoned");
        let record_count: usize = state.collections.values().map(|r| r.len()).sum();
        f.debug_struct("MemoryStore")
            .field("collections", &state.collections.len())
            .field("records", &record_count)
            .finish()
    }
}

/// Transaction handle for [`MemoryStore`].
pub struct MemoryTxn {
    inner: Arc<RwLock<StoreState>>,
    stamp: Stamp,
    reads: Vec<Observation>,
    writes: Vec<BufferedWrite>,
}

enum Observation {
    /// A point read by id, including the observed absence of the record.
    Point {
        collection: String,
        id: RecordId,
        commit: Option<u64>,
    },
    /// The first match for a filter, including the observed absence of one.
    First {
        collection: String,
        filter: Filter,
        observed: Option<(RecordId, u64)>,
    },
    /// The full result set of a filter read.
    All {
        collection: String,
        filter: Filter,
        observed: Vec<(RecordId, u64)>,
    },
}

impl Observation {
    fn validate(&self, state: &StoreState) -> StoreResult<()> {
        match self {
            Observation::Point { collection, id, commit } => {
                if state.commit_of(collection, id) != *commit {
                    return Err(StoreError::WriteConflict {
                        reason: format!(
                            "record changed concurrently: {collection}/{}",
                            id.short_id()
                        ),
                    });
                }
            }
            Observation::First { collection, filter, observed } => {
                let current = state
                    .matching(collection, filter)
                    .next()
                    .map(|(id, v)| (id.clone(), v.commit));
                if current != *observed {
                    return Err(StoreError::WriteConflict {
                        reason: format!("first match for filter changed in {collection}"),
                    });
                }
            }
            Observation::All { collection, filter, observed } => {
                let current: Vec<(RecordId, u64)> = state
                    .matching(collection, filter)
                    .map(|(id, v)| (id.clone(), v.commit))
                    .collect();
                if &current != observed {
                    return Err(StoreError::WriteConflict {
                        reason: format!("filter result set changed in {collection}"),
                    });
                }
            }
        }
        Ok(())
    }
}

enum BufferedWrite {
    Insert {
        collection: String,
        id: RecordId,
        fields: Fields,
    },
    Replace {
        collection: String,
        id: RecordId,
        fields: Fields,
    },
}

impl DocumentTxn for MemoryTxn {
    fn stamp(&self) -> Stamp {
        self.stamp
    }

    fn get(&mut self, collection: &str, id: &RecordId) -> StoreResult<Option<Document>> {
        let state = self.inner.read().map_err(|_| StoreError::LockPoisoned)?;
        let found = state
            .get(collection, id)
            .map(|v| (v.commit, v.fields.clone()));
        drop(state);

        self.reads.push(Observation::Point {
            collection: collection.to_string(),
            id: id.clone(),
            commit: found.as_ref().map(|(commit, _)| *commit),
        });
        Ok(found.map(|(_, fields)| Document::new(id.clone(), fields)))
    }

    fn find_one(&mut self, collection: &str, filter: &Filter) -> StoreResult<Option<Document>> {
        let state = self.inner.read().map_err(|_| StoreError::LockPoisoned)?;
        let found = state
            .matching(collection, filter)
            .next()
            .map(|(id, v)| (id.clone(), v.commit, v.fields.clone()));
        drop(state);

        self.reads.push(Observation::First {
            collection: collection.to_string(),
            filter: filter.clone(),
            observed: found.as_ref().map(|(id, commit, _)| (id.clone(), *commit)),
        });
        Ok(found.map(|(id, _, fields)| Document::new(id, fields)))
    }

    fn find(&mut self, collection: &str, filter: &Filter) -> StoreResult<Vec<Document>> {
        let state = self.inner.read().map_err(|_| StoreError::LockPoisoned)?;
        let found: Vec<(RecordId, u64, Fields)> = state
            .matching(collection, filter)
            .map(|(id, v)| (id.clone(), v.commit, v.fields.clone()))
            .collect();
        drop(state);

        self.reads.push(Observation::All {
            collection: collection.to_string(),
            filter: filter.clone(),
            observed: found.iter().map(|(id, commit, _)| (id.clone(), *commit)).collect(),
        });
        Ok(found
            .into_iter()
            .map(|(id, _, fields)| Document::new(id, fields))
            .collect())
    }

    fn insert(&mut self, collection: &str, fields: Fields) -> RecordId {
        let id = RecordId::new();
        self.writes.push(BufferedWrite::Insert {
            collection: collection.to_string(),
            id: id.clone(),
            fields,
        });
        id
    }

    fn replace(&mut self, collection: &str, id: &RecordId, fields: Fields) {
        self.writes.push(BufferedWrite::Replace {
            collection: collection.to_string(),
            id: id.clone(),
            fields,
        });
    }

    fn commit(self) -> StoreResult<()> {
        let mut state = self.inner.write().map_err(|_| StoreError::LockPoisoned)?;

        for observation in &self.reads {
            if let Err(conflict) = observation.validate(&state) {
                warn!(error = %conflict, "transaction aborted on conflict");
                return Err(conflict);
            }
        }

        // Every write must be applicable before any is applied.
        for write in &self.writes {
            match write {
                BufferedWrite::Insert { collection, id, .. } => {
                    if state.get(collection, id).is_some() {
                        return Err(StoreError::WriteConflict {
                            reason: format!("insert id already present: {collection}/{}", id.short_id()),
                        });
                    }
                }
                BufferedWrite::Replace { collection, id, .. } => {
                    if state.get(collection, id).is_none() {
                        return Err(StoreError::MissingRecord {
                            collection: collection.clone(),
                            id: id.to_string(),
                        });
                    }
                }
            }
        }

        state.commit_seq += 1;
        let commit = state.commit_seq;
        let write_count = self.writes.len();
        for write in self.writes {
            match write {
                BufferedWrite::Insert { collection, id, fields }
                | BufferedWrite::Replace { collection, id, fields } => {
                    state
                        .collections
                        .entry(collection)
                        .or_default()
                        .insert(id, Versioned { fields, commit });
                }
            }
        }

        debug!(commit, writes = write_count, "transaction committed");
        Ok(())
    }
}
