use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use vellum_chain::{
    ChainConfig, CollectionTarget, HistoryResult, LiveRecord, PatchOptions, PatchOutcome,
    ReconcileOptions, ReconcileSummary, Reconciler, Reconstructor, RevisionInfo, WriteCoordinator,
};
use vellum_store::{DocumentStore, MemoryStore};
use vellum_types::{Fields, Filter, Stamp, VersionTag};

/// Handle on one tracked collection.
///
/// Wraps a shared store with the collection's configuration and routes
/// every operation through the history engine, so each write leaves a
/// delta behind and any past state stays reachable. Clones share the
/// same store.
pub struct Collection<S> {
    store: Arc<S>,
    target: CollectionTarget,
    config: ChainConfig,
}

impl<S: DocumentStore> Collection<S> {
    /// Open a collection handle over a shared store.
    ///
    /// Validates `config` once here; the per-operation revalidation in the
    /// engine then never fires for a handle built this way.
    pub fn new(store: Arc<S>, name: &str, config: ChainConfig) -> HistoryResult<Self> {
        config.validate()?;
        let target = CollectionTarget::for_collection(name);
        debug!(live = %target.live, deltas = %target.deltas, "collection opened");
        Ok(Self {
            store,
            target,
            config,
        })
    }

    // ---- Write operations ----

    /// Write one document, creating or extending its chain.
    pub fn patch_one(&self, doc: &Fields, opts: &PatchOptions) -> HistoryResult<PatchOutcome> {
        WriteCoordinator::patch_one(&*self.store, &self.target, &self.config, doc, opts)
    }

    /// Soft-delete the document addressed by the primary key in `doc`.
    ///
    /// Returns the flagged live record, or `None` when no tracked document
    /// is there or it is already deleted.
    pub fn soft_delete(
        &self,
        doc: &Fields,
        metadata: Option<Value>,
    ) -> HistoryResult<Option<LiveRecord>> {
        WriteCoordinator::soft_delete(&*self.store, &self.target, &self.config, doc, metadata)
    }

    /// Apply a whole batch, optionally sweeping documents missing from it
    /// into soft deletion.
    pub fn reconcile(
        &self,
        docs: &[Fields],
        opts: &ReconcileOptions,
    ) -> HistoryResult<ReconcileSummary> {
        Reconciler::reconcile(&*self.store, &self.target, &self.config, docs, opts)
    }

    // ---- Current-state reads ----

    /// Fetch the first tracked document matching `filter`.
    ///
    /// Soft-deleted documents are returned; documents that exist in the
    /// collection but were never written through the engine are not.
    pub fn find_one(&self, filter: &Filter) -> HistoryResult<Option<LiveRecord>> {
        for doc in self.store.find(&self.target.live, filter)? {
            if doc.fields.contains_key(&self.config.metadata_key) {
                let live = LiveRecord::from_document(doc, &self.config.metadata_key)?;
                return Ok(Some(live));
            }
        }
        Ok(None)
    }

    /// Fetch every tracked document matching `filter`, deleted ones included.
    pub fn find(&self, filter: &Filter) -> HistoryResult<Vec<LiveRecord>> {
        let mut records = Vec::new();
        for doc in self.store.find(&self.target.live, filter)? {
            if doc.fields.contains_key(&self.config.metadata_key) {
                records.push(LiveRecord::from_document(doc, &self.config.metadata_key)?);
            }
        }
        Ok(records)
    }

    // ---- Historical reads ----

    /// Reconstruct the document's fields as they stood at `at`.
    pub fn revision_at(&self, live: &LiveRecord, at: Stamp) -> HistoryResult<Fields> {
        Reconstructor::revision_at(&*self.store, &self.target, &self.config, live, at)
    }

    /// Reconstruct the fields a specific recorded version carried.
    pub fn revision_by_version(
        &self,
        live: &LiveRecord,
        version: VersionTag,
    ) -> HistoryResult<Fields> {
        Reconstructor::revision_by_version(&*self.store, &self.target, &self.config, live, version)
    }

    /// List the document's recorded revisions, newest first.
    pub fn revisions(&self, live: &LiveRecord) -> HistoryResult<Vec<RevisionInfo>> {
        Reconstructor::revisions(&*self.store, &self.target, &self.config, live)
    }

    // ---- Accessors ----

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &ChainConfig {
        &self.config
    }

    pub fn target(&self) -> &CollectionTarget {
        &self.target
    }
}

impl Collection<MemoryStore> {
    /// Open a collection over a fresh in-memory store.
    pub fn in_memory(name: &str, config: ChainConfig) -> HistoryResult<Self> {
        Self::new(Arc::new(MemoryStore::new()), name, config)
    }
}

impl<S> Clone for Collection<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            target: self.target.clone(),
            config: self.config.clone(),
        }
    }
}

impl<S> std::fmt::Debug for Collection<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collection")
            .field("target", &self.target)
            .field("config", &self.config)
            .finish()
    }
}
