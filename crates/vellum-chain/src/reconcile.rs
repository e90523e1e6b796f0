use serde_json::Value;
use tracing::info;

use vellum_store::DocumentStore;
use vellum_types::{Fields, Filter};

use crate::chain::PatchOptions;
use crate::config::{ChainConfig, CollectionTarget};
use crate::error::HistoryResult;
use crate::records::LiveRecord;
use crate::writer::{PatchOutcome, WriteCoordinator};

/// Options for a batch reconciliation.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReconcileOptions {
    /// Soft-delete tracked documents that match `missing_filter` but are
    /// absent from the batch.
    pub missing_mark_deleted: bool,
    /// Scope of the missing-document sweep. `None` sweeps every tracked
    /// document in the collection.
    pub missing_filter: Option<Filter>,
    /// Record a delta for every batch document, changed or not.
    pub force: bool,
    /// Field names excluded from comparison on both sides.
    pub ignore_fields: Vec<String>,
    /// Caller metadata attached to every write this run performs.
    pub metadata: Option<Value>,
}

/// Tally of one reconciliation run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReconcileSummary {
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    pub unchanged: usize,
}

/// Applies one patch per batch document, then optionally sweeps documents
/// missing from the batch into soft deletion.
///
/// Each document is its own transaction; a conflict aborts the run and
/// leaves earlier documents committed. The caller re-runs to converge,
/// which is safe because unchanged documents write nothing.
pub struct Reconciler;

impl Reconciler {
    pub fn reconcile<S: DocumentStore>(
        store: &S,
        target: &CollectionTarget,
        config: &ChainConfig,
        docs: &[Fields],
        opts: &ReconcileOptions,
    ) -> HistoryResult<ReconcileSummary> {
        config.validate()?;

        // Resolve every primary key up front so a bad document aborts the
        // batch before any write happens.
        let mut batch_filters = Vec::with_capacity(docs.len());
        for doc in docs {
            batch_filters.push(config.pk_filter(doc)?);
        }

        let patch_opts = PatchOptions {
            force: opts.force,
            ignore_fields: opts.ignore_fields.clone(),
            metadata: opts.metadata.clone(),
        };

        let mut summary = ReconcileSummary::default();
        for doc in docs {
            match WriteCoordinator::patch_one(store, target, config, doc, &patch_opts)? {
                PatchOutcome::Created(_) => summary.created += 1,
                PatchOutcome::Updated(_) => summary.updated += 1,
                PatchOutcome::Unchanged(_) => summary.unchanged += 1,
            }
        }

        if opts.missing_mark_deleted {
            summary.deleted = Self::sweep_missing(store, target, config, &batch_filters, opts)?;
        }

        info!(
            created = summary.created,
            updated = summary.updated,
            deleted = summary.deleted,
            unchanged = summary.unchanged,
            "reconciliation finished"
        );
        Ok(summary)
    }

    /// Soft-delete every tracked document in scope that no batch document
    /// addresses. Returns how many were deleted.
    fn sweep_missing<S: DocumentStore>(
        store: &S,
        target: &CollectionTarget,
        config: &ChainConfig,
        batch_filters: &[Filter],
        opts: &ReconcileOptions,
    ) -> HistoryResult<usize> {
        let scope = opts.missing_filter.clone().unwrap_or_default();
        let mut deleted = 0;

        for doc in store.find(&target.live, &scope)? {
            // Documents never written through the engine carry no chain.
            if !doc.fields.contains_key(&config.metadata_key) {
                continue;
            }
            if batch_filters.iter().any(|f| f.matches(&doc.fields)) {
                continue;
            }
            let live = LiveRecord::from_document(doc, &config.metadata_key)?;
            if live.is_deleted() {
                continue;
            }
            // Primary-key fields always survive on a live record, so the
            // scan row itself addresses the document. The delete runs in
            // its own transaction and revalidates against current state.
            let removed = WriteCoordinator::soft_delete(
                store,
                target,
                config,
                &live.fields,
                opts.metadata.clone(),
            )?;
            if removed.is_some() {
                deleted += 1;
            }
        }
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;
    use serde_json::json;
    use vellum_store::{Document, DocumentTxn, MemoryStore, MemoryTxn, StoreError, StoreResult};
    use vellum_types::{RecordId, Stamp, VersionTag};

    use crate::error::HistoryError;
    use crate::records::{DeltaKind, DeltaRecord};

    fn config() -> ChainConfig {
        ChainConfig::new(["email"])
    }

    fn target() -> CollectionTarget {
        CollectionTarget::for_collection("users")
    }

    fn doc(email: &str, owner: &str, food: &str) -> Fields {
        let mut fields = Fields::new();
        fields.insert("email".into(), json!(email));
        fields.insert("owner".into(), json!(owner));
        fields.insert("food".into(), json!(food));
        fields
    }

    fn seed(store: &MemoryStore, fields: &Fields) -> LiveRecord {
        WriteCoordinator::patch_one(store, &target(), &config(), fields, &PatchOptions::default())
            .unwrap()
            .into_live()
    }

    fn live_of(store: &MemoryStore, email: &str) -> LiveRecord {
        let filter = Filter::new().with("email", email);
        LiveRecord::from_document(
            store.find_one("users", &filter).unwrap().expect("live record"),
            "__vellum",
        )
        .unwrap()
    }

    fn reconcile(
        store: &MemoryStore,
        docs: &[Fields],
        opts: &ReconcileOptions,
    ) -> HistoryResult<ReconcileSummary> {
        Reconciler::reconcile(store, &target(), &config(), docs, opts)
    }

    // -----------------------------------------------------------------------
    // Tallies
    // -----------------------------------------------------------------------

    #[test]
    fn batch_tallies_each_outcome() {
        let store = MemoryStore::new();
        seed(&store, &doc("b@x.com", "x", "pizza"));
        seed(&store, &doc("c@x.com", "x", "ramen"));

        let summary = reconcile(
            &store,
            &[
                doc("a@x.com", "x", "tacos"),   // new
                doc("b@x.com", "x", "pizza"),   // identical
                doc("c@x.com", "x", "noodles"), // changed
            ],
            &ReconcileOptions::default(),
        )
        .unwrap();

        assert_eq!(
            summary,
            ReconcileSummary {
                created: 1,
                updated: 1,
                deleted: 0,
                unchanged: 1,
            }
        );
    }

    #[test]
    fn empty_batch_is_a_noop() {
        let store = MemoryStore::new();
        let summary = reconcile(&store, &[], &ReconcileOptions::default()).unwrap();
        assert_eq!(summary, ReconcileSummary::default());
    }

    #[test]
    fn force_counts_identical_documents_as_updates() {
        let store = MemoryStore::new();
        seed(&store, &doc("a@x.com", "x", "pizza"));

        let opts = ReconcileOptions {
            force: true,
            ..ReconcileOptions::default()
        };
        let summary = reconcile(&store, &[doc("a@x.com", "x", "pizza")], &opts).unwrap();
        assert_eq!(summary.updated, 1);
        assert_eq!(summary.unchanged, 0);
    }

    // -----------------------------------------------------------------------
    // Missing-document sweep
    // -----------------------------------------------------------------------

    #[test]
    fn absent_documents_in_scope_are_soft_deleted() {
        let store = MemoryStore::new();
        seed(&store, &doc("a@x.com", "x", "pizza"));
        seed(&store, &doc("b@x.com", "x", "ramen"));
        seed(&store, &doc("c@x.com", "x", "sushi"));

        let opts = ReconcileOptions {
            missing_mark_deleted: true,
            missing_filter: Some(Filter::new().with("owner", "x")),
            metadata: Some(json!({"run": 42})),
            ..ReconcileOptions::default()
        };
        let summary = reconcile(
            &store,
            &[doc("a@x.com", "x", "pizza"), doc("b@x.com", "x", "ramen")],
            &opts,
        )
        .unwrap();
        assert_eq!(summary.deleted, 1);
        assert_eq!(summary.unchanged, 2);

        // The swept document stays present and queryable, flagged deleted.
        let swept = live_of(&store, "c@x.com");
        assert!(swept.is_deleted());
        assert_eq!(swept.fields["food"], json!("sushi"));
        assert_eq!(
            swept.envelope.deleted.as_ref().unwrap().metadata,
            Some(json!({"run": 42}))
        );

        let marker_doc = store
            .get("users_deltas", &swept.envelope.previous_delta)
            .unwrap()
            .unwrap();
        let marker = DeltaRecord::from_document(marker_doc, "__vellum").unwrap();
        assert_eq!(marker.envelope.kind, DeltaKind::DeleteMarker);

        // Batch members are untouched.
        assert!(!live_of(&store, "a@x.com").is_deleted());
        assert!(!live_of(&store, "b@x.com").is_deleted());
    }

    #[test]
    fn sweep_respects_the_scope_filter() {
        let store = MemoryStore::new();
        seed(&store, &doc("a@x.com", "x", "pizza"));
        seed(&store, &doc("z@x.com", "other", "stew"));

        let opts = ReconcileOptions {
            missing_mark_deleted: true,
            missing_filter: Some(Filter::new().with("owner", "x")),
            ..ReconcileOptions::default()
        };
        let summary = reconcile(&store, &[doc("a@x.com", "x", "pizza")], &opts).unwrap();

        assert_eq!(summary.deleted, 0);
        assert!(!live_of(&store, "z@x.com").is_deleted());
    }

    #[test]
    fn no_scope_filter_sweeps_the_whole_collection() {
        let store = MemoryStore::new();
        seed(&store, &doc("a@x.com", "x", "pizza"));
        seed(&store, &doc("z@x.com", "other", "stew"));

        let opts = ReconcileOptions {
            missing_mark_deleted: true,
            ..ReconcileOptions::default()
        };
        let summary = reconcile(&store, &[doc("a@x.com", "x", "pizza")], &opts).unwrap();

        assert_eq!(summary.deleted, 1);
        assert!(live_of(&store, "z@x.com").is_deleted());
    }

    #[test]
    fn sweep_skips_untracked_documents() {
        let store = MemoryStore::new();
        let mut txn = store.begin().unwrap();
        let raw_id = txn.insert("users", doc("raw@x.com", "x", "beans"));
        txn.commit().unwrap();

        let opts = ReconcileOptions {
            missing_mark_deleted: true,
            missing_filter: Some(Filter::new().with("owner", "x")),
            ..ReconcileOptions::default()
        };
        let summary = reconcile(&store, &[], &opts).unwrap();

        assert_eq!(summary.deleted, 0);
        let untouched = store.get("users", &raw_id).unwrap().unwrap();
        assert!(!untouched.fields.contains_key("__vellum"));
    }

    #[test]
    fn repeated_runs_do_not_recount_deletions() {
        let store = MemoryStore::new();
        seed(&store, &doc("c@x.com", "x", "sushi"));

        let opts = ReconcileOptions {
            missing_mark_deleted: true,
            missing_filter: Some(Filter::new().with("owner", "x")),
            ..ReconcileOptions::default()
        };
        let first = reconcile(&store, &[], &opts).unwrap();
        assert_eq!(first.deleted, 1);

        let second = reconcile(&store, &[], &opts).unwrap();
        assert_eq!(second.deleted, 0);
        assert_eq!(store.len("users_deltas"), 2);
    }

    #[test]
    fn swept_documents_reactivate_on_the_next_batch() {
        let store = MemoryStore::new();
        seed(&store, &doc("c@x.com", "x", "sushi"));

        let opts = ReconcileOptions {
            missing_mark_deleted: true,
            missing_filter: Some(Filter::new().with("owner", "x")),
            ..ReconcileOptions::default()
        };
        reconcile(&store, &[], &opts).unwrap();
        assert!(live_of(&store, "c@x.com").is_deleted());

        let summary = reconcile(&store, &[doc("c@x.com", "x", "sushi")], &opts).unwrap();
        assert_eq!(summary.updated, 1);

        let live = live_of(&store, "c@x.com");
        assert!(!live.is_deleted());
        assert_eq!(live.version(), VersionTag::new(1, 2));
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    #[test]
    fn bad_primary_key_aborts_before_any_write() {
        let store = MemoryStore::new();
        let mut missing_pk = Fields::new();
        missing_pk.insert("food".into(), json!("mystery"));

        let err = reconcile(
            &store,
            &[doc("a@x.com", "x", "pizza"), missing_pk],
            &ReconcileOptions::default(),
        )
        .unwrap_err();

        assert!(matches!(err, HistoryError::Configuration { .. }));
        assert!(store.is_empty("users"));
        assert!(store.is_empty("users_deltas"));
    }

    #[test]
    fn ignore_fields_flow_through_to_each_patch() {
        let store = MemoryStore::new();
        seed(&store, &doc("a@x.com", "x", "pizza"));

        let mut noisy = doc("a@x.com", "x", "pizza");
        noisy.insert("seen_at".into(), json!("2026-08-22T10:00:00Z"));

        let opts = ReconcileOptions {
            ignore_fields: vec!["seen_at".into()],
            ..ReconcileOptions::default()
        };
        let summary = reconcile(&store, &[noisy], &opts).unwrap();
        assert_eq!(summary.unchanged, 1);
    }

    // -----------------------------------------------------------------------
    // Mid-batch conflicts
    // -----------------------------------------------------------------------

    /// Delegates to a [`MemoryStore`] but fails every commit after the first
    /// `commits_left`, the way a concurrent writer winning the race would.
    struct ConflictingStore {
        inner: MemoryStore,
        commits_left: Arc<AtomicUsize>,
    }

    impl ConflictingStore {
        fn new(commits_left: usize) -> Self {
            Self {
                inner: MemoryStore::new(),
                commits_left: Arc::new(AtomicUsize::new(commits_left)),
            }
        }
    }

    impl DocumentStore for ConflictingStore {
        type Txn = ConflictingTxn;

        fn begin(&self) -> StoreResult<ConflictingTxn> {
            Ok(ConflictingTxn {
                inner: self.inner.begin()?,
                commits_left: Arc::clone(&self.commits_left),
            })
        }

        fn get(&self, collection: &str, id: &RecordId) -> StoreResult<Option<Document>> {
            self.inner.get(collection, id)
        }

        fn find_one(&self, collection: &str, filter: &Filter) -> StoreResult<Option<Document>> {
            self.inner.find_one(collection, filter)
        }

        fn find(&self, collection: &str, filter: &Filter) -> StoreResult<Vec<Document>> {
            self.inner.find(collection, filter)
        }

        fn now(&self) -> Stamp {
            self.inner.now()
        }
    }

    struct ConflictingTxn {
        inner: MemoryTxn,
        commits_left: Arc<AtomicUsize>,
    }

    impl DocumentTxn for ConflictingTxn {
        fn stamp(&self) -> Stamp {
            self.inner.stamp()
        }

        fn get(&mut self, collection: &str, id: &RecordId) -> StoreResult<Option<Document>> {
            self.inner.get(collection, id)
        }

        fn find_one(&mut self, collection: &str, filter: &Filter) -> StoreResult<Option<Document>> {
            self.inner.find_one(collection, filter)
        }

        fn find(&mut self, collection: &str, filter: &Filter) -> StoreResult<Vec<Document>> {
            self.inner.find(collection, filter)
        }

        fn insert(&mut self, collection: &str, fields: Fields) -> RecordId {
            self.inner.insert(collection, fields)
        }

        fn replace(&mut self, collection: &str, id: &RecordId, fields: Fields) {
            self.inner.replace(collection, id, fields)
        }

        fn commit(self) -> StoreResult<()> {
            if self.commits_left.load(Ordering::SeqCst) == 0 {
                return Err(StoreError::WriteConflict {
                    reason: "record changed concurrently".into(),
                });
            }
            self.commits_left.fetch_sub(1, Ordering::SeqCst);
            self.inner.commit()
        }
    }

    #[test]
    fn mid_batch_conflict_aborts_the_remainder() {
        let store = ConflictingStore::new(2);
        let batch = [
            doc("a@x.com", "x", "pizza"),
            doc("b@x.com", "x", "ramen"),
            doc("c@x.com", "x", "sushi"),
        ];

        let err = Reconciler::reconcile(
            &store,
            &target(),
            &config(),
            &batch,
            &ReconcileOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, HistoryError::Conflict { .. }));

        // The first two documents committed and stay committed; the third
        // never landed.
        assert_eq!(store.inner.len("users"), 2);
        assert_eq!(store.inner.len("users_deltas"), 2);
        assert!(store
            .inner
            .find_one("users", &Filter::new().with("email", "c@x.com"))
            .unwrap()
            .is_none());
    }
}
