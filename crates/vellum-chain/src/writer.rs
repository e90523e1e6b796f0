use serde_json::Value;
use tracing::debug;

use vellum_store::{DocumentStore, DocumentTxn, StoreError};
use vellum_types::Fields;

use crate::chain::{ChainManager, PatchOptions, WritePlan};
use crate::config::{ChainConfig, CollectionTarget};
use crate::error::{HistoryError, HistoryResult};
use crate::records::LiveRecord;

/// Outcome of a single patch write.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PatchOutcome {
    /// A new chain was rooted for this primary key.
    Created(LiveRecord),
    /// An entry was appended to an existing chain.
    Updated(LiveRecord),
    /// Empty diff without force; nothing was written.
    Unchanged(LiveRecord),
}

impl PatchOutcome {
    pub fn live(&self) -> &LiveRecord {
        match self {
            Self::Created(live) | Self::Updated(live) | Self::Unchanged(live) => live,
        }
    }

    pub fn into_live(self) -> LiveRecord {
        match self {
            Self::Created(live) | Self::Updated(live) | Self::Unchanged(live) => live,
        }
    }
}

/// Executes one logical mutation as a single atomic unit against the store:
/// read the live record by primary key, plan the chain write, write the
/// delta record, write the live record, commit.
///
/// The coordinator is the sole writer of live and delta records. It never
/// retries: a lost race surfaces as [`HistoryError::Conflict`] and the
/// retry policy stays with the caller.
pub struct WriteCoordinator;

impl WriteCoordinator {
    /// Record `candidate` as the next revision of its logical document.
    pub fn patch_one<S: DocumentStore>(
        store: &S,
        target: &CollectionTarget,
        config: &ChainConfig,
        candidate: &Fields,
        opts: &PatchOptions,
    ) -> HistoryResult<PatchOutcome> {
        config.validate()?;
        let filter = config.pk_filter(candidate)?;

        let mut txn = store.begin()?;
        let at = txn.stamp();

        let plan = match txn.find_one(&target.live, &filter)? {
            None => ChainManager::plan_create(config, candidate, None, opts, at),
            Some(doc) if !doc.fields.contains_key(&config.metadata_key) => {
                // An untracked document already sits at this primary key.
                // Root a chain for it in place, keeping its id.
                ChainManager::plan_create(config, candidate, Some(doc.id), opts, at)
            }
            Some(doc) => {
                let live = LiveRecord::from_document(doc, &config.metadata_key)?;
                match ChainManager::plan_patch(config, &live, candidate, opts, at)? {
                    Some(plan) => plan,
                    None => {
                        debug!(id = %live.id, version = %live.version(), "nothing to record");
                        return Ok(PatchOutcome::Unchanged(live));
                    }
                }
            }
        };

        let created = matches!(plan, WritePlan::Create { .. });
        let record = Self::commit_plan(txn, target, config, plan)?;
        if created {
            debug!(id = %record.id, version = %record.version(), "chain rooted");
            Ok(PatchOutcome::Created(record))
        } else {
            debug!(id = %record.id, version = %record.version(), "chain extended");
            Ok(PatchOutcome::Updated(record))
        }
    }

    /// Append a delete marker and flag the live record deleted, atomically.
    ///
    /// `fields` only needs to carry the primary-key values. Returns `None`
    /// when no tracked, still-active document exists for that key; deleting
    /// twice is a no-op.
    pub fn soft_delete<S: DocumentStore>(
        store: &S,
        target: &CollectionTarget,
        config: &ChainConfig,
        fields: &Fields,
        metadata: Option<Value>,
    ) -> HistoryResult<Option<LiveRecord>> {
        config.validate()?;
        let filter = config.pk_filter(fields)?;

        let mut txn = store.begin()?;
        let at = txn.stamp();

        let Some(doc) = txn.find_one(&target.live, &filter)? else {
            return Ok(None);
        };
        if !doc.fields.contains_key(&config.metadata_key) {
            // Untracked documents are not part of any chain.
            return Ok(None);
        }
        let live = LiveRecord::from_document(doc, &config.metadata_key)?;
        let Some(plan) = ChainManager::plan_delete(&live, metadata, at)? else {
            return Ok(None);
        };

        let record = Self::commit_plan(txn, target, config, plan)?;
        debug!(id = %record.id, version = %record.version(), "document soft-deleted");
        Ok(Some(record))
    }

    /// Write the delta record, complete and write the live record, commit.
    fn commit_plan<T: DocumentTxn>(
        mut txn: T,
        target: &CollectionTarget,
        config: &ChainConfig,
        plan: WritePlan,
    ) -> HistoryResult<LiveRecord> {
        let (existing, delta, live) = match plan {
            WritePlan::Create { existing, delta, live } => (existing, delta, live),
            WritePlan::Append { live_id, delta, live } => (Some(live_id), delta, live),
        };

        let delta_fields = delta.envelope.embed(&delta.fields, &config.metadata_key)?;
        let delta_id = txn.insert(&target.deltas, delta_fields);

        let (fields, envelope) = live.into_record_parts(delta_id);
        let stored = envelope.embed(&fields, &config.metadata_key)?;
        let live_id = match existing {
            Some(id) => {
                txn.replace(&target.live, &id, stored);
                id
            }
            None => txn.insert(&target.live, stored),
        };

        commit(txn)?;
        Ok(LiveRecord {
            id: live_id,
            fields,
            envelope,
        })
    }
}

fn commit<T: DocumentTxn>(txn: T) -> HistoryResult<()> {
    match txn.commit() {
        Ok(()) => Ok(()),
        Err(StoreError::WriteConflict { reason }) => Err(HistoryError::Conflict { reason }),
        Err(other) => Err(HistoryError::Store(other)),
    }
}
