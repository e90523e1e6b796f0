use serde_json::Value;

use vellum_diff::diff_fields;
use vellum_types::{Fields, RecordId, Stamp, VersionTag};

use crate::config::ChainConfig;
use crate::error::{HistoryError, HistoryResult};
use crate::policy::SnapshotPolicy;
use crate::records::{ActionStamp, DeltaEnvelope, DeltaKind, LiveEnvelope, LiveRecord};

/// Options for a single patch write.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PatchOptions {
    /// Record a delta even when the diff is empty.
    pub force: bool,
    /// Field names excluded from comparison on both sides.
    pub ignore_fields: Vec<String>,
    /// Caller metadata attached to the delta and the live envelope.
    pub metadata: Option<Value>,
}

impl PatchOptions {
    pub fn forced() -> Self {
        Self {
            force: true,
            ..Self::default()
        }
    }
}

/// A fully-formed delta record, minus the store-assigned id.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeltaSeed {
    pub fields: Fields,
    pub envelope: DeltaEnvelope,
}

/// The live record's next state, minus the chain-head link that becomes
/// known only once the delta record is inserted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LiveSeed {
    pub fields: Fields,
    pub version: VersionTag,
    pub created: ActionStamp,
    pub updated: ActionStamp,
    pub deleted: Option<ActionStamp>,
}

impl LiveSeed {
    /// Finish the seed once the chain head it points at is known.
    pub fn into_record_parts(self, previous_delta: RecordId) -> (Fields, LiveEnvelope) {
        let envelope = LiveEnvelope {
            previous_delta,
            version: self.version,
            created: self.created,
            updated: self.updated,
            deleted: self.deleted,
        };
        (self.fields, envelope)
    }
}

/// What the write coordinator must do to the store for one logical write.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WritePlan {
    /// First write for this primary key. `existing` carries the id of an
    /// untracked document being brought under version control in place.
    Create {
        existing: Option<RecordId>,
        delta: DeltaSeed,
        live: LiveSeed,
    },
    /// Append one entry to an existing chain.
    Append {
        live_id: RecordId,
        delta: DeltaSeed,
        live: LiveSeed,
    },
}

/// Builds delta records, links them, assigns version tags, and derives the
/// matching live-record state.
///
/// Pure planning over in-memory values; the write coordinator owns all
/// store access and is the only caller.
pub struct ChainManager;

impl ChainManager {
    /// Plan the first write for a primary key: a root snapshot at version
    /// 0.0 and a live record at version 1.0 pointing at it.
    pub fn plan_create(
        config: &ChainConfig,
        candidate: &Fields,
        existing: Option<RecordId>,
        opts: &PatchOptions,
        at: Stamp,
    ) -> WritePlan {
        let mut fields = candidate.clone();
        fields.remove(&config.metadata_key);

        let delta = DeltaSeed {
            fields: fields.clone(),
            envelope: DeltaEnvelope {
                previous_delta: None,
                kind: DeltaKind::Snapshot,
                version: VersionTag::root(),
                at,
                metadata: opts.metadata.clone(),
                changes: None,
            },
        };
        let stamp = ActionStamp::new(at, opts.metadata.clone());
        let live = LiveSeed {
            fields,
            version: VersionTag::initial(),
            created: stamp.clone(),
            updated: stamp,
            deleted: None,
        };

        WritePlan::Create {
            existing,
            delta,
            live,
        }
    }

    /// Plan a write against an existing live record. Returns `Ok(None)`
    /// when there is nothing to record.
    ///
    /// `at` must be strictly newer than the record's last write. Stamps are
    /// fixed at transaction begin, so a chain head at or past the stamp
    /// means a competing write committed after this transaction began;
    /// appending behind it would break the chain's time order, and planning
    /// fails with [`HistoryError::Conflict`] instead.
    pub fn plan_patch(
        config: &ChainConfig,
        live: &LiveRecord,
        candidate: &Fields,
        opts: &PatchOptions,
        at: Stamp,
    ) -> HistoryResult<Option<WritePlan>> {
        let mut candidate = candidate.clone();
        candidate.remove(&config.metadata_key);

        let diff = diff_fields(&candidate, &live.fields, &opts.ignore_fields);
        // A soft-deleted document is reactivated by any write, so identical
        // content still appends a delta there.
        if diff.is_empty() && !opts.force && !live.is_deleted() {
            return Ok(None);
        }
        Self::require_newer_stamp(live, at)?;

        let policy = SnapshotPolicy::new(config.snapshot_interval);
        let (kind, version) = policy.next(live.version());

        let mut next_fields = live.fields.clone();
        diff.apply_forward(&mut next_fields, &candidate);

        let is_snapshot = kind == DeltaKind::Snapshot;
        let delta = DeltaSeed {
            fields: if is_snapshot {
                next_fields.clone()
            } else {
                Fields::new()
            },
            envelope: DeltaEnvelope {
                previous_delta: Some(live.envelope.previous_delta.clone()),
                kind,
                version,
                at,
                metadata: opts.metadata.clone(),
                changes: if is_snapshot { None } else { Some(diff) },
            },
        };
        let live_seed = LiveSeed {
            fields: next_fields,
            version,
            created: live.envelope.created.clone(),
            updated: ActionStamp::new(at, opts.metadata.clone()),
            deleted: None,
        };

        Ok(Some(WritePlan::Append {
            live_id: live.id.clone(),
            delta,
            live: live_seed,
        }))
    }

    /// Plan a soft deletion: a delete marker on the chain plus the deletion
    /// flag on the live record. Returns `Ok(None)` when the document is
    /// already flagged deleted. The stamp rule of [`Self::plan_patch`]
    /// applies.
    pub fn plan_delete(
        live: &LiveRecord,
        metadata: Option<Value>,
        at: Stamp,
    ) -> HistoryResult<Option<WritePlan>> {
        if live.is_deleted() {
            return Ok(None);
        }
        Self::require_newer_stamp(live, at)?;

        let version = live.version().next_minor();
        let delta = DeltaSeed {
            fields: Fields::new(),
            envelope: DeltaEnvelope {
                previous_delta: Some(live.envelope.previous_delta.clone()),
                kind: DeltaKind::DeleteMarker,
                version,
                at,
                metadata: metadata.clone(),
                changes: None,
            },
        };
        let live_seed = LiveSeed {
            fields: live.fields.clone(),
            version,
            created: live.envelope.created.clone(),
            updated: live.envelope.updated.clone(),
            deleted: Some(ActionStamp::new(at, metadata)),
        };

        Ok(Some(WritePlan::Append {
            live_id: live.id.clone(),
            delta,
            live: live_seed,
        }))
    }

    /// Chain stamps strictly increase, so an entry may only be planned with
    /// a stamp newer than the live record's last write.
    fn require_newer_stamp(live: &LiveRecord, at: Stamp) -> HistoryResult<()> {
        let head = live.envelope.last_written_at();
        if at <= head {
            return Err(HistoryError::Conflict {
                reason: format!("stamp {at} is not newer than the last write at {head}"),
            });
        }
        Ok(())
    }
}
