use serde_json::Value;

use vellum_store::DocumentStore;
use vellum_types::{Fields, RecordId, Stamp, VersionTag};

use crate::config::{ChainConfig, CollectionTarget};
use crate::error::{HistoryError, HistoryResult};
use crate::records::{DeltaKind, DeltaRecord, LiveRecord};

/// One chain entry, summarized for history listings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RevisionInfo {
    pub version: VersionTag,
    pub kind: DeltaKind,
    pub at: Stamp,
    pub metadata: Option<Value>,
}

/// Where a backward walk stops.
enum StopRule {
    /// First entry stamped at or before the target time.
    AtOrBefore(Stamp),
    /// Entry carrying exactly this version.
    Exact(VersionTag),
}

impl StopRule {
    fn stops_at(&self, delta: &DeltaRecord) -> bool {
        match self {
            Self::AtOrBefore(target) => delta.envelope.at <= *target,
            Self::Exact(version) => delta.envelope.version == *version,
        }
    }

    fn not_found(&self) -> HistoryError {
        match self {
            Self::AtOrBefore(target) => HistoryError::NotFound {
                reason: format!("no revision at or before {target}"),
            },
            Self::Exact(version) => HistoryError::NotFound {
                reason: format!("version {version} does not exist in this chain"),
            },
        }
    }
}

/// Read-only chain walker that materializes historical document states.
///
/// Reconstruction starts from the live record's fields and reverses deltas
/// backward until the stop rule is satisfied. Within the newest snapshot
/// window the state is recovered exactly. Crossing a snapshot boundary
/// restores that snapshot's stored fields and keeps walking; the write that
/// produced the snapshot recorded no diff, so changes it made are not
/// reversed further back.
pub struct Reconstructor;

impl Reconstructor {
    /// The document's fields as they existed at or immediately before `at`.
    ///
    /// Fails with [`HistoryError::NotFound`] when `at` precedes the root
    /// snapshot.
    pub fn revision_at<S: DocumentStore>(
        store: &S,
        target: &CollectionTarget,
        config: &ChainConfig,
        live: &LiveRecord,
        at: Stamp,
    ) -> HistoryResult<Fields> {
        if at < live.envelope.created.at {
            return Err(HistoryError::NotFound {
                reason: format!("no revision at or before {at}"),
            });
        }
        if live.envelope.updated.at <= at {
            return Ok(live.fields.clone());
        }
        Self::walk(store, target, config, live, &StopRule::AtOrBefore(at))
    }

    /// The document's fields at an exact recorded version.
    ///
    /// Addressable versions are those carried by chain entries plus the
    /// live record's current version.
    pub fn revision_by_version<S: DocumentStore>(
        store: &S,
        target: &CollectionTarget,
        config: &ChainConfig,
        live: &LiveRecord,
        version: VersionTag,
    ) -> HistoryResult<Fields> {
        if live.version() == version {
            return Ok(live.fields.clone());
        }
        Self::walk(store, target, config, live, &StopRule::Exact(version))
    }

    /// Chain entries for the document, newest first.
    pub fn revisions<S: DocumentStore>(
        store: &S,
        target: &CollectionTarget,
        config: &ChainConfig,
        live: &LiveRecord,
    ) -> HistoryResult<Vec<RevisionInfo>> {
        let mut entries = Vec::new();
        let mut cursor = Some(live.envelope.previous_delta.clone());

        while let Some(id) = cursor {
            let delta = Self::fetch(store, target, config, &id)?;
            entries.push(RevisionInfo {
                version: delta.envelope.version,
                kind: delta.envelope.kind,
                at: delta.envelope.at,
                metadata: delta.envelope.metadata,
            });
            cursor = delta.envelope.previous_delta;
        }
        Ok(entries)
    }

    fn walk<S: DocumentStore>(
        store: &S,
        target: &CollectionTarget,
        config: &ChainConfig,
        live: &LiveRecord,
        rule: &StopRule,
    ) -> HistoryResult<Fields> {
        let mut state = live.fields.clone();
        let mut cursor = live.envelope.previous_delta.clone();

        loop {
            let delta = Self::fetch(store, target, config, &cursor)?;

            if rule.stops_at(&delta) {
                // A snapshot's stored fields are ground truth for its
                // version; prefer them over the unwound working state.
                return Ok(match delta.envelope.kind {
                    DeltaKind::Snapshot => delta.fields,
                    _ => state,
                });
            }

            match delta.envelope.kind {
                DeltaKind::Snapshot => {
                    state = delta.fields;
                }
                DeltaKind::Patch => {
                    let Some(changes) = delta.envelope.changes.as_ref() else {
                        return Err(HistoryError::CorruptChain {
                            reason: format!("patch record {} has no payload", delta.id),
                        });
                    };
                    changes.apply_inverse(&mut state);
                }
                DeltaKind::DeleteMarker => {}
            }

            match delta.envelope.previous_delta {
                Some(previous) => cursor = previous,
                // The root never satisfied the rule; there is nothing
                // further back.
                None => return Err(rule.not_found()),
            }
        }
    }

    fn fetch<S: DocumentStore>(
        store: &S,
        target: &CollectionTarget,
        config: &ChainConfig,
        id: &RecordId,
    ) -> HistoryResult<DeltaRecord> {
        let doc = store
            .get(&target.deltas, id)?
            .ok_or_else(|| HistoryError::CorruptChain {
                reason: format!("chain link {id} does not resolve"),
            })?;
        DeltaRecord::from_document(doc, &config.metadata_key)
    }
}
