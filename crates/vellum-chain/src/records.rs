use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use vellum_diff::FieldDiff;
use vellum_store::Document;
use vellum_types::{Fields, RecordId, Stamp, VersionTag};

use crate::error::{HistoryError, HistoryResult};

/// Kind of entry in a delta chain.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeltaKind {
    /// Full copy of the document state at one version.
    Snapshot,
    /// Incremental three-way field diff against the previous state.
    Patch,
    /// Soft-deletion event; carries no field payload.
    DeleteMarker,
}

impl fmt::Display for DeltaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Snapshot => write!(f, "snapshot"),
            Self::Patch => write!(f, "patch"),
            Self::DeleteMarker => write!(f, "delete-marker"),
        }
    }
}

/// When something happened, and what the caller attached to it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionStamp {
    pub at: Stamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

impl ActionStamp {
    pub fn new(at: Stamp, metadata: Option<Value>) -> Self {
        Self { at, metadata }
    }
}

/// Metadata envelope embedded in a live record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveEnvelope {
    /// The most recent delta record, i.e. the chain head.
    pub previous_delta: RecordId,
    /// Version produced by the latest write.
    pub version: VersionTag,
    pub created: ActionStamp,
    pub updated: ActionStamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted: Option<ActionStamp>,
}

impl LiveEnvelope {
    /// Embed this envelope into a field set for storage.
    pub fn embed(&self, fields: &Fields, metadata_key: &str) -> HistoryResult<Fields> {
        embed_envelope(self, fields, metadata_key)
    }

    /// Stamp of the most recent write recorded on this envelope. Soft
    /// deletion leaves `updated` untouched, so the deletion stamp wins when
    /// it is present and newer.
    pub fn last_written_at(&self) -> Stamp {
        match &self.deleted {
            Some(deleted) if deleted.at > self.updated.at => deleted.at,
            _ => self.updated.at,
        }
    }
}

/// Metadata envelope embedded in a delta record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeltaEnvelope {
    /// Back-reference to the preceding delta record. Absent only on the
    /// root snapshot.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_delta: Option<RecordId>,
    pub kind: DeltaKind,
    /// Version this entry produced; matches the live record's version
    /// immediately after the write that created it.
    pub version: VersionTag,
    pub at: Stamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
    /// Diff payload. Present on every patch, absent on snapshots and
    /// delete markers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub changes: Option<FieldDiff>,
}

impl DeltaEnvelope {
    /// Embed this envelope into a field set for storage.
    pub fn embed(&self, fields: &Fields, metadata_key: &str) -> HistoryResult<Fields> {
        embed_envelope(self, fields, metadata_key)
    }
}

fn embed_envelope<E: Serialize>(
    envelope: &E,
    fields: &Fields,
    metadata_key: &str,
) -> HistoryResult<Fields> {
    let raw = serde_json::to_value(envelope)
        .map_err(|e| HistoryError::Serialization(e.to_string()))?;
    let mut fields = fields.clone();
    fields.insert(metadata_key.to_string(), raw);
    Ok(fields)
}

/// The current-state record of a logical document, decoded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LiveRecord {
    pub id: RecordId,
    /// Business fields, with the metadata envelope stripped out.
    pub fields: Fields,
    pub envelope: LiveEnvelope,
}

impl LiveRecord {
    /// Decode a stored document into a live record.
    pub fn from_document(doc: Document, metadata_key: &str) -> HistoryResult<Self> {
        let mut fields = doc.fields;
        let raw = fields
            .remove(metadata_key)
            .ok_or_else(|| HistoryError::CorruptChain {
                reason: format!("live record {} has no metadata envelope", doc.id),
            })?;
        let envelope: LiveEnvelope =
            serde_json::from_value(raw).map_err(|e| HistoryError::CorruptChain {
                reason: format!("live record {}: invalid envelope: {e}", doc.id),
            })?;
        Ok(Self {
            id: doc.id,
            fields,
            envelope,
        })
    }

    /// Re-encode into the stored field layout.
    pub fn to_fields(&self, metadata_key: &str) -> HistoryResult<Fields> {
        self.envelope.embed(&self.fields, metadata_key)
    }

    /// Current version of the logical document.
    pub fn version(&self) -> VersionTag {
        self.envelope.version
    }

    /// Returns `true` once the document has been soft-deleted.
    pub fn is_deleted(&self) -> bool {
        self.envelope.deleted.is_some()
    }
}

/// One immutable chain entry, decoded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeltaRecord {
    pub id: RecordId,
    /// Full field set for snapshots; empty for patches and delete markers.
    pub fields: Fields,
    pub envelope: DeltaEnvelope,
}

impl DeltaRecord {
    /// Decode a stored document into a delta record.
    pub fn from_document(doc: Document, metadata_key: &str) -> HistoryResult<Self> {
        let mut fields = doc.fields;
        let raw = fields
            .remove(metadata_key)
            .ok_or_else(|| HistoryError::CorruptChain {
                reason: format!("delta record {} has no metadata envelope", doc.id),
            })?;
        let envelope: DeltaEnvelope =
            serde_json::from_value(raw).map_err(|e| HistoryError::CorruptChain {
                reason: format!("delta record {}: invalid envelope: {e}", doc.id),
            })?;
        Ok(Self {
            id: doc.id,
            fields,
            envelope,
        })
    }

    /// Re-encode into the stored field layout.
    pub fn to_fields(&self, metadata_key: &str) -> HistoryResult<Fields> {
        self.envelope.embed(&self.fields, metadata_key)
    }

    /// Returns `true` for the chain's root snapshot.
    pub fn is_root(&self) -> bool {
        self.envelope.previous_delta.is_none()
    }
}
