use thiserror::Error;

use vellum_store::StoreError;

/// Errors surfaced by the versioning engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HistoryError {
    /// The chain configuration is unusable, or a document does not resolve
    /// the configured primary-key fields.
    #[error("configuration error: {reason}")]
    Configuration { reason: String },

    /// A concurrent writer won the race on the same logical document. The
    /// caller decides whether and how to retry.
    #[error("write conflict: {reason}")]
    Conflict { reason: String },

    /// No revision exists at the requested time or version.
    #[error("not found: {reason}")]
    NotFound { reason: String },

    /// The delta chain is broken: a link does not resolve, an envelope does
    /// not decode, or a patch record has no payload.
    #[error("corrupt chain: {reason}")]
    CorruptChain { reason: String },

    /// A record failed to encode for storage.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The underlying store failed outside of conflict detection.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

pub type HistoryResult<T> = Result<T, HistoryError>;
