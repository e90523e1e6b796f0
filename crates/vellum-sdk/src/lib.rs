//! High-level SDK for vellum.
//!
//! A [`Collection`] is the one type most applications need: a handle over
//! a shared document store that versions every write and can reconstruct
//! any past state. The lower layers stay reachable through the re-exports
//! for callers that plug in their own store or drive the engine directly.

pub mod collection;

pub use collection::Collection;

// Re-export key types
pub use vellum_chain::{
    ChainConfig, DeltaKind, DeltaRecord, HistoryError, HistoryResult, LiveRecord, PatchOptions,
    PatchOutcome, ReconcileOptions, ReconcileSummary, RevisionInfo,
};
pub use vellum_diff::FieldDiff;
pub use vellum_store::{DocumentStore, DocumentTxn, MemoryStore, StoreError};
pub use vellum_types::{Fields, Filter, RecordId, Stamp, VersionTag};
