//! Delta-chain versioning engine for vellum.
//!
//! Every tracked document is a live record plus an append-only chain of
//! delta records linked backward to a snapshot root. Writes diff the
//! candidate against current state, append exactly one delta, and update
//! the live record in the same transaction; reads walk the chain backward,
//! undoing patches, to reconstruct the document at any stamp or version.
//!
//! The pieces, bottom up:
//!
//! - [`records`]: the metadata envelopes and their wire encoding
//! - [`config`]: per-collection configuration and validation
//! - [`policy`]: when an append rolls a full snapshot instead of a patch
//! - [`chain`]: pure write planning (no store access)
//! - [`writer`]: transactional execution of write plans
//! - [`reconstruct`]: point-in-time and by-version reconstruction
//! - [`reconcile`]: batch upserts with a missing-document sweep
//!
//! # Key Types
//!
//! - [`ChainConfig`] / [`CollectionTarget`]: where and how a collection is tracked
//! - [`LiveRecord`] / [`DeltaRecord`]: the two stored record shapes
//! - [`WriteCoordinator`]: single-document writes and soft deletes
//! - [`Reconstructor`]: historical reads
//! - [`Reconciler`]: batch reconciliation
//! - [`HistoryError`]: everything that can go wrong, including [`HistoryError::Conflict`]

pub mod chain;
pub mod config;
pub mod error;
pub mod policy;
pub mod reconcile;
pub mod reconstruct;
pub mod records;
pub mod writer;

pub use chain::{ChainManager, PatchOptions, WritePlan};
pub use config::{ChainConfig, CollectionTarget, DEFAULT_METADATA_KEY, DEFAULT_SNAPSHOT_INTERVAL};
pub use error::{HistoryError, HistoryResult};
pub use policy::SnapshotPolicy;
pub use reconcile::{ReconcileOptions, ReconcileSummary, Reconciler};
pub use reconstruct::{Reconstructor, RevisionInfo};
pub use records::{ActionStamp, DeltaEnvelope, DeltaKind, DeltaRecord, LiveEnvelope, LiveRecord};
pub use writer::{PatchOutcome, WriteCoordinator};
