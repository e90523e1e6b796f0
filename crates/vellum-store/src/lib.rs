//! Transactional document storage for vellum.
//!
//! Defines the [`DocumentStore`] and [`DocumentTxn`] traits the history
//! engine runs against, plus [`MemoryStore`], an in-memory implementation
//! with optimistic concurrency control. Transactions buffer writes, record
//! every read as an observation, and revalidate those observations at
//! commit; concurrent writers racing on the same records resolve to a
//! single winner.
//!
//! # Key Types
//!
//! - [`DocumentStore`] / [`DocumentTxn`]: the storage contract
//! - [`Document`]: an id paired with its business fields
//! - [`StoreClock`]: hybrid logical clock issuing monotonic stamps
//! - [`MemoryStore`]: reference implementation, also used by tests

pub mod clock;
pub mod document;
pub mod error;
pub mod memory;
pub mod traits;

pub use clock::StoreClock;
pub use document::Document;
pub use error::{StoreError, StoreResult};
pub use memory::{MemoryStore, MemoryTxn};
pub use traits::{DocumentStore, DocumentTxn};
