use vellum_types::{Fields, Filter, RecordId, Stamp};

use crate::document::Document;
use crate::error::StoreResult;

/// Transactional document store.
///
/// All implementations must satisfy these invariants:
/// - Commits are atomic: a transaction applies every buffered write or none.
/// - Isolation is optimistic: reads inside a transaction are recorded and
///   revalidated at commit. The first committer wins; a transaction whose
///   reads were invalidated by a concurrent commit fails with
///   `StoreError::WriteConflict` and applies nothing. Filter reads are
///   revalidated against their full result set, so phantom matches conflict
///   just like modified records do.
/// - Point reads on the store handle observe fully committed state only,
///   never a transaction's buffered writes.
/// - Record identifiers are store-assigned and never reused.
/// - Server timestamps come from the store clock and are strictly monotonic
///   per store handle.
pub trait DocumentStore: Send + Sync {
    /// Transaction handle type.
    type Txn: DocumentTxn;

    /// Begin a transaction. Its stamp is fixed at begin time.
    fn begin(&self) -> StoreResult<Self::Txn>;

    /// Read one committed document by id.
    ///
    /// Returns `Ok(None)` if the record (or the collection) does not exist.
    fn get(&self, collection: &str, id: &RecordId) -> StoreResult<Option<Document>>;

    /// First committed document matching `filter`, in record-id order.
    fn find_one(&self, collection: &str, filter: &Filter) -> StoreResult<Option<Document>>;

    /// All committed documents matching `filter`, in record-id order.
    fn find(&self, collection: &str, filter: &Filter) -> StoreResult<Vec<Document>>;

    /// A server timestamp from the store clock.
    fn now(&self) -> Stamp;
}

/// One atomic read-modify-write unit against a [`DocumentStore`].
///
/// Reads observe committed state as of the call; buffered writes are not
/// visible to any reader, including this transaction, until `commit`.
/// Dropping the transaction without committing aborts it and leaves no
/// trace.
pub trait DocumentTxn {
    /// The timestamp carried by every write in this transaction.
    fn stamp(&self) -> Stamp;

    /// Read one committed document by id, recording the observation.
    fn get(&mut self, collection: &str, id: &RecordId) -> StoreResult<Option<Document>>;

    /// First committed match for `filter`, recording the observation.
    ///
    /// The absence of a match is itself an observation: a concurrent commit
    /// that creates a match invalidates this transaction.
    fn find_one(&mut self, collection: &str, filter: &Filter) -> StoreResult<Option<Document>>;

    /// All committed matches for `filter`, recording the observation.
    fn find(&mut self, collection: &str, filter: &Filter) -> StoreResult<Vec<Document>>;

    /// Buffer an insert; the new record id is assigned immediately.
    fn insert(&mut self, collection: &str, fields: Fields) -> RecordId;

    /// Buffer a full replacement of an existing record's fields.
    fn replace(&mut self, collection: &str, id: &RecordId, fields: Fields);

    /// Validate every recorded read against current committed state, then
    /// apply all buffered writes atomically.
    fn commit(self) -> StoreResult<()>;
}
