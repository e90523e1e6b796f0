/// Errors produced by document store operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// Optimistic validation failed at commit: state this transaction read
    /// was changed by a concurrent commit. The transaction applied nothing.
    #[error("write conflict: {reason}")]
    WriteConflict { reason: String },

    /// A buffered replace targets a record that does not exist.
    #[error("replace target missing: {collection}/{id}")]
    MissingRecord { collection: String, id: String },

    /// A store lock was poisoned by a panicking thread.
    #[error("store lock poisoned")]
    LockPoisoned,
}

pub type StoreResult<T> = Result<T, StoreError>;
