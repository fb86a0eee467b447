//! Storage and cache error types.

use thiserror::Error;

/// Errors raised by the [`crate::cache::Cache`] or
/// [`crate::driver::StorageDriver`].
#[derive(Debug, Error)]
pub enum StorageError {
    /// Two documents were found sharing the same id. Carries the
    /// distinct profile ids the duplicates referenced, so a caller can
    /// run the session-corrector recovery path (`spec.md` §4.2).
    #[error("duplicated record for id `{id}`")]
    DuplicatedRecord {
        /// The id that was duplicated.
        id: String,
        /// Distinct profile ids referenced by the duplicate documents.
        profile_ids: Vec<String>,
    },

    /// The underlying backend failed.
    #[error("storage backend error: {0}")]
    Backend(String),

    /// The lock/cache backend is unreachable.
    #[error("cache backend unreachable: {0}")]
    Unreachable(String),
}

/// Result type for storage/cache operations.
pub type StorageResult<T> = Result<T, StorageError>;
