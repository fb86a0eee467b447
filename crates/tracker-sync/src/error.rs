//! Synchronizer error types.

use thiserror::Error;

/// Errors raised while acquiring a per-profile lock.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The lock was still held after exhausting all retries.
    #[error("timed out waiting for profile lock on `{0}`")]
    Timeout(String),
}

/// Result type for synchronizer operations.
pub type SyncResult<T> = Result<T, SyncError>;
