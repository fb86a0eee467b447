//! Error taxonomy shared across the tracking core (`spec.md` §7).
//!
//! Only [`TrackerError::Unauthorized`], [`TrackerError::InvalidArgument`],
//! [`TrackerError::StorageFailure`] and [`TrackerError::TransientDependency`]
//! are meant to propagate to the caller of `track()`. Everything else in
//! the pipeline is recorded as a `Console` entry and swallowed — see
//! `tracker-engine`'s `EngineError::propagates`.

use thiserror::Error;

/// Errors surfaced by the domain layer and, by extension, by anything
/// built on top of it.
#[derive(Debug, Error)]
pub enum TrackerError {
    /// Bad source id, or a bridge kind not on the caller's allow-list.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// A required argument was missing or empty (e.g. static-profile
    /// mode with no `profile.id`).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Two storage documents were found sharing the same id.
    #[error("duplicated record for id `{0}`")]
    DuplicatedRecord(String),

    /// A storage driver call failed while persisting an entity.
    #[error("storage failure: {message}")]
    StorageFailure {
        /// Human-readable description of the failure.
        message: String,
        /// Ids of the rows/documents implicated, if known.
        rows: Vec<String>,
    },

    /// A transient dependency (e.g. the lock/cache backend) is
    /// unreachable; the caller may retry.
    #[error("transient dependency failure: {0}")]
    TransientDependency(String),
}

/// Result type for domain-level operations.
pub type TrackerResult<T> = Result<T, TrackerError>;
