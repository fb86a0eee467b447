//! Pipeline error taxonomy (`spec.md` §7).
//!
//! Only [`EngineError::Unauthorized`], [`EngineError::InvalidArgument`],
//! [`EngineError::StorageFailure`] and [`EngineError::TransientDependency`]
//! surface to the caller of [`crate::Engine::track`]; everything else is
//! [`EngineError::PipelineStageFailure`], folded into a `Console` record
//! by the pipeline stage that raised it and never reaches `track`'s
//! caller. The split is structural: core writes (`persistence.rs`)
//! propagate their errors with `?`, while each collaborator call in
//! `pipeline.rs` is matched explicitly and always wrapped into a
//! console entry.

use thiserror::Error;
use tracker_core::error::TrackerError;
use tracker_storage::error::StorageError;
use tracker_sync::SyncError;

/// Errors that can occur while tracking a payload.
#[derive(Debug, Error, Clone)]
pub enum EngineError {
    /// Bad source id, or a bridge kind not on the caller's allow-list.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// A required argument was missing (e.g. static-profile mode with
    /// no `profile.id`).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A storage driver call failed while persisting an entity.
    #[error("storage failure: {message}")]
    StorageFailure {
        /// Human-readable description.
        message: String,
        /// Ids of the rows/documents implicated, if known.
        rows: Vec<String>,
    },

    /// A transient dependency (the lock table, the cache backend) is
    /// unreachable; the caller may retry.
    #[error("transient dependency failure: {0}")]
    TransientDependency(String),

    /// An external collaborator (rules engine, segmentation,
    /// profile merger, destination dispatcher) failed mid-pipeline.
    /// Never returned from [`crate::Engine::track`] — the pipeline
    /// catches it, folds it into a `Console` entry and continues
    /// (`spec.md` §4.3: "wrapped so its exception is recorded to the
    /// console log and swallowed").
    #[error("pipeline stage `{stage}` failed: {message}")]
    PipelineStageFailure {
        /// Name of the stage that failed (`rules`, `segmentation`, `merge`, `destination`).
        stage: String,
        /// Human-readable description.
        message: String,
    },
}

impl EngineError {
    /// Build a stage failure for `stage`, wrapping any displayable error.
    #[must_use]
    pub fn stage_failure(stage: &str, error: impl std::fmt::Display) -> Self {
        Self::PipelineStageFailure {
            stage: stage.to_owned(),
            message: error.to_string(),
        }
    }
}

impl From<TrackerError> for EngineError {
    fn from(error: TrackerError) -> Self {
        match error {
            TrackerError::Unauthorized(msg) => Self::Unauthorized(msg),
            TrackerError::InvalidArgument(msg) => Self::InvalidArgument(msg),
            TrackerError::DuplicatedRecord(id) => Self::StorageFailure {
                message: format!("duplicated record for id `{id}`"),
                rows: vec![id],
            },
            TrackerError::StorageFailure { message, rows } => Self::StorageFailure { message, rows },
            TrackerError::TransientDependency(msg) => Self::TransientDependency(msg),
        }
    }
}

impl From<StorageError> for EngineError {
    fn from(error: StorageError) -> Self {
        match error {
            StorageError::DuplicatedRecord { id, profile_ids } => Self::StorageFailure {
                message: format!("duplicated record for id `{id}`"),
                rows: profile_ids,
            },
            StorageError::Backend(message) => Self::StorageFailure { message, rows: Vec::new() },
            StorageError::Unreachable(message) => Self::TransientDependency(message),
        }
    }
}

impl From<SyncError> for EngineError {
    fn from(error: SyncError) -> Self {
        match error {
            SyncError::Timeout(profile_id) => {
                Self::TransientDependency(format!("profile lock timed out for `{profile_id}`"))
            },
        }
    }
}

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_failure_names_the_stage() {
        let err = EngineError::stage_failure("rules", "boom");
        assert!(matches!(err, EngineError::PipelineStageFailure { ref stage, .. } if stage == "rules"));
        assert_eq!(err.to_string(), "pipeline stage `rules` failed: boom");
    }

    #[test]
    fn sync_timeout_converts_to_transient_dependency() {
        let err: EngineError = SyncError::Timeout("prof-1".into()).into();
        assert!(matches!(err, EngineError::TransientDependency(_)));
    }
}
