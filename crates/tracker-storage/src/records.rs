//! Small record types the storage driver loads besides the core domain
//! entities (`spec.md` §4.3, §4.4).

use serde::{Deserialize, Serialize};

/// A routing rule binding `(source, event type)` to a workflow
/// (`spec.md` glossary: "Rule").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleRecord {
    /// Event type this rule routes.
    pub event_type: String,
    /// Rule id, appended to `Event.metadata.processed_by_rules`.
    pub rule_id: String,
    /// Flow/workflow id the rule invokes.
    pub flow_id: String,
}

/// Cached tag metadata for an event type, unioned onto every event of
/// that type (`spec.md` §4.4).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventTypeMetadata {
    /// Event type this metadata describes.
    pub event_type: String,
    /// Tags to union onto every event of this type.
    pub tags: Vec<String>,
}

/// Outcome of a batch write against one document stream.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SaveResult {
    /// Number of documents written.
    pub saved: usize,
    /// Event types included in the batch (events only; empty otherwise).
    #[serde(default)]
    pub types: Vec<String>,
    /// Errors encountered for individual documents, if any were partial.
    #[serde(default)]
    pub errors: Vec<String>,
}

impl SaveResult {
    /// A result recording that `count` documents were written.
    #[must_use]
    pub fn saved(count: usize) -> Self {
        Self {
            saved: count,
            ..Default::default()
        }
    }

    /// A result recording that nothing was written (e.g. gated off by
    /// an option).
    #[must_use]
    pub fn skipped() -> Self {
        Self::default()
    }
}
