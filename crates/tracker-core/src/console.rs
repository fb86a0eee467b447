//! In-request diagnostic log (`spec.md` glossary: "Console log").

use crate::ids::{EventId, ProfileId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Severity of a console-log record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsoleType {
    /// Informational record.
    Info,
    /// A stage failed in a way that should surface as a warning on its event.
    Warning,
    /// A stage failed in a way that should surface as an error on its event.
    Error,
}

/// A single structured diagnostic record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Console {
    /// Event this record is attributed to, if any.
    pub event_id: Option<EventId>,
    /// Profile in scope when the record was created, if any.
    pub profile_id: Option<ProfileId>,
    /// Subsystem that raised the record (`rules`, `segmentation`, `merge`,
    /// `destination`, `validator`, …).
    pub origin: String,
    /// Severity.
    #[serde(rename = "type")]
    pub kind: ConsoleType,
    /// Human-readable message.
    pub message: String,
    /// Full stack trace/trace string, when available.
    pub traceback: Option<String>,
}

impl Console {
    /// Build an error record attributed to `event_id`/`profile_id`.
    #[must_use]
    pub fn error(
        origin: &str,
        message: impl Into<String>,
        event_id: Option<EventId>,
        profile_id: Option<ProfileId>,
        traceback: Option<String>,
    ) -> Self {
        Self {
            event_id,
            profile_id,
            origin: origin.to_string(),
            kind: ConsoleType::Error,
            message: message.into(),
            traceback,
        }
    }

    /// Whether this record marks its event as erroring.
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.kind == ConsoleType::Error
    }

    /// Whether this record marks its event as warning.
    #[must_use]
    pub fn is_warning(&self) -> bool {
        self.kind == ConsoleType::Warning
    }
}

/// The in-request list of [`Console`] records, flushed to its own index
/// after the pipeline completes (`spec.md` §4.4).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConsoleLog {
    entries: Vec<Console>,
}

impl ConsoleLog {
    /// An empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record.
    pub fn append(&mut self, console: Console) {
        self.entries.push(console);
    }

    /// All records.
    #[must_use]
    pub fn entries(&self) -> &[Console] {
        &self.entries
    }

    /// Whether any record was logged.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Index records by event id, keeping the worst severity seen per
    /// event (error beats warning beats info) — mirrors
    /// `get_indexed_event_journal` in the original source, used by the
    /// persistence coordinator to reconcile event status
    /// (`spec.md` §4.4).
    #[must_use]
    pub fn indexed_by_event(&self) -> HashMap<EventId, &Console> {
        let mut index: HashMap<EventId, &Console> = HashMap::new();
        for entry in &self.entries {
            let Some(event_id) = entry.event_id.clone() else {
                continue;
            };
            match index.get(&event_id) {
                Some(existing) if severity_rank(existing) >= severity_rank(entry) => {},
                _ => {
                    index.insert(event_id, entry);
                },
            }
        }
        index
    }
}

fn severity_rank(console: &Console) -> u8 {
    match console.kind {
        ConsoleType::Error => 2,
        ConsoleType::Warning => 1,
        ConsoleType::Info => 0,
    }
}
