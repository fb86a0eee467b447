//! `EventPayload` (inbound) and `Event` (materialized) (`spec.md` §3).

use crate::ids::{EventId, ProfileId, SessionId};
use crate::time::EventTime;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;

/// One event as it arrives inside a `TrackerPayload`, before it is
/// bound to a source/session/profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventPayload {
    /// Event type, used for rule routing and tag lookup.
    #[serde(rename = "type")]
    pub event_type: String,
    /// Event-specific properties.
    #[serde(default)]
    pub properties: Map<String, Value>,
    /// Caller-supplied options (e.g. per-event debug override).
    #[serde(default)]
    pub options: Map<String, Value>,
}

/// Lifecycle status of a materialized event (`spec.md` §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    /// Collected but not yet run through the pipeline.
    Collected,
    /// Ran through the pipeline with no errors or warnings.
    Processed,
    /// A console-log entry tagged this event as an error.
    Error,
    /// A console-log entry tagged this event as a warning.
    Warning,
}

/// `Event.metadata`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventMetadata {
    /// Time block.
    pub time: EventTime,
    /// Current lifecycle status.
    pub status: EventStatus,
    /// Whether this event was collected under a debug-enabled payload.
    pub debug: bool,
    /// Set when a console entry tagged this event as an error.
    pub error: bool,
    /// Set when a console entry tagged this event as a warning.
    pub warning: bool,
    /// Ids of the rules that ran for this event's type
    /// (`spec.md` §4.3 step 8).
    #[serde(default)]
    pub processed_by_rules: Vec<String>,
}

impl EventMetadata {
    /// A fresh metadata block for an event collected right now.
    #[must_use]
    pub fn new(now: DateTime<Utc>, debug: bool) -> Self {
        Self {
            time: EventTime::new(now),
            status: EventStatus::Collected,
            debug,
            error: false,
            warning: false,
            processed_by_rules: Vec::new(),
        }
    }
}

/// A fully materialized event, bound to its originating source,
/// session and profile (`spec.md` §4.3 step 3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Event id, assigned at materialization.
    pub id: EventId,
    /// Event type.
    #[serde(rename = "type")]
    pub event_type: String,
    /// Status/error/warning/debug/rule-trace block.
    pub metadata: EventMetadata,
    /// Lower-cased, deduplicated tag set.
    #[serde(default)]
    pub tags: BTreeSet<String>,
    /// Owning session, if any (profile-less events may have one; events
    /// whose session was not saved may have this cleared — `spec.md` §4.4).
    pub session: Option<SessionId>,
    /// Owning profile, if any (`None` for profile-less payloads).
    pub profile: Option<ProfileId>,
    /// Request mapping merged from the parent payload's `request`.
    #[serde(default)]
    pub request: Map<String, Value>,
    /// Event-specific properties (post validation/reshape).
    #[serde(default)]
    pub properties: Map<String, Value>,
    /// Set by the rules engine when it substitutes this event
    /// (`spec.md` §4.3 step 11).
    #[serde(default)]
    pub update: bool,
    /// Session start time, copied from the session when present.
    pub session_start: Option<DateTime<Utc>>,
    /// Session duration, copied from the session when present.
    pub session_duration: Option<f64>,
    /// Whether this event is well-formed enough to run through the
    /// rules engine (cleared by schema validation failures, `spec.md`
    /// §4.7); invalid events are still persisted.
    #[serde(default = "default_true")]
    pub valid: bool,
}

fn default_true() -> bool {
    true
}

impl Event {
    /// Materialize an event from its payload plus the resolved
    /// `(source, session, profile)` context (`spec.md` §4.3 step 3).
    #[must_use]
    pub fn from_payload(
        payload: EventPayload,
        now: DateTime<Utc>,
        debug: bool,
        session: Option<&crate::session::Session>,
        profile_id: Option<ProfileId>,
        request: Map<String, Value>,
    ) -> Self {
        Self {
            id: EventId::generate(),
            event_type: payload.event_type,
            metadata: EventMetadata::new(now, debug),
            tags: BTreeSet::new(),
            session: session.map(|s| s.id.clone()),
            profile: profile_id,
            request,
            properties: payload.properties,
            update: false,
            session_start: session.map(|s| s.metadata.time.insert),
            session_duration: session.map(|s| s.metadata.time.duration),
            valid: true,
        }
    }

    /// Whether this event should be written to storage at all.
    ///
    /// All materialized events are persistent in this implementation;
    /// the predicate exists as the seam `spec.md` §3 documents, so a
    /// future event kind (e.g. a synthetic heartbeat) can opt out
    /// without touching the persistence coordinator.
    #[must_use]
    pub fn is_persistent(&self) -> bool {
        true
    }

    /// Union `self.tags` with `extra`, lower-cased and deduplicated
    /// (`spec.md` §8 invariant 9, §9 Open Question on tag ordering).
    pub fn union_tags<I: IntoIterator<Item = String>>(&mut self, extra: I) {
        for tag in extra {
            self.tags.insert(tag.to_lowercase());
        }
        // Normalize whatever was already present too.
        self.tags = self.tags.iter().map(|t| t.to_lowercase()).collect();
    }
}
