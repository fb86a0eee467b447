//! `Session` — a long-lived entity spanning many payloads (`spec.md` §3).

use crate::ids::{ProfileId, SessionId};
use crate::operation::Operation;
use crate::time::SessionMetadata;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A weak back-reference from a session to the profile it belongs to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProfileRef {
    /// Referenced profile id.
    pub id: ProfileId,
}

impl ProfileRef {
    /// Build a reference to `id`.
    #[must_use]
    pub fn new(id: ProfileId) -> Self {
        Self { id }
    }
}

/// A user session, created on first payload for its id and updated
/// whenever its profile binding or context/properties change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Session id.
    pub id: SessionId,
    /// Insert/last-timestamp/duration block.
    pub metadata: SessionMetadata,
    /// Optional back-reference to the owning profile.
    pub profile: Option<ProfileRef>,
    /// Context accumulated across payloads for this session.
    #[serde(default)]
    pub context: Map<String, Value>,
    /// Properties accumulated across payloads for this session.
    #[serde(default)]
    pub properties: Map<String, Value>,
    /// Why this session needs to be (re)written.
    pub operation: Operation,
}

impl Session {
    /// Start a brand-new session with the given id.
    #[must_use]
    pub fn new(id: SessionId, now: DateTime<Utc>) -> Self {
        Self {
            id,
            metadata: SessionMetadata::new(now),
            profile: None,
            context: Map::new(),
            properties: Map::new(),
            operation: Operation {
                new: true,
                ..Default::default()
            },
        }
    }

    /// Bind this session to `profile_id`, marking the session dirty.
    pub fn bind_profile(&mut self, profile_id: ProfileId) {
        self.profile = Some(ProfileRef::new(profile_id));
    }

    /// Merge `context`/`properties` from an incoming payload, with
    /// incoming keys overwriting existing ones (`spec.md` §4.2).
    pub fn merge_payload_context(&mut self, context: &Map<String, Value>, properties: &Map<String, Value>) {
        for (k, v) in context {
            self.context.insert(k.clone(), v.clone());
        }
        for (k, v) in properties {
            self.properties.insert(k.clone(), v.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_overwrites_existing_keys() {
        let mut session = Session::new(SessionId::from("s1"), Utc::now());
        session.context.insert("tz".into(), Value::String("UTC".into()));

        let mut incoming = Map::new();
        incoming.insert("tz".into(), Value::String("Europe/Warsaw".into()));

        session.merge_payload_context(&incoming, &Map::new());
        assert_eq!(session.context.get("tz").unwrap(), "Europe/Warsaw");
    }
}
