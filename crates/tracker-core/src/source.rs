//! `EventSource` — configuration of the ingesting channel (`spec.md` §3).

use crate::ids::SourceId;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A loaded, validated event source configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventSource {
    /// Source id.
    pub id: SourceId,
    /// Whether this source is allowed to return a full profile in the response.
    pub returns_profile: bool,
    /// Transitional sources never persist a session or an event
    /// (`spec.md` §4.1); used while a bridge is being migrated off.
    pub transitional: bool,
    /// Whether concurrent requests touching the same profile should be
    /// serialized (`spec.md` §4.5).
    pub synchronize_profiles: bool,
    /// Bridge kinds this source is allowed to be reached through.
    pub allowed_bridges: Vec<String>,
    /// Consent descriptor, echoed back to the caller as `source.consent`.
    pub consent: Value,
}

impl EventSource {
    /// Whether `bridge` is on this source's allow-list.
    #[must_use]
    pub fn allows_bridge(&self, bridge: &str) -> bool {
        self.allowed_bridges.iter().any(|b| b == bridge)
    }

    /// The portion of the source returned to the caller (`spec.md` §6
    /// response shape: `source: {consent}` only).
    #[must_use]
    pub fn to_response(&self) -> Value {
        serde_json::json!({ "consent": self.consent })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source() -> EventSource {
        EventSource {
            id: SourceId::from("src-A"),
            returns_profile: true,
            transitional: false,
            synchronize_profiles: false,
            allowed_bridges: vec!["rest".into(), "javascript".into()],
            consent: Value::Null,
        }
    }

    #[test]
    fn allow_list_is_checked_by_value() {
        let source = source();
        assert!(source.allows_bridge("rest"));
        assert!(!source.allows_bridge("webhook"));
    }
}
