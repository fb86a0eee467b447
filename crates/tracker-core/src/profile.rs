//! `Profile` — shared state referenced by many sessions and events (`spec.md` §3).

use crate::ids::ProfileId;
use crate::operation::Operation;
use crate::time::ProfileMetadata;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Public and private trait bags carried by a profile.
///
/// `private` is never included in a `track()` response (`spec.md` §6).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileTraits {
    /// Traits visible in API responses.
    #[serde(default)]
    pub public: Map<String, Value>,
    /// Traits excluded from API responses.
    #[serde(default)]
    pub private: Map<String, Value>,
}

/// A profile: the durable identity behind a visitor, shared across
/// sessions and events (never owned by a single request).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    /// Profile id.
    pub id: ProfileId,
    /// Insert time plus visit history.
    pub metadata: ProfileMetadata,
    /// Why this profile needs to be (re)written.
    pub operation: Operation,
    /// Public/private trait bags.
    #[serde(default)]
    pub traits: ProfileTraits,
    /// Personally identifiable information, excluded from responses.
    #[serde(default)]
    pub pii: Map<String, Value>,
}

impl Profile {
    /// Create a brand-new profile with a random id.
    #[must_use]
    pub fn new(now: DateTime<Utc>) -> Self {
        Self::with_id(ProfileId::generate(), now)
    }

    /// Create a brand-new profile with a specific (possibly
    /// caller-asserted) id (`spec.md` §4.2 "forged profile id" / static
    /// resolution).
    #[must_use]
    pub fn with_id(id: ProfileId, now: DateTime<Utc>) -> Self {
        Self {
            id,
            metadata: ProfileMetadata::new(now),
            operation: Operation {
                new: true,
                ..Default::default()
            },
            traits: ProfileTraits::default(),
            pii: Map::new(),
        }
    }

    /// Snapshot of the fields that matter for destination-diffing
    /// (`spec.md` §4.3 step 2/13): everything except `operation`.
    #[must_use]
    pub fn diffable_snapshot(&self) -> Value {
        serde_json::json!({
            "id": self.id,
            "metadata": self.metadata,
            "traits": self.traits,
            "pii": self.pii,
        })
    }

    /// The full response representation, excluding `traits.private`,
    /// `pii` and `operation` (`spec.md` §6).
    #[must_use]
    pub fn to_public_response(&self) -> Value {
        serde_json::json!({
            "id": self.id,
            "metadata": self.metadata,
            "traits": { "public": self.traits.public },
        })
    }

    /// The minimal `{id}`-only response representation.
    #[must_use]
    pub fn to_id_response(&self) -> Value {
        serde_json::json!({ "id": self.id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_excludes_operation() {
        let profile = Profile::new(Utc::now());
        let snapshot = profile.diffable_snapshot();
        assert!(snapshot.get("operation").is_none());
    }

    #[test]
    fn public_response_excludes_private_and_pii() {
        let mut profile = Profile::new(Utc::now());
        profile
            .traits
            .private
            .insert("ssn".into(), Value::String("secret".into()));
        profile.pii.insert("email".into(), Value::String("a@b.com".into()));

        let response = profile.to_public_response();
        assert!(response.get("pii").is_none());
        assert!(response["traits"].get("private").is_none());
    }
}
