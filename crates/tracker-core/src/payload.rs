//! `TrackerPayload` — the request envelope (`spec.md` §3).

use crate::event::EventPayload;
use crate::fingerprint::fingerprint;
use crate::ids::{ProfileId, RequestId, SessionId, SourceId};
use crate::source::EventSource;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Either an id-only reference to a source, or the fully loaded source
/// configuration — a tagged variant standing in for the original's
/// dynamically-typed `Union[EventSource, Entity]` (`spec.md` §9
/// "Dynamic typing → tagged variants").
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SourceRef {
    /// Only the id is known; not yet resolved against the source cache.
    Unresolved {
        /// Referenced source id.
        id: SourceId,
    },
    /// The full source configuration, resolved during ingestion.
    Resolved(Box<EventSource>),
}

impl SourceRef {
    /// The id, regardless of whether this reference is resolved.
    #[must_use]
    pub fn id(&self) -> &SourceId {
        match self {
            Self::Unresolved { id } => id,
            Self::Resolved(source) => &source.id,
        }
    }
}

/// An id-only reference to a session or profile, as carried by the
/// inbound payload before resolution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityRef {
    /// Referenced id.
    pub id: String,
}

/// `TrackerPayload.metadata`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayloadMetadata {
    /// When this payload instance was constructed.
    pub insert: DateTime<Utc>,
}

/// Recognized entries of `TrackerPayload.options` (`spec.md` §6).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrackerOptions {
    #[serde(flatten)]
    inner: Map<String, Value>,
}

impl TrackerOptions {
    /// Read a boolean option, falling back to `default` if absent or
    /// not a boolean (mirrors the original's `is_on`).
    #[must_use]
    pub fn is_on(&self, key: &str, default: bool) -> bool {
        self.inner.get(key).and_then(Value::as_bool).unwrap_or(default)
    }

    /// Force-set a boolean option, overriding any caller-supplied value.
    pub fn set(&mut self, key: &str, value: bool) {
        self.inner.insert(key.to_string(), Value::Bool(value));
    }
}

/// A batch of events from an external collector, plus resolution
/// context for session/profile binding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerPayload {
    /// Stable, opaque request id, assigned on construction.
    #[serde(skip_deserializing, default = "RequestId::new")]
    pub id: RequestId,
    /// Source reference (id-only on ingestion, resolved during
    /// source validation).
    pub source: SourceRef,
    /// Session reference, id only at this stage.
    pub session: Option<EntityRef>,
    /// Profile reference, id only at this stage.
    pub profile: Option<EntityRef>,
    /// Context mapping.
    #[serde(default)]
    pub context: Map<String, Value>,
    /// Properties mapping.
    #[serde(default)]
    pub properties: Map<String, Value>,
    /// Request mapping (headers live under `request.headers`).
    #[serde(default)]
    pub request: Map<String, Value>,
    /// Ordered list of events.
    #[serde(default)]
    pub events: Vec<EventPayload>,
    /// Recognized + passthrough options.
    #[serde(default)]
    pub options: TrackerOptions,
    /// Whether this request should bypass profile creation entirely.
    #[serde(default)]
    pub profile_less: bool,
    /// Insert-time metadata, set at construction.
    #[serde(default = "default_metadata")]
    pub metadata: PayloadMetadata,
}

fn default_metadata() -> PayloadMetadata {
    PayloadMetadata { insert: Utc::now() }
}

impl TrackerPayload {
    /// Trim whitespace from `source.id`, `session.id` and `profile.id`
    /// (`spec.md` §4.1).
    pub fn trim_ids(&mut self) {
        match &mut self.source {
            SourceRef::Unresolved { id } => id.trim(),
            SourceRef::Resolved(source) => source.id.trim(),
        }
        if let Some(session) = &mut self.session {
            session.id = session.id.trim().to_string();
        }
        if let Some(profile) = &mut self.profile {
            profile.id = profile.id.trim().to_string();
        }
    }

    /// Strip `authorization`/`cookie` from `request.headers` in place
    /// (`spec.md` §3 invariant: "headers never contain credentials
    /// after ingestion").
    pub fn redact_headers(&mut self) {
        if let Some(Value::Object(headers)) = self.request.get_mut("headers") {
            headers.remove("authorization");
            headers.remove("cookie");
        }
    }

    /// Ensure a session reference exists, generating a random one if
    /// absent (`spec.md` §4.1 "force session"). Recovers the original
    /// source's unexposed `force_there_is_a_session` (`SPEC_FULL.md` §4.1).
    pub fn force_session(&mut self) {
        if self
            .session
            .as_ref()
            .is_none_or(|s| s.id.trim().is_empty())
        {
            self.session = Some(EntityRef {
                id: SessionId::generate().to_string(),
            });
        }
    }

    /// Apply a source's `transitional`/`returns_profile` flags onto
    /// `options` (`spec.md` §4.1).
    pub fn apply_source_options(&mut self, source: &EventSource) {
        if source.transitional {
            self.options.set("saveSession", false);
            self.options.set("saveEvents", false);
        }
        if !source.returns_profile {
            self.options.set("profile", false);
        }
    }

    /// Whether the caller asked for the profile in the response.
    #[must_use]
    pub fn return_profile(&self) -> bool {
        self.options.is_on("profile", false)
    }

    /// Whether debug output was requested and globally enabled.
    #[must_use]
    pub fn is_debugging_on(&self, track_debug_enabled: bool) -> bool {
        track_debug_enabled && self.options.is_on("debugger", false)
    }

    /// Whether option `key` is on, given `default`.
    #[must_use]
    pub fn is_on(&self, key: &str, default: bool) -> bool {
        self.options.is_on(key, default)
    }

    /// The id this payload references for session resolution.
    #[must_use]
    pub fn session_id(&self) -> Option<SessionId> {
        self.session.as_ref().map(|s| SessionId::from(s.id.clone()))
    }

    /// The id this payload references for profile resolution.
    #[must_use]
    pub fn profile_id(&self) -> Option<ProfileId> {
        self.profile.as_ref().map(|p| ProfileId::from(p.id.clone()))
    }

    /// SHA-1 fingerprint of the payload excluding `events` and
    /// `metadata` (`spec.md` §3, §8 invariant 2).
    #[must_use]
    pub fn get_finger_print(&self) -> String {
        // `id` is excluded too: like the original's private `_id`
        // attribute, it is per-instance and would make otherwise
        // identical payloads fingerprint differently.
        let value = serde_json::json!({
            "source": self.source,
            "session": self.session,
            "profile": self.profile,
            "context": self.context,
            "properties": self.properties,
            "request": self.request,
            "options": self.options,
            "profile_less": self.profile_less,
        });
        fingerprint(&value)
    }
}
