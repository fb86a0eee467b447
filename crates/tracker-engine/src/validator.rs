//! Validator & Reshaper (`spec.md` §4.7).
//!
//! No schema/reshape-rule source survived the distillation this crate
//! was built from, and the format is unspecified — so the actual
//! validation/reshape logic is a swappable [`EventSchema`], with
//! [`PermissiveSchema`] as the default: every event is valid and no
//! property is rewritten. What's fixed is the orchestration loop this
//! module owns: run validation before reshape, mutate the console log
//! in place, and always retain the event (valid or not).

use tracker_core::prelude::*;

/// A dotted-path reader binding the scopes a reshape rule may read
/// from (`spec.md` glossary: "Dot accessor").
pub struct DotAccessor<'a> {
    /// Profile in scope, if any.
    pub profile: Option<&'a Profile>,
    /// Session in scope.
    pub session: Option<&'a Session>,
    /// The inbound payload.
    pub payload: &'a TrackerPayload,
}

impl DotAccessor<'_> {
    /// Resolve a dotted path like `profile.traits.public.email` against
    /// the bound scopes. Returns `None` if any segment is missing.
    #[must_use]
    pub fn get(&self, path: &str) -> Option<serde_json::Value> {
        let mut segments = path.split('.');
        let scope = segments.next()?;
        let root = match scope {
            "profile" => serde_json::to_value(self.profile?).ok()?,
            "session" => serde_json::to_value(self.session?).ok()?,
            "payload" => serde_json::to_value(self.payload).ok()?,
            _ => return None,
        };
        segments.try_fold(root, |value, segment| value.get(segment).cloned())
    }
}

/// Swappable validation/reshape logic for one event.
pub trait EventSchema: Send + Sync {
    /// Validate `event` against its type's schema, returning an error
    /// message on the first violation found.
    ///
    /// # Errors
    ///
    /// Returns `Err` describing the violation; the event is still
    /// retained by the caller regardless.
    fn validate(&self, event: &Event) -> Result<(), String>;

    /// Rewrite `event.properties` using paths resolved against
    /// `accessor`. Exceptions are the caller's responsibility to turn
    /// into console errors; this trait's contract is infallible so a
    /// permissive default can be total.
    fn reshape(&self, event: &mut Event, accessor: &DotAccessor<'_>);
}

/// Accepts every event unmodified.
pub struct PermissiveSchema;

impl EventSchema for PermissiveSchema {
    fn validate(&self, _event: &Event) -> Result<(), String> {
        Ok(())
    }

    fn reshape(&self, _event: &mut Event, _accessor: &DotAccessor<'_>) {}
}

/// Run validation then reshape over `events`, in place in the console
/// log, retaining every event regardless of validity
/// (`spec.md` §4.7: "invalid events are preserved but excluded from
/// rule invocation downstream").
#[must_use]
pub fn validate_and_reshape(
    events: Vec<Event>,
    accessor: &DotAccessor<'_>,
    schema: &dyn EventSchema,
    console_log: &mut ConsoleLog,
) -> Vec<Event> {
    events
        .into_iter()
        .map(|mut event| {
            if let Err(message) = schema.validate(&event) {
                event.valid = false;
                console_log.append(Console::error(
                    "validator",
                    message,
                    Some(event.id.clone()),
                    event.profile.clone(),
                    None,
                ));
            }
            schema.reshape(&mut event, accessor);
            event
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn payload() -> TrackerPayload {
        TrackerPayload {
            id: RequestId::new(),
            source: SourceRef::Unresolved { id: SourceId::from("src-A") },
            session: Some(EntityRef { id: "sess-1".into() }),
            profile: None,
            context: serde_json::Map::new(),
            properties: serde_json::Map::new(),
            request: serde_json::Map::new(),
            events: Vec::new(),
            options: TrackerOptions::default(),
            profile_less: false,
            metadata: PayloadMetadata { insert: Utc::now() },
        }
    }

    #[test]
    fn accessor_resolves_nested_session_path() {
        let session = Session::new(SessionId::from("sess-1"), Utc::now());
        let payload = payload();
        let accessor = DotAccessor {
            profile: None,
            session: Some(&session),
            payload: &payload,
        };
        assert_eq!(accessor.get("session.id"), Some(serde_json::json!("sess-1")));
        assert_eq!(accessor.get("profile.id"), None);
    }

    #[test]
    fn permissive_schema_never_invalidates() {
        let event = Event::from_payload(
            EventPayload {
                event_type: "pageview".into(),
                properties: serde_json::Map::new(),
                options: serde_json::Map::new(),
            },
            Utc::now(),
            false,
            None,
            None,
            serde_json::Map::new(),
        );
        let mut console_log = ConsoleLog::new();
        let payload = payload();
        let accessor = DotAccessor {
            profile: None,
            session: None,
            payload: &payload,
        };
        let events = validate_and_reshape(vec![event], &accessor, &PermissiveSchema, &mut console_log);
        assert!(events[0].valid);
        assert!(console_log.is_empty());
    }
}
