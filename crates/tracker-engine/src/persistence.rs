//! Persistence Coordinator (`spec.md` §4.4).
//!
//! Runs the profile write concurrently with a strictly sequential
//! session-then-events chain, rather than the fully-concurrent
//! three-way gather a literal reading of the source would suggest:
//! `spec.md` §5 separately guarantees "events are persisted strictly
//! after session" (needed so an event can safely reference a session
//! id that exists), and that ordering can only be guaranteed by
//! sequencing those two writes.
//!
//! Console-log and debug-info writes are a separate, later step
//! ([`flush_diagnostics`]) so a pipeline stage that runs after the core
//! three writes (destination dispatch) still gets its console entries
//! flushed.

use crate::error::{EngineError, EngineResult};
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracker_core::prelude::*;
use tracker_storage::cache::{Cache, CacheNamespace};
use tracker_storage::driver::StorageDriver;
use tracker_storage::error::StorageResult;
use tracker_storage::records::SaveResult;

/// The tuple of write outcomes the coordinator returns (`spec.md`
/// glossary: "Collect result").
#[derive(Debug, Clone, Default)]
pub struct CollectResult {
    /// Outcome of the profile write.
    pub profile: SaveResult,
    /// Outcome of the session write.
    pub session: SaveResult,
    /// Outcome of the events write.
    pub events: SaveResult,
}

async fn cached_tags(storage: &dyn StorageDriver, cache: &Cache, event_type: &str, ttl: Duration) -> Vec<String> {
    if let Some(value) = cache.get(CacheNamespace::EventTag, event_type) {
        return serde_json::from_value(value).unwrap_or_default();
    }
    match storage.load_event_tag_metadata(event_type).await {
        Ok(Some(metadata)) => {
            if let Ok(value) = serde_json::to_value(&metadata.tags) {
                cache.set(CacheNamespace::EventTag, event_type, value, ttl);
            }
            metadata.tags
        },
        _ => Vec::new(),
    }
}

/// Persist `profile` (if present and dirty), `session`, and `events`,
/// applying the pre-write transformations `spec.md` §4.4 specifies
/// (process time, session-nulling, status reconciliation, tag union).
///
/// # Errors
///
/// Returns the first storage error encountered by any of the three
/// writes.
pub async fn persist_entities(
    storage: &Arc<dyn StorageDriver>,
    cache: &Cache,
    console_log: &ConsoleLog,
    payload: &TrackerPayload,
    profile: Option<&mut Profile>,
    session: &mut Session,
    mut events: Vec<Event>,
    event_tag_ttl: Duration,
    now: DateTime<Utc>,
) -> EngineResult<(CollectResult, Vec<Event>)> {
    let save_session = payload.is_on("saveSession", true);
    let save_events = payload.is_on("saveEvents", true);

    let session_exists_before = if save_events && !save_session {
        storage.session_exists(&session.id).await?
    } else {
        true
    };

    let indexed_console = console_log.indexed_by_event();

    for event in &mut events {
        let elapsed_ms = now.signed_duration_since(event.metadata.time.insert).num_milliseconds();
        event.metadata.time.process_time = Some((elapsed_ms.max(0) as f64) / 1000.0);

        if !save_session && !session_exists_before {
            event.session = None;
        }

        match indexed_console.get(&event.id) {
            Some(entry) if entry.is_error() => {
                event.metadata.status = EventStatus::Error;
                event.metadata.error = true;
            },
            Some(entry) if entry.is_warning() => {
                event.metadata.status = EventStatus::Warning;
                event.metadata.warning = true;
            },
            _ => {
                event.metadata.status = EventStatus::Processed;
            },
        }

        let tags = cached_tags(storage.as_ref(), cache, &event.event_type, event_tag_ttl).await;
        event.union_tags(tags);
    }

    let persistable: Vec<Event> = events.iter().filter(|event| event.is_persistent()).cloned().collect();

    let profile_needs_write = profile
        .as_deref()
        .is_some_and(|profile| profile.operation.new || profile.operation.needs_update());

    let profile_fut = async move {
        if let Some(profile) = profile {
            if profile_needs_write {
                let result = storage.save_profile(profile).await?;
                profile.operation.new = false;
                profile.operation.update = false;
                return Ok::<_, EngineError>(result);
            }
        }
        Ok(SaveResult::skipped())
    };

    let session_events_fut = async move {
        let session_result = if save_session {
            let was_new = session.operation.new;
            let result = storage.save_session(session).await?;
            if was_new {
                storage.refresh_sessions().await?;
            }
            session.operation.new = false;
            session.operation.update = false;
            result
        } else {
            SaveResult::skipped()
        };

        let events_result = if save_events && !persistable.is_empty() {
            storage.save_events(&persistable).await?
        } else {
            SaveResult::skipped()
        };

        Ok::<_, EngineError>((session_result, events_result))
    };

    let (profile_result, (session_result, events_result)) = tokio::try_join!(profile_fut, session_events_fut)?;

    Ok((
        CollectResult {
            profile: profile_result,
            session: session_result,
            events: events_result,
        },
        events,
    ))
}

/// Flush `console_log` and, if debugging produced trace data, the
/// debug-info document, as a group of spawned tasks awaited together
/// (`SPEC_FULL.md` §4.4, mirroring `spec.md` §5's "request task
/// group").
///
/// # Errors
///
/// Returns the first storage error encountered, or a task-join error
/// if a spawned write panicked.
pub async fn flush_diagnostics(
    storage: &Arc<dyn StorageDriver>,
    console_log: &ConsoleLog,
    debug_info: Option<Value>,
) -> EngineResult<()> {
    let mut handles: Vec<tokio::task::JoinHandle<StorageResult<()>>> = Vec::new();

    if !console_log.is_empty() {
        let storage = Arc::clone(storage);
        let entries = console_log.entries().to_vec();
        handles.push(tokio::spawn(async move { storage.append_console_log(&entries).await }));
    }

    if let Some(debug) = debug_info {
        let storage = Arc::clone(storage);
        handles.push(tokio::spawn(async move { storage.save_debug_info(debug).await }));
    }

    for handle in handles {
        match handle.await {
            Ok(Ok(())) => {},
            Ok(Err(err)) => return Err(err.into()),
            Err(join_err) => return Err(EngineError::stage_failure("persistence", join_err)),
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracker_storage::driver::InMemoryStorageDriver;

    fn sample_event(now: DateTime<Utc>) -> Event {
        Event::from_payload(
            EventPayload {
                event_type: "pageview".into(),
                properties: serde_json::Map::new(),
                options: serde_json::Map::new(),
            },
            now,
            false,
            None,
            None,
            serde_json::Map::new(),
        )
    }

    fn sample_payload() -> TrackerPayload {
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

    #[tokio::test]
    async fn events_pick_up_type_tags_and_process_time() {
        let cache = Cache::new();
        let console_log = ConsoleLog::new();
        let now = Utc::now();

        let concrete = InMemoryStorageDriver::new();
        concrete.seed_event_tag_metadata(tracker_storage::records::EventTypeMetadata {
            event_type: "pageview".into(),
            tags: vec!["Sale".into()],
        });
        let storage: Arc<dyn StorageDriver> = Arc::new(concrete);

        let payload = sample_payload();
        let mut session = Session::new(SessionId::from("sess-1"), now);
        let events = vec![sample_event(now)];

        let (collect, events) = persist_entities(
            &storage,
            &cache,
            &console_log,
            &payload,
            None,
            &mut session,
            events,
            Duration::from_secs(15),
            now,
        )
        .await
        .unwrap();

        assert_eq!(collect.events.saved, 1);
        assert!(events[0].tags.contains("sale"));
        assert!(events[0].metadata.time.process_time.unwrap() >= 0.0);
        assert_eq!(events[0].metadata.status, EventStatus::Processed);
    }

    #[tokio::test]
    async fn no_profile_means_no_profile_write() {
        let storage: Arc<dyn StorageDriver> = Arc::new(InMemoryStorageDriver::new());
        let cache = Cache::new();
        let console_log = ConsoleLog::new();
        let now = Utc::now();
        let payload = sample_payload();
        let mut session = Session::new(SessionId::from("sess-1"), now);

        let (collect, _events) = persist_entities(
            &storage,
            &cache,
            &console_log,
            &payload,
            None,
            &mut session,
            Vec::new(),
            Duration::from_secs(15),
            now,
        )
        .await
        .unwrap();

        assert_eq!(collect.profile.saved, 0);
    }
}
