//! End-to-end pipeline scenarios (`spec.md` §8 S1-S6 and invariants),
//! driven entirely through [`Engine::track`] against an in-memory
//! storage driver.

use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use tracker_core::prelude::*;
use tracker_engine::prelude::*;
use tracker_storage::error::StorageResult;
use tracker_storage::prelude::*;

/// Wraps an [`InMemoryStorageDriver`], redirecting `load_merged_profile`
/// for one specific id to a profile carrying a different id entirely —
/// standing in for a profile that was re-merged (and thus renamed) by
/// another request between the session's bind and this lookup
/// (`spec.md` §4.2, S4). Every other call delegates straight through.
struct RemergedProfileDriver {
    inner: InMemoryStorageDriver,
    redirect_from: ProfileId,
    redirect_to: Profile,
}

#[async_trait]
impl StorageDriver for RemergedProfileDriver {
    async fn load_session(&self, id: &SessionId) -> StorageResult<Option<Session>> {
        self.inner.load_session(id).await
    }

    async fn save_session(&self, session: &Session) -> StorageResult<SaveResult> {
        self.inner.save_session(session).await
    }

    async fn refresh_sessions(&self) -> StorageResult<()> {
        self.inner.refresh_sessions().await
    }

    async fn session_exists(&self, id: &SessionId) -> StorageResult<bool> {
        self.inner.session_exists(id).await
    }

    async fn load_merged_profile(&self, id: &ProfileId) -> StorageResult<Option<Profile>> {
        if *id == self.redirect_from {
            return Ok(Some(self.redirect_to.clone()));
        }
        self.inner.load_merged_profile(id).await
    }

    async fn save_profile(&self, profile: &Profile) -> StorageResult<SaveResult> {
        self.inner.save_profile(profile).await
    }

    async fn find_profiles_sharing_merge_keys(
        &self,
        merge_keys: &[(String, String)],
        exclude: &ProfileId,
    ) -> StorageResult<Vec<Profile>> {
        self.inner.find_profiles_sharing_merge_keys(merge_keys, exclude).await
    }

    async fn save_events(&self, events: &[Event]) -> StorageResult<SaveResult> {
        self.inner.save_events(events).await
    }

    async fn append_console_log(&self, entries: &[Console]) -> StorageResult<()> {
        self.inner.append_console_log(entries).await
    }

    async fn save_debug_info(&self, debug: serde_json::Value) -> StorageResult<()> {
        self.inner.save_debug_info(debug).await
    }

    async fn load_source(&self, id: &SourceId) -> StorageResult<Option<EventSource>> {
        self.inner.load_source(id).await
    }

    async fn load_rules(&self, source_id: &SourceId, event_types: &[String]) -> StorageResult<Option<Vec<RuleRecord>>> {
        self.inner.load_rules(source_id, event_types).await
    }

    async fn load_event_tag_metadata(&self, event_type: &str) -> StorageResult<Option<EventTypeMetadata>> {
        self.inner.load_event_tag_metadata(event_type).await
    }
}

fn source(id: &str, transitional: bool, synchronize_profiles: bool) -> EventSource {
    EventSource {
        id: SourceId::from(id),
        returns_profile: true,
        transitional,
        synchronize_profiles,
        allowed_bridges: vec!["rest".to_owned()],
        consent: serde_json::Value::Null,
    }
}

fn engine_with(storage: &Arc<InMemoryStorageDriver>) -> Engine {
    Engine::with_defaults(Arc::clone(storage) as Arc<dyn StorageDriver>, EngineConfig::default())
}

fn pageview_payload(source_id: &str, session_id: &str) -> TrackerPayload {
    TrackerPayload {
        id: RequestId::new(),
        source: SourceRef::Unresolved { id: SourceId::from(source_id) },
        session: Some(EntityRef { id: session_id.to_owned() }),
        profile: None,
        context: serde_json::Map::new(),
        properties: serde_json::Map::new(),
        request: serde_json::Map::new(),
        events: vec![EventPayload {
            event_type: "pageview".to_owned(),
            properties: serde_json::Map::new(),
            options: serde_json::Map::new(),
        }],
        options: TrackerOptions::default(),
        profile_less: false,
        metadata: PayloadMetadata { insert: chrono::Utc::now() },
    }
}

fn request(payload: TrackerPayload) -> TrackRequest {
    TrackRequest {
        payload,
        client_ip: None,
        bridge: "rest".to_owned(),
        internal_source: None,
        run_async: false,
        static_profile_id: None,
        allowed_bridges: None,
    }
}

// S1: fresh source, fresh session, no profile reference — everything is created.
#[tokio::test]
async fn s1_new_everything_creates_profile_session_and_event() {
    let storage = Arc::new(InMemoryStorageDriver::new());
    storage.seed_source(source("src-A", false, false));
    let engine = engine_with(&storage);

    let payload = pageview_payload("src-A", "sess-1");
    let response = engine.track(request(payload)).await.unwrap();

    let profile_id = response.profile.as_ref().and_then(|p| p.get("id")).expect("profile id in response");
    assert!(profile_id.is_string());

    assert!(storage.has_session(&SessionId::from("sess-1")));

    let events = storage.events_snapshot();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_type, "pageview");
    assert_eq!(events[0].metadata.status, EventStatus::Processed);
    assert!(events[0].metadata.time.process_time.unwrap() >= 0.0);
}

// S2: a transitional source never persists a session, an event, or a profile,
// and the response carries no `profile` field at all.
#[tokio::test]
async fn s2_transitional_source_persists_nothing() {
    let storage = Arc::new(InMemoryStorageDriver::new());
    storage.seed_source(source("src-transitional", true, false));
    let engine = engine_with(&storage);

    let payload = pageview_payload("src-transitional", "sess-2");
    let response = engine.track(request(payload)).await.unwrap();

    assert!(response.profile.is_none());
    assert!(response.ux.is_empty());
    assert!(response.response.is_empty());
    assert!(!storage.has_session(&SessionId::from("sess-2")));
    assert!(storage.events_snapshot().is_empty());
}

// S3: a caller-forged profile id with no matching document still results
// in a new profile carrying exactly that id.
#[tokio::test]
async fn s3_forged_profile_id_is_adopted_when_missing() {
    let storage = Arc::new(InMemoryStorageDriver::new());
    storage.seed_source(source("src-A", false, false));
    let engine = engine_with(&storage);

    let mut payload = pageview_payload("src-A", "sess-3");
    payload.profile = Some(EntityRef { id: "ghost".to_owned() });
    let response = engine.track(request(payload)).await.unwrap();

    let profile_id = response.profile.as_ref().and_then(|p| p.get("id")).unwrap();
    assert_eq!(profile_id, &serde_json::to_value(ProfileId::from("ghost")).unwrap());

    let loaded = storage.load_merged_profile(&ProfileId::from("ghost")).await.unwrap();
    assert!(loaded.is_some());
    assert!(storage.has_session(&SessionId::from("sess-3")));
    assert_eq!(storage.events_snapshot().len(), 1);
}

// S4: the session's bound profile exists, but loading it returns a profile
// under a different id — another request merged it elsewhere in the
// meantime — so the session is rebound to the real id and marked new.
#[tokio::test]
async fn s4_session_profile_was_remerged_elsewhere() {
    let inner = InMemoryStorageDriver::new();
    inner.seed_source(source("src-A", false, false));
    let mut session = Session::new(SessionId::from("sess-4"), chrono::Utc::now());
    session.bind_profile(ProfileId::from("prof-old"));
    inner.seed_session(session);

    let driver = Arc::new(RemergedProfileDriver {
        inner,
        redirect_from: ProfileId::from("prof-old"),
        redirect_to: Profile::with_id(ProfileId::from("prof-new"), chrono::Utc::now()),
    });
    let engine = Engine::with_defaults(Arc::clone(&driver) as Arc<dyn StorageDriver>, EngineConfig::default());

    let payload = pageview_payload("src-A", "sess-4");
    let response = engine.track(request(payload)).await.unwrap();

    let profile_id = response.profile.as_ref().and_then(|p| p.get("id")).unwrap();
    assert_eq!(profile_id, &serde_json::to_value(ProfileId::from("prof-new")).unwrap());

    let stored_session = driver.inner.load_session(&SessionId::from("sess-4")).await.unwrap().unwrap();
    assert_eq!(stored_session.profile.unwrap().id, ProfileId::from("prof-new"));
}

// S5: a session id that resolves to more than one document is corrected by
// binding to the sole profile the duplicate records agree on, then the
// pipeline continues normally.
#[tokio::test]
async fn s5_duplicated_session_is_corrected_and_pipeline_continues() {
    let storage = Arc::new(InMemoryStorageDriver::new());
    storage.seed_source(source("src-A", false, false));
    storage.seed_profile(Profile::with_id(ProfileId::from("prof-7"), chrono::Utc::now()));
    storage.seed_duplicate_session(&SessionId::from("dup-sess"), vec!["prof-7".to_owned()]);
    let engine = engine_with(&storage);

    let payload = pageview_payload("src-A", "dup-sess");
    let response = engine.track(request(payload)).await.unwrap();

    let profile_id = response.profile.as_ref().and_then(|p| p.get("id")).unwrap();
    assert_eq!(profile_id, &serde_json::to_value(ProfileId::from("prof-7")).unwrap());
    assert!(storage.has_session(&SessionId::from("dup-sess")));
    assert_eq!(storage.events_snapshot().len(), 1);
}

// S6: two concurrent requests against the same profile, with
// synchronize_profiles on, must both succeed and each record its own visit.
#[tokio::test]
async fn s6_concurrent_same_profile_requests_are_serialized() {
    let storage = Arc::new(InMemoryStorageDriver::new());
    storage.seed_source(source("src-sync", false, true));
    storage.seed_profile(Profile::with_id(ProfileId::from("prof-shared"), chrono::Utc::now()));
    let engine = engine_with(&storage);

    let mut payload_a = pageview_payload("src-sync", "sess-a");
    payload_a.profile = Some(EntityRef { id: "prof-shared".to_owned() });
    let mut payload_b = pageview_payload("src-sync", "sess-b");
    payload_b.profile = Some(EntityRef { id: "prof-shared".to_owned() });

    let engine_a = engine.clone();
    let engine_b = engine.clone();
    let (result_a, result_b) =
        tokio::join!(engine_a.track(request(payload_a)), engine_b.track(request(payload_b)));

    let response_a = result_a.unwrap();
    let response_b = result_b.unwrap();

    let id_a = response_a.profile.as_ref().and_then(|p| p.get("id")).unwrap();
    let id_b = response_b.profile.as_ref().and_then(|p| p.get("id")).unwrap();
    assert_eq!(id_a, id_b);

    let merged = storage.load_merged_profile(&ProfileId::from("prof-shared")).await.unwrap().unwrap();
    assert_eq!(merged.metadata.visit.count, 2);
}

// Invariant 3: request headers never retain authorization/cookie once
// they reach storage.
#[tokio::test]
async fn invariant_headers_never_persist_credentials() {
    let storage = Arc::new(InMemoryStorageDriver::new());
    storage.seed_source(source("src-A", false, false));
    let engine = engine_with(&storage);

    let mut payload = pageview_payload("src-A", "sess-headers");
    payload.request.insert(
        "headers".to_owned(),
        json!({"authorization": "Bearer secret", "cookie": "a=b", "accept": "*/*"}),
    );
    engine.track(request(payload)).await.unwrap();

    let events = storage.events_snapshot();
    let headers = events[0].request.get("headers").unwrap();
    assert!(headers.get("authorization").is_none());
    assert!(headers.get("cookie").is_none());
    assert!(headers.get("accept").is_some());
}

// Invariant 4: profile_less requests never write a profile document.
#[tokio::test]
async fn invariant_profile_less_never_writes_a_profile() {
    let storage = Arc::new(InMemoryStorageDriver::new());
    storage.seed_source(source("src-A", false, false));
    let engine = engine_with(&storage);

    let mut payload = pageview_payload("src-A", "sess-pl");
    payload.profile_less = true;
    let response = engine.track(request(payload)).await.unwrap();

    assert!(response.profile.is_none());
    let events = storage.events_snapshot();
    assert!(events[0].profile.is_none());
}

// Invariant 5: saveEvents=false still returns a profile/ux but writes no events.
#[tokio::test]
async fn invariant_save_events_false_skips_event_write_but_keeps_response() {
    let storage = Arc::new(InMemoryStorageDriver::new());
    storage.seed_source(source("src-A", false, false));
    let engine = engine_with(&storage);

    let mut payload = pageview_payload("src-A", "sess-no-events");
    payload.options.set("saveEvents", false);
    let response = engine.track(request(payload)).await.unwrap();

    assert!(response.profile.is_some());
    assert!(storage.events_snapshot().is_empty());
}

// Invariant 6: a transitional source writes neither a session nor an event
// (already covered end to end by S2; this focuses on the two writes alone).
#[tokio::test]
async fn invariant_transitional_skips_session_and_event_writes() {
    let storage = Arc::new(InMemoryStorageDriver::new());
    storage.seed_source(source("src-transitional-2", true, false));
    let engine = engine_with(&storage);

    let payload = pageview_payload("src-transitional-2", "sess-skip");
    engine.track(request(payload)).await.unwrap();

    assert!(!storage.has_session(&SessionId::from("sess-skip")));
    assert!(storage.events_snapshot().is_empty());
}

// Invariant 9: event tags end up lower-cased and deduplicated, unioned
// with the cached event-type tag metadata.
#[tokio::test]
async fn invariant_event_tags_are_lowercase_and_deduped() {
    let storage = Arc::new(InMemoryStorageDriver::new());
    storage.seed_source(source("src-A", false, false));
    storage.seed_event_tag_metadata(EventTypeMetadata {
        event_type: "pageview".to_owned(),
        tags: vec!["Sale".to_owned(), "SALE".to_owned()],
    });
    let engine = engine_with(&storage);

    let payload = pageview_payload("src-A", "sess-tags");
    engine.track(request(payload)).await.unwrap();

    let events = storage.events_snapshot();
    assert_eq!(events[0].tags.len(), 1);
    assert!(events[0].tags.contains("sale"));
}

// Invariant 10: process_time is always non-negative.
#[tokio::test]
async fn invariant_process_time_is_non_negative() {
    let storage = Arc::new(InMemoryStorageDriver::new());
    storage.seed_source(source("src-A", false, false));
    let engine = engine_with(&storage);

    let payload = pageview_payload("src-A", "sess-time");
    engine.track(request(payload)).await.unwrap();

    let events = storage.events_snapshot();
    assert!(events[0].metadata.time.process_time.unwrap() >= 0.0);
}

// An unknown source fails with Unauthorized rather than panicking.
#[tokio::test]
async fn unknown_source_is_rejected() {
    let storage = Arc::new(InMemoryStorageDriver::new());
    let engine = engine_with(&storage);

    let payload = pageview_payload("src-missing", "sess-x");
    let err = engine.track(request(payload)).await.unwrap_err();
    assert!(matches!(err, EngineError::Unauthorized(_)));
}

// A bridge not on the source's allow-list is rejected the same way.
#[tokio::test]
async fn disallowed_bridge_is_rejected() {
    let storage = Arc::new(InMemoryStorageDriver::new());
    storage.seed_source(source("src-A", false, false));
    let engine = engine_with(&storage);

    let mut req = request(pageview_payload("src-A", "sess-y"));
    req.bridge = "webhook".to_owned();
    let err = engine.track(req).await.unwrap_err();
    assert!(matches!(err, EngineError::Unauthorized(_)));
}

// A call-level `allowed_bridges` further restricts the source's own
// allow-list, even when the bridge used is on the source's list.
#[tokio::test]
async fn call_level_allowed_bridges_further_restricts_the_source() {
    let storage = Arc::new(InMemoryStorageDriver::new());
    storage.seed_source(source("src-A", false, false));
    let engine = engine_with(&storage);

    let mut req = request(pageview_payload("src-A", "sess-z"));
    req.allowed_bridges = Some(vec!["javascript".to_owned()]);
    let err = engine.track(req).await.unwrap_err();
    assert!(matches!(err, EngineError::Unauthorized(_)));
}
