//! Session & Profile Resolver (`spec.md` §4.2).

use crate::error::{EngineError, EngineResult};
use chrono::{DateTime, Utc};
use std::time::Duration;
use tracker_core::prelude::*;
use tracker_storage::cache::{Cache, CacheNamespace};
use tracker_storage::driver::StorageDriver;
use tracker_storage::error::StorageError;

/// Outcome of resolving `(Session, Profile)` for one payload.
#[derive(Debug)]
pub struct Resolution {
    /// The session this payload is bound to.
    pub session: Session,
    /// The profile this payload is bound to, `None` for profile-less
    /// requests.
    pub profile: Option<Profile>,
}

enum SessionLookup {
    Found(Session),
    Missing,
    Duplicated(Vec<String>),
}

async fn lookup_session(
    storage: &dyn StorageDriver,
    cache: &Cache,
    id: &SessionId,
    ttl: Duration,
) -> EngineResult<SessionLookup> {
    if let Some(cached) = cache.get(CacheNamespace::Session, id.as_str()) {
        let session: Session =
            serde_json::from_value(cached).map_err(|err| EngineError::stage_failure("resolver", err))?;
        return Ok(SessionLookup::Found(session));
    }

    match storage.load_session(id).await {
        Ok(Some(session)) => {
            if let Ok(value) = serde_json::to_value(&session) {
                cache.set(CacheNamespace::Session, id.as_str(), value, ttl);
            }
            Ok(SessionLookup::Found(session))
        },
        Ok(None) => Ok(SessionLookup::Missing),
        Err(StorageError::DuplicatedRecord { profile_ids, .. }) => Ok(SessionLookup::Duplicated(profile_ids)),
        Err(err) => Err(err.into()),
    }
}

fn correct_duplicated_session(session_id: &SessionId, profile_ids: Vec<String>, now: DateTime<Utc>) -> Session {
    let mut session = Session::new(session_id.clone(), now);
    if let [only] = profile_ids.as_slice() {
        session.bind_profile(ProfileId::from(only.clone()));
    }
    session
}

/// Load the session for `session_id`, recovering from a duplicated
/// record via the session corrector (`spec.md` §4.2, S5). Returns
/// `None` only when no session document exists and none needed to be
/// synthesized.
pub async fn load_or_correct_session(
    storage: &dyn StorageDriver,
    cache: &Cache,
    session_id: &SessionId,
    ttl: Duration,
    now: DateTime<Utc>,
) -> EngineResult<Option<Session>> {
    match lookup_session(storage, cache, session_id, ttl).await? {
        SessionLookup::Found(session) => Ok(Some(session)),
        SessionLookup::Missing => Ok(None),
        SessionLookup::Duplicated(profile_ids) => Ok(Some(correct_duplicated_session(session_id, profile_ids, now))),
    }
}

/// Dynamic resolution (`spec.md` §4.2 `get_profile_and_session`): the
/// five-branch decision table over `(session present?, profile
/// referenced?)`, plus the profile-less fast path.
pub async fn resolve_dynamic(
    storage: &dyn StorageDriver,
    payload: &TrackerPayload,
    existing_session: Option<Session>,
    now: DateTime<Utc>,
) -> EngineResult<Resolution> {
    let session_id = payload
        .session_id()
        .expect("force_session guarantees a session reference before resolution");

    if payload.profile_less {
        let mut session = existing_session.unwrap_or_else(|| Session::new(session_id, now));
        session.merge_payload_context(&payload.context, &payload.properties);
        return Ok(Resolution { session, profile: None });
    }

    let (mut session, profile) = match existing_session {
        None => match payload.profile_id() {
            None => {
                let mut session = Session::new(session_id, now);
                let profile = Profile::new(now);
                session.bind_profile(profile.id.clone());
                (session, profile)
            },
            Some(forged_id) => {
                let mut session = Session::new(session_id, now);
                let profile = match storage.load_merged_profile(&forged_id).await? {
                    Some(loaded) => loaded,
                    None => Profile::with_id(forged_id, now),
                };
                session.bind_profile(profile.id.clone());
                (session, profile)
            },
        },
        Some(mut session) => {
            let profile = match session.profile.clone() {
                Some(profile_ref) => match storage.load_merged_profile(&profile_ref.id).await? {
                    Some(loaded) if loaded.id == profile_ref.id => loaded,
                    Some(loaded) => {
                        session.bind_profile(loaded.id.clone());
                        session.operation.new = true;
                        loaded
                    },
                    None => {
                        let fresh = Profile::with_id(profile_ref.id.clone(), now);
                        session.bind_profile(fresh.id.clone());
                        session.operation.new = true;
                        fresh
                    },
                },
                None => {
                    let fresh = Profile::new(now);
                    session.bind_profile(fresh.id.clone());
                    session.operation.new = true;
                    fresh
                },
            };
            (session, profile)
        },
    };

    session.merge_payload_context(&payload.context, &payload.properties);
    Ok(Resolution { session, profile: Some(profile) })
}

/// Static resolution (`spec.md` §4.2 `get_static_profile_and_session`):
/// the caller asserts a known profile id, bypassing creation-on-miss
/// with a fixed id.
///
/// # Errors
///
/// Returns [`EngineError::InvalidArgument`] if `static_profile_id` is
/// empty.
pub async fn resolve_static(
    storage: &dyn StorageDriver,
    payload: &TrackerPayload,
    existing_session: Option<Session>,
    static_profile_id: &ProfileId,
    now: DateTime<Utc>,
) -> EngineResult<Resolution> {
    if static_profile_id.as_str().trim().is_empty() {
        return Err(EngineError::InvalidArgument("static profile id must not be empty".to_owned()));
    }

    let profile = match storage.load_merged_profile(static_profile_id).await? {
        Some(loaded) => loaded,
        None => Profile::with_id(static_profile_id.clone(), now),
    };

    let session_id = payload
        .session_id()
        .expect("force_session guarantees a session reference before resolution");
    let mut session = existing_session.unwrap_or_else(|| Session::new(session_id, now));
    session.bind_profile(profile.id.clone());
    session.merge_payload_context(&payload.context, &payload.properties);

    Ok(Resolution { session, profile: Some(profile) })
}
