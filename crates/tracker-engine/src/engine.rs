//! The `Engine` entry point (`spec.md` §4.1 ingestion, §4.5 synchronization,
//! §5 async detach).

use crate::collaborators::{DefaultProfileMerger, NoopDestinationDispatcher, NoopRulesEngine, NoopSegmentation};
use crate::collaborators::{DestinationDispatcher, ProfileMerger, RulesEngine, Segmentation};
use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::resolver::Resolution;
use crate::response::TrackResponse;
use crate::validator::{EventSchema, PermissiveSchema};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracker_core::prelude::*;
use tracker_storage::cache::Cache;
use tracker_storage::driver::StorageDriver;
use tracker_sync::ProfileSynchronizer;
use tracing::{info, warn};

/// One inbound tracking request (`spec.md` §3 `TrackRequest`).
pub struct TrackRequest {
    /// The payload as received.
    pub payload: TrackerPayload,
    /// Caller's IP, for context merging only — never persisted as an id.
    pub client_ip: Option<String>,
    /// The bridge this request arrived through (`rest`, `javascript`, …).
    pub bridge: String,
    /// When set, the request is treated as coming from this internal
    /// source regardless of `payload.source`, bypassing the allowed-bridge
    /// check (`SPEC_FULL.md` §4.1).
    pub internal_source: Option<SourceId>,
    /// Detach the pipeline and return a minimal response immediately
    /// (`spec.md` §5 "the async path").
    pub run_async: bool,
    /// Bypass dynamic resolution and resolve against a caller-asserted
    /// profile id (`spec.md` §4.2 `get_static_profile_and_session`).
    pub static_profile_id: Option<ProfileId>,
    /// Caller-supplied allow-list for this call (`spec.md` §4.1 `track`'s
    /// own `allowed_bridges` parameter), further restricting the
    /// source's own `allowed_bridges` rather than replacing it. `None`
    /// means the source's list alone governs.
    pub allowed_bridges: Option<Vec<String>>,
}

/// The assembled tracking core: storage, cache, synchronizer and the
/// external collaborators, wired together behind one cheaply-`Clone`able
/// handle (`spec.md` §1 "process-wide singletons").
#[derive(Clone)]
pub struct Engine {
    pub(crate) storage: Arc<dyn StorageDriver>,
    pub(crate) cache: Arc<Cache>,
    pub(crate) synchronizer: Arc<ProfileSynchronizer>,
    pub(crate) rules_engine: Arc<dyn RulesEngine>,
    pub(crate) segmentation: Arc<dyn Segmentation>,
    pub(crate) profile_merger: Arc<dyn ProfileMerger>,
    pub(crate) destination: Arc<dyn DestinationDispatcher>,
    pub(crate) schema: Arc<dyn EventSchema>,
    pub(crate) config: EngineConfig,
}

impl Engine {
    /// Build an engine from explicit collaborators.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        storage: Arc<dyn StorageDriver>,
        cache: Arc<Cache>,
        synchronizer: Arc<ProfileSynchronizer>,
        rules_engine: Arc<dyn RulesEngine>,
        segmentation: Arc<dyn Segmentation>,
        profile_merger: Arc<dyn ProfileMerger>,
        destination: Arc<dyn DestinationDispatcher>,
        schema: Arc<dyn EventSchema>,
        config: EngineConfig,
    ) -> Self {
        Self {
            storage,
            cache,
            synchronizer,
            rules_engine,
            segmentation,
            profile_merger,
            destination,
            schema,
            config,
        }
    }

    /// Build an engine with every external collaborator defaulted to a
    /// noop/minimal implementation, so the pipeline is exercisable
    /// against nothing but a storage driver and a config.
    #[must_use]
    pub fn with_defaults(storage: Arc<dyn StorageDriver>, config: EngineConfig) -> Self {
        Self::new(
            storage,
            Arc::new(Cache::new()),
            Arc::new(ProfileSynchronizer::new()),
            Arc::new(NoopRulesEngine),
            Arc::new(NoopSegmentation),
            Arc::new(DefaultProfileMerger),
            Arc::new(NoopDestinationDispatcher),
            Arc::new(PermissiveSchema),
            config,
        )
    }

    /// Resolve and validate `request.payload.source`, applying its
    /// transitional/returns-profile flags and checking the allowed
    /// bridge list (`spec.md` §4.1, §7 "Unauthorized").
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Unauthorized`] if the source id does not
    /// resolve, or the bridge it arrived through is not on the
    /// source's allow-list.
    pub(crate) async fn resolve_source(&self, request: &TrackRequest) -> EngineResult<EventSource> {
        let source_id = request.payload.source.id();

        if let Some(internal) = request.internal_source.as_ref() {
            if internal != source_id {
                return Err(EngineError::Unauthorized(format!(
                    "internal source `{internal}` does not match payload source `{source_id}`"
                )));
            }
        }

        let cached = self.cache.get(tracker_storage::cache::CacheNamespace::Source, source_id.as_str());
        let source = if let Some(value) = cached {
            serde_json::from_value(value).map_err(|err| EngineError::stage_failure("source", err))?
        } else {
            let loaded = self
                .storage
                .load_source(source_id)
                .await?
                .ok_or_else(|| EngineError::Unauthorized(format!("unknown source `{source_id}`")))?;
            if let Ok(value) = serde_json::to_value(&loaded) {
                self.cache
                    .set(tracker_storage::cache::CacheNamespace::Source, source_id.as_str(), value, self.config.source_ttl);
            }
            loaded
        };

        if !source.allows_bridge(&request.bridge) {
            return Err(EngineError::Unauthorized(format!(
                "source `{source_id}` does not allow bridge `{}`",
                request.bridge
            )));
        }

        if let Some(allowed) = request.allowed_bridges.as_ref() {
            if !allowed.iter().any(|bridge| bridge == &request.bridge) {
                return Err(EngineError::Unauthorized(format!(
                    "bridge `{}` is not in this call's allowed-bridges list",
                    request.bridge
                )));
            }
        }

        Ok(source)
    }

    /// Run one `track()` call end to end (`spec.md` §2).
    ///
    /// # Errors
    ///
    /// Returns an [`EngineError`] for the caller-facing kinds
    /// (`spec.md` §7 propagation policy); every other failure is
    /// captured as a console-log record and does not fail the request.
    pub async fn track(&self, mut request: TrackRequest) -> EngineResult<TrackResponse> {
        request.payload.trim_ids();
        request.payload.redact_headers();
        request.payload.force_session();

        let source = self.resolve_source(&request).await?;
        request.payload.apply_source_options(&source);
        request.payload.source = SourceRef::Resolved(Box::new(source.clone()));

        // Resolution runs synchronously even on the `run_async` path:
        // the caller-visible response always names the real resolved
        // profile id, only the rest of the pipeline is detached
        // (`spec.md` §9 "Async detach", `SPEC_FULL.md` §5.1).
        let now = Utc::now();
        let resolution = self.resolve_entities(&request, now).await?;

        if request.run_async {
            let response = TrackResponse::minimal(resolution.profile.as_ref(), &source);
            let engine = self.clone();
            tokio::spawn(async move {
                if let Err(err) = engine.run_detached(request, source, resolution, now).await {
                    warn!(error = %err, "detached pipeline run failed");
                }
            });
            return Ok(response);
        }

        self.run_detached(request, source, resolution, now).await
    }

    async fn run_detached(
        &self,
        request: TrackRequest,
        source: EventSource,
        resolution: Resolution,
        now: DateTime<Utc>,
    ) -> EngineResult<TrackResponse> {
        let synchronize = source.synchronize_profiles && !request.payload.profile_less;
        let lock_target = if synchronize { resolution.profile.as_ref().map(|profile| &profile.id) } else { None };

        let _guard = self.synchronizer.acquire(lock_target, self.config.sync_wait, self.config.sync_max_repeats).await?;

        info!(request_id = %request.payload.id, "running pipeline");
        self.run_pipeline(request, source, resolution, now).await
    }
}
