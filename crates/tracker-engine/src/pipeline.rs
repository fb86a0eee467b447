//! The 14-step pipeline orchestrator (`spec.md` §4.3).

use crate::collaborators::RuleInvocation;
use crate::engine::{Engine, TrackRequest};
use crate::error::EngineResult;
use crate::persistence::{flush_diagnostics, persist_entities};
use crate::resolver::{load_or_correct_session, resolve_dynamic, resolve_static, Resolution};
use crate::response::TrackResponse;
use crate::validator::{validate_and_reshape, DotAccessor};
use chrono::{DateTime, Utc};
use serde_json::Value;
use tracker_core::prelude::*;
use tracker_storage::cache::CacheNamespace;

fn json_diff(before: &Value, after: &Value) -> Option<Value> {
    if before == after {
        None
    } else {
        Some(serde_json::json!({ "before": before, "after": after }))
    }
}

impl Engine {
    /// Resolve `(Session, Profile)` for `request` and run the
    /// pipeline's step 1 visit accounting, synchronously — this is the
    /// part of the pipeline that must complete before `track()` can
    /// answer even a `run_async` request, since the response always
    /// names the real resolved/created profile id (`spec.md` §8
    /// invariant 1).
    pub(crate) async fn resolve_entities(&self, request: &TrackRequest, now: DateTime<Utc>) -> EngineResult<Resolution> {
        let payload = &request.payload;
        let session_id = payload.session_id().expect("force_session guarantees a session reference");
        let existing_session = load_or_correct_session(self.storage.as_ref(), &self.cache, &session_id, self.config.session_ttl, now).await?;

        let mut resolution = if let Some(static_id) = request.static_profile_id.as_ref() {
            resolve_static(self.storage.as_ref(), payload, existing_session, static_id, now).await?
        } else {
            resolve_dynamic(self.storage.as_ref(), payload, existing_session, now).await?
        };

        // Step 1: visit accounting.
        if !payload.profile_less && resolution.session.operation.new {
            if let Some(profile) = resolution.profile.as_mut() {
                profile.metadata.visit.record_visit(now);
                profile.operation.update = true;
                if let Some(tz) = resolution.session.context.get("time").and_then(|time| time.get("tz")).and_then(Value::as_str) {
                    profile.metadata.visit.tz = Some(tz.to_string());
                }
            }
        }

        Ok(resolution)
    }

    pub(crate) async fn run_pipeline(
        &self,
        request: TrackRequest,
        source: EventSource,
        mut resolution: Resolution,
        now: DateTime<Utc>,
    ) -> EngineResult<TrackResponse> {
        let payload = &request.payload;
        let mut console_log = ConsoleLog::new();

        // Step 2: profile snapshot for later destination-diff.
        let snapshot_before = resolution.profile.as_ref().map(Profile::diffable_snapshot);

        // Step 3: event materialization.
        let debug = payload.is_debugging_on(self.config.track_debug);
        let events: Vec<Event> = payload
            .events
            .iter()
            .cloned()
            .map(|event_payload| {
                Event::from_payload(
                    event_payload,
                    now,
                    debug,
                    Some(&resolution.session),
                    resolution.profile.as_ref().map(|profile| profile.id.clone()),
                    payload.request.clone(),
                )
            })
            .collect();

        // Step 4: validation & reshape.
        let accessor = DotAccessor {
            profile: resolution.profile.as_ref(),
            session: Some(&resolution.session),
            payload,
        };
        let mut events = validate_and_reshape(events, &accessor, self.schema.as_ref(), &mut console_log);

        let mut event_types: Vec<String> = events.iter().map(|event| event.event_type.clone()).collect();
        event_types.sort();
        event_types.dedup();

        // Step 5: rule loading (cached).
        let rules = if event_types.is_empty() {
            None
        } else {
            let cache_key = format!("{}:{}", source.id, event_types.join(","));
            if let Some(cached) = self.cache.get(CacheNamespace::Rule, &cache_key) {
                serde_json::from_value(cached).ok()
            } else {
                let loaded = self.storage.load_rules(&source.id, &event_types).await?;
                if let Some(rules) = &loaded {
                    if let Ok(value) = serde_json::to_value(rules) {
                        self.cache.set(CacheNamespace::Rule, &cache_key, value, self.config.source_ttl);
                    }
                }
                loaded
            }
        };

        let mut execution_trace: Option<Value> = None;
        let mut segmentation_debug: Option<crate::collaborators::SegmentationResult> = None;
        let mut rule_outcome = RuleOutcome::default();

        if let Some(rules) = rules {
            // Steps 6-9 share one try/except grouping (`spec.md` §4.3):
            // a failure here is recorded to the console log and swallowed.
            match self
                .rules_engine
                .invoke(RuleInvocation {
                    source_id: source.id.clone(),
                    event_types: event_types.clone(),
                    rules,
                    profile: resolution.profile.clone(),
                    session: resolution.session.clone(),
                    events: events.clone(),
                })
                .await
            {
                Ok(rule_result) => {
                    // Step 7: profile/session replacement.
                    if let Some(profile) = rule_result.profile.clone() {
                        resolution.profile = Some(profile);
                    }
                    if let Some(session) = rule_result.session.clone() {
                        resolution.session = session;
                    }

                    // Step 8: rule annotation.
                    for event in &mut events {
                        if let Some(rule_ids) = rule_result.invoked_rules.get(&event.event_type) {
                            event.metadata.processed_by_rules = rule_ids.clone();
                        }
                    }

                    for entry in &rule_result.console {
                        console_log.append(entry.clone());
                    }
                    execution_trace = rule_result.execution.clone();

                    // Step 9: segmentation, only if a profile is present.
                    if let Some(profile) = resolution.profile.as_ref() {
                        match self.segmentation.segment(profile, &rule_result.ran_event_types).await {
                            Ok(result) => segmentation_debug = Some(result),
                            Err(err) => console_log.append(Console::error(
                                "segmentation",
                                err.to_string(),
                                None,
                                Some(profile.id.clone()),
                                None,
                            )),
                        }
                    }

                    self.apply_post_invoke_events(&mut events, &rule_result.post_invoke_events);

                    rule_outcome = RuleOutcome {
                        ux: rule_result.ux,
                        responses: rule_result.responses,
                    };
                },
                Err(err) => {
                    console_log.append(Console::error(
                        "rules",
                        err.to_string(),
                        None,
                        resolution.profile.as_ref().map(|profile| profile.id.clone()),
                        None,
                    ));
                },
            };
        }

        // Step 10: profile merge.
        if let Some(profile) = resolution.profile.clone() {
            if profile.operation.needs_merging() {
                match self.profile_merger.invoke_merge_profile(&profile, self.storage.as_ref(), 1000).await {
                    Ok(Some(merged)) => resolution.profile = Some(merged),
                    Ok(None) => {},
                    Err(err) => console_log.append(Console::error("merge", err.to_string(), None, Some(profile.id.clone()), None)),
                }
            }
        }

        // Step 12: persist.
        let (collect, events_after_persist) = persist_entities(
            &self.storage,
            &self.cache,
            &console_log,
            payload,
            resolution.profile.as_mut(),
            &mut resolution.session,
            events,
            self.config.event_tag_ttl,
            now,
        )
        .await?;
        events = events_after_persist;

        // Step 13: destination dispatch, diffed against the step-2 snapshot.
        if let (Some(profile), Some(before)) = (resolution.profile.as_ref(), snapshot_before.as_ref()) {
            let after = profile.diffable_snapshot();
            if let Some(delta) = json_diff(before, &after) {
                if let Err(err) = self.destination.send_data(&profile.id, delta, profile, &events, false).await {
                    console_log.append(Console::error("destination", err.to_string(), None, Some(profile.id.clone()), None));
                }
            }
        }

        let debug_info = if debug && execution_trace.is_some() { execution_trace.clone() } else { None };
        flush_diagnostics(&self.storage, &console_log, debug_info).await?;

        Ok(TrackResponse::assemble(
            resolution.profile.as_ref(),
            source.returns_profile,
            payload.return_profile(),
            &source,
            &crate::collaborators::RuleInvokeResult {
                ux: rule_outcome.ux,
                responses: rule_outcome.responses,
                ..Default::default()
            },
            debug,
            Some(&collect),
            execution_trace.as_ref(),
            segmentation_debug.as_ref(),
            Some(&console_log),
        ))
    }

    fn apply_post_invoke_events(&self, events: &mut [Event], post_invoke: &std::collections::HashMap<EventId, Event>) {
        for event in events.iter_mut() {
            if event.update {
                if let Some(replacement) = post_invoke.get(&event.id) {
                    *event = replacement.clone();
                }
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct RuleOutcome {
    pub ux: Vec<Value>,
    pub responses: Vec<Value>,
}
