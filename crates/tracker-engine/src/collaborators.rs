//! External-collaborator trait seams (`spec.md` §1 "out of scope, only
//! their interfaces are specified"): the rules/workflow engine, the
//! segmentation engine, the profile merger and the destination
//! dispatcher. Each ships a minimal default implementation so the
//! pipeline can be exercised end-to-end without a real workflow runner.

use crate::error::EngineResult;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use tracker_core::prelude::*;
use tracker_storage::driver::StorageDriver;

/// Input to one rules-engine invocation (`spec.md` §4.3 step 6).
#[derive(Debug, Clone)]
pub struct RuleInvocation {
    /// Source the events arrived through.
    pub source_id: SourceId,
    /// Distinct event types present in this batch.
    pub event_types: Vec<String>,
    /// Rules loaded for `(source, event types)`.
    pub rules: Vec<tracker_storage::records::RuleRecord>,
    /// Profile in scope, if any.
    pub profile: Option<Profile>,
    /// Session in scope.
    pub session: Session,
    /// Events to run through the workflow.
    pub events: Vec<Event>,
}

/// Result of one rules-engine invocation.
#[derive(Debug, Clone, Default)]
pub struct RuleInvokeResult {
    /// Substitute profile, if the workflow replaced it.
    pub profile: Option<Profile>,
    /// Substitute session, if the workflow replaced it.
    pub session: Option<Session>,
    /// Event types that actually ran through a workflow.
    pub ran_event_types: BTreeSet<String>,
    /// Event type -> rule ids that fired for it.
    pub invoked_rules: HashMap<String, Vec<String>>,
    /// Replacement events, keyed by the original event id.
    pub post_invoke_events: HashMap<EventId, Event>,
    /// UX directives produced by the workflow, echoed in the response.
    pub ux: Vec<Value>,
    /// Flow responses, merged into the response's `response` field.
    pub responses: Vec<Value>,
    /// Console-log records raised during invocation.
    pub console: Vec<Console>,
    /// Per-rule call traces, persisted as debug info when debugging is on.
    pub execution: Option<Value>,
}

/// The external rules/workflow engine (`spec.md` §1, §4.3 step 6).
#[async_trait]
pub trait RulesEngine: Send + Sync {
    /// Run `invocation` through the workflow engine.
    async fn invoke(&self, invocation: RuleInvocation) -> EngineResult<RuleInvokeResult>;
}

/// A rules engine that runs no workflows, but still records which rule
/// ids matched each event type (`spec.md` §4.3 step 8 still needs this
/// to annotate events even with no real engine wired in).
pub struct NoopRulesEngine;

#[async_trait]
impl RulesEngine for NoopRulesEngine {
    async fn invoke(&self, invocation: RuleInvocation) -> EngineResult<RuleInvokeResult> {
        let mut invoked_rules: HashMap<String, Vec<String>> = HashMap::new();
        for rule in &invocation.rules {
            invoked_rules
                .entry(rule.event_type.clone())
                .or_default()
                .push(rule.rule_id.clone());
        }
        Ok(RuleInvokeResult {
            ran_event_types: invocation.event_types.into_iter().collect(),
            invoked_rules,
            ..Default::default()
        })
    }
}

/// Result of a segmentation pass, kept only for debug output.
#[derive(Debug, Clone, Default)]
pub struct SegmentationResult {
    /// Opaque segmentation trace, echoed in `debugging.segmentation`.
    pub debug: Value,
}

/// The external segmentation engine (`spec.md` §4.3 step 9).
#[async_trait]
pub trait Segmentation: Send + Sync {
    /// Re-evaluate segment membership for `profile` given the event
    /// types that ran this request.
    async fn segment(&self, profile: &Profile, ran_event_types: &BTreeSet<String>) -> EngineResult<SegmentationResult>;
}

/// A segmentation engine that does nothing.
pub struct NoopSegmentation;

#[async_trait]
impl Segmentation for NoopSegmentation {
    async fn segment(&self, _profile: &Profile, _ran_event_types: &BTreeSet<String>) -> EngineResult<SegmentationResult> {
        Ok(SegmentationResult::default())
    }
}

/// The profile-merge collaborator (`spec.md` §4.3 step 10,
/// `SPEC_FULL.md` §4.8).
#[async_trait]
pub trait ProfileMerger: Send + Sync {
    /// Merge `profile` with any other profile sharing its merge keys,
    /// returning the merged profile when at least one match was found.
    async fn invoke_merge_profile(
        &self,
        profile: &Profile,
        storage: &dyn StorageDriver,
        limit: usize,
    ) -> EngineResult<Option<Profile>>;
}

/// Folds matching profiles' public/private traits into the candidate
/// profile, the candidate's own values winning ties
/// (`override_old_data=true` in `SPEC_FULL.md` §4.8).
pub struct DefaultProfileMerger;

#[async_trait]
impl ProfileMerger for DefaultProfileMerger {
    async fn invoke_merge_profile(
        &self,
        profile: &Profile,
        storage: &dyn StorageDriver,
        limit: usize,
    ) -> EngineResult<Option<Profile>> {
        let mut matches = storage
            .find_profiles_sharing_merge_keys(&profile.operation.merge, &profile.id)
            .await?;
        matches.truncate(limit);
        if matches.is_empty() {
            return Ok(None);
        }

        let mut merged = profile.clone();
        for other in &matches {
            for (key, value) in &other.traits.public {
                merged.traits.public.entry(key.clone()).or_insert_with(|| value.clone());
            }
            for (key, value) in &other.traits.private {
                merged.traits.private.entry(key.clone()).or_insert_with(|| value.clone());
            }
            for (key, value) in &other.pii {
                merged.pii.entry(key.clone()).or_insert_with(|| value.clone());
            }
        }
        merged.operation.update = true;
        Ok(Some(merged))
    }
}

/// The external destination dispatcher (`spec.md` §4.3 step 13).
#[async_trait]
pub trait DestinationDispatcher: Send + Sync {
    /// Send `delta` (the profile diff) plus the persisted events to
    /// configured destinations.
    async fn send_data(
        &self,
        profile_id: &ProfileId,
        delta: Value,
        profile: &Profile,
        events: &[Event],
        debug: bool,
    ) -> EngineResult<()>;
}

/// A destination dispatcher that sends nothing.
pub struct NoopDestinationDispatcher;

#[async_trait]
impl DestinationDispatcher for NoopDestinationDispatcher {
    async fn send_data(
        &self,
        _profile_id: &ProfileId,
        _delta: Value,
        _profile: &Profile,
        _events: &[Event],
        _debug: bool,
    ) -> EngineResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tracker_storage::driver::InMemoryStorageDriver;
    use tracker_storage::records::RuleRecord;

    #[tokio::test]
    async fn noop_rules_engine_annotates_from_loaded_rules() {
        let engine = NoopRulesEngine;
        let result = engine
            .invoke(RuleInvocation {
                source_id: SourceId::from("src-A"),
                event_types: vec!["pageview".to_string()],
                rules: vec![RuleRecord {
                    event_type: "pageview".into(),
                    rule_id: "rule-1".into(),
                    flow_id: "flow-1".into(),
                }],
                profile: None,
                session: Session::new(SessionId::from("s1"), Utc::now()),
                events: Vec::new(),
            })
            .await
            .unwrap();
        assert_eq!(result.invoked_rules.get("pageview").unwrap(), &vec!["rule-1".to_string()]);
    }

    #[tokio::test]
    async fn default_merger_returns_none_with_no_other_profiles() {
        let storage = InMemoryStorageDriver::new();
        let merger = DefaultProfileMerger;
        let mut profile = Profile::new(Utc::now());
        profile.operation.merge = vec![("email".into(), "a@b.com".into())];
        let merged = merger.invoke_merge_profile(&profile, &storage, 1000).await.unwrap();
        assert!(merged.is_none());
    }

    #[tokio::test]
    async fn default_merger_folds_candidates_without_overwriting() {
        let storage = InMemoryStorageDriver::new();
        let mut candidate = Profile::new(Utc::now());
        candidate.operation.merge = vec![("email".into(), "a@b.com".into())];
        candidate
            .traits
            .public
            .insert("name".into(), serde_json::Value::String("Keep Me".into()));

        let mut other = Profile::new(Utc::now());
        other
            .traits
            .public
            .insert("email".into(), serde_json::Value::String("a@b.com".into()));
        other
            .traits
            .public
            .insert("name".into(), serde_json::Value::String("Overwritten".into()));
        other
            .traits
            .public
            .insert("plan".into(), serde_json::Value::String("pro".into()));
        storage.seed_profile(other);

        let merger = DefaultProfileMerger;
        let merged = merger
            .invoke_merge_profile(&candidate, &storage, 1000)
            .await
            .unwrap()
            .expect("a match should be found");
        assert_eq!(merged.traits.public.get("name").unwrap(), "Keep Me");
        assert_eq!(merged.traits.public.get("plan").unwrap(), "pro");
    }
}
