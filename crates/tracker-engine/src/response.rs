//! Response assembly (`spec.md` §6).

use crate::collaborators::{RuleInvokeResult, SegmentationResult};
use crate::persistence::CollectResult;
use serde::Serialize;
use serde_json::Value;
use tracker_core::prelude::*;

/// The JSON shape returned to callers (`spec.md` §6 "Response").
#[derive(Debug, Clone, Serialize)]
pub struct TrackResponse {
    /// Omitted for profile-less requests; full or id-only depending on
    /// `source.returns_profile` and the `profile` option.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<Value>,
    /// `{consent}` only.
    pub source: Value,
    /// UX directives produced by the rules engine.
    pub ux: Vec<Value>,
    /// Merged flow responses.
    pub response: Vec<Value>,
    /// Present only when debugging was requested and enabled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debugging: Option<Value>,
}

impl TrackResponse {
    /// Build the response for a fully-run request.
    ///
    /// `profile` is the resolved profile (`None` for profile-less
    /// requests); `returns_profile`/`wants_profile` gate whether it is
    /// serialized full or id-only, per `spec.md` §6.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn assemble(
        profile: Option<&Profile>,
        returns_profile: bool,
        wants_profile: bool,
        source: &EventSource,
        rule_result: &RuleInvokeResult,
        debug: bool,
        collect: Option<&CollectResult>,
        execution: Option<&Value>,
        segmentation: Option<&SegmentationResult>,
        console_log: Option<&ConsoleLog>,
    ) -> Self {
        let profile_view = profile.map(|profile| {
            if returns_profile && wants_profile {
                profile.to_public_response()
            } else {
                profile.to_id_response()
            }
        });

        let debugging = if debug {
            Some(serde_json::json!({
                "profile": collect.map(|c| c.profile.clone()),
                "session": collect.map(|c| c.session.clone()),
                "events": collect.map(|c| c.events.clone()),
                "execution": execution,
                "segmentation": segmentation.map(|s| s.debug.clone()),
                "logs": console_log.map(|log| log.entries().to_vec()),
            }))
        } else {
            None
        };

        Self {
            profile: profile_view,
            source: source.to_response(),
            ux: rule_result.ux.clone(),
            response: rule_result.responses.clone(),
            debugging,
        }
    }

    /// The minimal response returned immediately by the `run_async`
    /// detach path, before the pipeline has even started
    /// (`spec.md` §5 "Cancellation & timeouts").
    #[must_use]
    pub fn minimal(profile: Option<&Profile>, source: &EventSource) -> Self {
        Self {
            profile: profile.map(Profile::to_id_response),
            source: source.to_response(),
            ux: Vec::new(),
            response: Vec::new(),
            debugging: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn source() -> EventSource {
        EventSource {
            id: SourceId::from("src-A"),
            returns_profile: true,
            transitional: false,
            synchronize_profiles: false,
            allowed_bridges: vec!["rest".into()],
            consent: Value::Null,
        }
    }

    #[test]
    fn profile_less_response_has_no_profile_field() {
        let response = TrackResponse::assemble(
            None,
            true,
            true,
            &source(),
            &RuleInvokeResult::default(),
            false,
            None,
            None,
            None,
            None,
        );
        let serialized = serde_json::to_value(&response).unwrap();
        assert!(serialized.get("profile").is_none());
    }

    #[test]
    fn profile_response_is_id_only_when_not_requested() {
        let profile = Profile::new(Utc::now());
        let response = TrackResponse::assemble(
            Some(&profile),
            true,
            false,
            &source(),
            &RuleInvokeResult::default(),
            false,
            None,
            None,
            None,
            None,
        );
        let profile_view = response.profile.unwrap();
        assert!(profile_view.get("traits").is_none());
        assert_eq!(profile_view.get("id").unwrap(), &serde_json::to_value(&profile.id).unwrap());
    }

    #[test]
    fn debugging_is_only_present_when_requested() {
        let response = TrackResponse::assemble(
            None,
            true,
            true,
            &source(),
            &RuleInvokeResult::default(),
            true,
            None,
            None,
            None,
            None,
        );
        assert!(response.debugging.is_some());
    }
}
