//! Commonly used types for convenient import.

pub use crate::collaborators::{
    DefaultProfileMerger, DestinationDispatcher, NoopDestinationDispatcher, NoopRulesEngine, NoopSegmentation,
    ProfileMerger, RuleInvocation, RuleInvokeResult, RulesEngine, Segmentation, SegmentationResult,
};
pub use crate::config::EngineConfig;
pub use crate::engine::{Engine, TrackRequest};
pub use crate::error::{EngineError, EngineResult};
pub use crate::persistence::CollectResult;
pub use crate::resolver::Resolution;
pub use crate::response::TrackResponse;
pub use crate::validator::{DotAccessor, EventSchema, PermissiveSchema};
