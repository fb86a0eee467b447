//! Commonly used types for convenient import.
//!
//! `use tracker_core::prelude::*;` pulls in the domain model, ids and
//! error types most call sites need.

pub use crate::console::{Console, ConsoleLog, ConsoleType};
pub use crate::error::{TrackerError, TrackerResult};
pub use crate::event::{Event, EventMetadata, EventPayload, EventStatus};
pub use crate::fingerprint::fingerprint;
pub use crate::ids::{EventId, ProfileId, RequestId, SessionId, SourceId};
pub use crate::operation::Operation;
pub use crate::payload::{EntityRef, PayloadMetadata, SourceRef, TrackerOptions, TrackerPayload};
pub use crate::profile::{Profile, ProfileTraits};
pub use crate::session::{ProfileRef, Session};
pub use crate::source::EventSource;
pub use crate::time::{EventTime, ProfileMetadata, ProfileVisit, SessionMetadata, SessionTime};
