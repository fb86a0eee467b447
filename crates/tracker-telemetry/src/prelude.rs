//! Convenience re-exports.

pub use crate::context::{RequestContext, RequestGuard};
pub use crate::error::{TelemetryError, TelemetryResult};
pub use crate::logging::{LogConfig, LogFormat, setup_default_logging, setup_logging};
