//! Tracker Telemetry - logging and tracing for the event tracking core.
//!
//! This crate provides:
//! - Configurable logging setup with multiple output formats
//! - A per-request correlation span
//!
//! # Example
//!
//! ```rust,no_run
//! use tracker_telemetry::{LogConfig, LogFormat, setup_logging, RequestContext};
//!
//! # fn main() -> Result<(), tracker_telemetry::TelemetryError> {
//! let config = LogConfig::new("info").with_format(LogFormat::Json);
//! setup_logging(&config)?;
//!
//! let ctx = RequestContext::new("req-1").with_operation("track");
//! let _guard = ctx.enter();
//! tracing::info!("processing payload");
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

pub mod prelude;

mod context;
mod error;
mod logging;

pub use context::{RequestContext, RequestGuard};
pub use error::{TelemetryError, TelemetryResult};
pub use logging::{LogConfig, LogFormat, setup_default_logging, setup_logging};
