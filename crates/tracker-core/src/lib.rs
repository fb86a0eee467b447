//! Domain model, ids, fingerprinting and error taxonomy for the event
//! tracking core.
//!
//! This crate has no async dependencies and no knowledge of storage,
//! caching or the pipeline — it only defines the shapes `spec.md` §3
//! describes (`TrackerPayload`, `EventSource`, `Session`, `Profile`,
//! `Event`) and the operations that are pure functions of those shapes
//! (fingerprinting, tag union, header redaction).
//!
//! # Example
//!
//! ```
//! use tracker_core::prelude::*;
//! use chrono::Utc;
//!
//! let profile = Profile::new(Utc::now());
//! assert!(profile.operation.new);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

pub mod console;
pub mod error;
pub mod event;
pub mod fingerprint;
pub mod ids;
pub mod operation;
pub mod payload;
pub mod profile;
pub mod prelude;
pub mod session;
pub mod source;
pub mod time;
