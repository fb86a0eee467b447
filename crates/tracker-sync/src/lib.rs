//! Cross-request profile synchronization (`spec.md` §4.5).
//!
//! Sits above the cache in the data-flow order of `spec.md` §2: when a
//! source has `synchronize_profiles = true`, `track()` wraps the rest
//! of the request in a [`ProfileSynchronizer`] guard keyed by
//! `profile.id`, guaranteeing at-most-one in-flight track per profile.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

mod error;
mod synchronizer;

pub use error::{SyncError, SyncResult};
pub use synchronizer::{ProfileSynchronizer, SyncGuard};
