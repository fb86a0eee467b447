//! Cache and storage-driver leaves of the event tracking core
//! (`spec.md` §4.6, §2 "Cache and Storage Driver are leaves").
//!
//! # Layers
//!
//! - [`cache::Cache`] — a single keyed cache with per-namespace TTL,
//!   used by the source/session/rule/segment/flow/event-tag lookups.
//! - [`driver::StorageDriver`] — document-index operations, with an
//!   in-memory reference implementation
//!   ([`driver::InMemoryStorageDriver`]) for tests and demos.
//! - [`index`] — logical index names and production/staging alias
//!   resolution.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

pub mod cache;
pub mod driver;
pub mod error;
pub mod index;
pub mod prelude;
pub mod records;
