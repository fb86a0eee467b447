//! The profile synchronizer (`spec.md` §4.5).
//!
//! Serializes concurrent requests that touch the same `profile.id`, so
//! two in-flight `track()` calls for the same profile don't race each
//! other's reads/writes of that profile document. The reference
//! implementation here is an in-process lock table; `spec.md` §4.5
//! explicitly allows this ("any distributed or in-process mutex table
//! keyed by profile id is acceptable").

use crate::error::{SyncError, SyncResult};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::time::Duration;
use tracker_core::ids::ProfileId;
use tracing::{debug, warn};

/// A table of per-profile locks.
#[derive(Debug, Default)]
pub struct ProfileSynchronizer {
    held: DashMap<String, ()>,
}

impl ProfileSynchronizer {
    /// An empty lock table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the lock for `profile_id`, retrying up to
    /// `max_repeats` times with a `wait` pause between attempts.
    ///
    /// A payload with no resolved profile id acquires a no-op guard
    /// (`spec.md` §4.5: "a payload whose profile is absent resolves to
    /// a no-op scope").
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Timeout`] if the lock is still held after
    /// all retries are exhausted.
    pub async fn acquire(
        &self,
        profile_id: Option<&ProfileId>,
        wait: Duration,
        max_repeats: u32,
    ) -> SyncResult<SyncGuard<'_>> {
        let Some(profile_id) = profile_id else {
            return Ok(SyncGuard {
                synchronizer: None,
                key: None,
            });
        };
        let key = profile_id.to_string();

        for attempt in 0..=max_repeats {
            match self.held.entry(key.clone()) {
                Entry::Vacant(slot) => {
                    slot.insert(());
                    debug!(profile_id = %key, attempt, "profile lock acquired");
                    return Ok(SyncGuard {
                        synchronizer: Some(self),
                        key: Some(key),
                    });
                },
                Entry::Occupied(_) => {
                    if attempt == max_repeats {
                        break;
                    }
                    tokio::time::sleep(wait).await;
                },
            }
        }

        warn!(profile_id = %key, max_repeats, "profile lock acquisition timed out");
        Err(SyncError::Timeout(key))
    }
}

/// RAII guard releasing the profile lock it was returned from
/// (`spec.md` §4.5: "release is guaranteed on every exit path").
pub struct SyncGuard<'a> {
    synchronizer: Option<&'a ProfileSynchronizer>,
    key: Option<String>,
}

impl Drop for SyncGuard<'_> {
    fn drop(&mut self) {
        if let (Some(synchronizer), Some(key)) = (self.synchronizer, &self.key) {
            synchronizer.held.remove(key);
        }
    }
}
