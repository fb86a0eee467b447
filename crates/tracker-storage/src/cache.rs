//! Keyed cache with per-namespace TTL (`spec.md` §4.6).

use dashmap::DashMap;
use serde_json::Value;
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::trace;

/// Typed cache namespaces, each with its own configurable TTL
/// (`spec.md` §4.6).
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheNamespace {
    /// Loaded `Session` documents.
    Session,
    /// Loaded `EventSource` documents.
    Source,
    /// `EventTypeMetadata` (tag lookup).
    EventTag,
    /// Flow/workflow definitions.
    Flow,
    /// Segment definitions.
    Segment,
    /// Routing rules.
    Rule,
}

#[derive(Debug)]
struct Entry {
    value: Value,
    expires_at: Instant,
}

/// A single keyed cache, used as the leaf both the resolver and the
/// persistence coordinator read/write through.
///
/// Coherency is best-effort: a writer invalidates on known-dirty paths
/// (e.g. a newly created session), but readers otherwise tolerate a
/// stale read within TTL (`spec.md` §4.6).
#[derive(Debug, Default)]
pub struct Cache {
    entries: DashMap<(CacheNamespace, String), Entry>,
}

impl Cache {
    /// An empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up `key` in `ns`, returning `None` on a miss or on an
    /// expired entry (which is evicted lazily).
    #[must_use]
    pub fn get(&self, ns: CacheNamespace, key: &str) -> Option<Value> {
        let composite = (ns, key.to_string());
        match self.entries.get(&composite) {
            Some(entry) if entry.expires_at > Instant::now() => Some(entry.value.clone()),
            Some(_) => {
                drop(self.entries.remove(&composite));
                None
            },
            None => None,
        }
    }

    /// Insert `value` under `key` in `ns` with the given TTL.
    pub fn set(&self, ns: CacheNamespace, key: &str, value: Value, ttl: Duration) {
        self.entries.insert(
            (ns, key.to_string()),
            Entry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
    }

    /// Invalidate a single key.
    pub fn delete(&self, ns: CacheNamespace, key: &str) {
        self.entries.remove(&(ns, key.to_string()));
    }

    /// Get-or-load: on a cache miss, await `loader` and populate the
    /// cache with its result (when `Some`) before returning it.
    pub async fn get_or_load<F, Fut>(
        &self,
        ns: CacheNamespace,
        key: &str,
        ttl: Duration,
        loader: F,
    ) -> Option<Value>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Option<Value>>,
    {
        if let Some(hit) = self.get(ns, key) {
            trace!(?ns, key, "cache hit");
            return Some(hit);
        }
        let loaded = loader().await?;
        self.set(ns, key, loaded.clone(), ttl);
        Some(loaded)
    }
}

impl std::fmt::Debug for CacheNamespace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Session => "session",
            Self::Source => "source",
            Self::EventTag => "event_tag",
            Self::Flow => "flow",
            Self::Segment => "segment",
            Self::Rule => "rule",
        };
        write!(f, "{name}")
    }
}
