//! Engine-level configuration, derived from [`tracker_config::Config`].

use std::time::Duration;

/// Runtime knobs the engine needs, independent of how they were loaded.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Force the debugger console log on every request
    /// (`tracardi.track_debug`).
    pub track_debug: bool,
    /// Pause between profile-lock retries (`tracardi.sync_profile_tracks_wait`).
    pub sync_wait: Duration,
    /// Maximum profile-lock retries (`tracardi.sync_profile_tracks_max_repeats`).
    pub sync_max_repeats: u32,
    /// TTL for cached session documents.
    pub session_ttl: Duration,
    /// TTL for cached source documents.
    pub source_ttl: Duration,
    /// TTL for cached event-type tag metadata.
    pub event_tag_ttl: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            track_debug: false,
            sync_wait: Duration::from_secs(1),
            sync_max_repeats: 5,
            session_ttl: Duration::from_secs(15),
            source_ttl: Duration::from_secs(15),
            event_tag_ttl: Duration::from_secs(15),
        }
    }
}

impl From<&tracker_config::Config> for EngineConfig {
    fn from(config: &tracker_config::Config) -> Self {
        Self {
            track_debug: config.tracardi.track_debug,
            sync_wait: Duration::from_secs(config.tracardi.sync_profile_tracks_wait),
            sync_max_repeats: config.tracardi.sync_profile_tracks_max_repeats,
            session_ttl: Duration::from_secs(config.memory_cache.session_cache_ttl),
            source_ttl: Duration::from_secs(config.memory_cache.source_cache_ttl),
            event_tag_ttl: Duration::from_secs(config.memory_cache.event_tag_cache_ttl),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_from_loaded_config() {
        let config = tracker_config::Config::default();
        let engine_config = EngineConfig::from(&config);
        assert_eq!(engine_config.sync_max_repeats, 5);
        assert_eq!(engine_config.session_ttl, Duration::from_secs(15));
    }
}
