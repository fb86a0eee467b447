//! Configuration section types.
//!
//! Every struct implements [`Default`] with sensible production values
//! so a bare `[section]` header (or a missing section entirely)
//! produces a working configuration.

use serde::{Deserialize, Serialize};

/// Root configuration for the event tracking core.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Elasticsearch connection settings.
    pub elastic: ElasticConfig,
    /// Redis connection settings.
    pub redis: RedisConfig,
    /// Tracking behaviour flags.
    pub tracardi: TracardiConfig,
    /// Cache TTLs.
    pub memory_cache: MemoryCacheConfig,
}

/// Elasticsearch connection settings.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ElasticConfig {
    /// Elasticsearch host URL.
    pub host: String,
    /// Query timeout, in seconds.
    pub query_timeout: u64,
}

impl Default for ElasticConfig {
    fn default() -> Self {
        Self {
            host: "http://localhost:9200".to_owned(),
            query_timeout: 30,
        }
    }
}

impl std::fmt::Debug for ElasticConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ElasticConfig")
            .field("host", &self.host)
            .field("query_timeout", &self.query_timeout)
            .finish()
    }
}

/// Redis connection settings.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RedisConfig {
    /// Redis host URL.
    pub host: String,
    /// Redis password. Omitted from `Debug` output.
    #[serde(skip_serializing)]
    pub password: Option<String>,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            host: "redis://localhost:6379".to_owned(),
            password: None,
        }
    }
}

impl std::fmt::Debug for RedisConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisConfig")
            .field("host", &self.host)
            .field("has_password", &self.password.is_some())
            .finish()
    }
}

/// Tracking behaviour flags, mirrored from the original `tracardi.*`
/// global settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TracardiConfig {
    /// Force the debugger console log on every request, independent of
    /// the payload's own `options.debugger` flag.
    pub track_debug: bool,
    /// Seconds to wait between profile-synchronization retries.
    pub sync_profile_tracks_wait: u64,
    /// Maximum number of profile-synchronization retries.
    pub sync_profile_tracks_max_repeats: u32,
}

impl Default for TracardiConfig {
    fn default() -> Self {
        Self {
            track_debug: false,
            sync_profile_tracks_wait: 1,
            sync_profile_tracks_max_repeats: 5,
        }
    }
}

/// Cache time-to-live settings, in seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryCacheConfig {
    /// TTL for cached event-type metadata (tags, validation schema).
    pub event_tag_cache_ttl: u64,
    /// TTL for cached session records.
    pub session_cache_ttl: u64,
    /// TTL for cached event source records.
    pub source_cache_ttl: u64,
}

impl Default for MemoryCacheConfig {
    fn default() -> Self {
        Self {
            event_tag_cache_ttl: 15,
            session_cache_ttl: 15,
            source_cache_ttl: 15,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redis_debug_omits_password() {
        let mut redis = RedisConfig::default();
        redis.password = Some("hunter2".to_owned());
        let debug_str = format!("{redis:?}");
        assert!(!debug_str.contains("hunter2"));
        assert!(debug_str.contains("has_password: true"));
    }

    #[test]
    fn config_default_is_valid_toml_round_trip() {
        let config = Config::default();
        let toml_str = toml::to_string(&config).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.elastic.query_timeout, config.elastic.query_timeout);
    }
}
