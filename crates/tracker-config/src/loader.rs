//! Config file discovery and layered loading.
//!
//! Implements the `Config::load()` algorithm:
//! 1. Parse `defaults.toml` → base
//! 2. Merge an optional TOML file, if provided
//! 3. Apply environment variable fallbacks for unset fields
//! 4. Deserialize merged tree → `Config`
//! 5. Validate

use std::path::Path;

use tracing::{debug, info};

use crate::error::{ConfigError, ConfigResult};
use crate::types::Config;
use crate::validate;

/// Embedded default configuration.
const DEFAULTS_TOML: &str = include_str!("defaults.toml");

/// Maximum allowed config file size (1 MB).
const MAX_CONFIG_FILE_SIZE: u64 = 1_048_576;

/// Environment variables consulted for fallbacks, paired with the
/// dotted config path they override.
const ENV_FALLBACKS: &[(&str, &str)] = &[
    ("TRACKER_ELASTIC_HOST", "elastic.host"),
    ("TRACKER_ELASTIC_QUERY_TIMEOUT", "elastic.query_timeout"),
    ("TRACKER_REDIS_HOST", "redis.host"),
    ("TRACKER_REDIS_PASSWORD", "redis.password"),
    ("TRACKER_TRACK_DEBUG", "tracardi.track_debug"),
    (
        "TRACKER_SYNC_PROFILE_TRACKS_WAIT",
        "tracardi.sync_profile_tracks_wait",
    ),
    (
        "TRACKER_SYNC_PROFILE_TRACKS_MAX_REPEATS",
        "tracardi.sync_profile_tracks_max_repeats",
    ),
    (
        "TRACKER_EVENT_TAG_CACHE_TTL",
        "memory_cache.event_tag_cache_ttl",
    ),
    ("TRACKER_SESSION_CACHE_TTL", "memory_cache.session_cache_ttl"),
    ("TRACKER_SOURCE_CACHE_TTL", "memory_cache.source_cache_ttl"),
];

/// Load the unified configuration: embedded defaults, optionally
/// overlaid by `file_path`, then environment variable fallbacks.
///
/// # Errors
///
/// Returns a [`ConfigError`] if the file cannot be read or parsed, or
/// if the final merged configuration fails validation.
pub fn load(file_path: Option<&Path>) -> ConfigResult<Config> {
    let mut merged: toml::Value =
        toml::from_str(DEFAULTS_TOML).map_err(|e| ConfigError::ParseError {
            path: "<embedded defaults>".to_owned(),
            source: e,
        })?;

    if let Some(path) = file_path {
        if let Some(overlay) = try_load_file(path)? {
            deep_merge(&mut merged, &overlay);
            info!(path = %path.display(), "loaded config file");
        }
    }

    let applied = apply_env_fallbacks(&mut merged);
    if applied > 0 {
        debug!(count = applied, "applied environment variable fallbacks");
    }

    let config: Config = merged
        .try_into()
        .map_err(|e: toml::de::Error| ConfigError::ParseError {
            path: "<merged config>".to_owned(),
            source: e,
        })?;

    validate::validate(&config)?;
    Ok(config)
}

/// Load a config from a single file (no layering, no env fallbacks).
///
/// # Errors
///
/// Returns a [`ConfigError`] if the file cannot be read, parsed, or
/// fails validation.
pub fn load_file(path: &Path) -> ConfigResult<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
        path: path.display().to_string(),
        source: e,
    })?;

    let config: Config = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
        path: path.display().to_string(),
        source: e,
    })?;

    validate::validate(&config)?;
    Ok(config)
}

/// Try to load a file as TOML, returning `None` if it does not exist.
fn try_load_file(path: &Path) -> ConfigResult<Option<toml::Value>> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "config file not found, skipping");
            return Ok(None);
        },
        Err(e) => {
            return Err(ConfigError::ReadError {
                path: path.display().to_string(),
                source: e,
            });
        },
    };

    if content.len() as u64 > MAX_CONFIG_FILE_SIZE {
        return Err(ConfigError::ValidationError {
            field: path.display().to_string(),
            message: format!(
                "config file is {} bytes, exceeding the {MAX_CONFIG_FILE_SIZE} byte limit",
                content.len()
            ),
        });
    }

    let value: toml::Value = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
        path: path.display().to_string(),
        source: e,
    })?;

    Ok(Some(value))
}

/// Recursively merge `overlay` into `base`, overlay values winning.
fn deep_merge(base: &mut toml::Value, overlay: &toml::Value) {
    match (base, overlay) {
        (toml::Value::Table(base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_value) in overlay_table {
                match base_table.get_mut(key) {
                    Some(base_value) => deep_merge(base_value, overlay_value),
                    None => {
                        base_table.insert(key.clone(), overlay_value.clone());
                    },
                }
            }
        },
        (base_value, overlay_value) => {
            *base_value = overlay_value.clone();
        },
    }
}

/// Set `value` at the dotted `path` inside a `toml::Value` tree,
/// creating intermediate tables as needed.
fn set_path(root: &mut toml::Value, path: &str, value: toml::Value) {
    let mut current = root;
    let segments: Vec<&str> = path.split('.').collect();
    for (i, segment) in segments.iter().enumerate() {
        let table = current
            .as_table_mut()
            .expect("config tree only ever holds tables above leaves");
        if i == segments.len() - 1 {
            table.insert((*segment).to_owned(), value);
            return;
        }
        current = table
            .entry((*segment).to_owned())
            .or_insert_with(|| toml::Value::Table(toml::map::Map::new()));
    }
}

/// Apply environment variable fallbacks for each known field, parsing
/// the raw string into the target field's existing TOML type.
/// Returns the number of fallbacks applied.
fn apply_env_fallbacks(merged: &mut toml::Value) -> usize {
    let mut applied = 0;
    for (var, path) in ENV_FALLBACKS {
        let Ok(raw) = std::env::var(var) else {
            continue;
        };
        let value = coerce_env_value(&raw);
        set_path(merged, path, value);
        applied += 1;
    }
    applied
}

/// Coerce a raw environment variable string into a TOML value,
/// preferring bool/integer parses over a plain string.
fn coerce_env_value(raw: &str) -> toml::Value {
    if let Ok(b) = raw.parse::<bool>() {
        toml::Value::Boolean(b)
    } else if let Ok(i) = raw.parse::<i64>() {
        toml::Value::Integer(i)
    } else {
        toml::Value::String(raw.to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_parse_and_validate() {
        let config = load(None).unwrap();
        assert_eq!(config.elastic.host, "http://localhost:9200");
        assert_eq!(config.tracardi.sync_profile_tracks_max_repeats, 5);
    }

    #[test]
    fn file_overlay_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[elastic]\nhost = \"http://es.internal:9200\"\n").unwrap();

        let config = load(Some(&path)).unwrap();
        assert_eq!(config.elastic.host, "http://es.internal:9200");
        // Unset fields in the overlay keep their defaults.
        assert_eq!(config.elastic.query_timeout, 30);
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config = load(Some(Path::new("/nonexistent/config.toml"))).unwrap();
        assert_eq!(config.elastic.host, "http://localhost:9200");
    }

    #[test]
    fn env_fallback_overrides_merged_value() {
        std::env::set_var("TRACKER_SYNC_PROFILE_TRACKS_WAIT", "9");
        let config = load(None).unwrap();
        std::env::remove_var("TRACKER_SYNC_PROFILE_TRACKS_WAIT");
        assert_eq!(config.tracardi.sync_profile_tracks_wait, 9);
    }

    #[test]
    fn oversized_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("huge.toml");
        let data = "x = \"".to_owned() + &"a".repeat(1_100_000) + "\"";
        std::fs::write(&path, data).unwrap();

        let result = try_load_file(&path);
        assert!(matches!(result, Err(ConfigError::ValidationError { .. })));
    }
}
