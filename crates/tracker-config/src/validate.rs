//! Post-merge configuration validation.

use crate::error::{ConfigError, ConfigResult};
use crate::types::Config;

/// Validate a fully-merged and deserialized configuration.
///
/// # Errors
///
/// Returns the first validation error found.
pub fn validate(config: &Config) -> ConfigResult<()> {
    if config.elastic.host.is_empty() {
        return Err(ConfigError::ValidationError {
            field: "elastic.host".to_owned(),
            message: "must not be empty".to_owned(),
        });
    }

    if config.elastic.query_timeout == 0 {
        return Err(ConfigError::ValidationError {
            field: "elastic.query_timeout".to_owned(),
            message: "must be greater than zero".to_owned(),
        });
    }

    if config.redis.host.is_empty() {
        return Err(ConfigError::ValidationError {
            field: "redis.host".to_owned(),
            message: "must not be empty".to_owned(),
        });
    }

    if config.tracardi.sync_profile_tracks_max_repeats == 0 {
        return Err(ConfigError::ValidationError {
            field: "tracardi.sync_profile_tracks_max_repeats".to_owned(),
            message: "must allow at least one retry".to_owned(),
        });
    }

    Ok(())
}
