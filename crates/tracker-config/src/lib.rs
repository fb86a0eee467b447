//! Layered configuration for the event tracking core.
//!
//! This crate has **no dependencies on other internal tracker
//! crates**. It only depends on `serde`, `toml`, and `thiserror`, so
//! that any crate can depend on it without pulling in the rest of the
//! workspace.
//!
//! # Usage
//!
//! ```rust,no_run
//! use tracker_config::Config;
//!
//! let config = Config::load(None).unwrap();
//! println!("elastic host: {}", config.elastic.host);
//! ```
//!
//! # Precedence
//!
//! From highest to lowest priority:
//!
//! 1. Environment variables (`TRACKER_*`)
//! 2. An optional TOML file
//! 3. Embedded defaults

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

/// Configuration error types.
pub mod error;
/// Config file discovery and layered loading.
pub mod loader;
/// Convenience re-exports.
pub mod prelude;
/// Configuration struct definitions.
pub mod types;
/// Configuration validation rules.
pub mod validate;

pub use error::{ConfigError, ConfigResult};
pub use types::{Config, ElasticConfig, MemoryCacheConfig, RedisConfig, TracardiConfig};

impl Config {
    /// Load configuration: embedded defaults, optionally overlaid by
    /// a TOML file at `path`, then `TRACKER_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the file cannot be read or parsed,
    /// or if the final configuration fails validation.
    pub fn load(path: Option<&std::path::Path>) -> ConfigResult<Self> {
        loader::load(path)
    }

    /// Load configuration from a single file, with no layering and no
    /// environment variable fallbacks.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the file cannot be read, parsed,
    /// or fails validation.
    pub fn load_file(path: &std::path::Path) -> ConfigResult<Self> {
        loader::load_file(path)
    }
}
