//! Convenience re-exports.

pub use crate::error::{ConfigError, ConfigResult};
pub use crate::types::{Config, ElasticConfig, MemoryCacheConfig, RedisConfig, TracardiConfig};
