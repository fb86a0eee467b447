//! Logging setup built on `tracing-subscriber`.

use crate::error::{TelemetryError, TelemetryResult};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

/// Output format for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable, multi-line.
    Pretty,
    /// Single-line, human-readable.
    Compact,
    /// Newline-delimited JSON, for shipping to log aggregators.
    Json,
}

/// Configuration for [`setup_logging`].
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Default level (`trace`, `debug`, `info`, `warn`, `error`).
    pub level: String,
    /// Output format.
    pub format: LogFormat,
    /// Extra per-target directives, e.g. `tracker_engine=trace`.
    pub directives: Vec<String>,
}

impl LogConfig {
    /// A config at the given default level, `Compact` format, no
    /// extra directives.
    #[must_use]
    pub fn new(level: impl Into<String>) -> Self {
        Self {
            level: level.into(),
            format: LogFormat::Compact,
            directives: Vec::new(),
        }
    }

    /// Override the output format.
    #[must_use]
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Add a per-target directive (e.g. `tracker_storage=debug`).
    #[must_use]
    pub fn with_directive(mut self, directive: impl Into<String>) -> Self {
        self.directives.push(directive.into());
        self
    }

    fn env_filter(&self) -> TelemetryResult<EnvFilter> {
        let mut filter = EnvFilter::try_new(&self.level)
            .map_err(|e| TelemetryError::InvalidDirective(e.to_string()))?;
        for directive in &self.directives {
            let parsed = directive
                .parse()
                .map_err(|_| TelemetryError::InvalidDirective(directive.clone()))?;
            filter = filter.add_directive(parsed);
        }
        Ok(filter)
    }
}

/// Install a global subscriber built from `config`.
///
/// # Errors
///
/// Returns [`TelemetryError::InvalidDirective`] if `config.level` or
/// any directive fails to parse, or
/// [`TelemetryError::AlreadyInstalled`] if a global subscriber is
/// already set.
pub fn setup_logging(config: &LogConfig) -> TelemetryResult<()> {
    let filter = config.env_filter()?;
    let registry = tracing_subscriber::registry().with(filter);

    let result = match config.format {
        LogFormat::Pretty => registry.with(fmt::layer().pretty()).try_init(),
        LogFormat::Compact => registry.with(fmt::layer().compact()).try_init(),
        LogFormat::Json => registry.with(fmt::layer().json()).try_init(),
    };

    result.map_err(|e| TelemetryError::AlreadyInstalled(e.to_string()))
}

/// Install a global subscriber at `info` level, `Compact` format.
///
/// # Errors
///
/// See [`setup_logging`].
pub fn setup_default_logging() -> TelemetryResult<()> {
    setup_logging(&LogConfig::new("info"))
}
