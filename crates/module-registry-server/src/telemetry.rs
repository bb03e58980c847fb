//! Telemetry configuration
//!
//! Structured logging for the module registry server. `RUST_LOG`, when set,
//! takes precedence over the configured level.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingConfig;

/// Telemetry configuration
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Log level
    pub log_level: String,

    /// Whether to use JSON formatting
    pub json_format: bool,

    /// Whether to include timestamps
    pub include_timestamps: bool,

    /// Whether to include thread IDs
    pub include_thread_ids: bool,

    /// Whether to include target module
    pub include_target: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_format: false,
            include_timestamps: true,
            include_thread_ids: false,
            include_target: true,
        }
    }
}

impl TelemetryConfig {
    /// Create a new telemetry config
    pub fn new() -> Self {
        Self::default()
    }

    /// Set log level
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Enable JSON formatting
    pub fn with_json_format(mut self, enabled: bool) -> Self {
        self.json_format = enabled;
        self
    }

    /// Configure timestamp inclusion
    pub fn with_timestamps(mut self, enabled: bool) -> Self {
        self.include_timestamps = enabled;
        self
    }

    /// Configure thread ID inclusion
    pub fn with_thread_ids(mut self, enabled: bool) -> Self {
        self.include_thread_ids = enabled;
        self
    }

    /// Configure target module inclusion
    pub fn with_target(mut self, enabled: bool) -> Self {
        self.include_target = enabled;
        self
    }
}

impl From<&LoggingConfig> for TelemetryConfig {
    fn from(logging: &LoggingConfig) -> Self {
        TelemetryConfig::new()
            .with_log_level(logging.effective_level())
            .with_json_format(logging.json_format)
            .with_timestamps(logging.include_timestamps)
            .with_thread_ids(logging.include_thread_ids)
            .with_target(logging.include_target)
    }
}

/// Initialize telemetry with custom configuration
pub fn init_with_config(config: TelemetryConfig) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    if config.json_format {
        let layer = fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(false)
            .with_target(config.include_target)
            .with_thread_ids(config.include_thread_ids);

        if config.include_timestamps {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(layer)
                .init();
        } else {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(layer.without_time())
                .init();
        }
    } else {
        let layer = fmt::layer()
            .with_target(config.include_target)
            .with_thread_ids(config.include_thread_ids);

        if config.include_timestamps {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(layer)
                .init();
        } else {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(layer.without_time())
                .init();
        }
    }
}
