//! Logging configuration and subscriber setup.
//!
//! The engine logs through `tracing` and never installs a subscriber on its
//! own. Hosts that do not already configure one can call
//! [`setup::init_logging`].

use tracing::Level;

/// Controls how much the orchestrator logs about individual regions and the cache.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Base log level for engine components
    pub base_level: Level,
    /// Whether to log each detected region
    pub log_region_details: bool,
    /// Whether to log cache hits and misses at info level
    pub log_cache_events: bool,
    /// Maximum length for logged field values (to prevent huge logs)
    pub max_field_length: usize,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            base_level: Level::INFO,
            log_region_details: false,
            log_cache_events: true,
            max_field_length: 256,
        }
    }
}

impl LogConfig {
    /// Creates a verbose configuration suitable for debugging.
    pub fn verbose() -> Self {
        Self {
            base_level: Level::DEBUG,
            log_region_details: true,
            log_cache_events: true,
            max_field_length: 1024,
        }
    }

    /// Creates a minimal configuration for production with lowest overhead.
    pub fn production() -> Self {
        Self {
            base_level: Level::WARN,
            log_region_details: false,
            log_cache_events: false,
            max_field_length: 128,
        }
    }

    pub fn balanced() -> Self {
        Self::default()
    }
}

/// Debug logging that is skipped entirely below the configured level.
#[macro_export]
macro_rules! perf_debug {
    ($config:expr, $($arg:tt)*) => {
        if $config.base_level >= tracing::Level::DEBUG {
            tracing::debug!($($arg)*);
        }
    };
}

/// Logs a region only when region details are enabled.
#[macro_export]
macro_rules! log_region {
    ($config:expr, $($arg:tt)*) => {
        if $config.log_region_details {
            tracing::info!($($arg)*);
        }
    };
}

/// Logs a cache event only when cache events are enabled.
#[macro_export]
macro_rules! log_cache_event {
    ($config:expr, $($arg:tt)*) => {
        if $config.log_cache_events {
            tracing::info!($($arg)*);
        }
    };
}

/// Truncates a string to at most `max_length` characters.
pub fn truncate_field(value: &str, max_length: usize) -> String {
    match value.char_indices().nth(max_length) {
        None => value.to_string(),
        Some((cut, _)) => format!("{}...(truncated)", &value[..cut]),
    }
}

/// Subscriber setup for hosts and examples.
pub mod setup {
    use tracing::Level;

    /// Configuration for the global subscriber.
    #[derive(Debug, Clone)]
    pub struct LoggingConfig {
        /// Log level for the application
        pub level: Level,
        /// Log level for the `sheetlens` target specifically
        pub engine_level: Level,
        /// Whether to use JSON output format
        pub json_format: bool,
        /// Environment filter override
        pub env_filter: Option<String>,
    }

    impl Default for LoggingConfig {
        fn default() -> Self {
            Self {
                level: Level::INFO,
                engine_level: Level::INFO,
                json_format: false,
                env_filter: None,
            }
        }
    }

    impl LoggingConfig {
        /// JSON output, engine at info, everything else at warn.
        pub fn production() -> Self {
            Self {
                level: Level::WARN,
                engine_level: Level::INFO,
                json_format: true,
                env_filter: None,
            }
        }

        pub fn development() -> Self {
            Self {
                level: Level::DEBUG,
                engine_level: Level::DEBUG,
                json_format: false,
                env_filter: None,
            }
        }

        pub fn with_level(mut self, level: Level) -> Self {
            self.level = level;
            self
        }

        pub fn with_engine_level(mut self, level: Level) -> Self {
            self.engine_level = level;
            self
        }

        pub fn with_json_format(mut self, enabled: bool) -> Self {
            self.json_format = enabled;
            self
        }

        pub fn with_env_filter(mut self, filter: impl Into<String>) -> Self {
            self.env_filter = Some(filter.into());
            self
        }

        /// Builds the environment filter string.
        pub fn env_filter(&self) -> String {
            match &self.env_filter {
                Some(filter) => filter.clone(),
                None => format!(
                    "{},sheetlens={}",
                    self.level.as_str().to_lowercase(),
                    self.engine_level.as_str().to_lowercase()
                ),
            }
        }
    }

    /// Installs a global fmt subscriber. `RUST_LOG` takes precedence over the
    /// configured filter.
    ///
    /// # Errors
    ///
    /// Fails if a global subscriber is already installed.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use sheetlens::logging::setup::{init_logging, LoggingConfig};
    ///
    /// init_logging(LoggingConfig::development().with_json_format(true)).unwrap();
    /// ```
    pub fn init_logging(config: LoggingConfig) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

        let env_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(config.env_filter()));

        let fmt_layer = if config.json_format {
            tracing_subscriber::fmt::layer().json().boxed()
        } else {
            tracing_subscriber::fmt::layer().boxed()
        };

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::setup::LoggingConfig;
    use super::*;

    #[test]
    fn test_log_config_presets() {
        let config = LogConfig::default();
        assert_eq!(config.base_level, Level::INFO);
        assert!(!config.log_region_details);
        assert_eq!(config.max_field_length, 256);

        assert!(LogConfig::verbose().log_region_details);
        assert_eq!(LogConfig::production().base_level, Level::WARN);
        assert!(!LogConfig::production().log_cache_events);
    }

    #[test]
    fn test_truncate_field() {
        assert_eq!(truncate_field("short", 10), "short");
        assert_eq!(truncate_field("abcdef", 3), "abc...(truncated)");
        // multi-byte characters are never split
        assert_eq!(truncate_field("ééé", 2), "éé...(truncated)");
    }

    #[test]
    fn test_env_filter() {
        assert_eq!(LoggingConfig::default().env_filter(), "info,sheetlens=info");
        assert_eq!(
            LoggingConfig::production().env_filter(),
            "warn,sheetlens=info"
        );
        assert_eq!(
            LoggingConfig::default()
                .with_env_filter("sheetlens=trace")
                .env_filter(),
            "sheetlens=trace"
        );
    }

    #[test]
    fn test_macros_respect_config() {
        let quiet = LogConfig::production();
        let loud = LogConfig::verbose();
        perf_debug!(quiet, "not emitted");
        perf_debug!(loud, value = 1, "emitted");
        log_region!(loud, region = "Sheet1!A1:B4", "region");
        log_cache_event!(quiet, "not emitted");
    }
}
