//! Logging configuration and initialization
//!
//! Structured logging with tracing: compact console output for development,
//! JSON lines for log aggregation, and an optional non-blocking log file.

use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use crate::settings::RigSettings;

/// Environment variable holding the log filter
pub const LOG_ENV: &str = "RIG_LOG";
/// Environment variable selecting the output format ("json")
pub const LOG_FORMAT_ENV: &str = "RIG_LOG_FORMAT";

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Enable console output (default: true)
    pub console_enabled: bool,
    /// Also write to this file (default: None)
    pub file_path: Option<PathBuf>,
    /// Use JSON format for console logs (default: false)
    pub json_format: bool,
    /// Default log level filter (default: "info")
    pub default_level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            console_enabled: true,
            file_path: None,
            json_format: false,
            default_level: "info".to_string(),
        }
    }
}

impl From<&RigSettings> for LogConfig {
    fn from(settings: &RigSettings) -> Self {
        Self {
            json_format: settings.log_json,
            file_path: settings.log_file.as_ref().map(PathBuf::from),
            ..Self::default()
        }
    }
}

impl LogConfig {
    /// JSON output if requested by the environment, otherwise the configured value
    fn use_json(&self) -> bool {
        std::env::var(LOG_FORMAT_ENV)
            .map(|v| v.eq_ignore_ascii_case("json"))
            .unwrap_or(self.json_format)
    }
}

/// Initialize the logging system with the given configuration
///
/// Returns a guard that must be kept alive for the duration of the program
/// so file logging is flushed.
///
/// Filter precedence: `RIG_LOG`, then `RUST_LOG`, then `default_level`.
pub fn init_logging(
    config: &LogConfig,
) -> Result<Option<WorkerGuard>, Box<dyn std::error::Error + Send + Sync>> {
    let env_filter = EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_env("RUST_LOG"))
        .unwrap_or_else(|_| EnvFilter::new(&config.default_level));

    let use_json = config.use_json();
    let mut file_guard: Option<WorkerGuard> = None;

    let file_layer = match &config.file_path {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?;
            let (non_blocking, guard) = tracing_appender::non_blocking(file);
            file_guard = Some(guard);
            Some(
                fmt::layer()
                    .with_writer(non_blocking)
                    .with_target(true)
                    .with_file(true)
                    .with_line_number(true)
                    .with_ansi(false),
            )
        }
        None => None,
    };

    let (json_layer, console_layer) = match (config.console_enabled, use_json) {
        (true, true) => (
            Some(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_file(true)
                    .with_line_number(true),
            ),
            None,
        ),
        (true, false) => (
            None,
            Some(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false)
                    .compact(),
            ),
        ),
        (false, _) => (None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(json_layer)
        .with(console_layer)
        .try_init()?;

    tracing::info!(
        target: "rig_server",
        version = env!("CARGO_PKG_VERSION"),
        json_format = use_json,
        file_enabled = config.file_path.is_some(),
        "Logging initialized"
    );

    Ok(file_guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_config_default() {
        let config = LogConfig::default();
        assert!(config.console_enabled);
        assert!(config.file_path.is_none());
        assert!(!config.json_format);
        assert_eq!(config.default_level, "info");
    }

    #[test]
    fn test_log_config_from_settings() {
        let settings = RigSettings {
            log_json: true,
            log_file: Some("/var/log/rig.log".to_string()),
            ..RigSettings::default()
        };
        let config = LogConfig::from(&settings);
        assert!(config.json_format);
        assert_eq!(config.file_path, Some(PathBuf::from("/var/log/rig.log")));
        assert!(config.console_enabled);
    }
}
