//! Log output for the relay
//!
//! Everything is written to stderr. `RUST_LOG` wins over the configured
//! level when it is set, so per-module filters such as
//! `libtweetbridge::relay=debug,rumqttc=warn` work without a flag.
//!
//! ```no_run
//! use libtweetbridge::logging::{LogFormat, LoggingConfig};
//!
//! LoggingConfig::new(LogFormat::Json, "info".to_string(), false).init();
//! ```

use std::str::FromStr;
use tracing_subscriber::EnvFilter;

const FORMAT_VAR: &str = "TWEETBRIDGE_LOG_FORMAT";
const LEVEL_VAR: &str = "TWEETBRIDGE_LOG_LEVEL";
const DEFAULT_LEVEL: &str = "info";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// One plain line per event, suitable for journald
    Text,
    /// One JSON object per event with fields flattened
    Json,
    /// Multi-line with source locations, for local debugging
    Pretty,
}

impl LogFormat {
    const ALL: [LogFormat; 3] = [LogFormat::Text, LogFormat::Json, LogFormat::Pretty];

    pub fn as_str(self) -> &'static str {
        match self {
            LogFormat::Text => "text",
            LogFormat::Json => "json",
            LogFormat::Pretty => "pretty",
        }
    }
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|format| format.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| {
                format!(
                    "Invalid log format: '{}'. Valid options: text, json, pretty",
                    s
                )
            })
    }
}

impl std::fmt::Display for LogFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the relay's subscriber is set up
pub struct LoggingConfig {
    pub format: LogFormat,
    pub level: String,
    /// Forces debug level regardless of `level`
    pub verbose: bool,
}

impl LoggingConfig {
    pub fn new(format: LogFormat, level: String, verbose: bool) -> Self {
        Self {
            format,
            level,
            verbose,
        }
    }

    fn default_directive(&self) -> &str {
        if self.verbose {
            "debug"
        } else {
            &self.level
        }
    }

    fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(self.default_directive()))
    }

    /// Install the global subscriber
    ///
    /// # Panics
    ///
    /// Panics if a global subscriber has already been installed
    pub fn init(&self) {
        let builder = tracing_subscriber::fmt()
            .with_env_filter(self.filter())
            .with_writer(std::io::stderr);

        match self.format {
            LogFormat::Json => builder.json().flatten_event(true).init(),
            LogFormat::Pretty => builder.pretty().init(),
            LogFormat::Text => builder.with_target(false).init(),
        }
    }
}

/// Set up logging from `TWEETBRIDGE_LOG_FORMAT` and `TWEETBRIDGE_LOG_LEVEL`
///
/// Unset or unparseable values fall back to text at info level.
pub fn init_default() {
    let format = std::env::var(FORMAT_VAR)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(LogFormat::Text);
    let level = std::env::var(LEVEL_VAR).unwrap_or_else(|_| DEFAULT_LEVEL.to_string());

    LoggingConfig::new(format, level, false).init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_parse_ignores_case() {
        assert_eq!("text".parse::<LogFormat>().unwrap(), LogFormat::Text);
        assert_eq!("Json".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("PRETTY".parse::<LogFormat>().unwrap(), LogFormat::Pretty);
    }

    #[test]
    fn test_log_format_parse_rejects_unknown() {
        let err = "xml".parse::<LogFormat>().unwrap_err();
        assert!(err.contains("Invalid log format: 'xml'"));
    }

    #[test]
    fn test_log_format_display_matches_flag_value() {
        for format in LogFormat::ALL {
            assert_eq!(format.to_string().parse::<LogFormat>().unwrap(), format);
        }
    }

    #[test]
    fn test_verbose_forces_debug() {
        let quiet = LoggingConfig::new(LogFormat::Text, "warn".to_string(), false);
        assert_eq!(quiet.default_directive(), "warn");

        let verbose = LoggingConfig::new(LogFormat::Text, "warn".to_string(), true);
        assert_eq!(verbose.default_directive(), "debug");
    }
}
