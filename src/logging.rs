//! Structured logging initialization.
//!
//! Dispatch events are emitted through `tracing` with structured fields
//! (`request_id`, `method`, `path`, `allow`, ...). This module installs a
//! `tracing-subscriber` pipeline for binaries and tests that want to see them:
//! JSON lines for production, pretty or compact output for development.
//!
//! Library code never installs a subscriber by itself.
//!
//! | Variable | Meaning | Default |
//! |---|---|---|
//! | `BRRTR_LOG_LEVEL` | base level | `info` |
//! | `BRRTR_LOG_FORMAT` | `json`, `pretty` or `compact` | `json` |
//! | `BRRTR_LOG_TARGET_FILTER` | extra directives, comma separated | none |
//! | `BRRTR_LOG_INCLUDE_LOCATION` | `true`/`1` adds file and line | off |

use anyhow::{anyhow, Context, Result};
use std::env;
use std::str::FromStr;
use tracing::Level;
use tracing_subscriber::filter::Directive;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Output shape of the fmt layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
    Compact,
}

impl FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            "pretty" => Ok(LogFormat::Pretty),
            "compact" => Ok(LogFormat::Compact),
            other => Err(anyhow!("unknown log format '{other}'")),
        }
    }
}

/// Subscriber settings for a process embedding the dispatcher
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub level: Level,
    pub format: LogFormat,
    /// Per-target directives such as `brrtdispatch::locator=debug`
    pub directives: Vec<String>,
    pub include_location: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            format: LogFormat::Json,
            directives: Vec::new(),
            include_location: false,
        }
    }
}

impl LogConfig {
    /// Read the `BRRTR_LOG_*` variables. Unparseable values fall back to the
    /// defaults.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub(crate) fn from_lookup<F>(get: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Self {
            level: get("BRRTR_LOG_LEVEL")
                .and_then(|v| Level::from_str(v.trim()).ok())
                .unwrap_or(defaults.level),
            format: get("BRRTR_LOG_FORMAT")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.format),
            directives: get("BRRTR_LOG_TARGET_FILTER")
                .map(|v| {
                    v.split(',')
                        .map(str::trim)
                        .filter(|d| !d.is_empty())
                        .map(String::from)
                        .collect()
                })
                .unwrap_or_default(),
            include_location: get("BRRTR_LOG_INCLUDE_LOCATION")
                .is_some_and(|v| v == "true" || v == "1"),
        }
    }

    /// Verbose human-readable output with every dispatch decision
    #[must_use]
    pub fn development() -> Self {
        Self {
            level: Level::DEBUG,
            format: LogFormat::Pretty,
            directives: Vec::new(),
            include_location: true,
        }
    }

    /// Add a directive on top of the base level
    #[must_use]
    pub fn with_directive(mut self, directive: impl Into<String>) -> Self {
        self.directives.push(directive.into());
        self
    }

    /// `RUST_LOG` wins over the configured level when set; directives are
    /// layered on top either way.
    fn env_filter(&self) -> Result<EnvFilter> {
        let base = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(self.level.as_str()));
        self.directives.iter().try_fold(base, |filter, directive| -> Result<EnvFilter> {
            let parsed: Directive = directive
                .parse()
                .with_context(|| format!("invalid log directive '{directive}'"))?;
            Ok(filter.add_directive(parsed))
        })
    }
}

/// Initialize logging at `level`, other settings from the environment
///
/// # Errors
///
/// Fails on an unknown level name, an invalid directive, or when a global
/// subscriber is already installed.
///
/// # Example
///
/// ```no_run
/// brrtdispatch::logging::init_logging("debug").expect("logging");
/// ```
pub fn init_logging(level: &str) -> Result<()> {
    let level = Level::from_str(level).with_context(|| format!("unknown log level '{level}'"))?;
    init_logging_with_config(&LogConfig {
        level,
        ..LogConfig::from_env()
    })
}

/// Install the global subscriber described by `config`.
///
/// # Errors
///
/// Fails on an invalid directive or when a global subscriber is already
/// installed.
pub fn init_logging_with_config(config: &LogConfig) -> Result<()> {
    let location = config.include_location;
    let fmt_layer = match config.format {
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .flatten_event(true)
            .with_current_span(true)
            .with_thread_ids(true)
            .with_file(location)
            .with_line_number(location)
            .boxed(),
        LogFormat::Pretty => tracing_subscriber::fmt::layer()
            .pretty()
            .with_file(location)
            .with_line_number(location)
            .boxed(),
        LogFormat::Compact => tracing_subscriber::fmt::layer()
            .compact()
            .with_file(location)
            .with_line_number(location)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(config.env_filter()?)
        .with(fmt_layer)
        .try_init()
        .context("a global tracing subscriber is already installed")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_log_format_names() {
        assert_eq!("pretty".parse::<LogFormat>().unwrap(), LogFormat::Pretty);
        assert_eq!(" COMPACT ".parse::<LogFormat>().unwrap(), LogFormat::Compact);
        assert_eq!("json".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert!("xml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn test_unset_variables_give_defaults() {
        let config = LogConfig::from_lookup(|_| None);
        assert_eq!(config.level, Level::INFO);
        assert_eq!(config.format, LogFormat::Json);
        assert!(config.directives.is_empty());
        assert!(!config.include_location);
    }

    #[test]
    fn test_variables_are_read() {
        let vars: HashMap<&str, &str> = [
            ("BRRTR_LOG_LEVEL", "debug"),
            ("BRRTR_LOG_FORMAT", "pretty"),
            (
                "BRRTR_LOG_TARGET_FILTER",
                "brrtdispatch::locator=trace, ,brrtdispatch::dispatcher=warn",
            ),
            ("BRRTR_LOG_INCLUDE_LOCATION", "1"),
        ]
        .into_iter()
        .collect();
        let config = LogConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string()));
        assert_eq!(config.level, Level::DEBUG);
        assert_eq!(config.format, LogFormat::Pretty);
        assert_eq!(
            config.directives,
            vec!["brrtdispatch::locator=trace", "brrtdispatch::dispatcher=warn"]
        );
        assert!(config.include_location);
    }

    #[test]
    fn test_bad_values_fall_back() {
        let config = LogConfig::from_lookup(|k| match k {
            "BRRTR_LOG_LEVEL" => Some("loud".to_string()),
            "BRRTR_LOG_FORMAT" => Some("xml".to_string()),
            _ => None,
        });
        assert_eq!(config.level, Level::INFO);
        assert_eq!(config.format, LogFormat::Json);
    }

    #[test]
    fn test_invalid_directive_is_an_error() {
        let config = LogConfig::default().with_directive("brrtdispatch=notalevel");
        assert!(config.env_filter().is_err());
        assert!(LogConfig::development()
            .with_directive("brrtdispatch::locator=trace")
            .env_filter()
            .is_ok());
    }
}
