//! # Dispatch Configuration Module
//!
//! Runtime knobs of the dispatch engine, loaded from environment variables
//! or a YAML file.
//!
//! ## Environment Variables
//!
//! ### `BRRTR_MAX_LOCATOR_DEPTH`
//!
//! Maximum number of sub-resource locator hops per request. A chain that goes
//! deeper fails with a 500 instead of recursing forever.
//!
//! Default: `32`
//!
//! ### `BRRTR_RESUME_ON_404`
//!
//! When `true`, a request no root resource matches is handed back to the
//! enclosing application (`Dispatch::Resume`) instead of answering 404.
//!
//! Default: `false`
//!
//! ## YAML
//!
//! ```yaml
//! max_locator_depth: 8
//! resume_on_404: true
//! ```
//!
//! Missing keys keep their defaults.
//!
//! ## Usage
//!
//! ```rust
//! use brrtdispatch::config::DispatchConfig;
//!
//! let config = DispatchConfig::from_env();
//! assert!(config.max_locator_depth > 0);
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::env;
use std::path::Path;

pub const DEFAULT_MAX_LOCATOR_DEPTH: usize = 32;

/// Dispatch engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DispatchConfig {
    /// Maximum locator hops per request (default: 32)
    pub max_locator_depth: usize,
    /// Resume the enclosing chain instead of answering 404 (default: false)
    pub resume_on_404: bool,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_locator_depth: DEFAULT_MAX_LOCATOR_DEPTH,
            resume_on_404: false,
        }
    }
}

impl DispatchConfig {
    /// Load configuration from environment variables. Unparseable values
    /// fall back to the defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub(crate) fn from_lookup<F>(get: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let max_locator_depth = get("BRRTR_MAX_LOCATOR_DEPTH")
            .and_then(|v| v.trim().parse::<usize>().ok())
            .filter(|depth| *depth > 0)
            .unwrap_or(defaults.max_locator_depth);
        let resume_on_404 = get("BRRTR_RESUME_ON_404")
            .map(|v| matches!(v.trim().to_lowercase().as_str(), "true" | "1" | "yes"))
            .unwrap_or(defaults.resume_on_404);
        Self {
            max_locator_depth,
            resume_on_404,
        }
    }

    /// Parse YAML configuration text
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self =
            serde_yaml::from_str(yaml).context("Failed to parse dispatch configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Load YAML configuration from a file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_yaml_str(&text)
            .with_context(|| format!("Invalid config file {}", path.display()))
    }

    fn validate(&self) -> Result<()> {
        if self.max_locator_depth == 0 {
            anyhow::bail!("max_locator_depth must be at least 1");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = DispatchConfig::from_lookup(|_| None);
        assert_eq!(config, DispatchConfig::default());
        assert_eq!(config.max_locator_depth, 32);
        assert!(!config.resume_on_404);
    }

    #[test]
    fn test_env_values() {
        let config = DispatchConfig::from_lookup(|key| match key {
            "BRRTR_MAX_LOCATOR_DEPTH" => Some("4".to_string()),
            "BRRTR_RESUME_ON_404" => Some("TRUE".to_string()),
            _ => None,
        });
        assert_eq!(config.max_locator_depth, 4);
        assert!(config.resume_on_404);
    }

    #[test]
    fn test_invalid_env_values_fall_back() {
        let config = DispatchConfig::from_lookup(|key| match key {
            "BRRTR_MAX_LOCATOR_DEPTH" => Some("0".to_string()),
            "BRRTR_RESUME_ON_404" => Some("nope".to_string()),
            _ => None,
        });
        assert_eq!(config.max_locator_depth, DEFAULT_MAX_LOCATOR_DEPTH);
        assert!(!config.resume_on_404);
    }

    #[test]
    fn test_yaml_partial_and_invalid() {
        let config = DispatchConfig::from_yaml_str("resume_on_404: true\n").unwrap();
        assert!(config.resume_on_404);
        assert_eq!(config.max_locator_depth, DEFAULT_MAX_LOCATOR_DEPTH);

        assert!(DispatchConfig::from_yaml_str("max_locator_depth: 0\n").is_err());
        assert!(DispatchConfig::from_yaml_str("unknown_key: 1\n").is_err());
    }
}
