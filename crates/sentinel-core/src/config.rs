//! Proctoring configuration.
//!
//! Loaded once at startup and shared read-only. Precedence: environment (`SENTINEL__*`) >
//! file (`SENTINEL_CONFIG` path, else `config/sentinel.toml`) > built-in defaults.
//!
//! | Key | Default | Description |
//! |-----|---------|-------------|
//! | max_warnings | 3 | Violations tolerated before forced termination. |
//! | termination_grace_ms | 3000 | Delay between threshold breach and the automatic end. |
//! | toast_duration_ms | 5000 | Warning toast visibility without a newer violation. |
//! | analysis.api_base | Gemini v1beta | Base URL of the grammar analysis API. |
//! | analysis.model | gemini-2.5-flash-latest | Model used for the report. |
//! | analysis.timeout_secs | 30 | Upper bound on one analysis request. |

use crate::shared::{MAX_WARNINGS, TERMINATION_GRACE_MS, TOAST_DURATION_MS};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_ANALYSIS_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_ANALYSIS_MODEL: &str = "gemini-2.5-flash-latest";
const DEFAULT_CONFIG_PATH: &str = "config/sentinel.toml";

fn default_max_warnings() -> usize {
    MAX_WARNINGS
}

fn default_grace_ms() -> u64 {
    TERMINATION_GRACE_MS
}

fn default_toast_ms() -> u64 {
    TOAST_DURATION_MS
}

fn default_api_base() -> String {
    DEFAULT_ANALYSIS_API_BASE.to_string()
}

fn default_model() -> String {
    DEFAULT_ANALYSIS_MODEL.to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

/// Settings for the outbound grammar analysis call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            model: default_model(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl AnalysisConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

/// Shared, read-only proctoring policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProctorConfig {
    #[serde(default = "default_max_warnings")]
    pub max_warnings: usize,
    #[serde(default = "default_grace_ms")]
    pub termination_grace_ms: u64,
    #[serde(default = "default_toast_ms")]
    pub toast_duration_ms: u64,
    #[serde(default)]
    pub analysis: AnalysisConfig,
}

impl Default for ProctorConfig {
    fn default() -> Self {
        Self {
            max_warnings: MAX_WARNINGS,
            termination_grace_ms: TERMINATION_GRACE_MS,
            toast_duration_ms: TOAST_DURATION_MS,
            analysis: AnalysisConfig::default(),
        }
    }
}

impl ProctorConfig {
    /// Load from the default file location and environment.
    pub fn load() -> Result<Self, config::ConfigError> {
        let path = std::env::var("SENTINEL_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load_from(Path::new(&path))
    }

    /// Load from a specific file (skipped when missing) and environment.
    pub fn load_from(path: &Path) -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder()
            .set_default("max_warnings", MAX_WARNINGS as i64)?
            .set_default("termination_grace_ms", TERMINATION_GRACE_MS as i64)?
            .set_default("toast_duration_ms", TOAST_DURATION_MS as i64)?
            .set_default("analysis.api_base", DEFAULT_ANALYSIS_API_BASE)?
            .set_default("analysis.model", DEFAULT_ANALYSIS_MODEL)?
            .set_default("analysis.timeout_secs", default_timeout_secs() as i64)?;

        let builder = if path.exists() {
            builder.add_source(config::File::from(path))
        } else {
            builder
        };

        let built = builder
            .add_source(config::Environment::with_prefix("SENTINEL").separator("__"))
            .build()?;

        let loaded: Self = built.try_deserialize()?;
        Ok(loaded.sanitized())
    }

    /// A zero threshold would terminate before any warning; clamp to at least one.
    fn sanitized(mut self) -> Self {
        self.max_warnings = self.max_warnings.max(1);
        self
    }

    pub fn termination_grace(&self) -> Duration {
        Duration::from_millis(self.termination_grace_ms)
    }

    pub fn toast_duration(&self) -> Duration {
        Duration::from_millis(self.toast_duration_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_policy_constants() {
        let config = ProctorConfig::default();
        assert_eq!(config.max_warnings, 3);
        assert_eq!(config.termination_grace(), Duration::from_secs(3));
        assert_eq!(config.toast_duration(), Duration::from_secs(5));
        assert_eq!(config.analysis.model, DEFAULT_ANALYSIS_MODEL);
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = ProctorConfig::load_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.max_warnings, MAX_WARNINGS);
        assert_eq!(config.analysis.api_base, DEFAULT_ANALYSIS_API_BASE);
    }

    #[test]
    fn file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sentinel.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "toast_duration_ms = 2500").unwrap();
        writeln!(file, "max_warnings = 0").unwrap();
        writeln!(file, "[analysis]").unwrap();
        writeln!(file, "model = \"gemini-test\"").unwrap();
        drop(file);

        let config = ProctorConfig::load_from(&path).unwrap();
        assert_eq!(config.toast_duration_ms, 2500);
        assert_eq!(config.max_warnings, 1);
        assert_eq!(config.analysis.model, "gemini-test");
        assert_eq!(config.termination_grace_ms, TERMINATION_GRACE_MS);
    }
}
