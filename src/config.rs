//! Runtime configuration.
//!
//! Loaded from YAML; every field has a default so a partial file (or none at
//! all) is valid. Environment variables override the file.

use std::path::{Path, PathBuf};

use action_flow::DEFAULT_SUCCESS_THRESHOLD;
use action_primitives::Viewport;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use webpilot_core_types::EngineKind;

pub const ENV_ENGINE: &str = "WEBPILOT_ENGINE";
pub const ENV_HEADLESS: &str = "WEBPILOT_HEADLESS";
pub const ENV_MAX_STEPS: &str = "WEBPILOT_MAX_STEPS";
pub const ENV_SUCCESS_THRESHOLD: &str = "WEBPILOT_SUCCESS_THRESHOLD";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },
    #[error("invalid value for {key}: {value}")]
    InvalidOverride { key: &'static str, value: String },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub engines: EngineSettings,
    pub planner: PlannerSettings,
    pub executor: ExecutorSettings,
    pub verifier: VerifierSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Engine new sessions are opened on; `auto` follows `priority`.
    pub preference: EngineKind,
    pub priority: Vec<EngineKind>,
    pub headless: bool,
    pub stealth: bool,
    pub user_agent: Option<String>,
    pub viewport: Option<Viewport>,
    /// Request timeout of the HTTP fetch engine.
    pub fetch_timeout_ms: u64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            preference: EngineKind::Auto,
            priority: EngineKind::CONCRETE.to_vec(),
            headless: true,
            stealth: false,
            user_agent: None,
            viewport: None,
            fetch_timeout_ms: 30_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerSettings {
    pub max_steps: usize,
    pub settle_ms: u64,
}

impl Default for PlannerSettings {
    fn default() -> Self {
        Self {
            max_steps: 10,
            settle_ms: 1_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorSettings {
    pub default_timeout_ms: u64,
    pub default_max_retries: u32,
    pub retry_backoff_ms: u64,
}

impl Default for ExecutorSettings {
    fn default() -> Self {
        Self {
            default_timeout_ms: 30_000,
            default_max_retries: 0,
            retry_backoff_ms: 250,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerifierSettings {
    pub success_threshold: f64,
}

impl Default for VerifierSettings {
    fn default() -> Self {
        Self {
            success_threshold: DEFAULT_SUCCESS_THRESHOLD,
        }
    }
}

impl Config {
    pub fn from_yaml_str(content: &str, path: &Path) -> Result<Self, ConfigError> {
        serde_yaml::from_str(content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&content, path)
    }

    /// Applies the process environment on top of the loaded values.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Applies overrides from `lookup`; unset or blank keys are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &'static str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
                .map(|value| (key, value))
        };

        if let Some((key, value)) = read(ENV_ENGINE) {
            self.engines.preference = value
                .parse()
                .map_err(|_| ConfigError::InvalidOverride { key, value })?;
        }
        if let Some((key, value)) = read(ENV_HEADLESS) {
            self.engines.headless = match value.to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" => false,
                _ => return Err(ConfigError::InvalidOverride { key, value }),
            };
        }
        if let Some((key, value)) = read(ENV_MAX_STEPS) {
            self.planner.max_steps = value
                .parse()
                .map_err(|_| ConfigError::InvalidOverride { key, value })?;
        }
        if let Some((key, value)) = read(ENV_SUCCESS_THRESHOLD) {
            self.verifier.success_threshold = value
                .parse()
                .map_err(|_| ConfigError::InvalidOverride { key, value })?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.planner.max_steps == 0 {
            return Err(ConfigError::Invalid("planner.max_steps must be at least 1".into()));
        }
        if !(0.0..=1.0).contains(&self.verifier.success_threshold) {
            return Err(ConfigError::Invalid(format!(
                "verifier.success_threshold must be within [0, 1], got {}",
                self.verifier.success_threshold
            )));
        }
        if self.engines.priority.iter().any(|kind| kind.is_auto()) {
            return Err(ConfigError::Invalid(
                "engines.priority lists concrete engines only".into(),
            ));
        }
        if self.engines.priority.is_empty() {
            return Err(ConfigError::Invalid("engines.priority is empty".into()));
        }
        Ok(())
    }

    pub fn session_options(&self) -> action_primitives::SessionOptions {
        action_primitives::SessionOptions {
            headless: self.engines.headless,
            stealth: self.engines.stealth,
            user_agent: self.engines.user_agent.clone(),
            viewport: self.engines.viewport,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn partial_yaml_keeps_defaults() {
        let yaml = "engines:\n  preference: fetch\nverifier:\n  success_threshold: 0.5\n";
        let config = Config::from_yaml_str(yaml, Path::new("inline.yaml")).unwrap();
        assert_eq!(config.engines.preference, EngineKind::Fetch);
        assert_eq!(config.engines.priority, EngineKind::CONCRETE.to_vec());
        assert_eq!(config.planner.max_steps, 10);
        assert_eq!(config.executor.retry_backoff_ms, 250);
        assert_eq!(config.verifier.success_threshold, 0.5);
        config.validate().unwrap();
    }

    #[test]
    fn unknown_engine_in_yaml_is_a_parse_error() {
        let err = Config::from_yaml_str("engines:\n  preference: netscape\n", Path::new("x.yaml"))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn overrides_replace_file_values() {
        let mut config = Config::default();
        config
            .apply_overrides(lookup(&[
                (ENV_ENGINE, "webdriver"),
                (ENV_HEADLESS, "off"),
                (ENV_MAX_STEPS, "4"),
                (ENV_SUCCESS_THRESHOLD, "0.9"),
            ]))
            .unwrap();
        assert_eq!(config.engines.preference, EngineKind::WebDriver);
        assert!(!config.engines.headless);
        assert_eq!(config.planner.max_steps, 4);
        assert_eq!(config.verifier.success_threshold, 0.9);
    }

    #[test]
    fn malformed_override_is_rejected() {
        let mut config = Config::default();
        let err = config
            .apply_overrides(lookup(&[(ENV_HEADLESS, "sometimes")]))
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidOverride {
                key: ENV_HEADLESS,
                ..
            }
        ));
    }

    #[test]
    fn validation_catches_bad_values() {
        let mut config = Config::default();
        config.verifier.success_threshold = 1.2;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.engines.priority = vec![EngineKind::Auto];
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.planner.max_steps = 0;
        assert!(config.validate().is_err());
    }
}
