//! Configuration loading and validation for the baton engine.
//!
//! Loads engine settings from a TOML file or string. Every field has a
//! documented default, so an empty config is a valid config. Validates all
//! settings before handing them to the engine.

use baton_core::{ModelPreferences, RequestParams};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to a `baton.toml` file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    /// Orchestration settings (plan mode, step limit, plan retries)
    #[serde(default)]
    pub engine: OrchestrationConfig,

    /// Reasoning loop settings (iteration bound, retry budgets, timeouts)
    #[serde(default)]
    pub reasoning: ReasoningConfig,

    /// Model defaults and selection weights
    #[serde(default)]
    pub model: ModelConfig,

    /// Provider binding settings
    #[serde(default)]
    pub provider: ProviderConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestrationConfig {
    /// "full" builds the whole plan up front; "iterative" plans one step at a time
    #[serde(default = "default_plan_mode")]
    pub plan_mode: String,

    /// Iterative planning stops with an error after this many steps
    /// without a completion signal
    #[serde(default = "default_max_steps")]
    pub max_steps: usize,

    /// Corrective re-prompts for malformed planner output
    #[serde(default = "default_retries")]
    pub plan_retries: u32,
}

fn default_plan_mode() -> String {
    "iterative".into()
}
fn default_max_steps() -> usize {
    20
}
fn default_retries() -> u32 {
    2
}

impl Default for OrchestrationConfig {
    fn default() -> Self {
        Self {
            plan_mode: default_plan_mode(),
            max_steps: default_max_steps(),
            plan_retries: default_retries(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReasoningConfig {
    /// Bound on provider/tool round-trips per loop invocation
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,

    /// Corrective re-prompts when structured output fails schema validation
    #[serde(default = "default_retries")]
    pub structured_retries: u32,

    /// Retries for transient provider failures
    #[serde(default = "default_retries")]
    pub provider_retries: u32,

    /// Initial backoff between provider retries, doubled per attempt
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Per provider-call timeout. Absent means no timeout.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call_timeout_secs: Option<u64>,
}

fn default_max_iterations() -> usize {
    8
}
fn default_retry_backoff_ms() -> u64 {
    250
}

impl Default for ReasoningConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            structured_retries: default_retries(),
            provider_retries: default_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
            call_timeout_secs: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Fallback model when nothing is pinned and the provider declares no candidates
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Default temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Default max tokens per completion
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Model selection weight on cheapness, in [0, 1]
    #[serde(default = "default_weight")]
    pub cost_weight: f32,

    /// Model selection weight on speed, in [0, 1]
    #[serde(default = "default_weight")]
    pub speed_weight: f32,

    /// Model selection weight on capability, in [0, 1]
    #[serde(default = "default_weight")]
    pub intelligence_weight: f32,
}

fn default_model() -> String {
    "anthropic/claude-sonnet-4".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    4096
}
fn default_weight() -> f32 {
    0.5
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            default_model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            cost_weight: default_weight(),
            speed_weight: default_weight(),
            intelligence_weight: default_weight(),
        }
    }
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// API key for the provider binding
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Override for the provider endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &redact(&self.api_key))
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl EngineConfig {
    /// Parse configuration from a TOML string.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(|e| ConfigError::ParseError {
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a file path. A missing file yields defaults.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        Self::from_toml_str(&content)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.engine.plan_mode != "full" && self.engine.plan_mode != "iterative" {
            return Err(ConfigError::ValidationError(format!(
                "plan_mode must be \"full\" or \"iterative\", got \"{}\"",
                self.engine.plan_mode
            )));
        }

        if self.engine.max_steps == 0 {
            return Err(ConfigError::ValidationError("max_steps must be at least 1".into()));
        }

        if self.reasoning.max_iterations == 0 {
            return Err(ConfigError::ValidationError(
                "max_iterations must be at least 1".into(),
            ));
        }

        if self.model.temperature < 0.0 || self.model.temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "temperature must be between 0.0 and 2.0".into(),
            ));
        }

        for (name, weight) in [
            ("cost_weight", self.model.cost_weight),
            ("speed_weight", self.model.speed_weight),
            ("intelligence_weight", self.model.intelligence_weight),
        ] {
            if !(0.0..=1.0).contains(&weight) {
                return Err(ConfigError::ValidationError(format!(
                    "{name} must be between 0.0 and 1.0"
                )));
            }
        }

        Ok(())
    }

    /// Model selection preferences from the configured weights.
    pub fn preferences(&self) -> ModelPreferences {
        ModelPreferences {
            cost: self.model.cost_weight,
            speed: self.model.speed_weight,
            intelligence: self.model.intelligence_weight,
        }
    }

    /// Default per-invocation request parameters derived from this config.
    pub fn request_params(&self) -> RequestParams {
        RequestParams::default()
            .with_temperature(self.model.temperature)
            .with_max_tokens(self.model.max_tokens)
            .with_max_iterations(self.reasoning.max_iterations)
            .with_preferences(self.preferences())
    }

    /// Check if an API key is configured.
    pub fn has_api_key(&self) -> bool {
        self.provider.api_key.is_some()
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config: {reason}")]
    ParseError { reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.engine.plan_mode, "iterative");
        assert_eq!(config.engine.max_steps, 20);
        assert_eq!(config.reasoning.max_iterations, 8);
        assert_eq!(config.reasoning.retry_backoff_ms, 250);
        assert!(config.reasoning.call_timeout_secs.is_none());
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = EngineConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed = EngineConfig::from_toml_str(&toml_str).unwrap();
        assert_eq!(parsed.engine.max_steps, config.engine.max_steps);
        assert_eq!(parsed.model.default_model, config.model.default_model);
    }

    #[test]
    fn sections_parse_from_toml() {
        let toml_str = r#"
[engine]
plan_mode = "full"
max_steps = 5

[reasoning]
max_iterations = 3
call_timeout_secs = 30

[model]
default_model = "fast-1"
cost_weight = 0.9
"#;
        let config = EngineConfig::from_toml_str(toml_str).unwrap();
        assert_eq!(config.engine.plan_mode, "full");
        assert_eq!(config.engine.max_steps, 5);
        assert_eq!(config.reasoning.max_iterations, 3);
        assert_eq!(config.reasoning.call_timeout_secs, Some(30));
        assert_eq!(config.model.default_model, "fast-1");
        assert!((config.model.cost_weight - 0.9).abs() < f32::EPSILON);
        // Unset fields keep their defaults
        assert_eq!(config.engine.plan_retries, 2);
    }

    #[test]
    fn invalid_plan_mode_rejected() {
        let err = EngineConfig::from_toml_str("[engine]\nplan_mode = \"recursive\"\n");
        assert!(matches!(err, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn invalid_temperature_rejected() {
        let err = EngineConfig::from_toml_str("[model]\ntemperature = 5.0\n");
        assert!(matches!(err, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn out_of_range_weight_rejected() {
        let err = EngineConfig::from_toml_str("[model]\nspeed_weight = 1.5\n");
        assert!(matches!(err, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn unknown_top_level_key_rejected() {
        let err = EngineConfig::from_toml_str("[telemetry]\nenabled = true\n");
        assert!(matches!(err, Err(ConfigError::ParseError { .. })));
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let config = EngineConfig::from_path(Path::new("/nonexistent/baton.toml")).unwrap();
        assert_eq!(config.engine.max_steps, 20);
    }

    #[test]
    fn config_loads_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("baton.toml");
        std::fs::write(&path, "[engine]\nmax_steps = 7\n").unwrap();

        let config = EngineConfig::from_path(&path).unwrap();
        assert_eq!(config.engine.max_steps, 7);
    }

    #[test]
    fn debug_redacts_api_key() {
        let config = ProviderConfig {
            api_key: Some("sk-secret-value".into()),
            base_url: None,
        };
        let debug = format!("{config:?}");
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("sk-secret-value"));
    }

    #[test]
    fn request_params_follow_config() {
        let toml_str = r#"
[reasoning]
max_iterations = 4

[model]
temperature = 0.2
max_tokens = 512
intelligence_weight = 1.0
"#;
        let config = EngineConfig::from_toml_str(toml_str).unwrap();
        let params = config.request_params();
        assert_eq!(params.max_iterations, 4);
        assert_eq!(params.max_tokens, 512);
        assert!((params.temperature - 0.2).abs() < f32::EPSILON);
        assert!((params.preferences.intelligence - 1.0).abs() < f32::EPSILON);
    }
}
