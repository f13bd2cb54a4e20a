//! Pipeline configuration.
//!
//! Everything has a default, so a config file only needs the values it
//! changes. Durations are written the human way (`2s`, `3m`).
//!
//! ```yaml
//! model: gemini-1.5-pro-latest
//! governance:
//!   concurrency: 8
//!   retry:
//!     max_attempts: 5
//!     delay: 5s
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::providers::{GenerationConfig, DEFAULT_MODEL};
use crate::resilience::RetryPolicy;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read configuration file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse YAML configuration: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    pub model: String,

    /// Base directory holding the numbered run directories
    pub data_dir: PathBuf,

    pub prompts: PromptPaths,

    pub scenario: ScenarioSettings,

    pub governance: GovernanceSettings,

    pub evaluation: EvaluationSettings,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            data_dir: PathBuf::from("data"),
            prompts: PromptPaths::default(),
            scenario: ScenarioSettings::default(),
            governance: GovernanceSettings::default(),
            evaluation: EvaluationSettings::default(),
        }
    }
}

impl PipelineConfig {
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&contents)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.model.trim().is_empty() {
            return Err(ConfigError::Invalid("model must not be empty".to_string()));
        }

        if let Some(t) = self.governance.temperature {
            if !(0.0..=2.0).contains(&t) {
                return Err(ConfigError::Invalid(format!(
                    "governance.temperature must be within 0.0..=2.0, got {t}"
                )));
            }
        }

        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PromptPaths {
    pub scenario: PathBuf,
    pub governance: PathBuf,
    pub evaluation: PathBuf,
}

impl Default for PromptPaths {
    fn default() -> Self {
        Self {
            scenario: PathBuf::from("prompts/scenario_prompt.txt"),
            governance: PathBuf::from("prompts/governance_prompt.txt"),
            evaluation: PathBuf::from("prompts/evaluation.txt"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetrySettings {
    pub max_attempts: u32,

    #[serde(with = "humantime_duration")]
    pub delay: Duration,
}

impl Default for RetrySettings {
    fn default() -> Self {
        let policy = RetryPolicy::generation();
        Self {
            max_attempts: policy.max_attempts,
            delay: policy.delay,
        }
    }
}

impl RetrySettings {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts, self.delay)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScenarioSettings {
    /// Scenarios generated per selected class
    pub count: usize,

    pub workers: usize,

    #[serde(with = "humantime_duration")]
    pub request_timeout: Duration,

    pub retry: RetrySettings,
}

impl Default for ScenarioSettings {
    fn default() -> Self {
        Self {
            count: 1,
            workers: 4,
            request_timeout: Duration::from_secs(120),
            retry: RetrySettings::default(),
        }
    }
}

impl ScenarioSettings {
    pub fn generation_config(&self, model: &str) -> GenerationConfig {
        GenerationConfig::new(model).with_timeout(self.request_timeout)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GovernanceSettings {
    /// Runs processed at the same time
    pub concurrency: usize,

    #[serde(with = "humantime_duration")]
    pub request_timeout: Duration,

    pub temperature: Option<f32>,

    pub max_output_tokens: Option<u32>,

    pub retry: RetrySettings,
}

impl Default for GovernanceSettings {
    fn default() -> Self {
        Self {
            concurrency: 5,
            request_timeout: Duration::from_secs(180),
            temperature: Some(0.7),
            max_output_tokens: Some(8192),
            retry: RetrySettings::default(),
        }
    }
}

impl GovernanceSettings {
    pub fn generation_config(&self, model: &str) -> GenerationConfig {
        let mut config = GenerationConfig::new(model).with_timeout(self.request_timeout);
        config.temperature = self.temperature;
        config.max_output_tokens = self.max_output_tokens;
        config
    }
}

/// The evaluation stage always makes a single attempt per run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EvaluationSettings {
    pub workers: usize,

    #[serde(with = "humantime_duration")]
    pub request_timeout: Duration,
}

impl Default for EvaluationSettings {
    fn default() -> Self {
        Self {
            workers: 4,
            request_timeout: Duration::from_secs(120),
        }
    }
}

impl EvaluationSettings {
    pub fn generation_config(&self, model: &str) -> GenerationConfig {
        GenerationConfig::new(model).with_timeout(self.request_timeout)
    }
}

mod humantime_duration {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&humantime::format_duration(*value).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let text = String::deserialize(deserializer)?;
        humantime::parse_duration(&text).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.model, "gemini-1.5-flash-latest");
        assert_eq!(config.scenario.workers, 4);
        assert_eq!(config.scenario.count, 1);
        assert_eq!(config.governance.concurrency, 5);
        assert_eq!(config.evaluation.workers, 4);
        assert_eq!(config.scenario.retry.policy(), RetryPolicy::generation());
        assert_eq!(config.prompts.evaluation, PathBuf::from("prompts/evaluation.txt"));
    }

    #[test]
    fn test_partial_yaml_with_durations() {
        let config = PipelineConfig::from_yaml(
            r#"
model: gemini-1.5-pro-latest
governance:
  concurrency: 8
  request_timeout: 3m
  retry:
    max_attempts: 5
    delay: 500ms
"#,
        )
        .unwrap();

        assert_eq!(config.model, "gemini-1.5-pro-latest");
        assert_eq!(config.governance.concurrency, 8);
        assert_eq!(config.governance.request_timeout, Duration::from_secs(180));
        assert_eq!(config.governance.retry.delay, Duration::from_millis(500));
        assert_eq!(config.governance.retry.max_attempts, 5);
        // Untouched sections keep their defaults.
        assert_eq!(config.governance.max_output_tokens, Some(8192));
        assert_eq!(config.scenario, ScenarioSettings::default());
    }

    #[test]
    fn test_governance_generation_config() {
        let generation = GovernanceSettings::default().generation_config("m");
        assert_eq!(generation.temperature, Some(0.7));
        assert_eq!(generation.max_output_tokens, Some(8192));
        assert_eq!(generation.timeout, Duration::from_secs(180));

        let scenario = ScenarioSettings::default().generation_config("m");
        assert_eq!(scenario.temperature, None);
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(matches!(PipelineConfig::from_yaml("model: ''"), Err(ConfigError::Invalid(_))));
        assert!(matches!(
            PipelineConfig::from_yaml("governance:\n  temperature: 5.0"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            PipelineConfig::from_yaml("scenario:\n  request_timeout: soon"),
            Err(ConfigError::Yaml(_))
        ));
        assert!(matches!(PipelineConfig::from_yaml("colour: blue"), Err(ConfigError::Yaml(_))));
    }

    #[test]
    fn test_yaml_round_trip_keeps_durations_readable() {
        let yaml = serde_yaml::to_string(&PipelineConfig::default()).unwrap();
        assert!(yaml.contains("request_timeout: 2m"));
        assert_eq!(PipelineConfig::from_yaml(&yaml).unwrap(), PipelineConfig::default());
    }
}
