//! Experiment configuration.
//!
//! Loaded from YAML; every field has a default so a partial file (or none
//! at all) is valid. CLI flags override the loaded values.

use crate::metrics::StatConfig;
use crate::sampler::{SamplerConfig, SamplingMode, SecondPassPriority};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Errors that can occur during configuration loading
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse YAML configuration: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

/// Sampling section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SamplingSettings {
    /// Size of the evaluation subset
    #[serde(default = "default_target_total")]
    pub target_total: usize,
    /// Random seed for reproducibility
    #[serde(default = "default_seed")]
    pub seed: u64,
    /// Balanced (true) or stratified (false) sampling
    #[serde(default = "default_balanced")]
    pub balanced: bool,
    /// Second-pass priority for balanced sampling
    #[serde(default)]
    pub priority: SecondPassPriority,
}

const fn default_target_total() -> usize {
    100
}
const fn default_seed() -> u64 {
    42
}
const fn default_balanced() -> bool {
    true
}

impl Default for SamplingSettings {
    fn default() -> Self {
        Self {
            target_total: default_target_total(),
            seed: default_seed(),
            balanced: default_balanced(),
            priority: SecondPassPriority::default(),
        }
    }
}

impl SamplingSettings {
    /// Sampler configuration for these settings
    #[must_use]
    pub const fn sampler_config(&self) -> SamplerConfig {
        SamplerConfig {
            seed: self.seed,
            mode: if self.balanced {
                SamplingMode::Balanced
            } else {
                SamplingMode::Stratified
            },
            priority: self.priority,
        }
    }
}

/// Statistics section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatisticsSettings {
    /// Bootstrap resamples for CI
    #[serde(default = "default_bootstrap_n")]
    pub bootstrap_n: usize,
    /// Confidence level
    #[serde(default = "default_confidence")]
    pub confidence: f64,
    /// Maximum p-value for significance
    #[serde(default = "default_alpha")]
    pub alpha: f64,
    /// Random seed for bootstrap resampling
    #[serde(default = "default_seed")]
    pub seed: u64,
}

const fn default_bootstrap_n() -> usize {
    10_000
}
const fn default_confidence() -> f64 {
    0.95
}
const fn default_alpha() -> f64 {
    0.05
}

impl Default for StatisticsSettings {
    fn default() -> Self {
        Self {
            bootstrap_n: default_bootstrap_n(),
            confidence: default_confidence(),
            alpha: default_alpha(),
            seed: default_seed(),
        }
    }
}

impl From<&StatisticsSettings> for StatConfig {
    fn from(settings: &StatisticsSettings) -> Self {
        Self {
            bootstrap_n: settings.bootstrap_n,
            confidence: settings.confidence,
            alpha: settings.alpha,
            seed: settings.seed,
        }
    }
}

/// Top-level experiment configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ExperimentConfig {
    /// Sampling settings
    #[serde(default)]
    pub sampling: SamplingSettings,
    /// Statistical settings
    #[serde(default)]
    pub statistics: StatisticsSettings,
}

impl ExperimentConfig {
    /// Load configuration from YAML file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Load configuration from YAML string
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML cannot be parsed or a value is out of range.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` naming the first bad field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sampling.target_total == 0 {
            return Err(ConfigError::InvalidValue(
                "sampling.target_total must be greater than zero".to_string(),
            ));
        }
        let confidence = self.statistics.confidence;
        if !(confidence > 0.0 && confidence < 1.0) {
            return Err(ConfigError::InvalidValue(format!(
                "statistics.confidence must be in (0, 1), got {confidence}"
            )));
        }
        let alpha = self.statistics.alpha;
        if !(alpha > 0.0 && alpha < 1.0) {
            return Err(ConfigError::InvalidValue(format!(
                "statistics.alpha must be in (0, 1), got {alpha}"
            )));
        }
        Ok(())
    }

    /// Statistical configuration for reports
    #[must_use]
    pub fn stat_config(&self) -> StatConfig {
        StatConfig::from(&self.statistics)
    }
}
