use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use thiserror::Error;

use crate::domain::models::config::Config;

/// Configuration validation error.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid checkpoint retention_days: {0}, must be positive")]
    InvalidRetentionDays(i64),

    #[error("invalid checkpoint max_bytes: {0}, must be positive")]
    InvalidMaxBytes(u64),

    #[error("invalid execution_state_machine.max_retries: {0}, would allow unbounded retry")]
    InvalidMaxRetries(u32),

    #[error("invalid wave_scheduler.global_agent_budget: {0}, must be at least 1")]
    InvalidAgentBudget(u32),

    #[error("invalid prompt_validator.similarity_threshold: {0}, must be within [0, 1]")]
    InvalidSimilarityThreshold(f64),

    #[error("invalid failure_index.max_records: {0}, must be positive")]
    InvalidMaxRecords(usize),

    #[error("invalid audit_log.max_files: {0}, must be at least 1")]
    InvalidMaxFiles(u32),

    #[error("invalid logging.level: {0}")]
    InvalidLogLevel(String),
}

/// Layered configuration loader: defaults, then project YAML, then local
/// override YAML, then environment variables, highest precedence last.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging.
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (`Config::default()`)
    /// 2. `.wavework/config.yaml` (project config)
    /// 3. `.wavework/local.yaml` (project-local override, optional)
    /// 4. `WAVEWORK_*`-prefixed environment variables (highest priority)
    pub fn load() -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(".wavework/config.yaml"))
            .merge(Yaml::file(".wavework/local.yaml"))
            .merge(Env::prefixed("WAVEWORK_").split("__"))
            .extract()
            .context("failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file, skipping project/env layers.
    pub fn load_from_file(path: impl AsRef<std::path::Path>) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .extract()
            .with_context(|| format!("failed to load config from {}", path.as_ref().display()))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading.
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        if config.checkpoint_store.retention_days <= 0 {
            return Err(ConfigError::InvalidRetentionDays(config.checkpoint_store.retention_days));
        }
        if config.checkpoint_store.max_bytes == 0 {
            return Err(ConfigError::InvalidMaxBytes(config.checkpoint_store.max_bytes));
        }
        if config.execution_state_machine.max_retries == 0 {
            return Err(ConfigError::InvalidMaxRetries(config.execution_state_machine.max_retries));
        }
        if config.wave_scheduler.global_agent_budget == 0 {
            return Err(ConfigError::InvalidAgentBudget(config.wave_scheduler.global_agent_budget));
        }
        if !(0.0..=1.0).contains(&config.prompt_validator.similarity_threshold) {
            return Err(ConfigError::InvalidSimilarityThreshold(
                config.prompt_validator.similarity_threshold,
            ));
        }
        if config.failure_index.max_records == 0 {
            return Err(ConfigError::InvalidMaxRecords(config.failure_index.max_records));
        }
        if config.audit_log.max_files == 0 {
            return Err(ConfigError::InvalidMaxFiles(config.audit_log.max_files));
        }
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = Config::default();
        ConfigLoader::validate(&config).expect("default config should be valid");
    }

    #[test]
    fn zero_agent_budget_is_rejected() {
        let mut config = Config::default();
        config.wave_scheduler.global_agent_budget = 0;
        assert!(matches!(ConfigLoader::validate(&config), Err(ConfigError::InvalidAgentBudget(0))));
    }

    #[test]
    fn out_of_range_similarity_threshold_is_rejected() {
        let mut config = Config::default();
        config.prompt_validator.similarity_threshold = 1.5;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidSimilarityThreshold(_))
        ));
    }

    #[test]
    fn yaml_override_wins_over_defaults() {
        use std::io::Write;
        use tempfile::NamedTempFile;

        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "wave_scheduler:\n  global_agent_budget: 7").unwrap();
        file.flush().unwrap();

        let config = ConfigLoader::load_from_file(file.path()).unwrap();
        assert_eq!(config.wave_scheduler.global_agent_budget, 7);
        assert_eq!(config.execution_state_machine.max_retries, 3);
    }
}
