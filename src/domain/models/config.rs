//! Ambient configuration aggregate (§4, ambient). One struct per component
//! plus the top-level `Config` that [`crate::infrastructure::config`] loads
//! from defaults, `.wavework/config.yaml`, `.wavework/local.yaml`, and
//! `WAVEWORK_`-prefixed environment variables, in that precedence order.

use serde::{Deserialize, Serialize};

use super::checkpoint::CheckpointStoreConfig;
use super::failure_record::FailureIndexConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionStateMachineConfig {
    pub max_retries: u32,
    pub allow_fail_from_any: bool,
    pub transition_timeout_ms: u64,
}

impl Default for ExecutionStateMachineConfig {
    fn default() -> Self {
        Self { max_retries: 3, allow_fail_from_any: true, transition_timeout_ms: 30_000 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    Stop,
    Continue,
}

impl Default for FailurePolicy {
    fn default() -> Self {
        Self::Stop
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WaveSchedulerConfig {
    pub global_agent_budget: u32,
    pub admission_poll_interval_ms: u64,
    pub failure_policy: FailurePolicy,
}

impl Default for WaveSchedulerConfig {
    fn default() -> Self {
        Self {
            global_agent_budget: 2,
            admission_poll_interval_ms: 250,
            failure_policy: FailurePolicy::Stop,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PropertyTesterConfig {
    pub num_runs: u32,
    pub seed: u64,
    pub max_shrinks: u32,
    pub collect_all: bool,
}

impl Default for PropertyTesterConfig {
    fn default() -> Self {
        Self { num_runs: 100, seed: 0, max_shrinks: 100, collect_all: false }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditLogConfig {
    pub max_file_size_bytes: u64,
    pub max_files: u32,
    pub enable_memory_store: bool,
    pub max_memory_entries: usize,
}

impl Default for AuditLogConfig {
    fn default() -> Self {
        Self {
            max_file_size_bytes: 10 * 1024 * 1024,
            max_files: 5,
            enable_memory_store: true,
            max_memory_entries: 1000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptValidatorConfig {
    pub max_prompt_chars: usize,
    pub max_estimated_tokens: usize,
    pub similarity_threshold: f64,
}

impl Default for PromptValidatorConfig {
    fn default() -> Self {
        Self { max_prompt_chars: 500, max_estimated_tokens: 125, similarity_threshold: 0.5 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), json: false }
    }
}

/// The top-level aggregate every component config lives under.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub checkpoint_store: CheckpointStoreConfig,
    pub execution_state_machine: ExecutionStateMachineConfig,
    pub wave_scheduler: WaveSchedulerConfig,
    pub property_tester: PropertyTesterConfig,
    pub failure_index: FailureIndexConfig,
    pub prompt_validator: PromptValidatorConfig,
    pub audit_log: AuditLogConfig,
    pub logging: LoggingConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_values() {
        let cfg = Config::default();
        assert_eq!(cfg.wave_scheduler.global_agent_budget, 2);
        assert_eq!(cfg.execution_state_machine.max_retries, 3);
        assert_eq!(cfg.prompt_validator.similarity_threshold, 0.5);
        assert_eq!(cfg.audit_log.max_files, 5);
    }
}
