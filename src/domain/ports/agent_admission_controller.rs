//! AgentAdmissionController: the global-resource gate the WaveScheduler
//! polls before every dispatch decision.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

#[derive(Debug, Clone)]
pub struct AdmissionMetrics {
    pub cpu_load: f64,
    pub memory_pressure: f64,
    pub process_count: u32,
    pub can_spawn_agent: bool,
    pub timestamp: DateTime<Utc>,
}

#[async_trait]
pub trait AgentAdmissionController: Send + Sync {
    async fn metrics(&self) -> AdmissionMetrics;
}

/// Admits unconditionally; useful as a default when the host imposes no
/// external resource gate.
pub struct AlwaysAdmit;

#[async_trait]
impl AgentAdmissionController for AlwaysAdmit {
    async fn metrics(&self) -> AdmissionMetrics {
        AdmissionMetrics {
            cpu_load: 0.0,
            memory_pressure: 0.0,
            process_count: 0,
            can_spawn_agent: true,
            timestamp: Utc::now(),
        }
    }
}
