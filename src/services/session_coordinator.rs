//! Session/Loop Coordinator (C9): the long-running top-level loop that owns
//! a Session, drives its Waves through the WaveScheduler, responds to
//! control events, persists progress via CheckpointStore, and emits
//! observer events for state changes, wave progress, and checkpoints.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::domain::errors::SchedulerError;
use crate::domain::models::{Session, SessionStatus, Wave, WaveOutcome};
use crate::services::audit_log::{AuditEventType, AuditOutcome, SharedAuditLog};
use crate::services::checkpoint_store::SharedCheckpointStore;
use crate::services::wave_scheduler::WaveScheduler;

/// A Session's plan: the ordered Waves it will run, most-dependent last.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    pub waves: Vec<Wave>,
}

/// One iteration of a `RepeatUntilLoop`, handed to the terminator predicate
/// alongside all prior iterations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IterationResult {
    pub wave_number: u32,
    pub outcome: WaveOutcome,
    pub completed: usize,
    pub failed: usize,
    pub at: DateTime<Utc>,
}

/// `{loopId, iterations, currentIteration, lastActivityAt}` per spec — a
/// persisted append-only record of a coordinator's progress through a Plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepeatUntilLoop {
    pub loop_id: String,
    pub iterations: Vec<IterationResult>,
    pub current_iteration: u32,
    pub last_activity_at: DateTime<Utc>,
}

impl RepeatUntilLoop {
    pub fn new(loop_id: impl Into<String>) -> Self {
        Self { loop_id: loop_id.into(), iterations: Vec::new(), current_iteration: 0, last_activity_at: Utc::now() }
    }

    pub fn append(&mut self, result: IterationResult) {
        self.iterations.push(result);
        self.current_iteration += 1;
        self.last_activity_at = Utc::now();
    }
}

/// Control events a caller (CLI/IPC) may send to a running coordinator.
#[derive(Debug, Clone)]
pub enum ControlEvent {
    Pause,
    Resume,
    Cancel,
    RestartWave(u32),
    RestartStory { wave_number: u32, story_id: String },
}

/// Observer events the coordinator publishes as it runs, per §6's
/// execution-events pub-sub contract.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    WaveProgress { wave_id: String, completed: usize, failed: usize, total: usize },
    StoryCompleted { story_id: String },
    StoryFailed { story_id: String, summary: String },
    CheckpointSaved { name: String },
    SessionStatusChanged { status: SessionStatus },
}

pub struct SessionCoordinator {
    scheduler: Arc<WaveScheduler>,
    checkpoints: SharedCheckpointStore,
    audit_log: SharedAuditLog,
    session: Arc<RwLock<Session>>,
    events: broadcast::Sender<SessionEvent>,
    cancel: CancellationToken,
    paused: Arc<RwLock<bool>>,
}

impl SessionCoordinator {
    pub fn new(
        scheduler: Arc<WaveScheduler>,
        checkpoints: SharedCheckpointStore,
        audit_log: SharedAuditLog,
        session: Session,
    ) -> (Self, broadcast::Receiver<SessionEvent>) {
        let (tx, rx) = broadcast::channel(256);
        let coordinator = Self {
            scheduler,
            checkpoints,
            audit_log,
            session: Arc::new(RwLock::new(session)),
            events: tx,
            cancel: CancellationToken::new(),
            paused: Arc::new(RwLock::new(false)),
        };
        (coordinator, rx)
    }

    /// Additional fan-out subscribers (UI, CLI, audit) can each get their own receiver.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub async fn session_snapshot(&self) -> Session {
        self.session.read().await.clone()
    }

    /// Drives `plan`'s Waves to completion (or a stop), pausing/cancelling
    /// cooperatively in response to `handle_control`, persisting a
    /// `RepeatUntilLoop` checkpoint after every wave.
    pub async fn run(&self, loop_id: &str, plan: &Plan) -> Result<RepeatUntilLoop, SchedulerError> {
        let mut loop_state = match self.checkpoints.load_loop::<RepeatUntilLoop>(loop_id).await {
            Ok(checkpoint) => checkpoint.state,
            Err(e) => {
                info!(error = %e, "no existing loop checkpoint, starting fresh");
                RepeatUntilLoop::new(loop_id)
            }
        };

        for wave in &plan.waves {
            if wave.number < loop_state.current_iteration + 1 {
                continue;
            }

            self.wait_while_paused().await;
            if self.cancel.is_cancelled() {
                self.set_status(SessionStatus::Failed).await;
                break;
            }

            let resume_state = self
                .checkpoints
                .load::<crate::domain::models::WaveState>(&format!("wave-{}", wave.number))
                .await
                .ok()
                .map(|c| c.state);

            let (wave_state, outcome) =
                self.scheduler.run_wave(wave, resume_state, false, self.cancel.clone()).await?;

            let _ = self.events.send(SessionEvent::WaveProgress {
                wave_id: wave.id.clone(),
                completed: wave_state.completed_task_ids.len(),
                failed: wave_state.failed_task_ids.len(),
                total: wave.stories.len(),
            });
            for story_id in &wave_state.completed_task_ids {
                let _ = self.events.send(SessionEvent::StoryCompleted { story_id: story_id.clone() });
            }
            for story_id in &wave_state.failed_task_ids {
                let _ = self.events.send(SessionEvent::StoryFailed {
                    story_id: story_id.clone(),
                    summary: "story failed".to_string(),
                });
            }

            self.audit_log
                .log_operation(
                    AuditEventType::WaveDispatched,
                    "system",
                    "wave-completed",
                    &wave.id,
                    if wave_state.failed_task_ids.is_empty() { AuditOutcome::Success } else { AuditOutcome::PartialSuccess },
                    Some(HashMap::from([("outcome".to_string(), serde_json::json!(outcome))])),
                )
                .await
                .ok();

            loop_state.append(IterationResult {
                wave_number: wave.number,
                outcome,
                completed: wave_state.completed_task_ids.len(),
                failed: wave_state.failed_task_ids.len(),
                at: Utc::now(),
            });
            self.checkpoints.save_loop(loop_id, &loop_state).await.map_err(|e| SchedulerError::WaveFailed(e.to_string()))?;
            let _ = self.events.send(SessionEvent::CheckpointSaved { name: format!("loop-{loop_id}") });

            {
                let mut session = self.session.write().await;
                session.touch();
            }

            if outcome == WaveOutcome::Failed {
                self.set_status(SessionStatus::Failed).await;
                return Ok(loop_state);
            }
        }

        if !self.cancel.is_cancelled() {
            self.set_status(SessionStatus::Completed).await;
        }
        Ok(loop_state)
    }

    pub async fn handle_control(&self, event: ControlEvent) {
        match event {
            ControlEvent::Pause => {
                *self.paused.write().await = true;
                self.set_status(SessionStatus::Paused).await;
            }
            ControlEvent::Resume => {
                *self.paused.write().await = false;
                self.set_status(SessionStatus::Active).await;
            }
            ControlEvent::Cancel => {
                self.cancel.cancel();
            }
            ControlEvent::RestartWave(number) => {
                info!(wave = number, "restart-wave requested; clearing persisted wave state");
                if let Err(e) = self.checkpoints.save(&format!("wave-{number}"), &crate::domain::models::WaveState::new(number)).await {
                    warn!(error = %e, "failed to reset wave checkpoint");
                }
            }
            ControlEvent::RestartStory { wave_number, story_id } => {
                if let Ok(checkpoint) = self
                    .checkpoints
                    .load::<crate::domain::models::WaveState>(&format!("wave-{wave_number}"))
                    .await
                {
                    let mut state = checkpoint.state;
                    state.completed_task_ids.remove(&story_id);
                    state.failed_task_ids.remove(&story_id);
                    if let Err(e) = self.checkpoints.save(&format!("wave-{wave_number}"), &state).await {
                        warn!(error = %e, "failed to persist story restart");
                    }
                }
            }
        }
    }

    async fn wait_while_paused(&self) {
        loop {
            if !*self.paused.read().await || self.cancel.is_cancelled() {
                return;
            }
            tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
        }
    }

    async fn set_status(&self, status: SessionStatus) {
        let mut session = self.session.write().await;
        session.set_status(status);
        drop(session);
        let _ = self.events.send(SessionEvent::SessionStatusChanged { status });
        self.audit_log
            .log_operation(
                AuditEventType::StateTransition,
                "system",
                "session-status-changed",
                "session",
                AuditOutcome::Success,
                Some(HashMap::from([("status".to_string(), serde_json::json!(status))])),
            )
            .await
            .ok();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{
        CheckpointStoreConfig, ExecutionStateMachineConfig, Parallelization, Story, WaveSchedulerConfig,
    };
    use crate::domain::ports::{AlwaysAdmit, RunOutput, RunUsage};
    use crate::domain::ports::AgentRunner;
    use crate::services::audit_log::AuditLogService;
    use crate::services::checkpoint_store::CheckpointStore;
    use crate::services::execution_state_machine::ExecutionStateMachine;
    use async_trait::async_trait;

    struct EchoRunner;

    #[async_trait]
    impl AgentRunner for EchoRunner {
        async fn run(&self, prompt: &str, _model: &str) -> Result<RunOutput, crate::domain::ports::RunError> {
            Ok(RunOutput { output: prompt.to_string(), metadata: Default::default(), usage: RunUsage::default() })
        }
    }

    fn one_wave_plan() -> Plan {
        let mut wave = Wave::new("w1", 1, "phase-1");
        wave.parallelization = Parallelization::Full;
        wave.max_concurrent = 4;
        wave.stories = vec![Story::new("s1", "w1", "first")];
        Plan { waves: vec![wave] }
    }

    async fn harness(dir: &std::path::Path) -> (SessionCoordinator, broadcast::Receiver<SessionEvent>) {
        let checkpoints = Arc::new(CheckpointStore::new(CheckpointStoreConfig {
            checkpoints_dir: dir.to_string_lossy().to_string(),
            retention_days: 7,
            max_bytes: 1024 * 1024,
        }));
        let audit_log = Arc::new(
            AuditLogService::new(dir.join("audit"), crate::domain::models::AuditLogConfig::default()).await.unwrap(),
        );
        let scheduler = Arc::new(WaveScheduler::new(
            WaveSchedulerConfig::default(),
            Arc::new(ExecutionStateMachine::new(ExecutionStateMachineConfig::default())),
            Arc::new(EchoRunner),
            Arc::new(AlwaysAdmit),
            Arc::clone(&checkpoints),
        ));
        SessionCoordinator::new(scheduler, checkpoints, audit_log, Session::new("t", "/repo"))
    }

    #[tokio::test]
    async fn run_completes_single_wave_session() {
        let dir = tempfile::tempdir().unwrap();
        let (coordinator, _rx) = harness(dir.path()).await;
        let loop_state = coordinator.run("loop-1", &one_wave_plan()).await.unwrap();
        assert_eq!(loop_state.current_iteration, 1);
        assert_eq!(loop_state.iterations[0].outcome, WaveOutcome::Completed);
        assert_eq!(coordinator.session_snapshot().await.status, SessionStatus::Completed);
    }

    #[tokio::test]
    async fn cancel_stops_before_completion() {
        let dir = tempfile::tempdir().unwrap();
        let (coordinator, _rx) = harness(dir.path()).await;
        coordinator.handle_control(ControlEvent::Cancel).await;
        let loop_state = coordinator.run("loop-2", &one_wave_plan()).await.unwrap();
        assert_eq!(loop_state.current_iteration, 0);
        assert_eq!(coordinator.session_snapshot().await.status, SessionStatus::Failed);
    }

    #[tokio::test]
    async fn resuming_a_loop_skips_completed_waves() {
        let dir = tempfile::tempdir().unwrap();
        let (coordinator, _rx) = harness(dir.path()).await;
        let _ = coordinator.run("loop-3", &one_wave_plan()).await.unwrap();

        let (coordinator2, _rx2) = harness(dir.path()).await;
        let loop_state = coordinator2.run("loop-3", &one_wave_plan()).await.unwrap();
        assert_eq!(loop_state.current_iteration, 1);
    }
}
