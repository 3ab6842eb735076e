//! WaveScheduler (C3): drives a Wave's Stories to completion subject to
//! concurrency and failure policy, built on `StoryDag::dispatch_batches`
//! for layer/parallel-group ordering and bounded by a `Semaphore` sized to
//! the effective concurrency.

use std::sync::Arc;

use tokio::sync::{RwLock, Semaphore};
use tokio::time::{sleep, Duration};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::domain::errors::{SchedulerError, TransitionError};
use crate::domain::models::{ExecutionContext, FailurePolicy, Story, StoryDag, Wave, WaveOutcome, WaveSchedulerConfig, WaveState};
use crate::domain::ports::{AgentAdmissionController, AgentRunner, ErrorClass};
use crate::services::checkpoint_store::CheckpointStore;
use crate::services::contract_engine::{standard_conditions, ContractEngine};
use crate::services::execution_state_machine::{ExecutionHandlers, ExecutionStateMachine, Handler};

pub struct WaveScheduler {
    config: WaveSchedulerConfig,
    state_machine: Arc<ExecutionStateMachine>,
    runner: Arc<dyn AgentRunner>,
    admission: Arc<dyn AgentAdmissionController>,
    checkpoints: Arc<CheckpointStore>,
}

impl WaveScheduler {
    pub fn new(
        config: WaveSchedulerConfig,
        state_machine: Arc<ExecutionStateMachine>,
        runner: Arc<dyn AgentRunner>,
        admission: Arc<dyn AgentAdmissionController>,
        checkpoints: Arc<CheckpointStore>,
    ) -> Self {
        Self { config, state_machine, runner, admission, checkpoints }
    }

    /// Runs `wave` to a terminal outcome, resuming from `resume_state` if
    /// supplied: stories already in `completed_task_ids` are skipped,
    /// stories in `failed_task_ids` are retried only when `retry_failed` is set.
    pub async fn run_wave(
        &self,
        wave: &Wave,
        resume_state: Option<WaveState>,
        retry_failed: bool,
        cancel: CancellationToken,
    ) -> Result<(WaveState, WaveOutcome), SchedulerError> {
        let dag = StoryDag::from_stories(&wave.stories);
        let batches = dag.dispatch_batches().map_err(|_| SchedulerError::CircularDependency)?;

        let state = Arc::new(RwLock::new(resume_state.unwrap_or_else(|| WaveState::new(wave.number))));
        let k = wave.effective_concurrency(self.config.global_agent_budget);
        let semaphore = Arc::new(Semaphore::new(k as usize));

        let stories_by_id: std::collections::HashMap<&str, &Story> =
            wave.stories.iter().map(|s| (s.id.as_str(), s)).collect();

        for batch in batches {
            let mut handles = Vec::new();
            for story_id in batch {
                let already_done = {
                    let s = state.read().await;
                    let completed = s.completed_task_ids.contains(&story_id);
                    let failed = s.failed_task_ids.contains(&story_id) && !retry_failed;
                    completed || failed
                };
                if already_done {
                    continue;
                }
                let Some(story) = stories_by_id.get(story_id.as_str()).copied() else { continue };

                self.wait_for_admission(&cancel).await;
                if cancel.is_cancelled() {
                    break;
                }

                let permit = Arc::clone(&semaphore).acquire_owned().await.expect("semaphore not closed");
                let story = story.clone();
                let state = Arc::clone(&state);
                let sm = Arc::clone(&self.state_machine);
                let runner = Arc::clone(&self.runner);
                let checkpoints = Arc::clone(&self.checkpoints);
                let cancel = cancel.clone();
                let wave_number = wave.number;

                handles.push(tokio::spawn(async move {
                    let _permit = permit;
                    let outcome = run_story(&sm, &runner, &story, cancel).await;
                    let mut s = state.write().await;
                    match outcome {
                        Ok(()) => s.mark_completed(story.id.clone()),
                        Err(e) => {
                            warn!(story_id = %story.id, error = %e, "story failed");
                            s.mark_failed(story.id.clone());
                        }
                    }
                    let snapshot = s.clone();
                    drop(s);
                    if let Err(e) = checkpoints.save(&format!("wave-{wave_number}"), &snapshot).await {
                        warn!(error = %e, "failed to persist wave checkpoint");
                    }
                }));
            }

            for handle in handles {
                let _ = handle.await;
            }
            if cancel.is_cancelled() {
                break;
            }
        }

        let final_state = state.read().await.clone();
        let outcome = if final_state.failed_task_ids.is_empty() {
            WaveOutcome::Completed
        } else if self.config.failure_policy == FailurePolicy::Continue {
            WaveOutcome::Partial
        } else {
            WaveOutcome::Failed
        };

        info!(wave = wave.number, ?outcome, "wave terminated");
        Ok((final_state, outcome))
    }

    async fn wait_for_admission(&self, cancel: &CancellationToken) {
        loop {
            let metrics = self.admission.metrics().await;
            if metrics.can_spawn_agent || cancel.is_cancelled() {
                return;
            }
            sleep(Duration::from_millis(self.config.admission_poll_interval_ms)).await;
        }
    }
}

async fn run_story(
    sm: &ExecutionStateMachine,
    runner: &Arc<dyn AgentRunner>,
    story: &Story,
    cancel: CancellationToken,
) -> Result<(), TransitionError> {
    let ctx = ExecutionContext::new(story.wave_id.clone(), story.id.clone())
        .with_input("title", serde_json::json!(story.title))
        .with_input("description", serde_json::json!(story.description));

    let runner_for_exec = Arc::clone(runner);
    let model = story.model.clone();
    let prompt_task = story.description.clone();

    let on_executing: Handler = Box::new(move |mut ctx| {
        let runner = Arc::clone(&runner_for_exec);
        let model = model.clone();
        let prompt = prompt_task.clone();
        Box::pin(async move {
            match runner.run(&prompt, &model).await {
                Ok(output) => {
                    let mut outputs = std::collections::HashMap::new();
                    outputs.insert("output".to_string(), serde_json::json!(output.output));
                    ctx.outputs = Some(outputs);
                    (ctx, Ok(()))
                }
                Err(e) if e.class == ErrorClass::Transient => {
                    (ctx, Err(TransitionError::HandlerFault(e.message)))
                }
                Err(e) => (ctx, Err(TransitionError::HandlerFault(e.message))),
            }
        })
    });

    let on_verifying: Handler = Box::new(|mut ctx| {
        let condition = standard_conditions::has_output();
        let passed = ContractEngine::evaluate(
            &{
                let mut contract = crate::domain::models::Contract::new("verify", "has-output", "story");
                contract.postconditions.push(condition);
                contract
            },
            &ctx,
        )
        .success;
        if !passed {
            ctx.error = Some("postcondition failed: missing output".to_string());
        }
        Box::pin(async move { (ctx, Ok(())) })
    });

    let handlers = ExecutionHandlers {
        on_planning: Box::new(|ctx| Box::pin(async move { (ctx, Ok(())) })),
        on_executing,
        on_verifying,
        on_committing: Box::new(|ctx| Box::pin(async move { (ctx, Ok(())) })),
        on_state_change: None,
        on_error: None,
    };

    let result = sm.execute(ctx, handlers, cancel).await?;
    if result.success {
        Ok(())
    } else {
        Err(TransitionError::HandlerFault(result.error.unwrap_or_else(|| "story failed".to_string())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{CheckpointStoreConfig, ExecutionStateMachineConfig, Parallelization};
    use crate::domain::ports::{AlwaysAdmit, RunOutput, RunUsage};
    use async_trait::async_trait;

    struct EchoRunner;

    #[async_trait]
    impl AgentRunner for EchoRunner {
        async fn run(&self, prompt: &str, _model: &str) -> Result<RunOutput, crate::domain::ports::RunError> {
            Ok(RunOutput { output: prompt.to_string(), metadata: Default::default(), usage: RunUsage::default() })
        }
    }

    fn wave() -> Wave {
        let mut wave = Wave::new("w1", 1, "phase-1");
        wave.parallelization = Parallelization::Full;
        wave.max_concurrent = 4;
        wave.stories = vec![
            Story::new("s1", "w1", "first"),
            Story::new("s2", "w1", "second").with_dependencies(vec!["s1".into()]),
        ];
        wave
    }

    #[tokio::test]
    async fn wave_with_no_failures_completes() {
        let dir = tempfile::tempdir().unwrap();
        let checkpoints = Arc::new(CheckpointStore::new(CheckpointStoreConfig {
            checkpoints_dir: dir.path().to_string_lossy().to_string(),
            retention_days: 7,
            max_bytes: 1024 * 1024,
        }));
        let scheduler = WaveScheduler::new(
            WaveSchedulerConfig::default(),
            Arc::new(ExecutionStateMachine::new(ExecutionStateMachineConfig::default())),
            Arc::new(EchoRunner),
            Arc::new(AlwaysAdmit),
            checkpoints,
        );
        let (state, outcome) = scheduler.run_wave(&wave(), None, false, CancellationToken::new()).await.unwrap();
        assert_eq!(outcome, WaveOutcome::Completed);
        assert_eq!(state.completed_task_ids.len(), 2);
    }

    #[tokio::test]
    async fn resume_skips_already_completed_stories() {
        let dir = tempfile::tempdir().unwrap();
        let checkpoints = Arc::new(CheckpointStore::new(CheckpointStoreConfig {
            checkpoints_dir: dir.path().to_string_lossy().to_string(),
            retention_days: 7,
            max_bytes: 1024 * 1024,
        }));
        let scheduler = WaveScheduler::new(
            WaveSchedulerConfig::default(),
            Arc::new(ExecutionStateMachine::new(ExecutionStateMachineConfig::default())),
            Arc::new(EchoRunner),
            Arc::new(AlwaysAdmit),
            checkpoints,
        );
        let mut resume = WaveState::new(1);
        resume.mark_completed("s1");
        let (state, outcome) =
            scheduler.run_wave(&wave(), Some(resume), false, CancellationToken::new()).await.unwrap();
        assert_eq!(outcome, WaveOutcome::Completed);
        assert!(state.completed_task_ids.contains("s1"));
        assert!(state.completed_task_ids.contains("s2"));
    }
}
