//! `wavework session ...` command handlers.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::Value;

use crate::cli::output::{output, CommandOutput};
use crate::domain::models::{Config, Session, SessionStatus};
use crate::infrastructure::runner::EchoAgentRunner;
use crate::services::audit_log::AuditLogService;
use crate::services::checkpoint_store::CheckpointStore;
use crate::services::execution_state_machine::ExecutionStateMachine;
use crate::services::session_coordinator::{Plan, SessionCoordinator};
use crate::services::wave_scheduler::WaveScheduler;

#[derive(Serialize)]
struct SessionView {
    id: String,
    title: String,
    status: String,
    project_path: String,
}

impl From<&Session> for SessionView {
    fn from(s: &Session) -> Self {
        Self { id: s.id.clone(), title: s.title.clone(), status: format!("{:?}", s.status).to_lowercase(), project_path: s.project_path.clone() }
    }
}

impl CommandOutput for SessionView {
    fn to_human(&self) -> String {
        format!("session {} [{}] {} ({})", self.id, self.status, self.title, self.project_path)
    }
    fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

#[derive(Serialize)]
struct SessionList(Vec<SessionView>);

impl CommandOutput for SessionList {
    fn to_human(&self) -> String {
        if self.0.is_empty() {
            return "no sessions found".to_string();
        }
        self.0.iter().map(SessionView::to_human).collect::<Vec<_>>().join("\n")
    }
    fn to_json(&self) -> Value {
        serde_json::to_value(&self.0).unwrap_or(Value::Null)
    }
}

async fn build_coordinator(
    config: &Config,
    session: Session,
) -> Result<(SessionCoordinator, Arc<CheckpointStore>, Arc<AuditLogService>)> {
    let checkpoints = Arc::new(CheckpointStore::new(config.checkpoint_store.clone()));
    let audit_log = Arc::new(AuditLogService::new(".wavework/audit", config.audit_log.clone()).await?);
    let scheduler = Arc::new(WaveScheduler::new(
        config.wave_scheduler.clone(),
        Arc::new(ExecutionStateMachine::new(config.execution_state_machine.clone())),
        Arc::new(EchoAgentRunner),
        Arc::new(crate::domain::ports::AlwaysAdmit),
        Arc::clone(&checkpoints),
    ));
    let (coordinator, _rx) = SessionCoordinator::new(scheduler, Arc::clone(&checkpoints), Arc::clone(&audit_log), session);
    Ok((coordinator, checkpoints, audit_log))
}

fn load_plan(path: &Path) -> Result<Plan> {
    let bytes = std::fs::read(path).with_context(|| format!("reading plan file {}", path.display()))?;
    serde_json::from_slice(&bytes).with_context(|| format!("parsing plan file {}", path.display()))
}

pub async fn create(title: String, plan_path: &Path, project_path: String, config: &Config, json: bool) -> Result<()> {
    let plan = load_plan(plan_path)?;
    let session = Session::new(title, project_path);
    let session_id = session.id.clone();
    let (coordinator, checkpoints, _audit) = build_coordinator(config, session).await?;

    checkpoints.save_session(&session_id, &coordinator.session_snapshot().await).await?;
    coordinator.run(&session_id, &plan).await?;
    checkpoints.save_session(&session_id, &coordinator.session_snapshot().await).await?;

    output(&SessionView::from(&coordinator.session_snapshot().await), json);
    Ok(())
}

pub async fn resume(id: String, plan_path: &Path, config: &Config, json: bool) -> Result<()> {
    let plan = load_plan(plan_path)?;
    let checkpoints = Arc::new(CheckpointStore::new(config.checkpoint_store.clone()));
    let session = checkpoints.load_session::<Session>(&id).await.with_context(|| format!("no session {id}"))?.state;
    let (coordinator, checkpoints, _audit) = build_coordinator(config, session).await?;

    coordinator.run(&id, &plan).await?;
    checkpoints.save_session(&id, &coordinator.session_snapshot().await).await?;

    output(&SessionView::from(&coordinator.session_snapshot().await), json);
    Ok(())
}

pub async fn pause(id: String, config: &Config, json: bool) -> Result<()> {
    let checkpoints = CheckpointStore::new(config.checkpoint_store.clone());
    let mut session = checkpoints.load_session::<Session>(&id).await.with_context(|| format!("no session {id}"))?.state;
    session.set_status(SessionStatus::Paused);
    checkpoints.save_session(&id, &session).await?;
    output(&SessionView::from(&session), json);
    Ok(())
}

pub async fn cancel(id: String, config: &Config, json: bool) -> Result<()> {
    let checkpoints = CheckpointStore::new(config.checkpoint_store.clone());
    let mut session = checkpoints.load_session::<Session>(&id).await.with_context(|| format!("no session {id}"))?.state;
    session.set_status(SessionStatus::Failed);
    checkpoints.save_session(&id, &session).await?;
    output(&SessionView::from(&session), json);
    Ok(())
}

pub async fn list(status: Option<String>, config: &Config, json: bool) -> Result<()> {
    let checkpoints = CheckpointStore::new(config.checkpoint_store.clone());
    let names = checkpoints.list_sessions(status.as_deref()).await?;
    let mut views = Vec::with_capacity(names.len());
    for name in names {
        if let Ok(checkpoint) = checkpoints.load_session::<Session>(&name).await {
            views.push(SessionView::from(&checkpoint.state));
        }
    }
    output(&SessionList(views), json);
    Ok(())
}

#[derive(Serialize)]
struct LoopHistoryView {
    loop_id: String,
    current_iteration: u32,
    iterations: usize,
}

impl CommandOutput for LoopHistoryView {
    fn to_human(&self) -> String {
        format!("loop {} at iteration {} ({} recorded)", self.loop_id, self.current_iteration, self.iterations)
    }
    fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

pub async fn history(id: String, config: &Config, json: bool) -> Result<()> {
    let checkpoints = CheckpointStore::new(config.checkpoint_store.clone());
    let checkpoint = checkpoints
        .load_loop::<crate::services::session_coordinator::RepeatUntilLoop>(&id)
        .await
        .with_context(|| format!("no loop history for {id}"))?;
    let view = LoopHistoryView {
        loop_id: checkpoint.state.loop_id,
        current_iteration: checkpoint.state.current_iteration,
        iterations: checkpoint.state.iterations.len(),
    };
    output(&view, json);
    Ok(())
}
