//! Execution state machine types for one Story's run through the orchestrator core.
//!
//! `ExecState` and its transition table are deliberately data, not a
//! payload-carrying enum: every Story drives the same fixed state graph,
//! so the only thing that varies run to run is the `ExecutionContext`
//! riding alongside it.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One state in a Story's execution lifecycle. `Completed` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecState {
    Idle,
    Planning,
    Executing,
    Verifying,
    Committing,
    Completed,
    Failed,
}

impl ExecState {
    /// Whether this state has no outgoing transitions.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// The transitions legal from this state, excluding the always-available
    /// fail-from-any-state escape hatch (see [`is_valid_transition`]).
    pub const fn legal_next(self) -> &'static [Self] {
        match self {
            Self::Idle => &[Self::Planning],
            Self::Planning => &[Self::Executing],
            Self::Executing => &[Self::Verifying],
            Self::Verifying => &[Self::Committing, Self::Executing],
            Self::Committing => &[Self::Completed],
            Self::Completed | Self::Failed => &[],
        }
    }
}

impl std::fmt::Display for ExecState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Planning => "planning",
            Self::Executing => "executing",
            Self::Verifying => "verifying",
            Self::Committing => "committing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Whether `from -> to` is a legal transition. `allow_fail_from_any` models
/// `ExecutionStateMachineConfig::allow_fail_from_any` (default true): every
/// non-terminal state may transition directly to `Failed`.
pub fn is_valid_transition(from: ExecState, to: ExecState, allow_fail_from_any: bool) -> bool {
    if from.legal_next().contains(&to) {
        return true;
    }
    allow_fail_from_any && !from.is_terminal() && to == ExecState::Failed
}

/// A single recorded state change, kept in `ExecutionResult::history`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub transition_id: String,
    pub from_state: ExecState,
    pub to_state: ExecState,
    pub success: bool,
    pub duration_ms: u64,
    pub timestamp: DateTime<Utc>,
    pub error: Option<String>,
    pub retry_attempt: Option<u32>,
}

/// The moving state of one Story's execution: input to every handler and condition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionContext {
    pub scope_id: String,
    pub task_id: String,
    pub inputs: HashMap<String, Value>,
    pub outputs: Option<HashMap<String, Value>>,
    pub state: ExecState,
    pub artifacts: HashMap<String, Value>,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

impl ExecutionContext {
    pub fn new(scope_id: impl Into<String>, task_id: impl Into<String>) -> Self {
        Self {
            scope_id: scope_id.into(),
            task_id: task_id.into(),
            inputs: HashMap::new(),
            outputs: None,
            state: ExecState::Idle,
            artifacts: HashMap::new(),
            start_time: Utc::now(),
            end_time: None,
            error: None,
        }
    }

    pub fn with_input(mut self, key: impl Into<String>, value: Value) -> Self {
        self.inputs.insert(key.into(), value);
        self
    }
}

/// Outcome of running the `ExecutionStateMachine` over one `ExecutionContext`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub final_state: ExecState,
    pub success: bool,
    pub context: ExecutionContext,
    pub history: Vec<HistoryEntry>,
    pub total_duration_ms: u64,
    pub retry_count: u32,
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_can_only_plan_or_fail() {
        assert!(is_valid_transition(ExecState::Idle, ExecState::Planning, true));
        assert!(is_valid_transition(ExecState::Idle, ExecState::Failed, true));
        assert!(!is_valid_transition(ExecState::Idle, ExecState::Executing, true));
    }

    #[test]
    fn verifying_allows_retry_loop() {
        assert!(is_valid_transition(ExecState::Verifying, ExecState::Executing, true));
        assert!(is_valid_transition(ExecState::Verifying, ExecState::Committing, true));
    }

    #[test]
    fn terminal_states_accept_nothing_even_with_fail_from_any() {
        assert!(!is_valid_transition(ExecState::Completed, ExecState::Failed, true));
        assert!(!is_valid_transition(ExecState::Failed, ExecState::Idle, true));
    }

    #[test]
    fn fail_from_any_can_be_disabled() {
        assert!(!is_valid_transition(ExecState::Executing, ExecState::Failed, false));
        assert!(is_valid_transition(ExecState::Executing, ExecState::Verifying, false));
    }

    #[test]
    fn exec_state_serde_is_snake_case() {
        assert_eq!(serde_json::to_string(&ExecState::Committing).unwrap(), "\"committing\"");
    }

    #[test]
    fn context_roundtrips_through_json() {
        let ctx = ExecutionContext::new("sess-1", "story-1").with_input("x", serde_json::json!(1));
        let json = serde_json::to_string(&ctx).unwrap();
        let back: ExecutionContext = serde_json::from_str(&json).unwrap();
        assert_eq!(back.task_id, "story-1");
        assert_eq!(back.inputs.get("x"), Some(&serde_json::json!(1)));
    }
}
