//! Contract/Condition types for the ContractEngine (C4).
//!
//! Conditions are small records carrying a predicate and metadata — tagged
//! data dispatched by the engine, not a class hierarchy, per the polymorphism
//! guidance this crate already follows for validation rules.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::exec_state::ExecutionContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionType {
    Precondition,
    Postcondition,
    Invariant,
}

/// A named, side-effect-free predicate over an ExecutionContext with a severity.
#[derive(Clone)]
pub struct Condition {
    pub id: String,
    pub name: String,
    pub condition_type: ConditionType,
    pub predicate: Arc<dyn Fn(&ExecutionContext) -> bool + Send + Sync>,
    pub error_message: String,
    pub severity: Severity,
    pub tags: Vec<String>,
}

impl std::fmt::Debug for Condition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Condition")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("condition_type", &self.condition_type)
            .field("severity", &self.severity)
            .finish_non_exhaustive()
    }
}

impl Condition {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        condition_type: ConditionType,
        severity: Severity,
        error_message: impl Into<String>,
        predicate: impl Fn(&ExecutionContext) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            condition_type,
            predicate: Arc::new(predicate),
            error_message: error_message.into(),
            severity,
            tags: Vec::new(),
        }
    }
}

/// A bundle of conditions attached to a task type. Immutable.
#[derive(Clone, Default)]
pub struct Contract {
    pub id: String,
    pub name: String,
    pub task_type: String,
    pub preconditions: Vec<Condition>,
    pub postconditions: Vec<Condition>,
    pub invariants: Vec<Condition>,
}

impl Contract {
    pub fn new(id: impl Into<String>, name: impl Into<String>, task_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            task_type: task_type.into(),
            preconditions: Vec::new(),
            postconditions: Vec::new(),
            invariants: Vec::new(),
        }
    }

    /// All conditions in the fixed evaluation order: pre, post, invariant.
    pub fn all_conditions(&self) -> impl Iterator<Item = &Condition> {
        self.preconditions
            .iter()
            .chain(self.postconditions.iter())
            .chain(self.invariants.iter())
    }
}

/// Result of evaluating one Condition.
#[derive(Debug, Clone)]
pub struct ConditionResult {
    pub condition_id: String,
    pub condition_name: String,
    pub condition_type: ConditionType,
    pub passed: bool,
    pub error_message: Option<String>,
    pub severity: Severity,
    pub evaluated_at: DateTime<Utc>,
    pub evaluation_duration_ms: u64,
}

/// Result of evaluating an entire Contract against a context.
#[derive(Debug, Clone, Default)]
pub struct ContractResult {
    pub success: bool,
    pub failures: Vec<ConditionResult>,
    pub successes: Vec<ConditionResult>,
}
