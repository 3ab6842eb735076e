//! Wave and Story: the unit of plan structure and the unit of scheduling.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How a Wave's stories may run relative to each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Parallelization {
    Sequential,
    Partial,
    Full,
}

/// The smallest schedulable unit: drives one run of the ExecutionStateMachine.
/// Immutable once planning has produced it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Story {
    pub id: String,
    pub wave_id: String,
    pub title: String,
    pub description: String,
    pub agent_type: String,
    pub model: String,
    pub estimated_minutes: u32,
    pub dependencies: Vec<String>,
    pub parallel_group: u32,
    pub acceptance_criteria: Vec<String>,
    pub files_in_scope: Vec<String>,
    pub test_requirements: String,
}

impl Story {
    pub fn new(id: impl Into<String>, wave_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            wave_id: wave_id.into(),
            title: title.into(),
            description: String::new(),
            agent_type: String::new(),
            model: String::new(),
            estimated_minutes: 0,
            dependencies: Vec::new(),
            parallel_group: 0,
            acceptance_criteria: Vec::new(),
            files_in_scope: Vec::new(),
            test_requirements: String::new(),
        }
    }

    pub fn with_dependencies(mut self, deps: Vec<String>) -> Self {
        self.dependencies = deps;
        self
    }

    pub fn with_parallel_group(mut self, group: u32) -> Self {
        self.parallel_group = group;
        self
    }

    pub fn is_ready(&self, completed: &HashSet<String>) -> bool {
        self.dependencies.iter().all(|d| completed.contains(d))
    }
}

/// A planned batch of Stories. Immutable after plan creation; its runtime
/// twin is [`WaveState`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Wave {
    pub id: String,
    pub number: u32,
    pub phase: String,
    pub name: String,
    pub dependencies: HashSet<String>,
    pub parallelization: Parallelization,
    pub max_concurrent: u32,
    pub stories: Vec<Story>,
}

impl Wave {
    pub fn new(id: impl Into<String>, number: u32, name: impl Into<String>) -> Self {
        assert!(number >= 1, "wave numbers are 1-based");
        Self {
            id: id.into(),
            number,
            phase: String::new(),
            name: name.into(),
            dependencies: HashSet::new(),
            parallelization: Parallelization::Partial,
            max_concurrent: 1,
            stories: Vec::new(),
        }
    }

    pub fn effective_concurrency(&self, global_agent_budget: u32) -> u32 {
        if self.parallelization == Parallelization::Sequential {
            1
        } else {
            self.max_concurrent.min(global_agent_budget).max(1)
        }
    }
}

/// Mutable runtime progress of one Wave, persisted after each story terminates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaveState {
    pub wave_number: u32,
    pub completed_task_ids: HashSet<String>,
    pub failed_task_ids: HashSet<String>,
    pub timestamp: DateTime<Utc>,
}

impl WaveState {
    pub fn new(wave_number: u32) -> Self {
        Self {
            wave_number,
            completed_task_ids: HashSet::new(),
            failed_task_ids: HashSet::new(),
            timestamp: Utc::now(),
        }
    }

    pub fn mark_completed(&mut self, story_id: impl Into<String>) {
        self.completed_task_ids.insert(story_id.into());
        self.timestamp = Utc::now();
    }

    pub fn mark_failed(&mut self, story_id: impl Into<String>) {
        self.failed_task_ids.insert(story_id.into());
        self.timestamp = Utc::now();
    }

    pub fn terminated_count(&self) -> usize {
        self.completed_task_ids.len() + self.failed_task_ids.len()
    }
}

/// Outcome of running a Wave to completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaveOutcome {
    Completed,
    Partial,
    Failed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn story_ready_when_all_deps_completed() {
        let story = Story::new("s2", "w1", "second").with_dependencies(vec!["s1".into()]);
        let mut completed = HashSet::new();
        assert!(!story.is_ready(&completed));
        completed.insert("s1".to_string());
        assert!(story.is_ready(&completed));
    }

    #[test]
    fn sequential_wave_forces_concurrency_one() {
        let mut wave = Wave::new("w1", 1, "phase-1");
        wave.parallelization = Parallelization::Sequential;
        wave.max_concurrent = 8;
        assert_eq!(wave.effective_concurrency(4), 1);
    }

    #[test]
    fn effective_concurrency_is_bounded_by_global_budget() {
        let mut wave = Wave::new("w1", 1, "phase-1");
        wave.max_concurrent = 8;
        assert_eq!(wave.effective_concurrency(2), 2);
    }

    #[test]
    fn wave_state_tracks_terminal_stories() {
        let mut ws = WaveState::new(1);
        ws.mark_completed("a");
        ws.mark_failed("b");
        assert_eq!(ws.terminated_count(), 2);
    }
}
