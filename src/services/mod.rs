//! Application services: the nine components (C1-C9) that implement the
//! orchestration core, each built directly on the domain models and ports.

pub mod audit_log;
pub mod checkpoint_store;
pub mod contract_engine;
pub mod execution_state_machine;
pub mod failure_index;
pub mod property_tester;
pub mod prompt_validator;
pub mod session_coordinator;
pub mod wave_scheduler;

pub use audit_log::{AuditEvent, AuditEventType, AuditFilter as AuditLogFilter, AuditLogService, AuditOutcome, SharedAuditLog};
pub use checkpoint_store::{CheckpointStore, SharedCheckpointStore};
pub use contract_engine::ContractEngine;
pub use execution_state_machine::{ExecutionHandlers, ExecutionStateMachine, Handler};
pub use failure_index::{FailureIndex, FailureStats, MatcherWeights, ResolutionMatcher, Suggestion};
pub use property_tester::{Failure, PropertyTester, TestReport, TestStatistics};
pub use prompt_validator::PromptValidator;
pub use session_coordinator::{ControlEvent, IterationResult, Plan, RepeatUntilLoop, SessionCoordinator, SessionEvent};
pub use wave_scheduler::WaveScheduler;
