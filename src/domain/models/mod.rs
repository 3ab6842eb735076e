//! Domain models
//!
//! Pure domain entities with business logic and validation rules.
//! These models are framework-agnostic and contain no infrastructure concerns.

pub mod checkpoint;
pub mod config;
pub mod contract;
pub mod exec_state;
pub mod failure_record;
pub mod property;
pub mod session;
pub mod story_dag;
pub mod wave;

pub use checkpoint::{
    checksum_of, is_valid_checkpoint_name, Checkpoint, CheckpointStoreConfig, MemoryAccounting,
    MemoryAccountingError,
};
pub use config::{
    AuditLogConfig, Config, ExecutionStateMachineConfig, FailurePolicy, LoggingConfig,
    PromptValidatorConfig, PropertyTesterConfig, WaveSchedulerConfig,
};
pub use contract::{Condition, ConditionResult, ConditionType, Contract, ContractResult, Severity};
pub use exec_state::{
    is_valid_transition, ExecState, ExecutionContext, ExecutionResult, HistoryEntry,
};
pub use failure_record::{FailureContext, FailureIndexConfig, FailureRecord, Match, Resolution};
pub use property::{
    BoundedInt, BoundedString, ExecutionContextGen, ExecutionStateGen, Generator, Lcg,
};
pub use session::{Session, SessionStatus};
pub use story_dag::{StoryDag, StoryDagError};
pub use wave::{Parallelization, Story, Wave, WaveOutcome, WaveState};
