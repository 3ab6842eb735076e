//! Domain layer: pure entities, the port traits external collaborators
//! implement, and the typed error taxonomy every component returns.

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{
    AuditLogError, CheckpointError, FailureIndexError, InjectionSeverity, PromptValidationError,
    SchedulerError, TransitionError,
};
