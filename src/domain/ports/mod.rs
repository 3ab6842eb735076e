//! External collaborators the orchestrator core consumes (§6). These are
//! the only seams where host-specific behavior plugs in; the core itself
//! depends only on these trait objects.

pub mod agent_admission_controller;
pub mod agent_runner;
pub mod embedding_backend;

pub use agent_admission_controller::{AdmissionMetrics, AgentAdmissionController, AlwaysAdmit};
pub use agent_runner::{AgentRunner, ErrorClass, RunError, RunOutput, RunUsage, StreamDelta};
pub use embedding_backend::EmbeddingBackend;
