//! AgentRunner: the pluggable external collaborator that actually executes
//! an agent task, consumed by the ExecutionStateMachine's `onExecuting`
//! handler. Out of scope to implement; only its contract lives here.

use async_trait::async_trait;
use tokio::sync::mpsc;

/// Whether a runner error should drive a retry (`Transient`) or an
/// immediate `Failed` terminal state (`Permanent`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Transient,
    Permanent,
}

#[derive(Debug, Clone)]
pub struct RunError {
    pub class: ErrorClass,
    pub message: String,
}

impl std::fmt::Display for RunError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.class, self.message)
    }
}

impl std::error::Error for RunError {}

#[derive(Debug, Clone, Default)]
pub struct RunUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

#[derive(Debug, Clone)]
pub struct RunOutput {
    pub output: String,
    pub metadata: std::collections::HashMap<String, serde_json::Value>,
    pub usage: RunUsage,
}

/// One chunk of a streaming run.
#[derive(Debug, Clone)]
pub struct StreamDelta {
    pub delta: String,
    pub done: bool,
}

/// The external model/agent invocation boundary. Implementations call out
/// to whatever concrete LLM backend the host wires in; this crate's core
/// depends only on this trait.
#[async_trait]
pub trait AgentRunner: Send + Sync {
    async fn run(&self, prompt: &str, model: &str) -> Result<RunOutput, RunError>;

    /// Optional streaming variant. Default: not supported.
    async fn run_streaming(
        &self,
        prompt: &str,
        model: &str,
    ) -> Result<mpsc::Receiver<StreamDelta>, RunError> {
        let _ = (prompt, model);
        Err(RunError { class: ErrorClass::Permanent, message: "streaming not supported".into() })
    }
}
