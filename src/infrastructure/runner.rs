//! Default `AgentRunner` adapter for standalone CLI use.
//!
//! The real agent backend is a host concern (§6 names it out of scope);
//! this adapter lets the `wavework` binary run end-to-end without one
//! wired in, by echoing the prompt back as the output.

use async_trait::async_trait;

use crate::domain::ports::{AgentRunner, RunError, RunOutput, RunUsage};

pub struct EchoAgentRunner;

#[async_trait]
impl AgentRunner for EchoAgentRunner {
    async fn run(&self, prompt: &str, _model: &str) -> Result<RunOutput, RunError> {
        Ok(RunOutput { output: prompt.to_string(), metadata: std::collections::HashMap::new(), usage: RunUsage::default() })
    }
}
