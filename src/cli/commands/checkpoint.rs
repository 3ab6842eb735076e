//! `wavework checkpoint ...` command handlers.

use anyhow::Result;
use serde::Serialize;
use serde_json::Value;

use crate::cli::output::{output, CommandOutput};
use crate::domain::models::Config;
use crate::services::checkpoint_store::CheckpointStore;

#[derive(Serialize)]
struct NameList(Vec<String>);

impl CommandOutput for NameList {
    fn to_human(&self) -> String {
        if self.0.is_empty() {
            "no checkpoints found".to_string()
        } else {
            self.0.join("\n")
        }
    }
    fn to_json(&self) -> Value {
        serde_json::to_value(&self.0).unwrap_or(Value::Null)
    }
}

#[derive(Serialize)]
struct CompactionReport {
    removed: usize,
}

impl CommandOutput for CompactionReport {
    fn to_human(&self) -> String {
        format!("removed {} checkpoints beyond retention", self.removed)
    }
    fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

pub async fn list(config: &Config, json: bool) -> Result<()> {
    let checkpoints = CheckpointStore::new(config.checkpoint_store.clone());
    let names = checkpoints.list().await?;
    output(&NameList(names), json);
    Ok(())
}

pub async fn compact(config: &Config, json: bool) -> Result<()> {
    let checkpoints = CheckpointStore::new(config.checkpoint_store.clone());
    let removed = checkpoints.compact().await?;
    output(&CompactionReport { removed }, json);
    Ok(())
}
