//! `wavework audit ...` command handlers.

use anyhow::{anyhow, Result};
use serde::Serialize;
use serde_json::Value;

use crate::cli::output::{output, CommandOutput};
use crate::domain::models::Config;
use crate::services::audit_log::{AuditFilter, AuditLogService, AuditOutcome};

#[derive(Serialize)]
struct AuditEventView {
    timestamp: String,
    event_type: String,
    user_id: String,
    action: String,
    resource: String,
    outcome: String,
}

#[derive(Serialize)]
struct AuditEventList(Vec<AuditEventView>);

impl CommandOutput for AuditEventList {
    fn to_human(&self) -> String {
        if self.0.is_empty() {
            return "no matching audit events".to_string();
        }
        self.0
            .iter()
            .map(|e| format!("{} {} {} {} {} -> {}", e.timestamp, e.event_type, e.user_id, e.action, e.resource, e.outcome))
            .collect::<Vec<_>>()
            .join("\n")
    }
    fn to_json(&self) -> Value {
        serde_json::to_value(&self.0).unwrap_or(Value::Null)
    }
}

fn parse_outcome(s: &str) -> Result<AuditOutcome> {
    match s {
        "success" => Ok(AuditOutcome::Success),
        "failure" => Ok(AuditOutcome::Failure),
        "partial_success" => Ok(AuditOutcome::PartialSuccess),
        other => Err(anyhow!("unknown outcome filter: {other}")),
    }
}

pub async fn query(user_id: Option<String>, outcome: Option<String>, limit: Option<usize>, config: &Config, json: bool) -> Result<()> {
    let audit_log = AuditLogService::new(".wavework/audit", config.audit_log.clone()).await?;
    let filter = AuditFilter {
        event_type: None,
        user_id,
        outcome: outcome.map(|s| parse_outcome(&s)).transpose()?,
        start_time: None,
        end_time: None,
        limit,
    };
    let events = audit_log.query(&filter).await?;
    let views = events
        .into_iter()
        .map(|e| AuditEventView {
            timestamp: e.timestamp.to_rfc3339(),
            event_type: format!("{:?}", e.event_type),
            user_id: e.user_id,
            action: e.action,
            resource: e.resource,
            outcome: format!("{:?}", e.outcome),
        })
        .collect();
    output(&AuditEventList(views), json);
    Ok(())
}
