//! FailureRecord and Resolution: a past failure vectorized for retrieval,
//! optionally resolved, for the FailureIndex + ResolutionMatcher (C6).

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Raw context describing a failure, before vectorization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureContext {
    pub message: String,
    #[serde(rename = "type")]
    pub error_type: String,
    pub stack_trace: Option<String>,
    pub metadata: Option<HashMap<String, Value>>,
}

impl FailureContext {
    pub fn new(message: impl Into<String>, error_type: impl Into<String>) -> Self {
        Self { message: message.into(), error_type: error_type.into(), stack_trace: None, metadata: None }
    }
}

/// A description of an action that successfully remedied a prior failure,
/// plus feedback statistics used to compute `wilsonLowerBound`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resolution {
    pub id: String,
    pub description: String,
    pub action: String,
    pub successful: bool,
    pub notes: Option<String>,
    #[serde(default)]
    pub helpful_votes: u32,
    #[serde(default)]
    pub total_votes: u32,
}

impl Resolution {
    pub fn new(id: impl Into<String>, description: impl Into<String>, action: impl Into<String>, successful: bool) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            action: action.into(),
            successful,
            notes: None,
            helpful_votes: 0,
            total_votes: 0,
        }
    }

    pub fn record_vote(&mut self, helpful: bool) {
        self.total_votes += 1;
        if helpful {
            self.helpful_votes += 1;
        }
    }
}

/// A past failure vectorized for retrieval. Mutated only via `addResolution`
/// (single assignment: once a resolution is attached it does not change).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureRecord {
    pub id: String,
    pub context: FailureContext,
    pub embedding: Vec<f32>,
    pub resolution: Option<Resolution>,
    pub timestamp: DateTime<Utc>,
    pub session_id: Option<String>,
    pub tags: Vec<String>,
}

impl FailureRecord {
    pub fn new(id: impl Into<String>, context: FailureContext, embedding: Vec<f32>) -> Self {
        Self {
            id: id.into(),
            context,
            embedding,
            resolution: None,
            timestamp: Utc::now(),
            session_id: None,
            tags: Vec::new(),
        }
    }

    /// Single-assignment: returns false if a resolution is already attached.
    pub fn add_resolution(&mut self, resolution: Resolution) -> bool {
        if self.resolution.is_some() {
            return false;
        }
        self.resolution = Some(resolution);
        true
    }
}

/// A retrieval hit: a past record matched against a new failure.
#[derive(Debug, Clone)]
pub struct Match {
    pub record: FailureRecord,
    pub resolution: Resolution,
    pub similarity: f32,
    pub confidence: f64,
}

/// Configuration for the FailureIndex, per §6 defaults.
#[derive(Debug, Clone)]
pub struct FailureIndexConfig {
    pub max_records: usize,
    pub similarity_threshold: f32,
    pub vector_dim: usize,
}

impl Default for FailureIndexConfig {
    fn default() -> Self {
        Self { max_records: 10_000, similarity_threshold: 0.5, vector_dim: 128 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_resolution_is_single_assignment() {
        let mut record = FailureRecord::new("f1", FailureContext::new("boom", "TypeError"), vec![0.0; 4]);
        assert!(record.add_resolution(Resolution::new("r1", "retry", "retry", true)));
        assert!(!record.add_resolution(Resolution::new("r2", "retry again", "retry", true)));
        assert_eq!(record.resolution.unwrap().id, "r1");
    }
}
