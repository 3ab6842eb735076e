//! AuditLog (C8): a durable, append-only security-event log with fast
//! in-memory queries and numbered file rotation. Every event is one JSON
//! line; rotation shifts `audit.log -> audit.log.1 -> ... -> audit.log.N-1`
//! and drops whatever falls off the end.

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::sync::Mutex;

use crate::domain::errors::AuditLogError;
use crate::domain::models::AuditLogConfig;

/// Broad classification of what happened, independent of the richer
/// `action` label callers may attach to the same record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    TaskCreated,
    TaskCancelled,
    AgentSpawned,
    AgentFailed,
    ConfigChanged,
    ApiKeyAccessed,
    StateTransition,
    WaveDispatched,
    Decision,
    SecurityEvent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditOutcome {
    Success,
    Failure,
    PartialSuccess,
}

/// One durable audit record: the unit written to, and read back from, the log files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub timestamp: DateTime<Utc>,
    pub event_type: AuditEventType,
    pub user_id: String,
    pub action: String,
    pub resource: String,
    pub outcome: AuditOutcome,
    pub metadata: Option<HashMap<String, Value>>,
}

/// A query filter over the log, per §4.8.
#[derive(Debug, Clone, Default)]
pub struct AuditFilter {
    pub event_type: Option<AuditEventType>,
    pub user_id: Option<String>,
    pub outcome: Option<AuditOutcome>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
}

impl AuditFilter {
    fn matches(&self, event: &AuditEvent) -> bool {
        if let Some(t) = self.event_type {
            if t != event.event_type {
                return false;
            }
        }
        if let Some(uid) = &self.user_id {
            if uid != &event.user_id {
                return false;
            }
        }
        if let Some(outcome) = self.outcome {
            if outcome != event.outcome {
                return false;
            }
        }
        if let Some(start) = self.start_time {
            if event.timestamp < start {
                return false;
            }
        }
        if let Some(end) = self.end_time {
            if event.timestamp > end {
                return false;
            }
        }
        true
    }
}

struct WriterState {
    file: File,
    current_size: u64,
}

/// File-backed append-only audit log with numbered rotation and an
/// in-memory cache of the most recent entries for fast queries.
pub struct AuditLogService {
    config: AuditLogConfig,
    dir: PathBuf,
    current_path: PathBuf,
    writer: Mutex<WriterState>,
    cache: Mutex<VecDeque<AuditEvent>>,
}

impl AuditLogService {
    pub async fn new(dir: impl Into<PathBuf>, config: AuditLogConfig) -> Result<Self, AuditLogError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).await.map_err(|e| AuditLogError::WriteFailed(e.to_string()))?;
        let current_path = dir.join("audit.log");
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&current_path)
            .await
            .map_err(|e| AuditLogError::WriteFailed(e.to_string()))?;
        let current_size = file.metadata().await.map(|m| m.len()).unwrap_or(0);

        let mut cache = VecDeque::with_capacity(config.max_memory_entries);
        if config.enable_memory_store {
            for event in read_tail(&current_path, config.max_memory_entries).await.unwrap_or_default() {
                cache.push_back(event);
            }
        }

        Ok(Self {
            config,
            dir,
            current_path,
            writer: Mutex::new(WriterState { file, current_size }),
            cache: Mutex::new(cache),
        })
    }

    pub async fn log(&self, event: AuditEvent) -> Result<(), AuditLogError> {
        let mut line = serde_json::to_string(&event).map_err(|e| AuditLogError::WriteFailed(e.to_string()))?;
        line.push('\n');

        let mut writer = self.writer.lock().await;
        if writer.current_size + line.len() as u64 >= self.config.max_file_size_bytes {
            self.rotate(&mut writer).await?;
        }
        writer
            .file
            .write_all(line.as_bytes())
            .await
            .map_err(|e| AuditLogError::WriteFailed(e.to_string()))?;
        writer.file.flush().await.map_err(|e| AuditLogError::WriteFailed(e.to_string()))?;
        writer.current_size += line.len() as u64;
        drop(writer);

        if self.config.enable_memory_store {
            let mut cache = self.cache.lock().await;
            if cache.len() >= self.config.max_memory_entries {
                cache.pop_front();
            }
            cache.push_back(event);
        }
        Ok(())
    }

    async fn rotate(&self, writer: &mut WriterState) -> Result<(), AuditLogError> {
        let max_files = self.config.max_files;
        let oldest = self.rotated_path(max_files.saturating_sub(1));
        if fs::try_exists(&oldest).await.unwrap_or(false) {
            fs::remove_file(&oldest).await.map_err(|e| AuditLogError::RotationFailed(e.to_string()))?;
        }
        for n in (1..max_files.saturating_sub(1)).rev() {
            let from = self.rotated_path(n);
            let to = self.rotated_path(n + 1);
            if fs::try_exists(&from).await.unwrap_or(false) {
                fs::rename(&from, &to).await.map_err(|e| AuditLogError::RotationFailed(e.to_string()))?;
            }
        }
        if max_files > 1 {
            fs::rename(&self.current_path, self.rotated_path(1))
                .await
                .map_err(|e| AuditLogError::RotationFailed(e.to_string()))?;
        } else {
            fs::remove_file(&self.current_path).await.map_err(|e| AuditLogError::RotationFailed(e.to_string()))?;
        }

        writer.file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.current_path)
            .await
            .map_err(|e| AuditLogError::RotationFailed(e.to_string()))?;
        writer.current_size = 0;
        Ok(())
    }

    fn rotated_path(&self, n: u32) -> PathBuf {
        self.dir.join(format!("audit.log.{n}"))
    }

    /// Convenience constructor mirroring `log`'s shape without requiring
    /// callers to build an `AuditEvent` by hand.
    pub async fn log_operation(
        &self,
        event_type: AuditEventType,
        user_id: impl Into<String>,
        action: impl Into<String>,
        resource: impl Into<String>,
        outcome: AuditOutcome,
        metadata: Option<HashMap<String, Value>>,
    ) -> Result<(), AuditLogError> {
        self.log(AuditEvent {
            timestamp: Utc::now(),
            event_type,
            user_id: user_id.into(),
            action: action.into(),
            resource: resource.into(),
            outcome,
            metadata,
        })
        .await
    }

    /// Queries the in-memory cache when enabled, otherwise reads every
    /// rotated file oldest-first, skipping unparseable lines.
    pub async fn query(&self, filter: &AuditFilter) -> Result<Vec<AuditEvent>, AuditLogError> {
        let events = if self.config.enable_memory_store {
            self.cache.lock().await.iter().cloned().collect::<Vec<_>>()
        } else {
            self.read_all_files().await?
        };

        let mut matching: Vec<AuditEvent> = events.into_iter().filter(|e| filter.matches(e)).collect();
        if let Some(limit) = filter.limit {
            matching.truncate(limit);
        }
        Ok(matching)
    }

    async fn read_all_files(&self) -> Result<Vec<AuditEvent>, AuditLogError> {
        let mut paths = Vec::new();
        for n in (1..self.config.max_files).rev() {
            let path = self.rotated_path(n);
            if fs::try_exists(&path).await.unwrap_or(false) {
                paths.push(path);
            }
        }
        paths.push(self.current_path.clone());

        let mut events = Vec::new();
        for path in paths {
            events.extend(read_all(&path).await?);
        }
        Ok(events)
    }

    pub fn config(&self) -> &AuditLogConfig {
        &self.config
    }
}

async fn read_all(path: &Path) -> Result<Vec<AuditEvent>, AuditLogError> {
    let Ok(file) = File::open(path).await else { return Ok(Vec::new()) };
    let mut lines = tokio::io::AsyncBufReadExt::lines(BufReader::new(file));
    let mut events = Vec::new();
    while let Some(line) = lines.next_line().await.map_err(|e| AuditLogError::WriteFailed(e.to_string()))? {
        if let Ok(event) = serde_json::from_str::<AuditEvent>(&line) {
            events.push(event);
        }
    }
    Ok(events)
}

async fn read_tail(path: &Path, max: usize) -> Result<Vec<AuditEvent>, AuditLogError> {
    let mut events = read_all(path).await?;
    if events.len() > max {
        events.drain(0..events.len() - max);
    }
    Ok(events)
}

pub type SharedAuditLog = Arc<AuditLogService>;

#[cfg(test)]
mod tests {
    use super::*;

    async fn service(dir: &tempfile::TempDir, max_file_size_bytes: u64, max_files: u32) -> AuditLogService {
        let config = AuditLogConfig { max_file_size_bytes, max_files, enable_memory_store: true, max_memory_entries: 1000 };
        AuditLogService::new(dir.path(), config).await.unwrap()
    }

    fn event(action: &str) -> AuditEvent {
        AuditEvent {
            timestamp: Utc::now(),
            event_type: AuditEventType::TaskCreated,
            user_id: "user-1".into(),
            action: action.into(),
            resource: "task-1".into(),
            outcome: AuditOutcome::Success,
            metadata: None,
        }
    }

    #[tokio::test]
    async fn logged_events_are_queryable() {
        let dir = tempfile::tempdir().unwrap();
        let log = service(&dir, 1024 * 1024, 5).await;
        log.log(event("create")).await.unwrap();
        let results = log.query(&AuditFilter::default()).await.unwrap();
        assert_eq!(results.len(), 1);
    }

    #[tokio::test]
    async fn rotation_shifts_numbered_files() {
        let dir = tempfile::tempdir().unwrap();
        let log = service(&dir, 120, 3).await;
        for i in 0..20 {
            log.log(event(&format!("op-{i}"))).await.unwrap();
        }
        assert!(fs::try_exists(dir.path().join("audit.log")).await.unwrap());
        assert!(fs::try_exists(dir.path().join("audit.log.1")).await.unwrap());
    }

    #[tokio::test]
    async fn special_characters_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let log = service(&dir, 1024 * 1024, 5).await;
        let mut metadata = HashMap::new();
        metadata.insert("note".to_string(), Value::String("quote \" backslash \\ newline \n end".to_string()));
        log.log(AuditEvent {
            timestamp: Utc::now(),
            event_type: AuditEventType::SecurityEvent,
            user_id: "user-1".into(),
            action: "probe".into(),
            resource: "r".into(),
            outcome: AuditOutcome::Failure,
            metadata: Some(metadata),
        })
        .await
        .unwrap();

        let results = log.query(&AuditFilter::default()).await.unwrap();
        let note = results[0].metadata.as_ref().unwrap().get("note").unwrap().as_str().unwrap();
        assert!(note.contains('"'));
        assert!(note.contains('\\'));
        assert!(note.contains('\n'));
    }

    #[tokio::test]
    async fn query_filters_by_outcome_and_user() {
        let dir = tempfile::tempdir().unwrap();
        let log = service(&dir, 1024 * 1024, 5).await;
        log.log(event("a")).await.unwrap();
        log.log(AuditEvent { outcome: AuditOutcome::Failure, ..event("b") }).await.unwrap();

        let filter = AuditFilter { outcome: Some(AuditOutcome::Failure), ..Default::default() };
        let results = log.query(&filter).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].action, "b");
    }

    #[tokio::test]
    async fn disabled_memory_store_reads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let config = AuditLogConfig { max_file_size_bytes: 1024 * 1024, max_files: 5, enable_memory_store: false, max_memory_entries: 10 };
        let log = AuditLogService::new(dir.path(), config).await.unwrap();
        log.log(event("a")).await.unwrap();
        let results = log.query(&AuditFilter::default()).await.unwrap();
        assert_eq!(results.len(), 1);
    }
}
