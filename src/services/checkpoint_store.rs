//! CheckpointStore (C1): durable, namespaced state persistence with an
//! in-memory capacity accounting sidecar. Every write is atomic
//! (write-temp, fsync, rename) so a crash mid-write never leaves a
//! partially-written checkpoint behind.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use serde::{de::DeserializeOwned, Serialize};
use tokio::fs;
use tokio::sync::RwLock;
use tracing::warn;
use uuid::Uuid;

use crate::domain::errors::CheckpointError;
use crate::domain::models::{
    checksum_of, is_valid_checkpoint_name, Checkpoint, CheckpointStoreConfig, MemoryAccounting,
};

/// File-backed `Checkpoint<T>` storage under namespaced subdirectories.
pub struct CheckpointStore {
    root: PathBuf,
    config: CheckpointStoreConfig,
    allocated_bytes: AtomicU64,
    used_bytes: AtomicU64,
    accounting_lock: RwLock<()>,
}

impl CheckpointStore {
    pub fn new(config: CheckpointStoreConfig) -> Self {
        let root = PathBuf::from(&config.checkpoints_dir);
        Self {
            root,
            config,
            allocated_bytes: AtomicU64::new(0),
            used_bytes: AtomicU64::new(0),
            accounting_lock: RwLock::new(()),
        }
    }

    pub fn memory_accounting(&self) -> MemoryAccounting {
        MemoryAccounting {
            allocated_bytes: self.allocated_bytes.load(Ordering::Relaxed),
            used_bytes: self.used_bytes.load(Ordering::Relaxed),
            max_bytes: self.config.max_bytes,
        }
    }

    fn steps_dir(&self) -> PathBuf {
        self.root.join("steps")
    }

    fn sessions_dir(&self) -> PathBuf {
        self.root.join("sessions")
    }

    fn loops_dir(&self) -> PathBuf {
        self.root.join("loops")
    }

    async fn ensure_dir(dir: &Path) -> Result<(), CheckpointError> {
        fs::create_dir_all(dir).await.map_err(|e| CheckpointError::SaveFailed(e.to_string()))
    }

    fn path_for(dir: &Path, name: &str) -> PathBuf {
        dir.join(format!("{name}.json"))
    }

    /// Atomic write: serialize, checksum, write to a sibling temp file,
    /// fsync, then rename over the destination.
    async fn write_checkpoint<T: Serialize>(
        &self,
        dir: &Path,
        name: &str,
        state: &T,
    ) -> Result<(), CheckpointError> {
        if !is_valid_checkpoint_name(name) {
            return Err(CheckpointError::InvalidName(name.to_string()));
        }
        Self::ensure_dir(dir).await?;

        let body = serde_json::to_vec(state).map_err(|e| CheckpointError::SaveFailed(e.to_string()))?;
        let checksum = checksum_of(&body);
        let envelope = CheckpointEnvelope { name: name.to_string(), checksum, saved_at: Utc::now(), state: body };
        let bytes = serde_json::to_vec(&envelope).map_err(|e| CheckpointError::SaveFailed(e.to_string()))?;

        {
            let _guard = self.accounting_lock.write().await;
            let mut acct = self.memory_accounting();
            acct.grow(bytes.len() as u64).map_err(|_| CheckpointError::MemoryLimitExceeded)?;
            self.allocated_bytes.store(acct.allocated_bytes, Ordering::Relaxed);
            self.used_bytes.store(acct.used_bytes, Ordering::Relaxed);
        }

        let dest = Self::path_for(dir, name);
        let tmp = dir.join(format!(".{}.{}.tmp", name, Uuid::new_v4()));
        let mut file = fs::File::create(&tmp).await.map_err(|e| CheckpointError::SaveFailed(e.to_string()))?;
        use tokio::io::AsyncWriteExt;
        file.write_all(&bytes).await.map_err(|e| CheckpointError::SaveFailed(e.to_string()))?;
        file.sync_all().await.map_err(|e| CheckpointError::SaveFailed(e.to_string()))?;
        fs::rename(&tmp, &dest).await.map_err(|e| CheckpointError::SaveFailed(e.to_string()))?;
        Ok(())
    }

    async fn read_checkpoint<T: DeserializeOwned>(
        &self,
        dir: &Path,
        name: &str,
    ) -> Result<Checkpoint<T>, CheckpointError> {
        if !is_valid_checkpoint_name(name) {
            return Err(CheckpointError::InvalidName(name.to_string()));
        }
        let path = Self::path_for(dir, name);
        let bytes = fs::read(&path).await.map_err(|e| CheckpointError::LoadFailed(e.to_string()))?;
        let envelope: CheckpointEnvelope =
            serde_json::from_slice(&bytes).map_err(|e| CheckpointError::LoadFailed(e.to_string()))?;
        if checksum_of(&envelope.state) != envelope.checksum {
            return Err(CheckpointError::Corrupt { name: name.to_string() });
        }
        let state: T =
            serde_json::from_slice(&envelope.state).map_err(|e| CheckpointError::LoadFailed(e.to_string()))?;
        Ok(Checkpoint { name: envelope.name, state, checksum: envelope.checksum, saved_at: envelope.saved_at })
    }

    async fn list_names(dir: &Path) -> Result<Vec<String>, CheckpointError> {
        let mut names = Vec::new();
        let mut entries = match fs::read_dir(dir).await {
            Ok(e) => e,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(names),
            Err(e) => return Err(CheckpointError::LoadFailed(e.to_string())),
        };
        while let Some(entry) = entries.next_entry().await.map_err(|e| CheckpointError::LoadFailed(e.to_string()))? {
            let file_name = entry.file_name();
            let file_name = file_name.to_string_lossy();
            if let Some(stripped) = file_name.strip_suffix(".json") {
                names.push(stripped.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    pub async fn save<T: Serialize>(&self, name: &str, state: &T) -> Result<(), CheckpointError> {
        self.write_checkpoint(&self.root, name, state).await
    }

    pub async fn load<T: DeserializeOwned>(&self, name: &str) -> Result<Checkpoint<T>, CheckpointError> {
        self.read_checkpoint(&self.root, name).await
    }

    pub async fn list(&self) -> Result<Vec<String>, CheckpointError> {
        Self::list_names(&self.root).await
    }

    /// Deletes checkpoints older than `retention_days`. Corrupt files are
    /// skipped with a warning, never abort the compaction pass.
    pub async fn compact(&self) -> Result<usize, CheckpointError> {
        let cutoff = Utc::now() - chrono::Duration::days(self.config.retention_days);
        let mut removed = 0;
        for name in Self::list_names(&self.root).await? {
            let path = Self::path_for(&self.root, &name);
            let bytes = match fs::read(&path).await {
                Ok(b) => b,
                Err(e) => {
                    warn!(name, error = %e, "skipping unreadable checkpoint during compaction");
                    continue;
                }
            };
            let envelope: CheckpointEnvelope = match serde_json::from_slice(&bytes) {
                Ok(e) => e,
                Err(e) => {
                    warn!(name, error = %e, "skipping corrupt checkpoint during compaction");
                    continue;
                }
            };
            if envelope.saved_at < cutoff {
                if let Err(e) = fs::remove_file(&path).await {
                    return Err(CheckpointError::CompactionFailed(e.to_string()));
                }
                removed += 1;
            }
        }
        Ok(removed)
    }

    pub async fn save_step<T: Serialize>(&self, session_id: &str, step_name: &str, state: &T) -> Result<(), CheckpointError> {
        let dir = self.steps_dir().join(session_id);
        self.write_checkpoint(&dir, step_name, state).await
    }

    pub async fn load_step<T: DeserializeOwned>(&self, session_id: &str, step_name: &str) -> Result<Checkpoint<T>, CheckpointError> {
        let dir = self.steps_dir().join(session_id);
        self.read_checkpoint(&dir, step_name).await
    }

    pub async fn list_steps_by_session(&self, session_id: &str) -> Result<Vec<String>, CheckpointError> {
        Self::list_names(&self.steps_dir().join(session_id)).await
    }

    pub async fn latest_step_by_session<T: DeserializeOwned>(
        &self,
        session_id: &str,
    ) -> Result<Option<Checkpoint<T>>, CheckpointError> {
        let mut names = self.list_steps_by_session(session_id).await?;
        names.sort();
        match names.pop() {
            Some(name) => Ok(Some(self.load_step(session_id, &name).await?)),
            None => Ok(None),
        }
    }

    /// Keeps only the most recent `keep` steps for a session, oldest first evicted.
    pub async fn compact_steps_by_session(&self, session_id: &str, keep: usize) -> Result<usize, CheckpointError> {
        let mut names = self.list_steps_by_session(session_id).await?;
        names.sort();
        let to_remove = names.len().saturating_sub(keep);
        let dir = self.steps_dir().join(session_id);
        let mut removed = 0;
        for name in names.into_iter().take(to_remove) {
            let path = Self::path_for(&dir, &name);
            fs::remove_file(&path).await.map_err(|e| CheckpointError::CompactionFailed(e.to_string()))?;
            removed += 1;
        }
        Ok(removed)
    }

    pub async fn save_session<T: Serialize>(&self, session_id: &str, state: &T) -> Result<(), CheckpointError> {
        self.write_checkpoint(&self.sessions_dir(), session_id, state).await
    }

    pub async fn load_session<T: DeserializeOwned>(&self, session_id: &str) -> Result<Checkpoint<T>, CheckpointError> {
        self.read_checkpoint(&self.sessions_dir(), session_id).await
    }

    /// `status_filter` inspects each session's stored JSON for a top-level
    /// `"status"` field; sessions that fail to parse are skipped.
    pub async fn list_sessions(&self, status_filter: Option<&str>) -> Result<Vec<String>, CheckpointError> {
        let names = Self::list_names(&self.sessions_dir()).await?;
        let Some(status) = status_filter else { return Ok(names) };

        let mut matching = Vec::new();
        for name in names {
            let path = Self::path_for(&self.sessions_dir(), &name);
            let Ok(bytes) = fs::read(&path).await else { continue };
            let Ok(envelope) = serde_json::from_slice::<CheckpointEnvelope>(&bytes) else { continue };
            let Ok(value) = serde_json::from_slice::<serde_json::Value>(&envelope.state) else { continue };
            if value.get("status").and_then(|v| v.as_str()) == Some(status) {
                matching.push(name);
            }
        }
        Ok(matching)
    }

    pub async fn save_loop<T: Serialize>(&self, loop_id: &str, state: &T) -> Result<(), CheckpointError> {
        self.write_checkpoint(&self.loops_dir(), loop_id, state).await
    }

    pub async fn load_loop<T: DeserializeOwned>(&self, loop_id: &str) -> Result<Checkpoint<T>, CheckpointError> {
        self.read_checkpoint(&self.loops_dir(), loop_id).await
    }

    /// Loads, applies `update`, and re-saves a loop checkpoint in one step.
    pub async fn update_loop_iteration<T, F>(&self, loop_id: &str, update: F) -> Result<(), CheckpointError>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce(&mut T),
    {
        let mut checkpoint = self.load_loop::<T>(loop_id).await?;
        update(&mut checkpoint.state);
        self.save_loop(loop_id, &checkpoint.state).await
    }

    pub async fn delete_loop(&self, loop_id: &str) -> Result<(), CheckpointError> {
        if !is_valid_checkpoint_name(loop_id) {
            return Err(CheckpointError::InvalidName(loop_id.to_string()));
        }
        let path = Self::path_for(&self.loops_dir(), loop_id);
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CheckpointError::LoadFailed(e.to_string())),
        }
    }

    pub async fn list_loops(&self) -> Result<Vec<String>, CheckpointError> {
        Self::list_names(&self.loops_dir()).await
    }
}

#[derive(serde::Serialize, serde::Deserialize)]
struct CheckpointEnvelope {
    name: String,
    checksum: u32,
    saved_at: chrono::DateTime<Utc>,
    state: Vec<u8>,
}

/// Shared handle suitable for wiring into the scheduler/coordinator.
pub type SharedCheckpointStore = Arc<CheckpointStore>;
