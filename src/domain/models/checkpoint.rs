//! Checkpoint<T>: a durably stored snapshot with a content checksum, plus
//! the in-memory capacity accounting the CheckpointStore tracks alongside it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A named, checksummed snapshot of component-specific state `T`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint<T> {
    pub name: String,
    pub state: T,
    pub checksum: u32,
    pub saved_at: DateTime<Utc>,
}

/// FNV-1a over canonical JSON bytes: deterministic, dependency-free, and
/// stable across the write/read boundary as required by §4.1.
pub fn checksum_of(bytes: &[u8]) -> u32 {
    const FNV_OFFSET_BASIS: u32 = 0x811c_9dc5;
    const FNV_PRIME: u32 = 0x0100_0193;
    let mut hash = FNV_OFFSET_BASIS;
    for &byte in bytes {
        hash ^= u32::from(byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// Whether `name` is a legal checkpoint name: `[A-Za-z0-9._-]{1,255}`, no
/// path separators, no `..` traversal.
pub fn is_valid_checkpoint_name(name: &str) -> bool {
    if name.is_empty() || name.len() > 255 {
        return false;
    }
    if name.contains("..") {
        return false;
    }
    name.bytes()
        .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'.' | b'_' | b'-'))
}

/// In-memory capacity accounting for the CheckpointStore. Advisory, not
/// authoritative: it tracks allocation pressure, it does not gate correctness.
#[derive(Debug, Clone, Copy)]
pub struct MemoryAccounting {
    pub allocated_bytes: u64,
    pub used_bytes: u64,
    pub max_bytes: u64,
}

impl MemoryAccounting {
    pub const fn new(max_bytes: u64) -> Self {
        Self { allocated_bytes: 0, used_bytes: 0, max_bytes }
    }

    pub fn utilization_percent(&self) -> f64 {
        if self.max_bytes == 0 {
            0.0
        } else {
            (self.allocated_bytes as f64 / self.max_bytes as f64) * 100.0
        }
    }

    pub fn is_under_pressure(&self) -> bool {
        self.utilization_percent() > 80.0
    }

    pub fn fragmentation_percent(&self) -> f64 {
        if self.allocated_bytes == 0 {
            0.0
        } else {
            let free = self.allocated_bytes.saturating_sub(self.used_bytes);
            (free as f64 / self.allocated_bytes as f64) * 100.0
        }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum MemoryAccountingError {
    #[error("memory limit exceeded: allocating {requested} would exceed max {max}")]
    MemoryLimitExceeded { requested: u64, max: u64 },
    #[error("insufficient memory: cannot shrink {requested} below allocated {allocated}")]
    InsufficientMemory { requested: u64, allocated: u64 },
}

impl MemoryAccounting {
    pub fn grow(&mut self, n: u64) -> Result<(), MemoryAccountingError> {
        if self.allocated_bytes + n > self.max_bytes {
            return Err(MemoryAccountingError::MemoryLimitExceeded { requested: n, max: self.max_bytes });
        }
        self.allocated_bytes += n;
        self.used_bytes += n;
        Ok(())
    }

    pub fn shrink(&mut self, n: u64) -> Result<(), MemoryAccountingError> {
        if n > self.allocated_bytes {
            return Err(MemoryAccountingError::InsufficientMemory { requested: n, allocated: self.allocated_bytes });
        }
        self.allocated_bytes -= n;
        self.used_bytes = self.used_bytes.saturating_sub(n);
        Ok(())
    }
}

/// Configuration for the CheckpointStore, per §6 defaults.
#[derive(Debug, Clone)]
pub struct CheckpointStoreConfig {
    pub checkpoints_dir: String,
    pub retention_days: i64,
    pub max_bytes: u64,
}

impl Default for CheckpointStoreConfig {
    fn default() -> Self {
        Self {
            checkpoints_dir: ".checkpoints".to_string(),
            retention_days: 7,
            max_bytes: 100 * 1024 * 1024,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checksum_is_deterministic() {
        assert_eq!(checksum_of(b"hello"), checksum_of(b"hello"));
        assert_ne!(checksum_of(b"hello"), checksum_of(b"hellp"));
    }

    #[test]
    fn valid_names_reject_traversal_and_separators() {
        assert!(is_valid_checkpoint_name("wave-1"));
        assert!(is_valid_checkpoint_name("session.json"));
        assert!(!is_valid_checkpoint_name("../escape"));
        assert!(!is_valid_checkpoint_name("a/b"));
        assert!(!is_valid_checkpoint_name(""));
        assert!(!is_valid_checkpoint_name(&"a".repeat(256)));
    }

    #[test]
    fn grow_past_max_fails() {
        let mut acct = MemoryAccounting::new(100);
        assert!(acct.grow(50).is_ok());
        assert!(matches!(acct.grow(60), Err(MemoryAccountingError::MemoryLimitExceeded { .. })));
    }

    #[test]
    fn shrink_past_allocated_fails() {
        let mut acct = MemoryAccounting::new(100);
        acct.grow(10).unwrap();
        assert!(matches!(acct.shrink(20), Err(MemoryAccountingError::InsufficientMemory { .. })));
    }

    #[test]
    fn pressure_flag_flips_at_80_percent() {
        let mut acct = MemoryAccounting::new(100);
        acct.grow(79).unwrap();
        assert!(!acct.is_under_pressure());
        acct.grow(2).unwrap();
        assert!(acct.is_under_pressure());
    }
}
