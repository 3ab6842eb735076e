//! Typed error taxonomy for the orchestrator core (§7). One enum per
//! component; every variant carries the error `code` spec.md names so the
//! `{code, message, context?}` surface required of every error is
//! reconstructible from `Display` plus `.code()`.

use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum CheckpointError {
    #[error("invalid checkpoint name: {0}")]
    InvalidName(String),
    #[error("save failed: {0}")]
    SaveFailed(String),
    #[error("load failed: {0}")]
    LoadFailed(String),
    #[error("checkpoint {name} is corrupt: checksum mismatch")]
    Corrupt { name: String },
    #[error("memory limit exceeded")]
    MemoryLimitExceeded,
    #[error("insufficient memory")]
    InsufficientMemory,
    #[error("compaction failed: {0}")]
    CompactionFailed(String),
}

impl CheckpointError {
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidName(_) => "INVALID_NAME",
            Self::SaveFailed(_) => "SAVE_FAILED",
            Self::LoadFailed(_) => "LOAD_FAILED",
            Self::Corrupt { .. } => "CORRUPT",
            Self::MemoryLimitExceeded => "MEMORY_LIMIT_EXCEEDED",
            Self::InsufficientMemory => "INSUFFICIENT_MEMORY",
            Self::CompactionFailed(_) => "COMPACTION_FAILED",
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum TransitionError {
    #[error("invalid transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },
    #[error("no guard passed for the attempted transition")]
    NoGuardPassed,
    #[error("handler fault: {0}")]
    HandlerFault(String),
    #[error("max retries exceeded")]
    MaxRetriesExceeded,
    #[error("cancelled")]
    Cancelled,
    #[error("timeout")]
    Timeout,
    #[error("context must start in IDLE")]
    NotIdle,
}

impl TransitionError {
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidTransition { .. } | Self::NotIdle => "INVALID_TRANSITION",
            Self::NoGuardPassed => "NO_GUARD_PASSED",
            Self::HandlerFault(_) => "HANDLER_FAULT",
            Self::MaxRetriesExceeded => "MAX_RETRIES_EXCEEDED",
            Self::Cancelled => "CANCELLED",
            Self::Timeout => "TIMEOUT",
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum SchedulerError {
    #[error("circular dependency among stories")]
    CircularDependency,
    #[error("admission denied")]
    AdmissionDenied,
    #[error("wave failed: {0}")]
    WaveFailed(String),
}

impl SchedulerError {
    pub const fn code(&self) -> &'static str {
        match self {
            Self::CircularDependency => "CIRCULAR_DEPENDENCY",
            Self::AdmissionDenied => "ADMISSION_DENIED",
            Self::WaveFailed(_) => "WAVE_FAILED",
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum FailureIndexError {
    #[error("embedding failed: {0}")]
    EmbeddingFailed(String),
    #[error("invalid snapshot: {0}")]
    SnapshotInvalid(String),
}

impl FailureIndexError {
    pub const fn code(&self) -> &'static str {
        match self {
            Self::EmbeddingFailed(_) => "EMBEDDING_FAILED",
            Self::SnapshotInvalid(_) => "SNAPSHOT_INVALID",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum InjectionSeverity {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Error)]
pub enum PromptValidationError {
    #[error("prompt exceeds {0} characters")]
    PromptTooLarge(usize),
    #[error("prompt estimated at more than {0} tokens")]
    TooManyTokens(usize),
    #[error("missing required 'Task:' section")]
    MissingTask,
    #[error("missing required 'Files:' section")]
    MissingFiles,
    #[error("missing required 'Output:' section")]
    MissingOutput,
    #[error("missing required 'Rules:' section")]
    MissingRules,
    #[error("invalid output format: {0}")]
    InvalidOutputFormat(String),
    #[error("injection detected ({0:?}): {1}")]
    InjectionDetected(InjectionSeverity, String),
    #[error("prompt contains conversation history")]
    ContainsConversationHistory,
    #[error("prompt contains CLAUDE.md rules")]
    ContainsClaudeMdRules,
    #[error("prompt contains previous agent output")]
    ContainsPreviousAgentOutput,
}

impl PromptValidationError {
    pub const fn code(&self) -> &'static str {
        match self {
            Self::PromptTooLarge(_) => "PROMPT_TOO_LARGE",
            Self::TooManyTokens(_) => "TOO_MANY_TOKENS",
            Self::MissingTask => "MISSING_TASK",
            Self::MissingFiles => "MISSING_FILES",
            Self::MissingOutput => "MISSING_OUTPUT",
            Self::MissingRules => "MISSING_RULES",
            Self::InvalidOutputFormat(_) => "INVALID_OUTPUT_FORMAT",
            Self::InjectionDetected(..) => "INJECTION_DETECTED",
            Self::ContainsConversationHistory => "CONTAINS_CONVERSATION_HISTORY",
            Self::ContainsClaudeMdRules => "CONTAINS_CLAUDE_MD_RULES",
            Self::ContainsPreviousAgentOutput => "CONTAINS_PREVIOUS_AGENT_OUTPUT",
        }
    }

    pub const fn severity(&self) -> InjectionSeverity {
        match self {
            Self::InjectionDetected(sev, _) => *sev,
            _ => InjectionSeverity::High,
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum AuditLogError {
    #[error("write failed: {0}")]
    WriteFailed(String),
    #[error("rotation failed: {0}")]
    RotationFailed(String),
}

impl AuditLogError {
    pub const fn code(&self) -> &'static str {
        match self {
            Self::WriteFailed(_) => "SAVE_FAILED",
            Self::RotationFailed(_) => "SAVE_FAILED",
        }
    }
}
