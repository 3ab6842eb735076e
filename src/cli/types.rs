//! CLI type definitions
//!
//! Clap command structures that define the CLI interface.

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "wavework")]
#[command(about = "Wave-based agent orchestration core", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Session lifecycle and history
    #[command(subcommand)]
    Session(SessionCommands),

    /// CheckpointStore administration
    #[command(subcommand)]
    Checkpoint(CheckpointCommands),

    /// AuditLog queries
    #[command(subcommand)]
    Audit(AuditCommands),
}

#[derive(Subcommand)]
pub enum SessionCommands {
    /// Create a new session from a plan file
    Create {
        /// Human-readable session title
        title: String,

        /// Path to a JSON file containing the Plan (waves/stories)
        #[arg(short, long)]
        plan: std::path::PathBuf,

        /// Project path the session operates against
        #[arg(short = 'd', long, default_value = ".")]
        project_path: String,
    },

    /// Resume a previously paused or interrupted session
    Resume {
        /// Session id
        id: String,

        /// Path to the Plan file to resume against
        #[arg(short, long)]
        plan: std::path::PathBuf,
    },

    /// Pause a running session
    Pause {
        /// Session id
        id: String,
    },

    /// Cancel a running session
    Cancel {
        /// Session id
        id: String,
    },

    /// List known sessions, optionally filtered by status
    List {
        /// Filter by status: active, paused, completed, failed
        #[arg(short, long)]
        status: Option<String>,
    },

    /// Show a session's persisted loop history
    History {
        /// Session id (used as the loop id)
        id: String,
    },
}

#[derive(Subcommand)]
pub enum CheckpointCommands {
    /// List all top-level checkpoint names
    List,

    /// Compact checkpoints beyond the retention policy
    Compact,
}

#[derive(Subcommand)]
pub enum AuditCommands {
    /// Query the audit log
    Query {
        /// Filter by user id
        #[arg(long)]
        user_id: Option<String>,

        /// Filter by outcome: success, failure, partial_success
        #[arg(long)]
        outcome: Option<String>,

        /// Maximum number of results
        #[arg(long)]
        limit: Option<usize>,
    },
}
