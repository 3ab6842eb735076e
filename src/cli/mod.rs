//! CLI interface module
//!
//! Command-line surface over the Session RPCs, CheckpointStore admin
//! operations, and AuditLog query described in the external-interfaces
//! section: command definitions, dispatch, and output formatting.

pub mod commands;
pub mod dispatcher;
pub mod output;
pub mod types;

pub use types::{AuditCommands, Cli, Commands, CheckpointCommands, SessionCommands};
