//! Dispatches a parsed [`Cli`] invocation to its command handler.

use anyhow::Result;

use crate::cli::commands::{audit, checkpoint, session};
use crate::cli::types::{AuditCommands, Cli, Commands, CheckpointCommands, SessionCommands};
use crate::domain::models::Config;

pub async fn dispatch(cli: Cli, config: &Config) -> Result<()> {
    match cli.command {
        Commands::Session(cmd) => match cmd {
            SessionCommands::Create { title, plan, project_path } => {
                session::create(title, &plan, project_path, config, cli.json).await
            }
            SessionCommands::Resume { id, plan } => session::resume(id, &plan, config, cli.json).await,
            SessionCommands::Pause { id } => session::pause(id, config, cli.json).await,
            SessionCommands::Cancel { id } => session::cancel(id, config, cli.json).await,
            SessionCommands::List { status } => session::list(status, config, cli.json).await,
            SessionCommands::History { id } => session::history(id, config, cli.json).await,
        },
        Commands::Checkpoint(cmd) => match cmd {
            CheckpointCommands::List => checkpoint::list(config, cli.json).await,
            CheckpointCommands::Compact => checkpoint::compact(config, cli.json).await,
        },
        Commands::Audit(cmd) => match cmd {
            AuditCommands::Query { user_id, outcome, limit } => {
                audit::query(user_id, outcome, limit, config, cli.json).await
            }
        },
    }
}
