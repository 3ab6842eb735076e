//! wavework CLI entry point

use anyhow::Result;
use clap::Parser;
use wavework::cli::{dispatcher, Cli};
use wavework::infrastructure::config::ConfigLoader;
use wavework::infrastructure::logging::{LogConfig, LoggerImpl};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = ConfigLoader::load()?;

    let log_config = LogConfig::from_domain(&config.logging, Some(".wavework/logs".into()));
    let _logger = LoggerImpl::init(&log_config)?;

    dispatcher::dispatch(cli, &config).await
}
