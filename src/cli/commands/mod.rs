//! Command handlers, one module per top-level subcommand group.

pub mod audit;
pub mod checkpoint;
pub mod session;
