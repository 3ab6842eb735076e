//! Infrastructure layer
//!
//! Adapters for cross-cutting concerns that sit outside the domain:
//! - Configuration loading (figment)
//! - Structured logging (tracing)

pub mod config;
pub mod logging;
pub mod runner;
