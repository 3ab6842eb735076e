//! wavework - wave-based agent orchestration core
//!
//! A Session owns one or more Waves of Stories, driven through planning,
//! execution, verification and commit by an ExecutionStateMachine, scheduled
//! for bounded concurrency by a WaveScheduler, with durable checkpointing,
//! prompt validation, failure indexing, and an append-only audit log.

pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;
