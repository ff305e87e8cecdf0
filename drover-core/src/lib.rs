//! Drover Core - Core library for the drover git operations agent
//!
//! This crate provides the orchestration for unattended git automation:
//! cloning, branching, committing, and pushing with divergence-aware
//! retries, with every operation recorded in an auditable log.

pub mod config;
pub mod error;
pub mod git;
pub mod ops;

pub use config::Config;
pub use error::{Error, Result};
pub use ops::{OperationLog, OperationsAgent, RepositoryState, StatusSnapshot};
