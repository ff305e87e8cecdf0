//! CLI command implementations

pub mod branch;
pub mod clone;
pub mod commit;
pub mod log;
pub mod push;
pub mod status;

pub use branch::BranchArgs;
pub use clone::CloneArgs;
pub use commit::CommitArgs;
pub use log::LogArgs;
pub use push::PushArgs;
pub use status::StatusArgs;

use std::path::PathBuf;

/// Checkout a command operates on: the explicit flag, or the current
/// directory
pub(crate) fn resolve_checkout(path: Option<PathBuf>) -> anyhow::Result<PathBuf> {
    match path {
        Some(path) => Ok(path),
        None => Ok(std::env::current_dir()?),
    }
}
