//! Error types for drover

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for drover operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for drover operations
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error (operation log persistence)
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Clone failed. Never retried: the source or destination must be fixed
    /// by the caller.
    #[error("Failed to clone {url}: {reason}")]
    Clone { url: String, reason: String },

    /// Operation invoked without the state it requires (usage error)
    #[error("Invalid state: {0}")]
    State(String),

    /// Branch name generation exhausted its search or the base name was
    /// unsanitizable
    #[error("Branch naming failed: {0}")]
    Naming(String),

    /// The checkout is in a state that cannot be committed
    #[error("Cannot commit at {}: {reason}", .location.display())]
    Commit { location: PathBuf, reason: String },

    /// Content-level conflict the resolver will not auto-merge; the paths are
    /// surfaced for out-of-band resolution
    #[error("Reconciliation conflict at {}: {}", .location.display(), join_paths(.paths))]
    Conflict {
        location: PathBuf,
        paths: Vec<PathBuf>,
    },

    /// Push gave up: the retry budget ran out or the remote rejected the
    /// branch outright
    #[error("Push from {} failed after {attempts} attempt(s): {last_reason}", .location.display())]
    Push {
        location: PathBuf,
        attempts: u32,
        last_reason: String,
    },

    /// The caller signaled cancellation between retry attempts
    #[error("Cancelled: {0}")]
    Cancelled(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// External git tool failure outside the typed cases above
    #[error("Git error: {0}")]
    Git(String),
}

fn join_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
