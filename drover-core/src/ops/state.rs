//! Tracked state of a managed checkout

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::git::CheckoutStatus;

/// What the agent knows about one checkout it manages
///
/// Fields reflect the last observation, not live git state; `status` on the
/// agent refreshes them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositoryState {
    /// Local checkout path
    pub location: PathBuf,
    /// Source the checkout was cloned from or attached to
    pub remote_source: String,
    /// Branch currently checked out, if HEAD is on one
    pub current_branch: Option<String>,
    /// Index into the operation log of the most recent operation that
    /// touched this checkout
    pub last_operation: Option<usize>,
    /// Whether the working tree had uncommitted changes when last observed
    pub dirty: bool,
}

impl RepositoryState {
    /// Track a checkout that has no recorded operations yet
    pub fn new(location: impl Into<PathBuf>, remote_source: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            remote_source: remote_source.into(),
            current_branch: None,
            last_operation: None,
            dirty: false,
        }
    }

    /// Point `last_operation` at a freshly appended log record
    pub fn note_operation(&mut self, index: usize) {
        self.last_operation = Some(index);
    }
}

/// Point-in-time view of a checkout, as reported by the status operation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum StatusSnapshot {
    /// The location holds a usable git repository
    Ready {
        /// Checkout path
        location: PathBuf,
        /// Branch currently checked out, if HEAD is on one
        branch: Option<String>,
        /// Working tree contents by category
        files: CheckoutStatus,
        /// Known local branch names
        branches: Vec<String>,
        /// URL of the configured remote, if any
        remote_url: Option<String>,
    },
    /// No usable repository; `location` is absent when the agent has no
    /// checkout at all
    Uninitialized {
        /// Checkout path, when one was recorded
        location: Option<PathBuf>,
    },
}

impl StatusSnapshot {
    /// Whether the checkout is usable
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready { .. })
    }

    /// Whether the working tree has uncommitted changes
    pub fn is_dirty(&self) -> bool {
        match self {
            Self::Ready { files, .. } => files.is_dirty(),
            Self::Uninitialized { .. } => false,
        }
    }

    /// One-line summary for log records and terminal output
    pub fn summary(&self) -> String {
        match self {
            Self::Ready { branch, files, .. } => {
                let branch = branch.as_deref().unwrap_or("(detached)");
                format!("on {}: {}", branch, files.summary())
            }
            Self::Uninitialized { location: Some(location) } => {
                format!("no repository at {}", location.display())
            }
            Self::Uninitialized { location: None } => "no repository attached".to_string(),
        }
    }
}
