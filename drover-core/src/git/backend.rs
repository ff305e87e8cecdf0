//! Git backend trait and structured operation outcomes
//!
//! The agent drives git through this seam so orchestration logic stays
//! independent of how commands are executed. `CommandBackend` is the real
//! implementation; tests substitute a scripted one.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::Result;

/// Author identity for commits created by the agent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitAuthor {
    /// Author name
    pub name: String,
    /// Author email
    pub email: String,
}

/// Result of a commit attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
    /// A commit was created with the given id
    Created {
        /// Commit id (full hex)
        id: String,
    },
    /// The working tree had nothing staged to commit
    NothingToCommit,
}

/// How a push should be performed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushMode {
    /// Regular fast-forward push
    Normal,
    /// Forced push guarded by a lease on the remote tip
    ForceWithLease {
        /// Remote tip id the lease is taken against
        expected: String,
    },
}

/// Result of a push attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushOutcome {
    /// The remote accepted the push
    Accepted,
    /// The remote rejected the push because it has commits we lack
    Diverged,
    /// The remote rejected the push for another reason
    Rejected(String),
}

/// Result of replaying or merging local work onto fetched remote commits
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Histories combined cleanly
    Clean,
    /// Reconciliation hit conflicts in these paths; the attempt was
    /// aborted and the working tree left as it was
    Conflicts(Vec<PathBuf>),
}

/// Working tree status for a checkout
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutStatus {
    /// Files not tracked by git
    pub untracked: Vec<PathBuf>,
    /// Tracked files with unstaged modifications
    pub modified: Vec<PathBuf>,
    /// Files with staged changes
    pub staged: Vec<PathBuf>,
}

impl CheckoutStatus {
    /// Whether the working tree has any uncommitted changes
    pub fn is_dirty(&self) -> bool {
        !self.untracked.is_empty() || !self.modified.is_empty() || !self.staged.is_empty()
    }

    /// Short human-readable summary ("clean" or counts per category)
    pub fn summary(&self) -> String {
        if !self.is_dirty() {
            return "clean".to_string();
        }
        let mut parts = Vec::new();
        if !self.staged.is_empty() {
            parts.push(format!("{} staged", self.staged.len()));
        }
        if !self.modified.is_empty() {
            parts.push(format!("{} modified", self.modified.len()));
        }
        if !self.untracked.is_empty() {
            parts.push(format!("{} untracked", self.untracked.len()));
        }
        parts.join(", ")
    }
}

/// Operations the agent needs from git
///
/// Every method takes the checkout path explicitly; the backend holds no
/// per-repository state.
pub trait GitBackend {
    /// Clone `source` into `target`, optionally checking out `branch`
    fn clone_repo(&self, source: &str, target: &Path, branch: Option<&str>) -> Result<()>;

    /// Branch currently checked out, or `None` for a detached HEAD
    fn current_branch(&self, checkout: &Path) -> Result<Option<String>>;

    /// Names of all local branches
    fn list_branches(&self, checkout: &Path) -> Result<BTreeSet<String>>;

    /// Create a branch at HEAD and switch to it
    fn create_branch(&self, checkout: &Path, name: &str) -> Result<()>;

    /// Switch to an existing branch
    fn checkout_branch(&self, checkout: &Path, name: &str) -> Result<()>;

    /// Stage all changes in the working tree
    fn stage_all(&self, checkout: &Path) -> Result<()>;

    /// Stage the given paths
    fn stage_paths(&self, checkout: &Path, paths: &[PathBuf]) -> Result<()>;

    /// Commit staged changes
    fn commit(
        &self,
        checkout: &Path,
        message: &str,
        author: Option<&CommitAuthor>,
    ) -> Result<CommitOutcome>;

    /// Working tree status
    fn status(&self, checkout: &Path) -> Result<CheckoutStatus>;

    /// URL of the named remote, if configured
    fn remote_url(&self, checkout: &Path, remote: &str) -> Result<Option<String>>;

    /// Push `branch` to `remote`, setting upstream tracking
    fn push(
        &self,
        checkout: &Path,
        remote: &str,
        branch: &str,
        mode: PushMode,
    ) -> Result<PushOutcome>;

    /// Fetch `branch` from `remote`, returning the fetched tip id
    fn fetch(&self, checkout: &Path, remote: &str, branch: &str) -> Result<String>;

    /// Replay local commits onto `upstream`
    fn rebase_onto(&self, checkout: &Path, upstream: &str) -> Result<ReconcileOutcome>;

    /// Merge `source` into the current branch
    fn merge_from(&self, checkout: &Path, source: &str) -> Result<ReconcileOutcome>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_summary_clean() {
        let status = CheckoutStatus::default();
        assert!(!status.is_dirty());
        assert_eq!(status.summary(), "clean");
    }

    #[test]
    fn test_status_summary_counts() {
        let status = CheckoutStatus {
            untracked: vec![PathBuf::from("new.txt")],
            modified: vec![PathBuf::from("a.rs"), PathBuf::from("b.rs")],
            staged: vec![PathBuf::from("c.rs")],
        };
        assert!(status.is_dirty());
        assert_eq!(status.summary(), "1 staged, 2 modified, 1 untracked");
    }
}
