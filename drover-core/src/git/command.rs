//! Git backend backed by the git CLI and libgit2
//!
//! Mutations (clone, checkout, add, commit, push, fetch, rebase, merge) go
//! through the git binary so behavior matches what an operator would get at
//! a shell. Reads (current branch, branch lists, remote URLs, commit ids)
//! use libgit2 directly.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tracing::{debug, info};

use crate::git::backend::{
    CheckoutStatus, CommitAuthor, CommitOutcome, GitBackend, PushMode, PushOutcome,
    ReconcileOutcome,
};
use crate::{Error, Result};

/// `GitBackend` implementation that shells out to git
#[derive(Debug, Clone, Copy, Default)]
pub struct CommandBackend;

impl CommandBackend {
    /// Create a new command backend
    pub fn new() -> Self {
        Self
    }

    fn head_id(&self, checkout: &Path) -> Result<String> {
        let repo = open_repo(checkout)?;
        let head = repo
            .head()
            .map_err(|e| Error::Git(format!("Failed to read HEAD: {}", e)))?;
        let commit = head
            .peel_to_commit()
            .map_err(|e| Error::Git(format!("Failed to resolve HEAD commit: {}", e)))?;
        Ok(commit.id().to_string())
    }

    fn unmerged_paths(&self, checkout: &Path) -> Result<Vec<PathBuf>> {
        let output = run_git(checkout, &["diff", "--name-only", "--diff-filter=U"])?;
        if !output.status.success() {
            return Err(Error::Git(format!(
                "git diff failed: {}",
                stderr_text(&output)
            )));
        }
        let paths = String::from_utf8_lossy(&output.stdout)
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(PathBuf::from)
            .collect();
        Ok(paths)
    }

    fn finish_reconcile(
        &self,
        checkout: &Path,
        output: &Output,
        abort_args: &[&str],
        verb: &str,
    ) -> Result<ReconcileOutcome> {
        if output.status.success() {
            return Ok(ReconcileOutcome::Clean);
        }

        let conflicts = self.unmerged_paths(checkout)?;
        if conflicts.is_empty() {
            return Err(Error::Git(format!(
                "git {} failed: {}",
                verb,
                stderr_text(output)
            )));
        }

        // Abort so the checkout is left on its branch with a clean tree
        // rather than mid-operation.
        let abort = run_git(checkout, abort_args)?;
        if !abort.status.success() {
            return Err(Error::Git(format!(
                "git {} --abort failed: {}",
                verb,
                stderr_text(&abort)
            )));
        }

        debug!(
            "{} conflicted in {} path(s), aborted",
            verb,
            conflicts.len()
        );
        Ok(ReconcileOutcome::Conflicts(conflicts))
    }
}

impl GitBackend for CommandBackend {
    fn clone_repo(&self, source: &str, target: &Path, branch: Option<&str>) -> Result<()> {
        info!("Cloning {} into {}", source, target.display());

        let mut cmd = Command::new("git");
        cmd.arg("clone");
        if let Some(branch) = branch {
            cmd.args(["--branch", branch]);
        }
        cmd.arg(source).arg(target);

        let output = cmd.output().map_err(|e| Error::Git(format!(
            "Failed to run git clone: {}",
            e
        )))?;

        if !output.status.success() {
            return Err(classify_clone_failure(source, &stderr_text(&output)));
        }
        Ok(())
    }

    fn current_branch(&self, checkout: &Path) -> Result<Option<String>> {
        let repo = open_repo(checkout)?;
        // Bound to a local so the reference does not outlive `repo`.
        let branch = match repo.head() {
            Ok(head) => {
                if head.is_branch() {
                    Ok(head.shorthand().map(String::from))
                } else {
                    Ok(None)
                }
            }
            // An unborn HEAD (fresh or empty clone) still names its branch
            // through the symbolic reference.
            Err(e)
                if e.code() == git2::ErrorCode::UnbornBranch
                    || e.code() == git2::ErrorCode::NotFound =>
            {
                let head_ref = repo
                    .find_reference("HEAD")
                    .map_err(|e| Error::Git(format!("Failed to read HEAD: {}", e)))?;
                Ok(head_ref
                    .symbolic_target()
                    .and_then(|t| t.strip_prefix("refs/heads/"))
                    .map(String::from))
            }
            Err(e) => Err(Error::Git(format!("Failed to read HEAD: {}", e))),
        };
        branch
    }

    fn list_branches(&self, checkout: &Path) -> Result<BTreeSet<String>> {
        let repo = open_repo(checkout)?;
        let branches = repo
            .branches(Some(git2::BranchType::Local))
            .map_err(|e| Error::Git(format!("Failed to list branches: {}", e)))?;

        let mut names = BTreeSet::new();
        for entry in branches {
            let (branch, _) = entry.map_err(|e| Error::Git(format!(
                "Failed to read branch: {}",
                e
            )))?;
            if let Some(name) = branch
                .name()
                .map_err(|e| Error::Git(format!("Failed to read branch name: {}", e)))?
            {
                names.insert(name.to_string());
            }
        }
        Ok(names)
    }

    fn create_branch(&self, checkout: &Path, name: &str) -> Result<()> {
        debug!("Creating branch {} in {}", name, checkout.display());
        let output = run_git(checkout, &["checkout", "-b", name])?;
        if !output.status.success() {
            return Err(Error::Git(format!(
                "git checkout -b {} failed: {}",
                name,
                stderr_text(&output)
            )));
        }
        Ok(())
    }

    fn checkout_branch(&self, checkout: &Path, name: &str) -> Result<()> {
        let output = run_git(checkout, &["checkout", name])?;
        if !output.status.success() {
            return Err(Error::Git(format!(
                "git checkout {} failed: {}",
                name,
                stderr_text(&output)
            )));
        }
        Ok(())
    }

    fn stage_all(&self, checkout: &Path) -> Result<()> {
        let output = run_git(checkout, &["add", "--all"])?;
        if !output.status.success() {
            return Err(Error::Git(format!(
                "git add failed: {}",
                stderr_text(&output)
            )));
        }
        Ok(())
    }

    fn stage_paths(&self, checkout: &Path, paths: &[PathBuf]) -> Result<()> {
        let mut cmd = Command::new("git");
        cmd.args(["add", "--"]).current_dir(checkout);
        for path in paths {
            cmd.arg(path);
        }
        let output = cmd
            .output()
            .map_err(|e| Error::Git(format!("Failed to run git add: {}", e)))?;
        if !output.status.success() {
            return Err(Error::Git(format!(
                "git add failed: {}",
                stderr_text(&output)
            )));
        }
        Ok(())
    }

    fn commit(
        &self,
        checkout: &Path,
        message: &str,
        author: Option<&CommitAuthor>,
    ) -> Result<CommitOutcome> {
        let mut cmd = Command::new("git");
        if let Some(author) = author {
            cmd.arg("-c").arg(format!("user.name={}", author.name));
            cmd.arg("-c").arg(format!("user.email={}", author.email));
        }
        cmd.args(["commit", "-m", message]).current_dir(checkout);

        let output = cmd
            .output()
            .map_err(|e| Error::Git(format!("Failed to run git commit: {}", e)))?;

        if output.status.success() {
            let id = self.head_id(checkout)?;
            debug!("Created commit {} in {}", id, checkout.display());
            return Ok(CommitOutcome::Created { id });
        }

        // git reports an empty index on stdout and exits non-zero.
        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = stderr_text(&output);
        if stdout.contains("nothing to commit")
            || stdout.contains("nothing added to commit")
            || stderr.contains("nothing to commit")
        {
            return Ok(CommitOutcome::NothingToCommit);
        }

        Err(Error::Commit {
            location: checkout.to_path_buf(),
            reason: first_line(&stderr).to_string(),
        })
    }

    fn status(&self, checkout: &Path) -> Result<CheckoutStatus> {
        let output = run_git(checkout, &["status", "--porcelain"])?;
        if !output.status.success() {
            return Err(Error::Git(format!(
                "git status failed: {}",
                stderr_text(&output)
            )));
        }
        Ok(parse_porcelain_status(&String::from_utf8_lossy(
            &output.stdout,
        )))
    }

    fn remote_url(&self, checkout: &Path, remote: &str) -> Result<Option<String>> {
        let repo = open_repo(checkout)?;
        // Bound to a local so the handle does not outlive `repo`.
        let url = match repo.find_remote(remote) {
            Ok(found) => Ok(found.url().map(String::from)),
            Err(e) if e.code() == git2::ErrorCode::NotFound => Ok(None),
            Err(e) => Err(Error::Git(format!(
                "Failed to look up remote {}: {}",
                remote, e
            ))),
        };
        url
    }

    fn push(
        &self,
        checkout: &Path,
        remote: &str,
        branch: &str,
        mode: PushMode,
    ) -> Result<PushOutcome> {
        let lease;
        let mut args = vec!["push", "--set-upstream"];
        if let PushMode::ForceWithLease { expected } = &mode {
            lease = format!("--force-with-lease=refs/heads/{}:{}", branch, expected);
            args.push(&lease);
        }
        args.push(remote);
        args.push(branch);

        let output = run_git(checkout, &args)?;
        if output.status.success() {
            info!("Pushed {} to {}", branch, remote);
            return Ok(PushOutcome::Accepted);
        }

        Ok(classify_push_failure(&stderr_text(&output)))
    }

    fn fetch(&self, checkout: &Path, remote: &str, branch: &str) -> Result<String> {
        let output = run_git(checkout, &["fetch", remote, branch])?;
        if !output.status.success() {
            return Err(Error::Git(format!(
                "git fetch {} {} failed: {}",
                remote,
                branch,
                stderr_text(&output)
            )));
        }

        let repo = open_repo(checkout)?;
        let tip = repo
            .revparse_single("FETCH_HEAD")
            .map_err(|e| Error::Git(format!("Failed to resolve FETCH_HEAD: {}", e)))?;
        Ok(tip.id().to_string())
    }

    fn rebase_onto(&self, checkout: &Path, upstream: &str) -> Result<ReconcileOutcome> {
        debug!("Rebasing {} onto {}", checkout.display(), upstream);
        let output = run_git(checkout, &["rebase", upstream])?;
        self.finish_reconcile(checkout, &output, &["rebase", "--abort"], "rebase")
    }

    fn merge_from(&self, checkout: &Path, source: &str) -> Result<ReconcileOutcome> {
        debug!("Merging {} into {}", source, checkout.display());
        let output = run_git(checkout, &["merge", "--no-edit", source])?;
        self.finish_reconcile(checkout, &output, &["merge", "--abort"], "merge")
    }
}

fn open_repo(checkout: &Path) -> Result<git2::Repository> {
    git2::Repository::open(checkout).map_err(|e| Error::Git(format!(
        "Failed to open repository at {}: {}",
        checkout.display(),
        e
    )))
}

fn run_git(dir: &Path, args: &[&str]) -> Result<Output> {
    debug!("git {} (in {})", args.join(" "), dir.display());
    Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .map_err(|e| Error::Git(format!(
            "Failed to run git {}: {}",
            args.first().copied().unwrap_or(""),
            e
        )))
}

fn stderr_text(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).trim().to_string()
}

fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or("").trim()
}

/// Map git clone stderr to a clone error with a stable reason prefix
fn classify_clone_failure(source: &str, stderr: &str) -> Error {
    let line = first_line(stderr);
    let reason = if stderr.contains("Authentication failed")
        || stderr.contains("Permission denied")
        || stderr.contains("could not read Username")
    {
        format!("authentication failed: {}", line)
    } else if stderr.contains("Could not find remote branch")
        || (stderr.contains("Remote branch") && stderr.contains("not found"))
    {
        format!("remote branch not found: {}", line)
    } else if stderr.contains("Could not resolve host") || stderr.contains("unable to access") {
        format!("could not reach host: {}", line)
    } else if stderr.contains("not found") || stderr.contains("does not exist") {
        format!("repository not found: {}", line)
    } else {
        line.to_string()
    };

    Error::Clone {
        url: source.to_string(),
        reason,
    }
}

/// Decide whether a failed push means the remote moved ahead of us
fn classify_push_failure(stderr: &str) -> PushOutcome {
    let diverged = stderr.contains("non-fast-forward")
        || stderr.contains("fetch first")
        || stderr.contains("stale info")
        || (stderr.contains("[rejected]") && stderr.contains("behind"));

    if diverged {
        PushOutcome::Diverged
    } else {
        let line = stderr
            .lines()
            .map(str::trim)
            .find(|line| line.starts_with("error:") || line.starts_with("fatal:"))
            .unwrap_or_else(|| first_line(stderr));
        PushOutcome::Rejected(line.to_string())
    }
}

/// Parse `git status --porcelain` output
fn parse_porcelain_status(text: &str) -> CheckoutStatus {
    let mut status = CheckoutStatus::default();
    for line in text.lines() {
        if line.len() < 4 {
            continue;
        }
        let index = line.as_bytes()[0] as char;
        let worktree = line.as_bytes()[1] as char;
        let rest = &line[3..];
        // Renames list both sides; the new path is what callers care about.
        let path = PathBuf::from(rest.split(" -> ").last().unwrap_or(rest));

        if index == '?' && worktree == '?' {
            status.untracked.push(path);
            continue;
        }
        if index != ' ' && index != '?' {
            status.staged.push(path.clone());
        }
        if worktree != ' ' && worktree != '?' {
            status.modified.push(path);
        }
    }
    status
}
