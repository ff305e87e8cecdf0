//! The operations agent
//!
//! `OperationsAgent` strings the git plumbing together for unattended runs:
//! clone or attach, branch with a collision-free name, commit, push with
//! retry, and report status. Every operation leaves at least one record in
//! the agent's log, on failure paths included, so a run can be reconstructed
//! after the fact.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::config::Config;
use crate::git::{self, CommandBackend, CommitAuthor, CommitOutcome, GitBackend};
use crate::ops::cancel::CancelToken;
use crate::ops::log::{OperationKind, OperationLog, OperationOutcome, OperationRecord};
use crate::ops::naming::BranchNamer;
use crate::ops::push::{PushProtocol, PushReport};
use crate::ops::state::{RepositoryState, StatusSnapshot};
use crate::{Error, Result};

/// Orchestrates git operations over a single checkout
///
/// The agent tracks one checkout at a time. Operations take `&mut self`, so
/// a checkout is never driven by two operations at once; bots wanting
/// parallelism run one agent per checkout.
pub struct OperationsAgent<G = CommandBackend> {
    backend: G,
    config: Config,
    namer: BranchNamer,
    log: OperationLog,
    state: Option<RepositoryState>,
    cancel: Option<CancelToken>,
}

impl OperationsAgent<CommandBackend> {
    /// Agent driving the real git installation
    pub fn new(config: Config) -> Self {
        Self::with_backend(CommandBackend::new(), config)
    }
}

impl<G: GitBackend> OperationsAgent<G> {
    /// Agent over an explicit backend
    pub fn with_backend(backend: G, config: Config) -> Self {
        let namer = BranchNamer::from_config(&config.naming);
        Self {
            backend,
            config,
            namer,
            log: OperationLog::new(),
            state: None,
            cancel: None,
        }
    }

    /// Seed the agent with a previously saved operation log
    pub fn with_log(mut self, log: OperationLog) -> Self {
        self.log = log;
        self
    }

    /// Observe a cancellation token during retry loops
    pub fn with_cancel(mut self, token: &CancelToken) -> Self {
        self.cancel = Some(token.clone());
        self
    }

    /// Operation log accumulated so far
    pub fn log(&self) -> &OperationLog {
        &self.log
    }

    /// State of the tracked checkout, if one exists
    pub fn state(&self) -> Option<&RepositoryState> {
        self.state.as_ref()
    }

    /// Configuration the agent runs with
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Clone `source` and start tracking the new checkout
    ///
    /// Without an explicit destination the checkout lands under the
    /// configured checkout directory, named after the source. A destination
    /// that already exists is refused; checkout locations are never reused.
    pub fn clone_repository(
        &mut self,
        source: &str,
        destination: Option<PathBuf>,
        branch: Option<&str>,
    ) -> Result<&RepositoryState> {
        let destination = match self.resolve_destination(source, destination) {
            Ok(path) => path,
            Err(e) => {
                self.record(OperationKind::Clone, OperationOutcome::Failure, e.to_string());
                return Err(e);
            }
        };

        if destination.exists() {
            let err = Error::Clone {
                url: source.to_string(),
                reason: format!("destination {} already exists", destination.display()),
            };
            self.record(OperationKind::Clone, OperationOutcome::Failure, err.to_string());
            return Err(err);
        }

        if let Err(e) = self.backend.clone_repo(source, &destination, branch) {
            self.record(OperationKind::Clone, OperationOutcome::Failure, e.to_string());
            return Err(e);
        }

        let current_branch = match self.backend.current_branch(&destination) {
            Ok(branch) => branch,
            Err(e) => {
                self.record(OperationKind::Clone, OperationOutcome::Failure, e.to_string());
                return Err(e);
            }
        };

        let detail = format!("cloned {} into {}", source, destination.display());
        let mut state = RepositoryState::new(destination, source);
        state.current_branch = current_branch;
        self.state = Some(state);
        self.record(OperationKind::Clone, OperationOutcome::Success, detail);

        info!("Cloned {}", source);
        self.current_state()
    }

    /// Start tracking an existing checkout instead of cloning
    ///
    /// The checkout must have a branch checked out; a detached HEAD is
    /// refused because every later operation needs a branch to work with.
    /// The remote source is taken from the configured remote when present;
    /// purely local repositories fall back to their own path.
    pub fn attach(&mut self, location: impl Into<PathBuf>) -> Result<&RepositoryState> {
        let location = location.into();

        let current_branch = match self.backend.current_branch(&location) {
            Ok(branch) => branch,
            Err(e) => {
                self.record(
                    OperationKind::Status,
                    OperationOutcome::Failure,
                    format!("cannot attach to {}: {}", location.display(), e),
                );
                return Err(Error::State(format!(
                    "no usable repository at {}",
                    location.display()
                )));
            }
        };
        let branch = match current_branch {
            Some(branch) => branch,
            None => {
                self.record(
                    OperationKind::Status,
                    OperationOutcome::Failure,
                    format!("cannot attach to {}: detached HEAD", location.display()),
                );
                return Err(Error::State(format!(
                    "{} has a detached HEAD; check out a branch first",
                    location.display()
                )));
            }
        };

        let remote_url = match self.backend.remote_url(&location, self.config.remote.as_str()) {
            Ok(url) => url,
            Err(e) => {
                self.record(OperationKind::Status, OperationOutcome::Failure, e.to_string());
                return Err(e);
            }
        };
        let files = match self.backend.status(&location) {
            Ok(files) => files,
            Err(e) => {
                self.record(OperationKind::Status, OperationOutcome::Failure, e.to_string());
                return Err(e);
            }
        };

        let detail = format!("attached to {} on {}", location.display(), branch);
        let source = remote_url.unwrap_or_else(|| location.display().to_string());
        let mut state = RepositoryState::new(location, source);
        state.current_branch = Some(branch);
        state.dirty = files.is_dirty();
        self.state = Some(state);
        self.record(OperationKind::Status, OperationOutcome::Success, detail);

        self.current_state()
    }

    /// Create and switch to a branch derived from `desired`, guaranteed not
    /// to collide with any existing local branch
    ///
    /// Returns the name actually used.
    pub fn create_unique_branch(&mut self, desired: &str) -> Result<String> {
        let location = self.require_checkout(OperationKind::CreateBranch)?;

        let branches = match self.backend.list_branches(&location) {
            Ok(branches) => branches,
            Err(e) => {
                self.record(OperationKind::CreateBranch, OperationOutcome::Failure, e.to_string());
                return Err(e);
            }
        };

        let name = match self.namer.unique_name(desired, &branches) {
            Ok(name) => name,
            Err(e) => {
                self.record(OperationKind::CreateBranch, OperationOutcome::Failure, e.to_string());
                return Err(e);
            }
        };

        if let Err(e) = self.backend.create_branch(&location, &name) {
            self.record(OperationKind::CreateBranch, OperationOutcome::Failure, e.to_string());
            return Err(e);
        }

        if let Some(state) = self.state.as_mut() {
            state.current_branch = Some(name.clone());
        }
        self.record(
            OperationKind::CreateBranch,
            OperationOutcome::Success,
            format!("created branch {}", name),
        );

        info!("Created branch {}", name);
        Ok(name)
    }

    /// Like [`create_unique_branch`](Self::create_unique_branch), but
    /// branching from `from_branch` instead of the current HEAD
    ///
    /// If branch creation fails after switching away, the original branch is
    /// checked out again so the checkout is not left somewhere unexpected.
    pub fn create_unique_branch_from(
        &mut self,
        desired: &str,
        from_branch: &str,
    ) -> Result<String> {
        let location = self.require_checkout(OperationKind::CreateBranch)?;
        let original = self.state.as_ref().and_then(|s| s.current_branch.clone());

        if let Err(e) = self.backend.checkout_branch(&location, from_branch) {
            self.record(
                OperationKind::CreateBranch,
                OperationOutcome::Failure,
                format!("cannot start from {}: {}", from_branch, e),
            );
            return Err(e);
        }
        if let Some(state) = self.state.as_mut() {
            state.current_branch = Some(from_branch.to_string());
        }

        match self.create_unique_branch(desired) {
            Ok(name) => Ok(name),
            Err(e) => {
                if let Some(original) = original {
                    if let Err(restore) = self.backend.checkout_branch(&location, &original) {
                        warn!("could not restore branch {}: {}", original, restore);
                    } else if let Some(state) = self.state.as_mut() {
                        state.current_branch = Some(original);
                    }
                }
                Err(e)
            }
        }
    }

    /// Stage everything and commit
    ///
    /// Returns the new commit id, or `None` when the working tree had
    /// nothing to commit (which is recorded but is not an error).
    pub fn commit_changes(&mut self, message: &str) -> Result<Option<String>> {
        let location = self.require_checkout(OperationKind::Commit)?;
        if let Err(e) = self.backend.stage_all(&location) {
            self.record(OperationKind::Commit, OperationOutcome::Failure, e.to_string());
            return Err(e);
        }
        self.finish_commit(&location, message)
    }

    /// Stage only `paths` and commit
    pub fn commit_paths(&mut self, message: &str, paths: &[PathBuf]) -> Result<Option<String>> {
        let location = self.require_checkout(OperationKind::Commit)?;
        if let Err(e) = self.backend.stage_paths(&location, paths) {
            self.record(OperationKind::Commit, OperationOutcome::Failure, e.to_string());
            return Err(e);
        }
        self.finish_commit(&location, message)
    }

    /// Push a branch to the configured remote, retrying through divergence
    ///
    /// Defaults to the current branch; naming a branch that is not checked
    /// out is refused, because reconciliation rewrites the checkout.
    /// Attempt-by-attempt records come from the retry protocol; one summary
    /// record closes the operation either way.
    pub fn push_branch(&mut self, branch: Option<&str>) -> Result<PushReport> {
        let location = self.require_checkout(OperationKind::Push)?;
        let current = self.state.as_ref().and_then(|s| s.current_branch.clone());
        let branch = match (branch, current) {
            (Some(named), Some(current)) if named == current => current,
            (None, Some(current)) => current,
            (Some(named), Some(current)) => {
                let err = Error::State(format!(
                    "cannot push {}: {} is checked out; check out {} first",
                    named, current, named
                ));
                self.record(OperationKind::Push, OperationOutcome::Failure, err.to_string());
                return Err(err);
            }
            (_, None) => {
                let err = Error::State(format!(
                    "no branch checked out at {}",
                    location.display()
                ));
                self.record(OperationKind::Push, OperationOutcome::Failure, err.to_string());
                return Err(err);
            }
        };
        let remote = self.config.remote.as_str().to_string();

        let result = {
            let mut protocol = PushProtocol::new(&self.backend, &self.config.push);
            if let Some(token) = &self.cancel {
                protocol = protocol.with_cancel(token);
            }
            protocol.run(&location, &remote, &branch, &mut self.log)
        };

        match result {
            Ok(report) => {
                let mut detail = format!(
                    "pushed {} to {} after {} attempt(s)",
                    branch, remote, report.attempts
                );
                if report.forced {
                    detail.push_str(" with a lease");
                } else if report.reconciled {
                    detail.push_str(" after reconciling");
                }
                self.record(OperationKind::Push, OperationOutcome::Success, detail);
                info!("Pushed {} to {}", branch, remote);
                Ok(report)
            }
            Err(e) => {
                self.record(OperationKind::Push, OperationOutcome::Failure, e.to_string());
                Err(e)
            }
        }
    }

    /// Observe the tracked checkout
    ///
    /// Status is a read that must be safe to call at any time: with no
    /// tracked checkout, or one that has vanished or stopped being a
    /// repository, it reports [`StatusSnapshot::Uninitialized`] instead of
    /// failing. It refreshes the tracked branch and dirty flag and appends a
    /// record, but does not move `last_operation`.
    pub fn status(&mut self) -> Result<StatusSnapshot> {
        let location = match &self.state {
            Some(state) => state.location.clone(),
            None => {
                let snapshot = StatusSnapshot::Uninitialized { location: None };
                self.record(
                    OperationKind::Status,
                    OperationOutcome::Success,
                    snapshot.summary(),
                );
                return Ok(snapshot);
            }
        };

        if !location.exists() {
            let snapshot = StatusSnapshot::Uninitialized {
                location: Some(location),
            };
            self.record(
                OperationKind::Status,
                OperationOutcome::Success,
                snapshot.summary(),
            );
            return Ok(snapshot);
        }

        let branch = match self.backend.current_branch(&location) {
            Ok(branch) => branch,
            Err(e) => {
                warn!("could not read HEAD at {}: {}", location.display(), e);
                let snapshot = StatusSnapshot::Uninitialized {
                    location: Some(location),
                };
                self.record(
                    OperationKind::Status,
                    OperationOutcome::Success,
                    snapshot.summary(),
                );
                return Ok(snapshot);
            }
        };

        let files = match self.backend.status(&location) {
            Ok(files) => files,
            Err(e) => {
                warn!("could not read {}: {}", location.display(), e);
                let snapshot = StatusSnapshot::Uninitialized {
                    location: Some(location),
                };
                self.record(
                    OperationKind::Status,
                    OperationOutcome::Success,
                    snapshot.summary(),
                );
                return Ok(snapshot);
            }
        };
        let branches = match self.backend.list_branches(&location) {
            Ok(branches) => branches.into_iter().collect(),
            Err(e) => {
                warn!("could not list branches: {}", e);
                Vec::new()
            }
        };
        let remote_url = match self.backend.remote_url(&location, self.config.remote.as_str()) {
            Ok(url) => url,
            Err(e) => {
                warn!("could not read remote url: {}", e);
                None
            }
        };

        if let Some(state) = self.state.as_mut() {
            state.current_branch = branch.clone();
            state.dirty = files.is_dirty();
        }

        let snapshot = StatusSnapshot::Ready {
            location,
            branch,
            files,
            branches,
            remote_url,
        };
        self.record(
            OperationKind::Status,
            OperationOutcome::Success,
            snapshot.summary(),
        );
        Ok(snapshot)
    }

    fn finish_commit(&mut self, location: &Path, message: &str) -> Result<Option<String>> {
        let author = self.commit_author();
        let outcome = match self.backend.commit(location, message, author.as_ref()) {
            Ok(outcome) => outcome,
            Err(e) => {
                self.record(OperationKind::Commit, OperationOutcome::Failure, e.to_string());
                return Err(e);
            }
        };

        match outcome {
            CommitOutcome::Created { id } => {
                let dirty = match self.backend.status(location) {
                    Ok(status) => status.is_dirty(),
                    Err(e) => {
                        warn!("could not refresh status after commit: {}", e);
                        false
                    }
                };
                if let Some(state) = self.state.as_mut() {
                    state.dirty = dirty;
                }

                let short = id.get(..8).unwrap_or(&id);
                let subject = message.lines().next().unwrap_or("");
                self.record(
                    OperationKind::Commit,
                    OperationOutcome::Success,
                    format!("created {}: {}", short, subject),
                );
                info!("Committed {}", short);
                Ok(Some(id))
            }
            CommitOutcome::NothingToCommit => {
                self.record(
                    OperationKind::Commit,
                    OperationOutcome::Success,
                    "nothing to commit",
                );
                Ok(None)
            }
        }
    }

    fn commit_author(&self) -> Option<CommitAuthor> {
        match (
            &self.config.commit.author_name,
            &self.config.commit.author_email,
        ) {
            (Some(name), Some(email)) => Some(CommitAuthor {
                name: name.clone(),
                email: email.clone(),
            }),
            _ => None,
        }
    }

    fn resolve_destination(&self, source: &str, destination: Option<PathBuf>) -> Result<PathBuf> {
        match destination {
            Some(path) => Ok(path),
            None => {
                let base = match &self.config.checkout_dir {
                    Some(dir) => dir.clone(),
                    None => git::default_checkout_dir()?,
                };
                Ok(base.join(git::derive_checkout_name(source)?))
            }
        }
    }

    /// Append a record, keeping `last_operation` pointed at the newest
    /// mutating operation. Status records never move it.
    fn record(
        &mut self,
        kind: OperationKind,
        outcome: OperationOutcome,
        detail: impl Into<String>,
    ) -> usize {
        let index = self.log.append(OperationRecord::new(kind, outcome, detail));
        if kind != OperationKind::Status {
            if let Some(state) = self.state.as_mut() {
                state.note_operation(index);
            }
        }
        index
    }

    fn require_checkout(&mut self, kind: OperationKind) -> Result<PathBuf> {
        match &self.state {
            Some(state) => Ok(state.location.clone()),
            None => {
                let err = Error::State("no checkout; clone or attach first".to_string());
                self.record(kind, OperationOutcome::Failure, err.to_string());
                Err(err)
            }
        }
    }

    fn current_state(&self) -> Result<&RepositoryState> {
        self.state
            .as_ref()
            .ok_or_else(|| Error::State("no checkout is being tracked".to_string()))
    }
}
