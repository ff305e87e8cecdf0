//! Scripted in-memory backend for exercising orchestration logic in tests

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::git::backend::{
    CheckoutStatus, CommitAuthor, CommitOutcome, GitBackend, PushMode, PushOutcome,
    ReconcileOutcome,
};
use crate::ops::cancel::CancelToken;
use crate::{Error, Result};

#[derive(Default)]
struct ScriptState {
    branches: BTreeSet<String>,
    current: Option<String>,
    remotes: BTreeMap<String, String>,
    status: CheckoutStatus,
    commit_count: u64,
    clone_error: Option<String>,
    status_error: Option<String>,
    push_script: VecDeque<PushOutcome>,
    reconcile_script: VecDeque<ReconcileOutcome>,
    fetch_script: VecDeque<String>,
    cancel_on_push: Option<CancelToken>,
    calls: Vec<String>,
}

/// In-memory `GitBackend` whose push/fetch/reconcile results are scripted
/// per call. Everything else simulates a single checkout: branch creation,
/// staging, and commits mutate shared state so orchestration code sees
/// realistic follow-on reads.
pub(crate) struct ScriptedBackend {
    state: Mutex<ScriptState>,
}

impl ScriptedBackend {
    pub(crate) fn new() -> Self {
        let mut state = ScriptState::default();
        state.branches.insert("main".to_string());
        state.current = Some("main".to_string());
        state
            .remotes
            .insert("origin".to_string(), "https://example.com/team/widget.git".to_string());
        Self {
            state: Mutex::new(state),
        }
    }

    pub(crate) fn with_branches(self, names: &[&str]) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            for name in names {
                state.branches.insert((*name).to_string());
            }
        }
        self
    }

    pub(crate) fn with_detached_head(self) -> Self {
        self.state.lock().unwrap().current = None;
        self
    }

    pub(crate) fn with_dirty_tree(self, modified: &[&str], untracked: &[&str]) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            state.status.modified = modified.iter().map(PathBuf::from).collect();
            state.status.untracked = untracked.iter().map(PathBuf::from).collect();
        }
        self
    }

    pub(crate) fn with_clone_error(self, reason: &str) -> Self {
        self.state.lock().unwrap().clone_error = Some(reason.to_string());
        self
    }

    pub(crate) fn with_status_error(self, reason: &str) -> Self {
        self.state.lock().unwrap().status_error = Some(reason.to_string());
        self
    }

    pub(crate) fn script_pushes(self, outcomes: Vec<PushOutcome>) -> Self {
        self.state.lock().unwrap().push_script = outcomes.into();
        self
    }

    pub(crate) fn script_reconciles(self, outcomes: Vec<ReconcileOutcome>) -> Self {
        self.state.lock().unwrap().reconcile_script = outcomes.into();
        self
    }

    /// Cancel `token` during every push call, as an operator interrupt
    /// arriving mid-attempt would
    pub(crate) fn cancel_on_push(self, token: &CancelToken) -> Self {
        self.state.lock().unwrap().cancel_on_push = Some(token.clone());
        self
    }

    /// Calls made so far, one formatted entry per backend invocation
    pub(crate) fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    fn record(&self, call: String) {
        self.state.lock().unwrap().calls.push(call);
    }
}

impl GitBackend for ScriptedBackend {
    fn clone_repo(&self, source: &str, target: &Path, branch: Option<&str>) -> Result<()> {
        self.record(format!("clone {}", source));
        let mut state = self.state.lock().unwrap();
        if let Some(reason) = state.clone_error.clone() {
            return Err(Error::Clone {
                url: source.to_string(),
                reason,
            });
        }
        std::fs::create_dir_all(target)?;
        if let Some(branch) = branch {
            state.branches.insert(branch.to_string());
            state.current = Some(branch.to_string());
        }
        Ok(())
    }

    fn current_branch(&self, _checkout: &Path) -> Result<Option<String>> {
        Ok(self.state.lock().unwrap().current.clone())
    }

    fn list_branches(&self, _checkout: &Path) -> Result<BTreeSet<String>> {
        Ok(self.state.lock().unwrap().branches.clone())
    }

    fn create_branch(&self, _checkout: &Path, name: &str) -> Result<()> {
        self.record(format!("create-branch {}", name));
        let mut state = self.state.lock().unwrap();
        if state.branches.contains(name) {
            return Err(Error::Git(format!("branch {} already exists", name)));
        }
        state.branches.insert(name.to_string());
        state.current = Some(name.to_string());
        Ok(())
    }

    fn checkout_branch(&self, _checkout: &Path, name: &str) -> Result<()> {
        self.record(format!("checkout {}", name));
        let mut state = self.state.lock().unwrap();
        if !state.branches.contains(name) {
            return Err(Error::Git(format!("branch {} not found", name)));
        }
        state.current = Some(name.to_string());
        Ok(())
    }

    fn stage_all(&self, _checkout: &Path) -> Result<()> {
        self.record("stage-all".to_string());
        let mut state = self.state.lock().unwrap();
        let mut moved: Vec<PathBuf> = state.status.modified.drain(..).collect();
        moved.extend(state.status.untracked.drain(..));
        state.status.staged.extend(moved);
        Ok(())
    }

    fn stage_paths(&self, _checkout: &Path, paths: &[PathBuf]) -> Result<()> {
        self.record(format!(
            "stage-paths {}",
            paths
                .iter()
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join(",")
        ));
        let mut state = self.state.lock().unwrap();
        state.status.modified.retain(|p| !paths.contains(p));
        state.status.untracked.retain(|p| !paths.contains(p));
        for path in paths {
            state.status.staged.push(path.clone());
        }
        Ok(())
    }

    fn commit(
        &self,
        _checkout: &Path,
        message: &str,
        _author: Option<&CommitAuthor>,
    ) -> Result<CommitOutcome> {
        self.record(format!("commit {}", message));
        let mut state = self.state.lock().unwrap();
        if state.status.staged.is_empty() {
            return Ok(CommitOutcome::NothingToCommit);
        }
        state.status.staged.clear();
        state.commit_count += 1;
        Ok(CommitOutcome::Created {
            id: format!("{:040x}", state.commit_count),
        })
    }

    fn status(&self, _checkout: &Path) -> Result<CheckoutStatus> {
        let state = self.state.lock().unwrap();
        if let Some(reason) = &state.status_error {
            return Err(Error::Git(reason.clone()));
        }
        Ok(state.status.clone())
    }

    fn remote_url(&self, _checkout: &Path, remote: &str) -> Result<Option<String>> {
        Ok(self.state.lock().unwrap().remotes.get(remote).cloned())
    }

    fn push(
        &self,
        _checkout: &Path,
        remote: &str,
        branch: &str,
        mode: PushMode,
    ) -> Result<PushOutcome> {
        let call = match &mode {
            PushMode::Normal => format!("push {} {}", remote, branch),
            PushMode::ForceWithLease { expected } => {
                format!("push {} {} lease={}", remote, branch, expected)
            }
        };
        self.record(call);
        let mut state = self.state.lock().unwrap();
        if let Some(token) = &state.cancel_on_push {
            token.cancel();
        }
        let outcome = state.push_script.pop_front().unwrap_or(PushOutcome::Accepted);
        Ok(outcome)
    }

    fn fetch(&self, _checkout: &Path, remote: &str, branch: &str) -> Result<String> {
        self.record(format!("fetch {} {}", remote, branch));
        let tip = self
            .state
            .lock()
            .unwrap()
            .fetch_script
            .pop_front()
            .unwrap_or_else(|| "f".repeat(40));
        Ok(tip)
    }

    fn rebase_onto(&self, _checkout: &Path, upstream: &str) -> Result<ReconcileOutcome> {
        self.record(format!("rebase {}", upstream));
        let outcome = self
            .state
            .lock()
            .unwrap()
            .reconcile_script
            .pop_front()
            .unwrap_or(ReconcileOutcome::Clean);
        Ok(outcome)
    }

    fn merge_from(&self, _checkout: &Path, source: &str) -> Result<ReconcileOutcome> {
        self.record(format!("merge {}", source));
        let outcome = self
            .state
            .lock()
            .unwrap()
            .reconcile_script
            .pop_front()
            .unwrap_or(ReconcileOutcome::Clean);
        Ok(outcome)
    }
}
