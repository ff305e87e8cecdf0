//! Push retry protocol
//!
//! Pushing from an unattended bot races everything else that writes to the
//! remote. The protocol pushes, and when the remote reports commits we do
//! not have, reconciles (rebase by default, merge or a lease-guarded force
//! when configured) and pushes again, within a fixed attempt budget. Every
//! attempt is logged individually so a failed run can be audited afterwards.

use std::path::Path;
use std::thread;

use tracing::debug;

use crate::config::{PushConfig, ReconcileStrategy};
use crate::git::{GitBackend, PushMode, PushOutcome, ReconcileOutcome};
use crate::ops::cancel::CancelToken;
use crate::ops::log::{OperationKind, OperationLog, OperationOutcome};
use crate::{Error, Result};

/// Phase of one protocol run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushPhase {
    /// A push is being attempted
    Attempting,
    /// The remote rejected the push because it moved ahead of us
    Diverged,
    /// Local history is being combined with the fetched remote
    Reconciling,
    /// The remote accepted the push
    Succeeded,
    /// The protocol gave up
    Failed,
}

impl PushPhase {
    /// Short name for display
    pub fn name(&self) -> &'static str {
        match self {
            Self::Attempting => "attempting",
            Self::Diverged => "diverged",
            Self::Reconciling => "reconciling",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }

    /// Whether the protocol is finished in this phase
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }

    /// Whether the protocol may move from this phase to `next`
    pub fn can_transition_to(&self, next: PushPhase) -> bool {
        match self {
            Self::Attempting => matches!(
                next,
                Self::Succeeded | Self::Diverged | Self::Failed
            ),
            Self::Diverged => matches!(next, Self::Reconciling | Self::Failed),
            Self::Reconciling => matches!(next, Self::Attempting | Self::Failed),
            Self::Succeeded | Self::Failed => false,
        }
    }
}

impl std::fmt::Display for PushPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Summary of a completed protocol run
#[derive(Debug, Clone)]
pub struct PushReport {
    /// Push attempts made, including the accepted one
    pub attempts: u32,
    /// Whether any divergence was reconciled along the way
    pub reconciled: bool,
    /// Whether the accepted push was a lease-guarded force
    pub forced: bool,
}

/// Drives push attempts against a backend until the remote accepts the
/// branch, the attempt budget runs out, or reconciliation conflicts
pub struct PushProtocol<'a, G> {
    backend: &'a G,
    config: &'a PushConfig,
    cancel: Option<CancelToken>,
}

impl<'a, G: GitBackend> PushProtocol<'a, G> {
    /// Protocol over `backend` with the given retry configuration
    pub fn new(backend: &'a G, config: &'a PushConfig) -> Self {
        Self {
            backend,
            config,
            cancel: None,
        }
    }

    /// Observe a cancellation token between attempts
    pub fn with_cancel(mut self, token: &CancelToken) -> Self {
        self.cancel = Some(token.clone());
        self
    }

    /// Push `branch` to `remote`, appending one record per attempt
    ///
    /// The first attempt is always a regular push; the configured strategy
    /// only comes into play once the remote diverges. Force pushes happen
    /// solely under the force-with-lease strategy, never by default.
    pub fn run(
        &self,
        checkout: &Path,
        remote: &str,
        branch: &str,
        log: &mut OperationLog,
    ) -> Result<PushReport> {
        let max_attempts = self.config.max_attempts.max(1);
        let mut phase = PushPhase::Attempting;
        let mut mode = PushMode::Normal;
        let mut attempts = 0u32;
        let mut reconciled = false;
        let mut forced = false;

        loop {
            self.check_cancelled(branch, attempts, log)?;

            attempts += 1;
            debug!(
                "push attempt {}/{} for {} ({})",
                attempts,
                max_attempts,
                branch,
                phase.name()
            );
            if matches!(mode, PushMode::ForceWithLease { .. }) {
                forced = true;
            }

            match self.backend.push(checkout, remote, branch, mode.clone())? {
                PushOutcome::Accepted => {
                    advance(&mut phase, PushPhase::Succeeded)?;
                    log.record(
                        OperationKind::Push,
                        OperationOutcome::Success,
                        format!("attempt {}: {} accepted {}", attempts, remote, branch),
                    );
                    return Ok(PushReport {
                        attempts,
                        reconciled,
                        forced,
                    });
                }
                PushOutcome::Rejected(reason) => {
                    advance(&mut phase, PushPhase::Failed)?;
                    log.record(
                        OperationKind::Push,
                        OperationOutcome::Failure,
                        format!("attempt {}: push rejected: {}", attempts, reason),
                    );
                    return Err(Error::Push {
                        location: checkout.to_path_buf(),
                        attempts,
                        last_reason: reason,
                    });
                }
                PushOutcome::Diverged => {
                    advance(&mut phase, PushPhase::Diverged)?;
                    if attempts >= max_attempts {
                        advance(&mut phase, PushPhase::Failed)?;
                        log.record(
                            OperationKind::Push,
                            OperationOutcome::Failure,
                            format!(
                                "attempt {}: {} has new commits, attempt budget exhausted",
                                attempts, remote
                            ),
                        );
                        return Err(Error::Push {
                            location: checkout.to_path_buf(),
                            attempts,
                            last_reason: format!("{} diverged", remote),
                        });
                    }

                    log.record(
                        OperationKind::Push,
                        OperationOutcome::Retried,
                        format!(
                            "attempt {}: {} has new commits, reconciling via {}",
                            attempts,
                            remote,
                            self.config.strategy.name()
                        ),
                    );

                    if !self.config.backoff.is_zero() {
                        thread::sleep(self.config.backoff);
                    }
                    self.check_cancelled(branch, attempts, log)?;

                    advance(&mut phase, PushPhase::Reconciling)?;
                    mode = self.reconcile(checkout, remote, branch, attempts, log)?;
                    if matches!(mode, PushMode::Normal) {
                        reconciled = true;
                    }
                    advance(&mut phase, PushPhase::Attempting)?;
                }
            }
        }
    }

    /// Fetch the remote branch and combine histories per the configured
    /// strategy, returning the mode for the next push
    fn reconcile(
        &self,
        checkout: &Path,
        remote: &str,
        branch: &str,
        attempt: u32,
        log: &mut OperationLog,
    ) -> Result<PushMode> {
        let tip = self.backend.fetch(checkout, remote, branch)?;

        let outcome = match self.config.strategy {
            ReconcileStrategy::Rebase => self.backend.rebase_onto(checkout, "FETCH_HEAD")?,
            ReconcileStrategy::Merge => self.backend.merge_from(checkout, "FETCH_HEAD")?,
            ReconcileStrategy::ForceWithLease => {
                return Ok(PushMode::ForceWithLease { expected: tip });
            }
        };

        match outcome {
            ReconcileOutcome::Clean => Ok(PushMode::Normal),
            ReconcileOutcome::Conflicts(paths) => {
                log.record(
                    OperationKind::Push,
                    OperationOutcome::Failure,
                    format!(
                        "attempt {}: {} hit {} conflict(s), aborted",
                        attempt,
                        self.config.strategy.name(),
                        paths.len()
                    ),
                );
                Err(Error::Conflict {
                    location: checkout.to_path_buf(),
                    paths,
                })
            }
        }
    }

    fn check_cancelled(&self, branch: &str, attempts: u32, log: &mut OperationLog) -> Result<()> {
        if let Some(token) = &self.cancel {
            if token.is_cancelled() {
                log.record(
                    OperationKind::Push,
                    OperationOutcome::Failure,
                    format!("push of {} cancelled after {} attempt(s)", branch, attempts),
                );
                return Err(Error::Cancelled(format!("push of {}", branch)));
            }
        }
        Ok(())
    }
}

fn advance(phase: &mut PushPhase, next: PushPhase) -> Result<()> {
    if !phase.can_transition_to(next) {
        return Err(Error::State(format!(
            "illegal push transition: {} -> {}",
            phase, next
        )));
    }
    *phase = next;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::scripted::ScriptedBackend;
    use std::path::PathBuf;
    use std::time::Duration;

    fn quick_config() -> PushConfig {
        PushConfig {
            backoff: Duration::ZERO,
            ..Default::default()
        }
    }

    fn checkout() -> PathBuf {
        PathBuf::from("/tmp/checkout")
    }

    #[test]
    fn test_transitions() {
        use PushPhase::*;
        assert!(Attempting.can_transition_to(Succeeded));
        assert!(Attempting.can_transition_to(Diverged));
        assert!(Attempting.can_transition_to(Failed));
        assert!(Diverged.can_transition_to(Reconciling));
        assert!(Diverged.can_transition_to(Failed));
        assert!(Reconciling.can_transition_to(Attempting));
        assert!(Reconciling.can_transition_to(Failed));

        assert!(!Attempting.can_transition_to(Reconciling));
        assert!(!Diverged.can_transition_to(Succeeded));
        assert!(!Reconciling.can_transition_to(Succeeded));
        assert!(!Succeeded.can_transition_to(Attempting));
        assert!(!Failed.can_transition_to(Attempting));

        assert!(Succeeded.is_terminal());
        assert!(Failed.is_terminal());
        assert!(!Reconciling.is_terminal());
    }

    #[test]
    fn test_accepted_first_try() {
        let backend = ScriptedBackend::new().script_pushes(vec![PushOutcome::Accepted]);
        let config = quick_config();
        let mut log = OperationLog::new();

        let report = PushProtocol::new(&backend, &config)
            .run(&checkout(), "origin", "work", &mut log)
            .unwrap();

        assert_eq!(report.attempts, 1);
        assert!(!report.reconciled);
        assert!(!report.forced);
        assert_eq!(log.len(), 1);
        assert_eq!(log.get(0).unwrap().outcome, OperationOutcome::Success);
    }

    #[test]
    fn test_diverged_twice_then_accepted() {
        let backend = ScriptedBackend::new().script_pushes(vec![
            PushOutcome::Diverged,
            PushOutcome::Diverged,
            PushOutcome::Accepted,
        ]);
        let config = quick_config();
        let mut log = OperationLog::new();

        let report = PushProtocol::new(&backend, &config)
            .run(&checkout(), "origin", "work", &mut log)
            .unwrap();

        assert_eq!(report.attempts, 3);
        assert!(report.reconciled);
        assert!(!report.forced);

        // One record per attempt: two retried, then the acceptance.
        let outcomes: Vec<OperationOutcome> = log.iter().map(|r| r.outcome).collect();
        assert_eq!(
            outcomes,
            vec![
                OperationOutcome::Retried,
                OperationOutcome::Retried,
                OperationOutcome::Success
            ]
        );

        let calls = backend.calls();
        assert_eq!(calls.iter().filter(|c| c.starts_with("fetch")).count(), 2);
        assert_eq!(calls.iter().filter(|c| c.starts_with("rebase")).count(), 2);
    }

    #[test]
    fn test_budget_exhausted() {
        let backend = ScriptedBackend::new().script_pushes(vec![
            PushOutcome::Diverged,
            PushOutcome::Diverged,
            PushOutcome::Diverged,
        ]);
        let config = quick_config();
        let mut log = OperationLog::new();

        let err = PushProtocol::new(&backend, &config)
            .run(&checkout(), "origin", "work", &mut log)
            .unwrap_err();

        match err {
            Error::Push { attempts, .. } => assert_eq!(attempts, 3),
            other => panic!("unexpected error: {:?}", other),
        }

        let outcomes: Vec<OperationOutcome> = log.iter().map(|r| r.outcome).collect();
        assert_eq!(
            outcomes,
            vec![
                OperationOutcome::Retried,
                OperationOutcome::Retried,
                OperationOutcome::Failure
            ]
        );
        // The third divergence exhausts the budget without reconciling again.
        assert_eq!(
            backend
                .calls()
                .iter()
                .filter(|c| c.starts_with("push"))
                .count(),
            3
        );
    }

    #[test]
    fn test_hard_rejection_not_retried() {
        let backend = ScriptedBackend::new()
            .script_pushes(vec![PushOutcome::Rejected("permission denied".to_string())]);
        let config = quick_config();
        let mut log = OperationLog::new();

        let err = PushProtocol::new(&backend, &config)
            .run(&checkout(), "origin", "work", &mut log)
            .unwrap_err();

        match err {
            Error::Push {
                attempts,
                last_reason,
                ..
            } => {
                assert_eq!(attempts, 1);
                assert!(last_reason.contains("permission denied"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(
            backend
                .calls()
                .iter()
                .filter(|c| c.starts_with("push"))
                .count(),
            1
        );
    }

    #[test]
    fn test_conflicts_fail_the_push() {
        let backend = ScriptedBackend::new()
            .script_pushes(vec![PushOutcome::Diverged])
            .script_reconciles(vec![ReconcileOutcome::Conflicts(vec![PathBuf::from(
                "shared.txt",
            )])]);
        let config = quick_config();
        let mut log = OperationLog::new();

        let err = PushProtocol::new(&backend, &config)
            .run(&checkout(), "origin", "work", &mut log)
            .unwrap_err();

        match err {
            Error::Conflict { paths, .. } => {
                assert_eq!(paths, vec![PathBuf::from("shared.txt")])
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(log.latest().unwrap().outcome, OperationOutcome::Failure);
        assert!(log.latest().unwrap().detail.contains("conflict"));
    }

    #[test]
    fn test_merge_strategy() {
        let backend = ScriptedBackend::new()
            .script_pushes(vec![PushOutcome::Diverged, PushOutcome::Accepted]);
        let config = PushConfig {
            strategy: ReconcileStrategy::Merge,
            backoff: Duration::ZERO,
            ..Default::default()
        };
        let mut log = OperationLog::new();

        PushProtocol::new(&backend, &config)
            .run(&checkout(), "origin", "work", &mut log)
            .unwrap();

        let calls = backend.calls();
        assert!(calls.iter().any(|c| c == "merge FETCH_HEAD"));
        assert!(!calls.iter().any(|c| c.starts_with("rebase")));
    }

    #[test]
    fn test_force_with_lease_strategy() {
        let backend = ScriptedBackend::new()
            .script_pushes(vec![PushOutcome::Diverged, PushOutcome::Accepted]);
        let config = PushConfig {
            strategy: ReconcileStrategy::ForceWithLease,
            backoff: Duration::ZERO,
            ..Default::default()
        };
        let mut log = OperationLog::new();

        let report = PushProtocol::new(&backend, &config)
            .run(&checkout(), "origin", "work", &mut log)
            .unwrap();

        assert!(report.forced);
        let calls = backend.calls();
        // First push is never forced; the lease covers the retry only.
        assert_eq!(calls[0], "push origin work");
        assert!(calls.iter().any(|c| c.contains("lease=")));
        assert!(!calls.iter().any(|c| c.starts_with("rebase")));
        assert!(!calls.iter().any(|c| c.starts_with("merge")));
    }

    #[test]
    fn test_default_strategy_never_forces() {
        let backend = ScriptedBackend::new()
            .script_pushes(vec![PushOutcome::Diverged, PushOutcome::Accepted]);
        let config = quick_config();
        let mut log = OperationLog::new();

        let report = PushProtocol::new(&backend, &config)
            .run(&checkout(), "origin", "work", &mut log)
            .unwrap();

        assert!(!report.forced);
        assert!(!backend.calls().iter().any(|c| c.contains("lease=")));
    }

    #[test]
    fn test_cancelled_mid_retry_stops_the_loop() {
        let token = CancelToken::new();
        let backend = ScriptedBackend::new()
            .script_pushes(vec![PushOutcome::Diverged, PushOutcome::Accepted])
            .cancel_on_push(&token);
        let config = quick_config();
        let mut log = OperationLog::new();

        let err = PushProtocol::new(&backend, &config)
            .with_cancel(&token)
            .run(&checkout(), "origin", "work", &mut log)
            .unwrap_err();

        assert!(matches!(err, Error::Cancelled(_)));
        // The divergence was observed, but nothing ran after the signal.
        assert_eq!(backend.calls(), vec!["push origin work".to_string()]);
        let outcomes: Vec<OperationOutcome> = log.iter().map(|r| r.outcome).collect();
        assert_eq!(
            outcomes,
            vec![OperationOutcome::Retried, OperationOutcome::Failure]
        );
    }

    #[test]
    fn test_cancelled_before_first_attempt() {
        let backend = ScriptedBackend::new();
        let config = quick_config();
        let token = CancelToken::new();
        token.cancel();
        let mut log = OperationLog::new();

        let err = PushProtocol::new(&backend, &config)
            .with_cancel(&token)
            .run(&checkout(), "origin", "work", &mut log)
            .unwrap_err();

        assert!(matches!(err, Error::Cancelled(_)));
        assert!(backend.calls().is_empty());
        // Cancellation still leaves a trace in the log.
        assert_eq!(log.len(), 1);
        assert!(log.latest().unwrap().detail.contains("cancelled"));
    }
}
