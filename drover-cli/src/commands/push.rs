//! Push command - push a branch, retrying through divergence

use std::path::PathBuf;

use clap::Args;
use drover_core::ops::CancelToken;
use drover_core::{Config, OperationLog, OperationsAgent};

use crate::commands::resolve_checkout;

/// Push a branch to the configured remote
///
/// When the remote has commits we lack, the push is retried after
/// reconciling, up to the configured attempt budget. Ctrl-C stops the retry
/// loop at the next attempt boundary.
#[derive(Args, Debug)]
pub struct PushArgs {
    /// Branch to push; must match the checked-out branch (defaults to it)
    pub branch: Option<String>,

    /// Checkout to operate on (defaults to the current directory)
    #[arg(short, long)]
    pub repo: Option<PathBuf>,
}

impl PushArgs {
    /// Execute the push command
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let checkout = resolve_checkout(self.repo.clone())?;
        let oplog = OperationLog::default_path(&checkout);

        let token = CancelToken::new();
        let handle = token.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                handle.cancel();
            }
        });

        let mut agent = OperationsAgent::new(config.clone())
            .with_log(OperationLog::load(&oplog)?)
            .with_cancel(&token);
        agent.attach(&checkout)?;

        let result = agent.push_branch(self.branch.as_deref());
        agent.log().save(&oplog)?;

        let report = result?;
        let branch = self
            .branch
            .clone()
            .or_else(|| agent.state().and_then(|s| s.current_branch.clone()))
            .unwrap_or_else(|| "HEAD".to_string());
        println!(
            "Pushed {} to {} in {} attempt(s)",
            branch, config.remote, report.attempts
        );
        Ok(())
    }
}
