//! Commit command - stage and commit working tree changes

use std::path::PathBuf;

use clap::Args;
use drover_core::{Config, OperationLog, OperationsAgent};

use crate::commands::resolve_checkout;

/// Stage changes and commit them
#[derive(Args, Debug)]
pub struct CommitArgs {
    /// Commit message
    #[arg(short, long)]
    pub message: String,

    /// Limit the commit to these paths (stages everything when empty)
    pub paths: Vec<PathBuf>,

    /// Checkout to operate on (defaults to the current directory)
    #[arg(short, long)]
    pub repo: Option<PathBuf>,
}

impl CommitArgs {
    /// Execute the commit command
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let checkout = resolve_checkout(self.repo.clone())?;
        let oplog = OperationLog::default_path(&checkout);

        let mut agent =
            OperationsAgent::new(config.clone()).with_log(OperationLog::load(&oplog)?);
        agent.attach(&checkout)?;

        let result = if self.paths.is_empty() {
            agent.commit_changes(&self.message)
        } else {
            agent.commit_paths(&self.message, &self.paths)
        };
        agent.log().save(&oplog)?;

        match result? {
            Some(id) => {
                let short = id.get(..8).unwrap_or(id.as_str());
                println!("Committed {}", short);
            }
            None => println!("Nothing to commit."),
        }
        Ok(())
    }
}
