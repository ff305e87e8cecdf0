//! Branch command - create a collision-free branch

use std::path::PathBuf;

use clap::Args;
use drover_core::{Config, OperationLog, OperationsAgent};

use crate::commands::resolve_checkout;

/// Create and switch to a branch whose name will not collide
#[derive(Args, Debug)]
pub struct BranchArgs {
    /// Desired branch name; a numeric suffix is added on collision
    pub name: String,

    /// Base branch to create from (defaults to the current branch)
    #[arg(short, long)]
    pub from: Option<String>,

    /// Checkout to operate on (defaults to the current directory)
    #[arg(short, long)]
    pub repo: Option<PathBuf>,
}

impl BranchArgs {
    /// Execute the branch command
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let checkout = resolve_checkout(self.repo.clone())?;
        let oplog = OperationLog::default_path(&checkout);

        let mut agent =
            OperationsAgent::new(config.clone()).with_log(OperationLog::load(&oplog)?);
        agent.attach(&checkout)?;

        let result = match &self.from {
            Some(from) => agent.create_unique_branch_from(&self.name, from),
            None => agent.create_unique_branch(&self.name),
        };
        agent.log().save(&oplog)?;

        let name = result?;
        println!("Created branch {}", name);
        Ok(())
    }
}
