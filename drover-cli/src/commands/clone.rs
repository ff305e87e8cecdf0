//! Clone command - create a new managed checkout

use std::path::PathBuf;

use clap::Args;
use drover_core::{Config, OperationLog, OperationsAgent};

/// Clone a repository into a managed checkout
#[derive(Args, Debug)]
pub struct CloneArgs {
    /// Repository to clone (URL, owner/repo shorthand, or local path)
    pub source: String,

    /// Destination directory (defaults to the configured checkout dir,
    /// named after the source)
    pub destination: Option<PathBuf>,

    /// Branch to check out instead of the remote default
    #[arg(short, long)]
    pub branch: Option<String>,
}

impl CloneArgs {
    /// Execute the clone command
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let mut agent = OperationsAgent::new(config.clone());
        let state = agent.clone_repository(
            &self.source,
            self.destination.clone(),
            self.branch.as_deref(),
        )?;

        let location = state.location.clone();
        let branch = state.current_branch.clone();
        println!("Cloned {} into {}", self.source, location.display());
        if let Some(branch) = branch {
            println!("  on branch {}", branch);
        }

        agent.log().save(&OperationLog::default_path(&location))?;
        Ok(())
    }
}
