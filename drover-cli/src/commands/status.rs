//! Status command - inspect a checkout

use std::path::PathBuf;

use clap::Args;
use drover_core::{Config, OperationLog, OperationsAgent, StatusSnapshot};

use crate::commands::resolve_checkout;

/// Show the status of a checkout
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Checkout to inspect (defaults to the current directory)
    #[arg(short, long)]
    pub repo: Option<PathBuf>,

    /// Emit machine-readable JSON
    #[arg(long)]
    pub json: bool,
}

impl StatusArgs {
    /// Execute the status command
    pub async fn execute(&self, verbose: bool, config: &Config) -> anyhow::Result<()> {
        let checkout = resolve_checkout(self.repo.clone())?;
        let oplog = OperationLog::default_path(&checkout);

        let mut agent =
            OperationsAgent::new(config.clone()).with_log(OperationLog::load(&oplog)?);

        // Status must work on anything, so a failed attach is reported as
        // an uninitialized checkout instead of an error.
        let snapshot = match agent.attach(&checkout) {
            Ok(_) => {
                let result = agent.status();
                agent.log().save(&oplog)?;
                result?
            }
            Err(_) => StatusSnapshot::Uninitialized {
                location: Some(checkout.clone()),
            },
        };

        if self.json {
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
            return Ok(());
        }

        match &snapshot {
            StatusSnapshot::Ready {
                location,
                branch,
                files,
                branches,
                remote_url,
            } => {
                println!("Checkout: {}", location.display());
                println!("  branch: {}", branch.as_deref().unwrap_or("(detached)"));
                if !branches.is_empty() {
                    println!("  branches: {}", branches.join(", "));
                }
                if let Some(url) = remote_url {
                    println!("  remote: {} ({})", config.remote, url);
                }
                println!("  tree: {}", files.summary());
                if verbose {
                    for path in &files.staged {
                        println!("    staged: {}", path.display());
                    }
                    for path in &files.modified {
                        println!("    modified: {}", path.display());
                    }
                    for path in &files.untracked {
                        println!("    untracked: {}", path.display());
                    }
                }
            }
            StatusSnapshot::Uninitialized { location } => match location {
                Some(location) => println!("No repository at {}", location.display()),
                None => println!("No repository attached."),
            },
        }
        Ok(())
    }
}
