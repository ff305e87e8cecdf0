//! Log command - show recorded operations for a checkout

use std::path::PathBuf;

use clap::Args;
use drover_core::ops::{OperationKind, OperationOutcome};
use drover_core::OperationLog;

use crate::commands::resolve_checkout;

/// Show the operation log for a checkout
#[derive(Args, Debug)]
pub struct LogArgs {
    /// Checkout to read (defaults to the current directory)
    #[arg(short, long)]
    pub repo: Option<PathBuf>,

    /// Only show this kind (clone, create-branch, commit, push, status)
    #[arg(short, long)]
    pub kind: Option<OperationKind>,

    /// Only show this outcome (success, failure, retried)
    #[arg(short, long)]
    pub outcome: Option<OperationOutcome>,

    /// Show only the last N records
    #[arg(short = 'n', long)]
    pub limit: Option<usize>,
}

impl LogArgs {
    /// Execute the log command
    pub async fn execute(&self) -> anyhow::Result<()> {
        let checkout = resolve_checkout(self.repo.clone())?;
        let log = OperationLog::load(&OperationLog::default_path(&checkout))?;

        let records: Vec<_> = log
            .iter()
            .filter(|r| self.kind.map_or(true, |k| r.kind == k))
            .filter(|r| self.outcome.map_or(true, |o| r.outcome == o))
            .collect();

        if records.is_empty() {
            println!("No recorded operations.");
            return Ok(());
        }

        let skip = self.limit.map_or(0, |n| records.len().saturating_sub(n));
        for record in &records[skip..] {
            let stamp = record.timestamp.with_timezone(&chrono::Local);
            println!(
                "{}  {:<13} {:<8} {}",
                stamp.format("%Y-%m-%d %H:%M:%S"),
                record.kind,
                record.outcome,
                record.detail
            );
        }
        Ok(())
    }
}
