//! Drover CLI - Command line interface for the drover git operations agent
//!
//! Clone, branch, commit, and push for unattended automation, with every
//! operation recorded in a per-checkout log.

mod commands;

use clap::{Parser, Subcommand};
use drover_core::config::ReconcileStrategy;
use drover_core::Config;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use commands::{BranchArgs, CloneArgs, CommitArgs, LogArgs, PushArgs, StatusArgs};

/// Drover: git operations for unattended automation
#[derive(Parser, Debug)]
#[command(name = "drover")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Remote to push and fetch (overrides config and env)
    #[arg(long, global = true, env = "DROVER_REMOTE")]
    remote: Option<String>,

    /// Strategy for diverged pushes: rebase, merge, or force-with-lease
    #[arg(long, global = true, env = "DROVER_STRATEGY")]
    strategy: Option<ReconcileStrategy>,

    /// Push attempt budget (overrides config and env)
    #[arg(long, global = true, env = "DROVER_MAX_ATTEMPTS")]
    max_attempts: Option<u32>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show version information
    Version,

    /// Clone a repository into a managed checkout
    Clone(CloneArgs),

    /// Create and switch to a collision-free branch
    #[command(visible_alias = "br")]
    Branch(BranchArgs),

    /// Stage and commit working tree changes
    #[command(visible_alias = "ci")]
    Commit(CommitArgs),

    /// Push a branch, retrying through divergence
    Push(PushArgs),

    /// Show checkout status
    #[command(visible_alias = "st")]
    Status(StatusArgs),

    /// Show recorded operations for a checkout
    Log(LogArgs),

    /// Show current configuration
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    if cli.verbose {
        tracing::info!("Verbose mode enabled");
    }

    // Load configuration with overrides
    let config = Config::load_with_overrides(cli.remote.clone(), cli.strategy, cli.max_attempts)?;

    if cli.verbose {
        tracing::info!(
            remote = %config.remote,
            strategy = %config.push.strategy,
            max_attempts = config.push.max_attempts,
            "Configuration loaded"
        );
    }

    match cli.command {
        Some(Commands::Version) => {
            println!("drover {}", env!("CARGO_PKG_VERSION"));
        }
        Some(Commands::Clone(args)) => {
            args.execute(&config).await?;
        }
        Some(Commands::Branch(args)) => {
            args.execute(&config).await?;
        }
        Some(Commands::Commit(args)) => {
            args.execute(&config).await?;
        }
        Some(Commands::Push(args)) => {
            args.execute(&config).await?;
        }
        Some(Commands::Status(args)) => {
            args.execute(cli.verbose, &config).await?;
        }
        Some(Commands::Log(args)) => {
            args.execute().await?;
        }
        Some(Commands::Config) => {
            println!("Drover Configuration");
            println!("====================");
            println!();
            println!("Push Settings:");
            println!("  remote: {}", config.remote);
            println!("  strategy: {}", config.push.strategy);
            println!("  max_attempts: {}", config.push.max_attempts);
            println!("  backoff: {:?}", config.push.backoff);
            println!();
            println!("Branch Naming:");
            println!("  suffix: {:?}", config.naming.suffix);
            println!("  max_suffix: {}", config.naming.max_suffix);
            println!();
            if let Some(path) = Config::default_config_path() {
                println!("Config file: {}", path.display());
                if path.exists() {
                    println!("  (exists)");
                } else {
                    println!("  (not found - using defaults)");
                }
            }
        }
        None => {
            println!("Drover - git operations for unattended automation");
            println!();
            println!("Use --help for usage information");
        }
    }

    Ok(())
}
