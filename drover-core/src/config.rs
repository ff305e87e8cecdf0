//! Configuration management for drover
//!
//! Configuration is loaded with the following priority (highest to lowest):
//! 1. CLI flags
//! 2. Environment variables (DROVER_*)
//! 3. Config file (~/.config/drover/config.toml)
//! 4. Default values

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// How a diverged branch is reconciled with its remote before a push retry
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReconcileStrategy {
    /// Rebase the local branch onto the fetched remote tip
    #[default]
    Rebase,
    /// Merge the fetched remote tip into the local branch
    Merge,
    /// Retry the push with --force-with-lease against the fetched tip.
    /// A last resort for branches the agent owns outright; never the default.
    ForceWithLease,
}

impl ReconcileStrategy {
    /// Get the short name for this strategy
    pub fn name(&self) -> &'static str {
        match self {
            ReconcileStrategy::Rebase => "rebase",
            ReconcileStrategy::Merge => "merge",
            ReconcileStrategy::ForceWithLease => "force-with-lease",
        }
    }
}

impl std::fmt::Display for ReconcileStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for ReconcileStrategy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "rebase" => Ok(ReconcileStrategy::Rebase),
            "merge" => Ok(ReconcileStrategy::Merge),
            "force-with-lease" | "lease" => Ok(ReconcileStrategy::ForceWithLease),
            _ => Err(format!(
                "Unknown reconcile strategy: {} (expected rebase, merge, or force-with-lease)",
                s
            )),
        }
    }
}

/// Suffix style used when a branch base name collides
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SuffixStyle {
    /// `base-2`, `base-3`, ...
    #[default]
    Numeric,
    /// `base-YYYYMMDD`, then `base-YYYYMMDD-2`, ...
    Dated,
}

/// Push retry protocol configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PushConfig {
    /// Total number of push attempts before giving up
    pub max_attempts: u32,

    /// Wait between a reconciliation and the next push attempt
    #[serde(with = "humantime_serde")]
    pub backoff: Duration,

    /// Strategy used to reconcile a diverged branch
    pub strategy: ReconcileStrategy,
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_millis(500),
            strategy: ReconcileStrategy::default(),
        }
    }
}

/// Branch naming configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct NamingConfig {
    /// Highest numeric suffix tried before the search fails
    pub max_suffix: u32,

    /// Suffix style for colliding base names
    pub suffix: SuffixStyle,
}

impl Default for NamingConfig {
    fn default() -> Self {
        Self {
            max_suffix: 1000,
            suffix: SuffixStyle::default(),
        }
    }
}

/// Commit identity for unattended use
///
/// When unset, commits rely on the checkout's own git configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct CommitConfig {
    /// Author/committer name passed to the git tool
    pub author_name: Option<String>,

    /// Author/committer email passed to the git tool
    pub author_email: Option<String>,
}

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Remote that pushes and fetches target
    pub remote: RemoteName,

    /// Directory new checkouts are placed under when the caller gives no
    /// destination (defaults to ~/.cache/drover/checkouts)
    pub checkout_dir: Option<PathBuf>,

    /// Push retry protocol settings
    pub push: PushConfig,

    /// Branch naming settings
    pub naming: NamingConfig,

    /// Commit identity settings
    pub commit: CommitConfig,
}

/// Newtype wrapper so the remote name can default to "origin" under
/// `#[serde(default)]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RemoteName(pub String);

impl Default for RemoteName {
    fn default() -> Self {
        Self("origin".to_string())
    }
}

impl RemoteName {
    /// Get the remote name as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RemoteName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Config {
    /// Load configuration from the default config file location
    ///
    /// Returns default config if file doesn't exist
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path();

        if let Some(path) = config_path {
            if path.exists() {
                return Self::load_from_file(&path);
            }
        }

        Ok(Self::default())
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: &PathBuf) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(Error::Io)?;
        toml::from_str(&contents)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))
    }

    /// Get the default config file path
    ///
    /// Returns `~/.config/drover/config.toml` on Unix
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("drover").join("config.toml"))
    }

    /// Apply environment variable overrides
    ///
    /// Supported variables:
    /// - DROVER_REMOTE: remote name to push/fetch
    /// - DROVER_STRATEGY: reconcile strategy (rebase, merge, force-with-lease)
    /// - DROVER_MAX_ATTEMPTS: push retry budget
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(remote) = std::env::var("DROVER_REMOTE") {
            self.remote = RemoteName(remote);
        }

        if let Ok(strategy) = std::env::var("DROVER_STRATEGY") {
            match strategy.parse() {
                Ok(s) => self.push.strategy = s,
                Err(e) => tracing::warn!("Ignoring DROVER_STRATEGY: {}", e),
            }
        }

        if let Ok(attempts) = std::env::var("DROVER_MAX_ATTEMPTS") {
            match attempts.parse() {
                Ok(n) => self.push.max_attempts = n,
                Err(e) => tracing::warn!("Ignoring DROVER_MAX_ATTEMPTS: {}", e),
            }
        }

        self
    }

    /// Apply CLI flag overrides
    pub fn with_cli_overrides(
        mut self,
        remote: Option<String>,
        strategy: Option<ReconcileStrategy>,
        max_attempts: Option<u32>,
    ) -> Self {
        if let Some(r) = remote {
            self.remote = RemoteName(r);
        }

        if let Some(s) = strategy {
            self.push.strategy = s;
        }

        if let Some(n) = max_attempts {
            self.push.max_attempts = n;
        }

        self
    }

    /// Load configuration with all overrides applied
    ///
    /// Priority: CLI > env > config file > defaults
    pub fn load_with_overrides(
        remote: Option<String>,
        strategy: Option<ReconcileStrategy>,
        max_attempts: Option<u32>,
    ) -> Result<Self> {
        Ok(Self::load()?
            .with_env_overrides()
            .with_cli_overrides(remote, strategy, max_attempts))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.remote.as_str(), "origin");
        assert_eq!(config.push.max_attempts, 3);
        assert_eq!(config.push.backoff, Duration::from_millis(500));
        assert_eq!(config.push.strategy, ReconcileStrategy::Rebase);
        assert_eq!(config.naming.max_suffix, 1000);
        assert!(config.commit.author_name.is_none());
    }

    #[test]
    fn test_cli_overrides() {
        let config = Config::default().with_cli_overrides(
            Some("upstream".to_string()),
            Some(ReconcileStrategy::Merge),
            Some(5),
        );

        assert_eq!(config.remote.as_str(), "upstream");
        assert_eq!(config.push.strategy, ReconcileStrategy::Merge);
        assert_eq!(config.push.max_attempts, 5);
    }

    #[test]
    fn test_parse_toml() {
        let toml = r#"
remote = "upstream"

[push]
max_attempts = 5
backoff = "2s"
strategy = "merge"

[commit]
author_name = "drover bot"
author_email = "bot@example.com"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.remote.as_str(), "upstream");
        assert_eq!(config.push.max_attempts, 5);
        assert_eq!(config.push.backoff, Duration::from_secs(2));
        assert_eq!(config.push.strategy, ReconcileStrategy::Merge);
        assert_eq!(config.commit.author_name.as_deref(), Some("drover bot"));
    }

    #[test]
    fn test_partial_toml() {
        let toml = r#"
[push]
strategy = "force-with-lease"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        // Everything else should use defaults
        assert_eq!(config.remote.as_str(), "origin");
        assert_eq!(config.push.max_attempts, 3);
        assert_eq!(config.push.strategy, ReconcileStrategy::ForceWithLease);
        assert_eq!(config.naming.suffix, SuffixStyle::Numeric);
    }

    #[test]
    fn test_strategy_from_str() {
        assert_eq!(
            "rebase".parse::<ReconcileStrategy>().unwrap(),
            ReconcileStrategy::Rebase
        );
        assert_eq!(
            "merge".parse::<ReconcileStrategy>().unwrap(),
            ReconcileStrategy::Merge
        );
        assert_eq!(
            "force-with-lease".parse::<ReconcileStrategy>().unwrap(),
            ReconcileStrategy::ForceWithLease
        );
        assert!("overwrite".parse::<ReconcileStrategy>().is_err());
    }

    #[test]
    fn test_strategy_display() {
        assert_eq!(ReconcileStrategy::Rebase.to_string(), "rebase");
        assert_eq!(
            ReconcileStrategy::ForceWithLease.to_string(),
            "force-with-lease"
        );
    }
}
