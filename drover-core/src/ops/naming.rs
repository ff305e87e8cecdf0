//! Deterministic, collision-free branch naming
//!
//! Unattended runs cannot stop to ask what a branch should be called when
//! the desired name is taken. The namer sanitizes the requested name into a
//! valid git ref component and walks a fixed suffix sequence until it finds
//! one that no existing branch uses.

use std::collections::BTreeSet;

use chrono::Utc;

use crate::config::{NamingConfig, SuffixStyle};
use crate::{Error, Result};

/// How colliding names are suffixed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SuffixPolicy {
    /// `name`, `name-2`, `name-3`, ...
    Numeric,
    /// `name-<stamp>`, `name-<stamp>-2`, ...
    Dated {
        /// Stamp inserted before numeric suffixes (normally `YYYYMMDD`)
        stamp: String,
    },
}

/// Produces branch names that are valid refs and absent from a branch set
///
/// Given the same desired name and the same existing branches, the namer
/// always returns the same result.
#[derive(Debug, Clone)]
pub struct BranchNamer {
    policy: SuffixPolicy,
    max_suffix: u32,
}

impl Default for BranchNamer {
    fn default() -> Self {
        Self::new()
    }
}

impl BranchNamer {
    /// Namer with numeric suffixes and the default search bound
    pub fn new() -> Self {
        Self {
            policy: SuffixPolicy::Numeric,
            max_suffix: NamingConfig::default().max_suffix,
        }
    }

    /// Build a namer from configuration
    ///
    /// Dated suffixes stamp candidates with today's UTC date.
    pub fn from_config(config: &NamingConfig) -> Self {
        let policy = match config.suffix {
            SuffixStyle::Numeric => SuffixPolicy::Numeric,
            SuffixStyle::Dated => SuffixPolicy::Dated {
                stamp: Utc::now().format("%Y%m%d").to_string(),
            },
        };
        Self {
            policy,
            max_suffix: config.max_suffix,
        }
    }

    /// Override the suffix policy
    pub fn with_policy(mut self, policy: SuffixPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Override the highest suffix tried before giving up
    pub fn with_max_suffix(mut self, max_suffix: u32) -> Self {
        self.max_suffix = max_suffix;
        self
    }

    /// Reduce a requested name to a valid git ref component
    ///
    /// Whitespace becomes `-`, characters git refuses in ref names are
    /// dropped, and separator runs are collapsed. Returns an empty string
    /// when nothing usable remains.
    pub fn sanitize(name: &str) -> String {
        let mut out = String::with_capacity(name.len());
        for ch in name.trim().chars() {
            let mapped = if ch.is_whitespace() {
                Some('-')
            } else if ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '/' | '.') {
                Some(ch)
            } else {
                None
            };
            if let Some(ch) = mapped {
                if ch == '-' && out.ends_with('-') {
                    continue;
                }
                out.push(ch);
            }
        }

        while out.contains("..") {
            out = out.replace("..", ".");
        }
        while out.contains("//") {
            out = out.replace("//", "/");
        }
        while out.ends_with(".lock") {
            out.truncate(out.len() - ".lock".len());
        }

        out.trim_matches(|c| matches!(c, '-' | '.' | '/')).to_string()
    }

    /// Pick the first name in this policy's sequence not present in
    /// `existing`
    ///
    /// The desired name itself (stamped, for dated policies) is tried
    /// first; collisions then walk `-2`, `-3`, ... up to the configured
    /// bound.
    pub fn unique_name(&self, desired: &str, existing: &BTreeSet<String>) -> Result<String> {
        let base = Self::sanitize(desired);
        if base.is_empty() {
            return Err(Error::Naming(format!(
                "nothing usable remains of branch name {:?}",
                desired
            )));
        }

        let stem = match &self.policy {
            SuffixPolicy::Numeric => base,
            SuffixPolicy::Dated { stamp } => format!("{}-{}", base, stamp),
        };

        if !existing.contains(&stem) {
            return Ok(stem);
        }

        for n in 2..=self.max_suffix {
            let candidate = format!("{}-{}", stem, n);
            if !existing.contains(&candidate) {
                return Ok(candidate);
            }
        }

        Err(Error::Naming(format!(
            "no free name for {} within {} suffixes",
            stem, self.max_suffix
        )))
    }
}
