//! Append-only record of what the agent has done
//!
//! Every orchestrated operation appends at least one record, including the
//! ones that fail or get retried. Records are never edited after the fact;
//! auditing a bot run means replaying this log in order.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Category of a recorded operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    /// Cloning a remote repository into a local checkout
    Clone,
    /// Creating and switching to a branch
    CreateBranch,
    /// Committing working tree changes
    Commit,
    /// Pushing a branch to a remote
    Push,
    /// Inspecting checkout state
    Status,
}

impl OperationKind {
    /// Short name for display and filtering
    pub fn name(&self) -> &'static str {
        match self {
            Self::Clone => "clone",
            Self::CreateBranch => "create-branch",
            Self::Commit => "commit",
            Self::Push => "push",
            Self::Status => "status",
        }
    }
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for OperationKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "clone" => Ok(Self::Clone),
            "create-branch" | "branch" => Ok(Self::CreateBranch),
            "commit" => Ok(Self::Commit),
            "push" => Ok(Self::Push),
            "status" => Ok(Self::Status),
            _ => Err(Error::State(format!("Unknown operation kind: {}", s))),
        }
    }
}

/// How a recorded operation ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationOutcome {
    /// The operation completed
    Success,
    /// The operation failed and was not retried further
    Failure,
    /// The attempt failed but the operation was retried
    Retried,
}

impl OperationOutcome {
    /// Short name for display and filtering
    pub fn name(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failure => "failure",
            Self::Retried => "retried",
        }
    }
}

impl std::fmt::Display for OperationOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for OperationOutcome {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "success" => Ok(Self::Success),
            "failure" => Ok(Self::Failure),
            "retried" => Ok(Self::Retried),
            _ => Err(Error::State(format!("Unknown outcome: {}", s))),
        }
    }
}

/// A single logged operation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationRecord {
    /// What was attempted
    pub kind: OperationKind,
    /// When the record was appended
    pub timestamp: DateTime<Utc>,
    /// How it ended
    pub outcome: OperationOutcome,
    /// Human-readable context (branch names, commit ids, failure reasons)
    pub detail: String,
}

impl OperationRecord {
    /// Create a record stamped with the current time
    pub fn new(
        kind: OperationKind,
        outcome: OperationOutcome,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            timestamp: Utc::now(),
            outcome,
            detail: detail.into(),
        }
    }
}

/// Ordered, append-only collection of operation records
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OperationLog {
    records: Vec<OperationRecord>,
}

impl OperationLog {
    /// Create an empty log
    pub fn new() -> Self {
        Self::default()
    }

    /// Conventional on-disk location of a checkout's log, inside its git
    /// directory so it never dirties the working tree
    pub fn default_path(checkout: &Path) -> PathBuf {
        checkout.join(".git").join("drover").join("oplog.jsonl")
    }

    /// Append a record, returning its index
    ///
    /// Appending cannot fail; cancellation and failure paths rely on being
    /// able to leave a trace unconditionally.
    pub fn append(&mut self, record: OperationRecord) -> usize {
        self.records.push(record);
        self.records.len() - 1
    }

    /// Append a freshly stamped record, returning its index
    pub fn record(
        &mut self,
        kind: OperationKind,
        outcome: OperationOutcome,
        detail: impl Into<String>,
    ) -> usize {
        self.append(OperationRecord::new(kind, outcome, detail))
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the log has no records
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Record at `index`, if present
    pub fn get(&self, index: usize) -> Option<&OperationRecord> {
        self.records.get(index)
    }

    /// Most recently appended record
    pub fn latest(&self) -> Option<&OperationRecord> {
        self.records.last()
    }

    /// All records in insertion order
    pub fn iter(&self) -> std::slice::Iter<'_, OperationRecord> {
        self.records.iter()
    }

    /// Records of the given kind, in insertion order
    pub fn by_kind(&self, kind: OperationKind) -> Vec<&OperationRecord> {
        self.records.iter().filter(|r| r.kind == kind).collect()
    }

    /// Records with the given outcome, in insertion order
    pub fn by_outcome(&self, outcome: OperationOutcome) -> Vec<&OperationRecord> {
        self.records.iter().filter(|r| r.outcome == outcome).collect()
    }

    /// Write the log as JSON lines, creating parent directories as needed
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut out = String::new();
        for record in &self.records {
            out.push_str(&serde_json::to_string(record)?);
            out.push('\n');
        }
        std::fs::write(path, out)?;
        Ok(())
    }

    /// Load a log saved with [`OperationLog::save`]
    ///
    /// A missing file is an empty log, not an error.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self::new());
            }
            Err(e) => return Err(e.into()),
        };

        let mut log = Self::new();
        for line in contents.lines() {
            if line.trim().is_empty() {
                continue;
            }
            log.records.push(serde_json::from_str(line)?);
        }
        Ok(log)
    }
}
