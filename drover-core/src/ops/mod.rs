//! Orchestration: the agent, its operation log, and the machinery the
//! operations are built from

pub mod agent;
pub mod cancel;
pub mod log;
pub mod naming;
pub mod push;
pub mod state;

pub use agent::OperationsAgent;
pub use cancel::CancelToken;
pub use log::{OperationKind, OperationLog, OperationOutcome, OperationRecord};
pub use naming::{BranchNamer, SuffixPolicy};
pub use push::{PushPhase, PushProtocol, PushReport};
pub use state::{RepositoryState, StatusSnapshot};
