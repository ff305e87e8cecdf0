//! Git plumbing: the backend seam, its command-line implementation, and
//! clone source parsing

pub mod backend;
pub mod command;
#[cfg(test)]
pub(crate) mod scripted;
pub mod url;

pub use backend::{
    CheckoutStatus, CommitAuthor, CommitOutcome, GitBackend, PushMode, PushOutcome,
    ReconcileOutcome,
};
pub use command::CommandBackend;
pub use url::{default_checkout_dir, derive_checkout_name, RepoUrl};
