//! Publish transports
//!
//! A transport moves an [`ArtifactSet`] onto the hosting service. Two
//! strategies share the interface:
//!
//! - [`WorkingCopyTransport`] stages files in a local git checkout and pushes
//! - [`DirectApiTransport`] commits through the hosting service's API, with
//!   no local tool
//!
//! Both skip the commit when the published files already match, and report
//! the existing head commit instead.

use async_trait::async_trait;
use ship_core::{ArtifactSet, Result, TransportStrategy};

mod direct_api;
mod working_copy;

pub use direct_api::DirectApiTransport;
pub use working_copy::WorkingCopyTransport;

/// How [`PublishTransport::prepare`] initialises a repository's state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkspaceMode {
    /// No remote exists yet; start empty
    Fresh,
    /// Start from the remote's current contents
    Clone,
}

/// Result of a commit attempt
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommitOutcome {
    /// Commit that now holds the published files. `None` only after a
    /// `create` whose commit has not been delivered yet.
    pub commit_id: Option<String>,
    /// Whether this attempt produced a new commit
    pub changed: bool,
}

impl CommitOutcome {
    pub fn new_commit(commit_id: impl Into<String>) -> Self {
        Self {
            commit_id: Some(commit_id.into()),
            changed: true,
        }
    }

    pub fn unchanged(commit_id: impl Into<String>) -> Self {
        Self {
            commit_id: Some(commit_id.into()),
            changed: false,
        }
    }

    /// A commit held locally, awaiting `push`
    pub fn pending() -> Self {
        Self {
            commit_id: None,
            changed: true,
        }
    }
}

/// Moves artifact sets between the orchestrator and the hosting service
#[async_trait]
pub trait PublishTransport: Send + Sync {
    fn strategy(&self) -> TransportStrategy;

    /// Reset per-repository state before a run uses it
    async fn prepare(&self, repo: &str, mode: WorkspaceMode) -> Result<()>;

    /// Current published content of a file, `None` when it does not exist
    async fn fetch(&self, repo: &str, name: &str) -> Result<Option<String>>;

    /// Record the first contents of a repository that is about to be created
    async fn create(&self, repo: &str, files: &ArtifactSet, message: &str)
        -> Result<CommitOutcome>;

    /// Deliver what `create` recorded to the newly provisioned remote
    async fn push(&self, repo: &str) -> Result<CommitOutcome>;

    /// Publish a new version of an existing repository
    async fn update(&self, repo: &str, files: &ArtifactSet, message: &str)
        -> Result<CommitOutcome>;

    /// Drop local state for the repository
    async fn release(&self, repo: &str) -> Result<()>;
}
