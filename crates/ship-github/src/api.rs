//! Hosting service seams

use async_trait::async_trait;
use ship_core::Result;

use crate::types::{CommitFiles, PagesStatus, PutFile, RemoteFile, RepoHandle, Visibility};

/// File-level access to a repository's default branch
#[async_trait]
pub trait ContentApi: Send + Sync {
    /// Read a file. `Ok(None)` means the file does not exist.
    async fn get_file(&self, repo: &str, path: &str, branch: &str) -> Result<Option<RemoteFile>>;

    /// Create or replace a file, returning the resulting commit hash.
    ///
    /// Replacing requires `sha` to match the current blob hash; a stale or
    /// missing hash fails with `ShipError::TransportConflict`.
    async fn put_file(&self, repo: &str, path: &str, file: PutFile) -> Result<String>;

    /// Write every file in `commit` as one commit whose parent is
    /// `commit.parent`, returning its hash.
    ///
    /// The branch is moved without forcing. If it no longer points at the
    /// parent, nothing becomes visible and the call fails with
    /// `ShipError::TransportConflict`. Not available on a repository
    /// without commits.
    async fn commit_files(&self, repo: &str, commit: CommitFiles) -> Result<String>;
}

/// Repository lifecycle operations
#[async_trait]
pub trait HostingApi: Send + Sync {
    async fn repository_exists(&self, repo: &str) -> Result<bool>;

    /// Create a repository. An existing repository of the same name is
    /// returned as-is with `created == false`.
    async fn create_repository(&self, repo: &str, visibility: Visibility) -> Result<RepoHandle>;

    async fn enable_pages(&self, repo: &str, branch: &str, path: &str) -> Result<PagesStatus>;

    /// Hash of the branch head, `None` for an empty repository
    async fn head_commit(&self, repo: &str, branch: &str) -> Result<Option<String>>;
}
