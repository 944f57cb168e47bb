//! Request and response types for the hosting API

use serde::{Deserialize, Serialize};

/// Repository visibility
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Public,
    Private,
}

/// A repository known to the hosting service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoHandle {
    pub name: String,
    pub html_url: String,
    /// False when the repository already existed
    pub created: bool,
}

/// Outcome of a Pages enablement request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PagesStatus {
    Enabled,
    AlreadyEnabled,
}

/// A file read from the contents API
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFile {
    pub path: String,
    /// Blob hash, required to replace the file
    pub sha: String,
    pub content: String,
}

/// Author/committer recorded on API commits
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitterIdentity {
    pub name: String,
    pub email: String,
}

/// A file write through the contents API
#[derive(Debug, Clone)]
pub struct PutFile {
    pub message: String,
    pub content: String,
    /// Blob hash being replaced; `None` for a brand-new file
    pub sha: Option<String>,
    pub branch: String,
    pub committer: Option<CommitterIdentity>,
}

/// Several files written as a single commit on top of `parent`
#[derive(Debug, Clone)]
pub struct CommitFiles {
    pub message: String,
    /// (path, content) pairs; other files keep their content from `parent`
    pub files: Vec<(String, String)>,
    /// Commit the branch must still point at when it is moved
    pub parent: String,
    pub branch: String,
    pub committer: Option<CommitterIdentity>,
}

// Wire formats

#[derive(Debug, Deserialize)]
pub(crate) struct ContentResponse {
    pub path: String,
    pub sha: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub encoding: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct PutContentRequest<'a> {
    pub message: &'a str,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha: Option<&'a str>,
    pub branch: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub committer: Option<&'a CommitterIdentity>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PutContentResponse {
    pub commit: CommitRef,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CommitRef {
    pub sha: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct CreateRepoRequest<'a> {
    pub name: &'a str,
    pub private: bool,
    pub auto_init: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RepoResponse {
    pub name: String,
    pub html_url: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct PagesRequest<'a> {
    pub source: PagesSource<'a>,
}

#[derive(Debug, Serialize)]
pub(crate) struct PagesSource<'a> {
    pub branch: &'a str,
    pub path: &'a str,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GitCommitResponse {
    pub tree: CommitRef,
}

#[derive(Debug, Serialize)]
pub(crate) struct CreateTreeRequest<'a> {
    pub base_tree: &'a str,
    pub tree: Vec<TreeEntry<'a>>,
}

#[derive(Debug, Serialize)]
pub(crate) struct TreeEntry<'a> {
    pub path: &'a str,
    pub mode: &'static str,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub content: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct CreateCommitRequest<'a> {
    pub message: &'a str,
    pub tree: &'a str,
    pub parents: [&'a str; 1],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<&'a CommitterIdentity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub committer: Option<&'a CommitterIdentity>,
}

#[derive(Debug, Serialize)]
pub(crate) struct UpdateRefRequest<'a> {
    pub sha: &'a str,
    pub force: bool,
}
