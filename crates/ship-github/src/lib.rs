//! # ship-github
//!
//! Client for the hosting service's REST API.
//!
//! Two seams are exposed as traits so the orchestrator never depends on a
//! concrete client:
//! - [`ContentApi`] reads and writes files: single files keyed by their
//!   last-known blob hash, or a set of files as one commit that only lands
//!   if the branch has not moved
//! - [`HostingApi`] creates repositories and enables static-site publishing
//!
//! [`GitHubClient`] implements both against the GitHub v3 API.
//! [`InMemoryHost`] implements both in memory for tests.

mod api;
mod client;
mod memory;
mod types;

pub use api::{ContentApi, HostingApi};
pub use client::GitHubClient;
pub use memory::InMemoryHost;
pub use types::{
    CommitFiles, CommitterIdentity, PagesStatus, PutFile, RemoteFile, RepoHandle, Visibility,
};
