//! Workspace management for per-repository staging trees

use ship_core::{ArtifactSet, Result, ShipError};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Owns the `<root>/<repo>` staging directories
#[derive(Debug, Clone)]
pub struct WorkspaceManager {
    root: PathBuf,
}

impl WorkspaceManager {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Staging directory for a repository (may not exist yet)
    pub fn path(&self, repo: &str) -> PathBuf {
        self.root.join(repo)
    }

    /// Remove any previous tree for `repo` and create an empty one
    pub async fn reset(&self, repo: &str) -> Result<PathBuf> {
        let path = self.clear(repo).await?;
        tokio::fs::create_dir_all(&path).await.map_err(|e| {
            ShipError::Publish(format!(
                "Failed to create workspace {}: {}",
                path.display(),
                e
            ))
        })?;
        info!("Workspace ready at {}", path.display());
        Ok(path)
    }

    /// Remove any previous tree for `repo`, leaving its parent in place
    /// so that a clone can create the directory itself
    pub async fn clear(&self, repo: &str) -> Result<PathBuf> {
        let path = self.path(repo);
        if tokio::fs::try_exists(&path).await? {
            debug!("Removing stale workspace {}", path.display());
            tokio::fs::remove_dir_all(&path).await?;
        }
        tokio::fs::create_dir_all(&self.root).await?;
        Ok(path)
    }

    /// Write every file of the set into the repository's tree
    pub async fn write_files(&self, repo: &str, files: &ArtifactSet) -> Result<()> {
        let path = self.path(repo);
        for (name, content) in files.files() {
            tokio::fs::write(path.join(name), content).await?;
            debug!("Wrote {} ({} bytes)", name, content.len());
        }
        Ok(())
    }

    /// Read a file from the repository's tree, `None` when absent
    pub async fn read_file(&self, repo: &str, name: &str) -> Result<Option<String>> {
        match tokio::fs::read_to_string(self.path(repo).join(name)).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Delete the repository's tree
    pub async fn discard(&self, repo: &str) -> Result<()> {
        let path = self.path(repo);
        if tokio::fs::try_exists(&path).await? {
            tokio::fs::remove_dir_all(&path).await?;
            info!("Discarded workspace {}", path.display());
        }
        Ok(())
    }
}
