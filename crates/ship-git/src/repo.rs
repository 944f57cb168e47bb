//! Repository operations on a local working tree

use crate::command::{GitExecutor, GitOutput};
use crate::status::{parse_porcelain, StatusEntry};
use ship_core::{Result, ShipError};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// A local working tree driven through a [`GitExecutor`]
pub struct GitRepo<'a, E: GitExecutor + ?Sized> {
    executor: &'a E,
    root: PathBuf,
}

impl<'a, E: GitExecutor + ?Sized> GitRepo<'a, E> {
    pub fn new(executor: &'a E, root: impl Into<PathBuf>) -> Self {
        Self {
            executor,
            root: root.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Run a git command in the tree, failing on non-zero exit
    async fn run(&self, args: &[&str]) -> Result<GitOutput> {
        let output = self.executor.exec(&self.root, args).await?;
        if !output.success {
            let subcommand = args.first().copied().unwrap_or("git");
            return Err(ShipError::Git(format!(
                "git {} failed: {}",
                subcommand,
                output.stderr.trim()
            )));
        }
        Ok(output)
    }

    /// `git init` with the given initial branch
    pub async fn init(&self, branch: &str) -> Result<()> {
        info!("Initializing repository at {}", self.root.display());
        self.run(&["init", "-b", branch]).await?;
        Ok(())
    }

    /// Clone `url` into this tree's root. The root must not exist yet.
    ///
    /// git runs in the parent directory, so the destination is passed as the
    /// root's last component; a relative root would otherwise be resolved
    /// twice.
    pub async fn clone_from(&self, url: &str) -> Result<()> {
        let parent = self
            .root
            .parent()
            .ok_or_else(|| ShipError::Git("Workspace has no parent directory".to_string()))?;
        let dest = self
            .root
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| {
                ShipError::Git(format!(
                    "Workspace {} has no usable directory name",
                    self.root.display()
                ))
            })?;

        info!("Cloning into {}", self.root.display());
        let output = self.executor.exec(parent, &["clone", url, dest]).await?;
        if !output.success {
            return Err(ShipError::Git(format!(
                "git clone failed: {}",
                output.stderr.trim()
            )));
        }
        Ok(())
    }

    /// Apply the committer identity to this tree only
    pub async fn set_identity(&self, name: &str, email: &str) -> Result<()> {
        self.run(&["config", "user.name", name]).await?;
        self.run(&["config", "user.email", email]).await?;
        Ok(())
    }

    pub async fn add_remote(&self, name: &str, url: &str) -> Result<()> {
        self.run(&["remote", "add", name, url]).await?;
        Ok(())
    }

    /// Stage every change in the tree
    pub async fn add_all(&self) -> Result<()> {
        self.run(&["add", "-A"]).await?;
        Ok(())
    }

    pub async fn status(&self) -> Result<Vec<StatusEntry>> {
        let output = self.run(&["status", "--porcelain"]).await?;
        let entries = parse_porcelain(&output.stdout);
        debug!("{} pending changes", entries.len());
        Ok(entries)
    }

    pub async fn commit(&self, message: &str) -> Result<()> {
        self.run(&["commit", "-m", message]).await?;
        Ok(())
    }

    /// Push `branch` to `origin`, optionally recording it as upstream
    pub async fn push(&self, branch: &str, set_upstream: bool) -> Result<()> {
        if set_upstream {
            self.run(&["push", "-u", "origin", branch]).await?;
        } else {
            self.run(&["push", "origin", branch]).await?;
        }
        Ok(())
    }

    /// Hash of the current HEAD commit
    pub async fn head(&self) -> Result<String> {
        let output = self.run(&["rev-parse", "HEAD"]).await?;
        let sha = output.stdout.trim().to_string();
        if sha.is_empty() {
            return Err(ShipError::Git("rev-parse returned no commit".to_string()));
        }
        Ok(sha)
    }

    /// Point HEAD at `branch` without creating a commit. Used after cloning
    /// an empty remote, whose unborn branch name depends on the local git.
    pub async fn set_unborn_branch(&self, branch: &str) -> Result<()> {
        let target = format!("refs/heads/{}", branch);
        self.run(&["symbolic-ref", "HEAD", &target]).await?;
        Ok(())
    }

    /// Whether HEAD names a commit
    pub async fn has_commits(&self) -> Result<bool> {
        let output = self
            .executor
            .exec(&self.root, &["rev-parse", "--verify", "--quiet", "HEAD"])
            .await?;
        Ok(output.success && !output.stdout.trim().is_empty())
    }

    /// Whether the tree is a checkout (has a `.git` directory)
    pub fn is_checkout(&self) -> bool {
        self.root.join(".git").exists()
    }
}
