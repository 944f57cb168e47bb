//! Working-copy transport: a local git checkout per repository

use async_trait::async_trait;
use ship_core::{ArtifactSet, Result, ShipConfig, ShipError, TransportStrategy};
use ship_git::{GitExecutor, GitRepo};
use std::sync::Arc;
use tracing::{debug, info};

use super::{CommitOutcome, PublishTransport, WorkspaceMode};
use crate::workspace::WorkspaceManager;

/// Publishes by committing in `<workspace_root>/<repo>` and pushing to
/// the remote built from `hosting.remote_url_template`
pub struct WorkingCopyTransport<E: GitExecutor> {
    executor: E,
    workspaces: WorkspaceManager,
    config: Arc<ShipConfig>,
}

impl<E: GitExecutor> WorkingCopyTransport<E> {
    pub fn new(executor: E, workspaces: WorkspaceManager, config: Arc<ShipConfig>) -> Self {
        Self {
            executor,
            workspaces,
            config,
        }
    }

    pub fn workspaces(&self) -> &WorkspaceManager {
        &self.workspaces
    }

    fn git(&self, repo: &str) -> GitRepo<'_, E> {
        GitRepo::new(&self.executor, self.workspaces.path(repo))
    }

    async fn configure_identity(&self, git: &GitRepo<'_, E>) -> Result<()> {
        git.set_identity(&self.config.committer.name, &self.config.committer.email)
            .await
    }

    /// Stage everything and commit it. Returns false when the tree
    /// already matches HEAD.
    async fn commit_staged(&self, git: &GitRepo<'_, E>, message: &str) -> Result<bool> {
        git.add_all().await?;
        let pending = git.status().await?;
        if pending.is_empty() {
            return Ok(false);
        }
        for entry in &pending {
            debug!("{} {}", entry.code, entry.path);
        }
        git.commit(message).await?;
        Ok(true)
    }
}

#[async_trait]
impl<E: GitExecutor> PublishTransport for WorkingCopyTransport<E> {
    fn strategy(&self) -> TransportStrategy {
        TransportStrategy::WorkingCopy
    }

    async fn prepare(&self, repo: &str, mode: WorkspaceMode) -> Result<()> {
        let git = self.git(repo);
        match mode {
            WorkspaceMode::Fresh => {
                self.workspaces.reset(repo).await?;
                git.init(&self.config.hosting.branch).await?;
                self.configure_identity(&git).await?;
                git.add_remote("origin", &self.config.remote_url(repo))
                    .await?;
            }
            WorkspaceMode::Clone => {
                self.workspaces.clear(repo).await?;
                git.clone_from(&self.config.remote_url(repo)).await?;
                if !git.has_commits().await? {
                    // Created remotely, but the first push never landed
                    debug!("{} has no commits yet", repo);
                    git.set_unborn_branch(&self.config.hosting.branch).await?;
                }
                self.configure_identity(&git).await?;
            }
        }
        Ok(())
    }

    async fn fetch(&self, repo: &str, name: &str) -> Result<Option<String>> {
        if !self.git(repo).is_checkout() {
            self.prepare(repo, WorkspaceMode::Clone).await?;
        }
        self.workspaces.read_file(repo, name).await
    }

    async fn create(
        &self,
        repo: &str,
        files: &ArtifactSet,
        message: &str,
    ) -> Result<CommitOutcome> {
        let git = self.git(repo);
        self.workspaces.write_files(repo, files).await?;
        if !self.commit_staged(&git, message).await? {
            return Err(ShipError::Publish(format!(
                "Nothing to commit in new repository {}",
                repo
            )));
        }
        info!("Committed initial contents of {} locally", repo);
        Ok(CommitOutcome::pending())
    }

    async fn push(&self, repo: &str) -> Result<CommitOutcome> {
        let git = self.git(repo);
        git.push(&self.config.hosting.branch, true).await?;
        let head = git.head().await?;
        info!("Pushed {} to origin ({})", repo, head);
        Ok(CommitOutcome::new_commit(head))
    }

    async fn update(
        &self,
        repo: &str,
        files: &ArtifactSet,
        message: &str,
    ) -> Result<CommitOutcome> {
        let git = self.git(repo);
        self.workspaces.write_files(repo, files).await?;

        if !self.commit_staged(&git, message).await? {
            let head = git.head().await?;
            info!("No changes for {}; reusing {}", repo, head);
            return Ok(CommitOutcome::unchanged(head));
        }

        git.push(&self.config.hosting.branch, false).await?;
        let head = git.head().await?;
        info!("Pushed revision of {} ({})", repo, head);
        Ok(CommitOutcome::new_commit(head))
    }

    async fn release(&self, repo: &str) -> Result<()> {
        self.workspaces.discard(repo).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ship_core::MARKUP_FILE;
    use ship_git::{GitOutput, MockGitExecutor};
    use tempfile::TempDir;

    fn config() -> Arc<ShipConfig> {
        let mut config = ShipConfig::default();
        config.hosting.owner = "octo".to_string();
        Arc::new(config)
    }

    fn transport(executor: MockGitExecutor, temp: &TempDir) -> WorkingCopyTransport<MockGitExecutor> {
        WorkingCopyTransport::new(executor, WorkspaceManager::new(temp.path()), config())
    }

    fn files() -> ArtifactSet {
        ArtifactSet::new("<html></html>", "# demo-app")
    }

    #[tokio::test]
    async fn test_fresh_create_and_push() {
        let temp = TempDir::new().unwrap();
        let executor = MockGitExecutor::new()
            .with_response("status --porcelain", GitOutput::ok("?? README.md\n?? index.html\n"))
            .with_response("rev-parse HEAD", GitOutput::ok("abc123\n"));
        let transport = transport(executor.clone(), &temp);

        transport.prepare("demo-app", WorkspaceMode::Fresh).await.unwrap();
        let outcome = transport
            .create("demo-app", &files(), "Initial commit via AI agent")
            .await
            .unwrap();
        assert_eq!(outcome, CommitOutcome::pending());

        let pushed = transport.push("demo-app").await.unwrap();
        assert_eq!(pushed, CommitOutcome::new_commit("abc123"));

        let calls = executor.calls();
        assert_eq!(calls[0], "init -b main");
        assert_eq!(calls[1], "config user.name shipwright");
        assert!(calls[3].starts_with("remote add origin https://x-access-token:"));
        assert!(executor.ran("commit -m Initial commit via AI agent"));
        assert!(executor.ran("push -u origin main"));
        assert!(temp.path().join("demo-app").join(MARKUP_FILE).exists());
    }

    #[tokio::test]
    async fn test_update_without_changes_reuses_head() {
        let temp = TempDir::new().unwrap();
        let executor = MockGitExecutor::new()
            .with_response("status --porcelain", GitOutput::ok(""))
            .with_response("rev-parse HEAD", GitOutput::ok("abc123\n"));
        let transport = transport(executor.clone(), &temp);
        transport.workspaces().reset("demo-app").await.unwrap();

        let outcome = transport
            .update("demo-app", &files(), "Apply Round 2 revisions")
            .await
            .unwrap();

        assert_eq!(outcome, CommitOutcome::unchanged("abc123"));
        assert!(!executor.ran("commit"));
        assert!(!executor.ran("push"));
    }

    #[tokio::test]
    async fn test_update_with_changes_pushes() {
        let temp = TempDir::new().unwrap();
        let executor = MockGitExecutor::new()
            .with_response("status --porcelain", GitOutput::ok(" M index.html\n"))
            .with_response("rev-parse HEAD", GitOutput::ok("def456\n"));
        let transport = transport(executor.clone(), &temp);
        transport.workspaces().reset("demo-app").await.unwrap();

        let outcome = transport
            .update("demo-app", &files(), "Apply Round 2 revisions")
            .await
            .unwrap();

        assert_eq!(outcome, CommitOutcome::new_commit("def456"));
        assert!(executor.ran("commit -m Apply Round 2 revisions"));
        assert!(executor.ran("push origin main"));
    }

    #[tokio::test]
    async fn test_rejected_push_is_git_error() {
        let temp = TempDir::new().unwrap();
        let executor = MockGitExecutor::new().with_response(
            "push -u origin main",
            GitOutput::failed("! [rejected] main -> main (fetch first)"),
        );
        let transport = transport(executor, &temp);

        let err = transport.push("demo-app").await.unwrap_err();
        assert!(matches!(err, ShipError::Git(_)));
        assert_eq!(err.category(), ship_core::ErrorCategory::Publish);
    }

    #[tokio::test]
    async fn test_fetch_clones_when_not_checked_out() {
        let temp = TempDir::new().unwrap();
        let executor = MockGitExecutor::new();
        let transport = transport(executor.clone(), &temp);

        // The mock clone creates nothing, so the file is reported missing
        let content = transport.fetch("demo-app", MARKUP_FILE).await.unwrap();
        assert!(content.is_none());
        assert!(executor.ran("clone https://x-access-token:"));
    }

    #[tokio::test]
    async fn test_clone_of_empty_remote_targets_configured_branch() {
        let temp = TempDir::new().unwrap();
        let executor = MockGitExecutor::new().with_response(
            "rev-parse --verify --quiet HEAD",
            GitOutput::failed(""),
        );
        let transport = transport(executor.clone(), &temp);

        transport.prepare("demo-app", WorkspaceMode::Clone).await.unwrap();
        assert!(executor.ran("symbolic-ref HEAD refs/heads/main"));
    }

    #[tokio::test]
    async fn test_clone_of_populated_remote_keeps_head() {
        let temp = TempDir::new().unwrap();
        let executor = MockGitExecutor::new().with_response(
            "rev-parse --verify --quiet HEAD",
            GitOutput::ok("abc123\n"),
        );
        let transport = transport(executor.clone(), &temp);

        transport.prepare("demo-app", WorkspaceMode::Clone).await.unwrap();
        assert!(executor.ran("clone "));
        assert!(!executor.ran("symbolic-ref"));
    }
}
