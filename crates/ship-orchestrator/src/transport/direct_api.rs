//! Direct-API transport: publishes through the hosting service's API
//!
//! The hash seen by the first `fetch` of a file after `prepare` is the
//! baseline for that run. `update` re-reads every file before writing and
//! refuses to proceed if any baseline no longer matches. The changed files
//! then land as one commit on top of the head read at the start of the
//! update, and the branch only moves if nobody else moved it in between,
//! so a conflicting change never leaves a partially applied revision.
//!
//! A repository without commits cannot take multi-file commits; its first
//! file is written through the contents API and the rest go on top.

use async_trait::async_trait;
use ship_core::{ArtifactSet, Result, ShipConfig, ShipError, TransportStrategy};
use ship_github::{CommitFiles, CommitterIdentity, ContentApi, HostingApi, PutFile};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};

use super::{CommitOutcome, PublishTransport, WorkspaceMode};

/// Files recorded by `create`, written by `push`
#[derive(Debug, Clone)]
struct PendingCreate {
    files: Vec<(&'static str, String)>,
    message: String,
}

#[derive(Debug, Default)]
struct TransportState {
    pending: HashMap<String, PendingCreate>,
    /// (repo, file) -> hash recorded by the first fetch
    baselines: HashMap<(String, String), String>,
}

/// A file that `update` will write
struct PlannedWrite<'a> {
    name: &'static str,
    content: &'a str,
    sha: Option<String>,
}

/// Publishes through the hosting service's contents API, no local tool
pub struct DirectApiTransport {
    contents: Arc<dyn ContentApi>,
    hosting: Arc<dyn HostingApi>,
    config: Arc<ShipConfig>,
    state: Mutex<TransportState>,
}

impl DirectApiTransport {
    pub fn new(
        contents: Arc<dyn ContentApi>,
        hosting: Arc<dyn HostingApi>,
        config: Arc<ShipConfig>,
    ) -> Self {
        Self {
            contents,
            hosting,
            config,
            state: Mutex::new(TransportState::default()),
        }
    }

    fn state(&self) -> Result<MutexGuard<'_, TransportState>> {
        self.state
            .lock()
            .map_err(|_| ShipError::Other("transport state lock poisoned".to_string()))
    }

    fn branch(&self) -> &str {
        &self.config.hosting.branch
    }

    fn committer(&self) -> CommitterIdentity {
        CommitterIdentity {
            name: self.config.committer.name.clone(),
            email: self.config.committer.email.clone(),
        }
    }

    fn put(&self, message: &str, content: &str, sha: Option<String>) -> PutFile {
        PutFile {
            message: message.to_string(),
            content: content.to_string(),
            sha,
            branch: self.branch().to_string(),
            committer: Some(self.committer()),
        }
    }

    fn baseline(&self, repo: &str, name: &str) -> Result<Option<String>> {
        Ok(self
            .state()?
            .baselines
            .get(&(repo.to_string(), name.to_string()))
            .cloned())
    }

    /// Re-read every file in the set and decide which need writing.
    /// Fails without side effects if a baseline has moved.
    async fn plan_writes<'a>(
        &self,
        repo: &str,
        files: &'a ArtifactSet,
    ) -> Result<Vec<PlannedWrite<'a>>> {
        let mut planned = Vec::new();
        for (name, content) in files.files() {
            let current = self.contents.get_file(repo, name, self.branch()).await?;
            let current_sha = current.as_ref().map(|f| f.sha.clone());

            if let Some(baseline) = self.baseline(repo, name)? {
                if current_sha.as_deref() != Some(baseline.as_str()) {
                    warn!("{} in {} changed since it was read", name, repo);
                    return Err(ShipError::conflict(
                        name,
                        format!(
                            "expected {}, found {}",
                            baseline,
                            current_sha.as_deref().unwrap_or("no file")
                        ),
                    ));
                }
            }

            match current {
                Some(file) if file.content == content => {
                    debug!("{} unchanged, skipping", name);
                }
                _ => planned.push(PlannedWrite {
                    name,
                    content,
                    sha: current_sha,
                }),
            }
        }
        Ok(planned)
    }

    /// Write `writes` as one commit on `parent`, or, for a repository with
    /// no commits, as an initial single-file commit plus one for the rest.
    /// Returns the resulting head.
    async fn write_set(
        &self,
        repo: &str,
        writes: &[PlannedWrite<'_>],
        message: &str,
        parent: Option<String>,
    ) -> Result<String> {
        let (parent, rest) = match parent {
            Some(parent) => (parent, writes),
            None => {
                let (first, rest) = writes.split_first().ok_or_else(|| {
                    ShipError::Publish(format!("No files to write for {}", repo))
                })?;
                let commit = self
                    .contents
                    .put_file(repo, first.name, self.put(message, first.content, first.sha.clone()))
                    .await?;
                debug!("Wrote initial {} to {} ({})", first.name, repo, commit);
                (commit, rest)
            }
        };

        if rest.is_empty() {
            return Ok(parent);
        }
        self.contents
            .commit_files(
                repo,
                CommitFiles {
                    message: message.to_string(),
                    files: rest
                        .iter()
                        .map(|w| (w.name.to_string(), w.content.to_string()))
                        .collect(),
                    parent,
                    branch: self.branch().to_string(),
                    committer: Some(self.committer()),
                },
            )
            .await
    }

    async fn head(&self, repo: &str) -> Result<Option<String>> {
        self.hosting.head_commit(repo, self.branch()).await
    }

    fn forget_baselines(&self, repo: &str) -> Result<()> {
        self.state()?.baselines.retain(|(r, _), _| r != repo);
        Ok(())
    }
}

#[async_trait]
impl PublishTransport for DirectApiTransport {
    fn strategy(&self) -> TransportStrategy {
        TransportStrategy::DirectApi
    }

    async fn prepare(&self, repo: &str, _mode: WorkspaceMode) -> Result<()> {
        let mut state = self.state()?;
        state.pending.remove(repo);
        state.baselines.retain(|(r, _), _| r != repo);
        Ok(())
    }

    async fn fetch(&self, repo: &str, name: &str) -> Result<Option<String>> {
        let file = self.contents.get_file(repo, name, self.branch()).await?;
        match file {
            Some(file) => {
                self.state()?
                    .baselines
                    .entry((repo.to_string(), name.to_string()))
                    .or_insert(file.sha);
                debug!("Fetched {} from {} ({} bytes)", name, repo, file.content.len());
                Ok(Some(file.content))
            }
            None => Ok(None),
        }
    }

    async fn create(
        &self,
        repo: &str,
        files: &ArtifactSet,
        message: &str,
    ) -> Result<CommitOutcome> {
        let pending = PendingCreate {
            files: files
                .files()
                .into_iter()
                .map(|(name, content)| (name, content.to_string()))
                .collect(),
            message: message.to_string(),
        };
        info!("Staged {} files for new repository {}", pending.files.len(), repo);
        self.state()?.pending.insert(repo.to_string(), pending);
        Ok(CommitOutcome::pending())
    }

    async fn push(&self, repo: &str) -> Result<CommitOutcome> {
        let pending = self.state()?.pending.remove(repo).ok_or_else(|| {
            ShipError::Publish(format!("No staged contents for {}", repo))
        })?;

        let writes: Vec<PlannedWrite<'_>> = pending
            .files
            .iter()
            .map(|(name, content)| PlannedWrite {
                name: *name,
                content: content.as_str(),
                sha: None,
            })
            .collect();
        let parent = self.head(repo).await?;
        let commit = self
            .write_set(repo, &writes, &pending.message, parent)
            .await?;
        info!("Wrote {} files to {} ({})", writes.len(), repo, commit);
        Ok(CommitOutcome::new_commit(commit))
    }

    async fn update(
        &self,
        repo: &str,
        files: &ArtifactSet,
        message: &str,
    ) -> Result<CommitOutcome> {
        // Read before the files, so the commit can only land on the state
        // the comparison was made against
        let head = self.head(repo).await?;
        let planned = self.plan_writes(repo, files).await?;

        if planned.is_empty() {
            let head =
                head.ok_or_else(|| ShipError::Publish(format!("{} has no commits", repo)))?;
            info!("No changes for {}; reusing {}", repo, head);
            return Ok(CommitOutcome::unchanged(head));
        }

        let commit = self.write_set(repo, &planned, message, head).await?;
        self.forget_baselines(repo)?;

        info!("Wrote {} files to {} ({})", planned.len(), repo, commit);
        Ok(CommitOutcome::new_commit(commit))
    }

    async fn release(&self, repo: &str) -> Result<()> {
        let mut state = self.state()?;
        state.pending.remove(repo);
        state.baselines.retain(|(r, _), _| r != repo);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ship_core::{DESCRIPTION_FILE, LICENSE_FILE, MARKUP_FILE};
    use ship_github::{InMemoryHost, Visibility};

    fn setup() -> (Arc<InMemoryHost>, DirectApiTransport) {
        let host = Arc::new(InMemoryHost::new("octo"));
        let mut config = ShipConfig::default();
        config.hosting.owner = "octo".to_string();
        let transport = DirectApiTransport::new(host.clone(), host.clone(), Arc::new(config));
        (host, transport)
    }

    #[tokio::test]
    async fn test_create_then_push_writes_new_files() {
        let (host, transport) = setup();
        let files = ArtifactSet::new("<html>v1</html>", "# demo").with_license("MIT");

        transport.prepare("demo", WorkspaceMode::Fresh).await.unwrap();
        transport.create("demo", &files, "Initial commit via AI agent").await.unwrap();
        assert_eq!(host.write_count(), 0);

        host.create_repository("demo", Visibility::Public).await.unwrap();
        let outcome = transport.push("demo").await.unwrap();

        assert_eq!(host.write_count(), 3);
        // The first file starts the branch, the rest share one commit
        assert_eq!(host.commits("demo").len(), 2);
        assert_eq!(outcome.commit_id, host.commits("demo").last().cloned());
        assert_eq!(host.file("demo", MARKUP_FILE).as_deref(), Some("<html>v1</html>"));
        assert_eq!(host.file("demo", LICENSE_FILE).as_deref(), Some("MIT"));
    }

    #[tokio::test]
    async fn test_update_is_a_single_commit() {
        let (host, transport) = setup();
        host.seed_file("demo", MARKUP_FILE, "<html>v1</html>");
        host.seed_file("demo", DESCRIPTION_FILE, "# demo");
        let before = host.commits("demo").len();

        let files = ArtifactSet::new("<html>v2</html>", "# demo v2");
        let outcome = transport
            .update("demo", &files, "Apply Round 2 revisions")
            .await
            .unwrap();

        assert_eq!(host.commits("demo").len(), before + 1);
        assert_eq!(outcome, CommitOutcome::new_commit(host.commits("demo")[before].clone()));
        assert_eq!(host.file("demo", DESCRIPTION_FILE).as_deref(), Some("# demo v2"));
    }

    #[tokio::test]
    async fn test_failed_update_changes_nothing() {
        let (host, transport) = setup();
        host.seed_file("demo", MARKUP_FILE, "<html>v1</html>");
        host.seed_file("demo", DESCRIPTION_FILE, "# demo");
        let before = host.commits("demo");
        host.set_fail_writes(true);

        let files = ArtifactSet::new("<html>v2</html>", "# demo v2");
        let err = transport
            .update("demo", &files, "Apply Round 2 revisions")
            .await
            .unwrap_err();

        assert_eq!(err.category(), ship_core::ErrorCategory::Publish);
        assert_eq!(host.commits("demo"), before);
        assert_eq!(host.file("demo", MARKUP_FILE).as_deref(), Some("<html>v1</html>"));
        assert_eq!(host.file("demo", DESCRIPTION_FILE).as_deref(), Some("# demo"));
    }

    #[tokio::test]
    async fn test_update_of_empty_repository_writes_everything() {
        let (host, transport) = setup();
        host.create_repository("demo", Visibility::Public).await.unwrap();

        let files = ArtifactSet::new("<html>v1</html>", "# demo").with_license("MIT");
        let outcome = transport
            .update("demo", &files, "Initial commit via AI agent")
            .await
            .unwrap();

        assert!(outcome.changed);
        assert_eq!(outcome.commit_id, host.commits("demo").last().cloned());
        assert_eq!(host.write_count(), 3);
        assert_eq!(host.file("demo", LICENSE_FILE).as_deref(), Some("MIT"));
    }

    #[tokio::test]
    async fn test_push_without_create_fails() {
        let (_host, transport) = setup();
        let err = transport.push("demo").await.unwrap_err();
        assert!(matches!(err, ShipError::Publish(_)));
    }

    #[tokio::test]
    async fn test_update_skips_unchanged_files() {
        let (host, transport) = setup();
        host.seed_file("demo", MARKUP_FILE, "<html>v1</html>");
        host.seed_file("demo", DESCRIPTION_FILE, "# demo");

        let files = ArtifactSet::new("<html>v2</html>", "# demo");
        let outcome = transport
            .update("demo", &files, "Apply Round 2 revisions")
            .await
            .unwrap();

        assert!(outcome.changed);
        assert_eq!(host.write_count(), 1);
        assert_eq!(host.file("demo", MARKUP_FILE).as_deref(), Some("<html>v2</html>"));
    }

    #[tokio::test]
    async fn test_identical_update_reuses_head() {
        let (host, transport) = setup();
        host.seed_file("demo", MARKUP_FILE, "<html>v1</html>");
        let head = host.seed_file("demo", DESCRIPTION_FILE, "# demo");

        let files = ArtifactSet::new("<html>v1</html>", "# demo");
        let outcome = transport
            .update("demo", &files, "Initial commit via AI agent")
            .await
            .unwrap();

        assert_eq!(outcome, CommitOutcome::unchanged(head));
        assert_eq!(host.write_count(), 0);
    }

    #[tokio::test]
    async fn test_moved_baseline_is_conflict_without_writes() {
        let (host, transport) = setup();
        host.seed_file("demo", MARKUP_FILE, "<html>v1</html>");
        host.seed_file("demo", DESCRIPTION_FILE, "# demo");

        transport.prepare("demo", WorkspaceMode::Clone).await.unwrap();
        transport.fetch("demo", MARKUP_FILE).await.unwrap();
        transport.fetch("demo", DESCRIPTION_FILE).await.unwrap();

        // Someone else edits the README after we read it
        host.seed_file("demo", DESCRIPTION_FILE, "# edited elsewhere");

        let files = ArtifactSet::new("<html>v2</html>", "# demo v2");
        let err = transport
            .update("demo", &files, "Apply Round 2 revisions")
            .await
            .unwrap_err();

        assert!(matches!(err, ShipError::TransportConflict { ref path, .. } if path == DESCRIPTION_FILE));
        assert_eq!(host.write_count(), 0);
        assert_eq!(host.file("demo", MARKUP_FILE).as_deref(), Some("<html>v1</html>"));
    }

    #[tokio::test]
    async fn test_baseline_is_first_fetch() {
        let (host, transport) = setup();
        host.seed_file("demo", MARKUP_FILE, "<html>v1</html>");

        transport.prepare("demo", WorkspaceMode::Clone).await.unwrap();
        transport.fetch("demo", MARKUP_FILE).await.unwrap();
        host.seed_file("demo", MARKUP_FILE, "<html>other</html>");
        // A second read sees the new content but keeps the original baseline
        let second = transport.fetch("demo", MARKUP_FILE).await.unwrap();
        assert_eq!(second.as_deref(), Some("<html>other</html>"));

        let files = ArtifactSet::new("<html>v2</html>", "# demo");
        let err = transport.update("demo", &files, "Apply Round 2 revisions").await;
        assert!(matches!(err, Err(ShipError::TransportConflict { .. })));
    }

    #[tokio::test]
    async fn test_prepare_resets_baselines() {
        let (host, transport) = setup();
        host.seed_file("demo", MARKUP_FILE, "<html>v1</html>");

        transport.fetch("demo", MARKUP_FILE).await.unwrap();
        host.seed_file("demo", MARKUP_FILE, "<html>other</html>");
        transport.prepare("demo", WorkspaceMode::Clone).await.unwrap();

        let files = ArtifactSet::new("<html>v2</html>", "# demo");
        transport
            .update("demo", &files, "Apply Round 2 revisions")
            .await
            .unwrap();
        assert_eq!(host.file("demo", MARKUP_FILE).as_deref(), Some("<html>v2</html>"));
    }
}
