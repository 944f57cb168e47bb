//! In-memory hosting service for tests
//!
//! Behaves like the real service for the operations shipwright uses: every
//! file carries a content hash, every single-file write creates a commit,
//! replacing a file with a stale hash is rejected, and a multi-file commit
//! only lands on an unmoved branch. Failures can be injected per operation,
//! and every call is counted.

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use ship_core::{Result, ShipError};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use crate::api::{ContentApi, HostingApi};
use crate::types::{CommitFiles, PagesStatus, PutFile, RemoteFile, RepoHandle, Visibility};

#[derive(Debug, Default)]
struct MemRepo {
    files: BTreeMap<String, RemoteFile>,
    commits: Vec<String>,
    pages: Option<(String, String)>,
}

/// Fake hosting service
#[derive(Debug)]
pub struct InMemoryHost {
    owner: String,
    repos: Mutex<HashMap<String, MemRepo>>,
    fail_create: AtomicBool,
    fail_pages: AtomicBool,
    fail_writes: AtomicBool,
    calls: AtomicUsize,
    writes: AtomicUsize,
}

/// Content hash of a file body
pub fn blob_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("blob {}\0", content.len()).as_bytes());
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

impl InMemoryHost {
    pub fn new(owner: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            repos: Mutex::new(HashMap::new()),
            fail_create: AtomicBool::new(false),
            fail_pages: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
            writes: AtomicUsize::new(0),
        }
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    fn repos(&self) -> Result<MutexGuard<'_, HashMap<String, MemRepo>>> {
        self.repos
            .lock()
            .map_err(|_| ShipError::Other("in-memory host lock poisoned".to_string()))
    }

    fn record_call(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }

    /// Change a file directly, as another client of the service would.
    /// Creates the repository if needed.
    pub fn seed_file(&self, repo: &str, path: &str, content: &str) -> String {
        let mut repos = match self.repos.lock() {
            Ok(repos) => repos,
            Err(poisoned) => poisoned.into_inner(),
        };
        let entry = repos.entry(repo.to_string()).or_default();
        commit_file(entry, path, content)
    }

    /// Current content of a file
    pub fn file(&self, repo: &str, path: &str) -> Option<String> {
        let repos = self.repos.lock().ok()?;
        repos
            .get(repo)
            .and_then(|r| r.files.get(path))
            .map(|f| f.content.clone())
    }

    pub fn has_repository(&self, repo: &str) -> bool {
        self.repos
            .lock()
            .map(|repos| repos.contains_key(repo))
            .unwrap_or(false)
    }

    pub fn commits(&self, repo: &str) -> Vec<String> {
        self.repos
            .lock()
            .ok()
            .and_then(|repos| repos.get(repo).map(|r| r.commits.clone()))
            .unwrap_or_default()
    }

    pub fn pages(&self, repo: &str) -> Option<(String, String)> {
        self.repos
            .lock()
            .ok()
            .and_then(|repos| repos.get(repo).and_then(|r| r.pages.clone()))
    }

    /// Total number of API calls received
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Number of files written by successful writes
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn set_fail_create(&self, fail: bool) {
        self.fail_create.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_pages(&self, fail: bool) {
        self.fail_pages.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

fn commit_file(repo: &mut MemRepo, path: &str, content: &str) -> String {
    commit_all(repo, &[(path, content)])
}

/// Apply every file and record a single commit
fn commit_all(repo: &mut MemRepo, files: &[(&str, &str)]) -> String {
    let parent = repo.commits.last().cloned().unwrap_or_default();
    let mut hasher = Sha256::new();
    hasher.update(parent.as_bytes());

    for (path, content) in files {
        let sha = blob_hash(content);
        hasher.update(path.as_bytes());
        hasher.update(sha.as_bytes());
        repo.files.insert(
            path.to_string(),
            RemoteFile {
                path: path.to_string(),
                sha,
                content: content.to_string(),
            },
        );
    }

    let commit = hex::encode(hasher.finalize());
    repo.commits.push(commit.clone());
    commit
}

#[async_trait]
impl ContentApi for InMemoryHost {
    async fn get_file(&self, repo: &str, path: &str, _branch: &str) -> Result<Option<RemoteFile>> {
        self.record_call();
        let repos = self.repos()?;
        // The real service answers 404 for a missing repository too
        Ok(repos.get(repo).and_then(|r| r.files.get(path).cloned()))
    }

    async fn put_file(&self, repo: &str, path: &str, file: PutFile) -> Result<String> {
        self.record_call();
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(ShipError::Http("503 Service Unavailable".to_string()));
        }

        let mut repos = self.repos()?;
        let entry = repos
            .get_mut(repo)
            .ok_or_else(|| ShipError::NotFound(format!("repository {}", repo)))?;

        match (entry.files.get(path), file.sha.as_deref()) {
            (Some(current), Some(sha)) if current.sha != sha => {
                return Err(ShipError::conflict(
                    path,
                    format!("{} does not match {}", sha, current.sha),
                ));
            }
            (Some(_), None) => {
                return Err(ShipError::conflict(path, "\"sha\" wasn't supplied"));
            }
            (None, Some(_)) => {
                return Err(ShipError::conflict(path, "file no longer exists"));
            }
            _ => {}
        }

        let commit = commit_file(entry, path, &file.content);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(commit)
    }

    async fn commit_files(&self, repo: &str, commit: CommitFiles) -> Result<String> {
        self.record_call();
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(ShipError::Http("503 Service Unavailable".to_string()));
        }

        let mut repos = self.repos()?;
        let entry = repos
            .get_mut(repo)
            .ok_or_else(|| ShipError::NotFound(format!("repository {}", repo)))?;

        let head = entry.commits.last().ok_or_else(|| {
            ShipError::Http("409 Conflict: Git Repository is empty.".to_string())
        })?;
        if *head != commit.parent {
            return Err(ShipError::conflict(
                format!("refs/heads/{}", commit.branch),
                format!("Update is not a fast forward ({} is now {})", commit.parent, head),
            ));
        }

        let files: Vec<(&str, &str)> = commit
            .files
            .iter()
            .map(|(path, content)| (path.as_str(), content.as_str()))
            .collect();
        let sha = commit_all(entry, &files);
        self.writes.fetch_add(files.len(), Ordering::SeqCst);
        Ok(sha)
    }
}

#[async_trait]
impl HostingApi for InMemoryHost {
    async fn repository_exists(&self, repo: &str) -> Result<bool> {
        self.record_call();
        Ok(self.repos()?.contains_key(repo))
    }

    async fn create_repository(&self, repo: &str, _visibility: Visibility) -> Result<RepoHandle> {
        self.record_call();
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(ShipError::Http("403 Forbidden".to_string()));
        }

        let mut repos = self.repos()?;
        let created = !repos.contains_key(repo);
        repos.entry(repo.to_string()).or_default();
        Ok(RepoHandle {
            name: repo.to_string(),
            html_url: format!("https://github.com/{}/{}", self.owner, repo),
            created,
        })
    }

    async fn enable_pages(&self, repo: &str, branch: &str, path: &str) -> Result<PagesStatus> {
        self.record_call();
        if self.fail_pages.load(Ordering::SeqCst) {
            return Err(ShipError::Http("500 Internal Server Error".to_string()));
        }

        let mut repos = self.repos()?;
        let entry = repos
            .get_mut(repo)
            .ok_or_else(|| ShipError::NotFound(format!("repository {}", repo)))?;
        if entry.pages.is_some() {
            return Ok(PagesStatus::AlreadyEnabled);
        }
        entry.pages = Some((branch.to_string(), path.to_string()));
        Ok(PagesStatus::Enabled)
    }

    async fn head_commit(&self, repo: &str, _branch: &str) -> Result<Option<String>> {
        self.record_call();
        let repos = self.repos()?;
        Ok(repos.get(repo).and_then(|r| r.commits.last().cloned()))
    }
}
