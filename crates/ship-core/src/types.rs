//! Core type definitions for shipwright

use serde::{Deserialize, Serialize};

use crate::{Result, ShipError};

/// Entry-point markup document of a published site
pub const MARKUP_FILE: &str = "index.html";
/// Descriptive document, regenerated every round
pub const DESCRIPTION_FILE: &str = "README.md";
/// License document, written once when the repository is created
pub const LICENSE_FILE: &str = "LICENSE";

/// Longest repository name the hosting service accepts
const MAX_REPO_NAME_LEN: usize = 100;

/// Workflow phase requested by a task descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u32", try_from = "u32")]
pub enum Round {
    /// Create a new published repository
    Create = 1,
    /// Revise an existing repository (secret-gated)
    Revise = 2,
}

impl Round {
    pub fn number(self) -> u32 {
        self as u32
    }

    /// Commit message used by this round's publish
    pub fn commit_message(self) -> &'static str {
        match self {
            Round::Create => "Initial commit via AI agent",
            Round::Revise => "Apply Round 2 revisions",
        }
    }
}

impl TryFrom<u32> for Round {
    type Error = ShipError;

    fn try_from(value: u32) -> Result<Self> {
        match value {
            1 => Ok(Round::Create),
            2 => Ok(Round::Revise),
            other => Err(ShipError::Validation(format!(
                "Unsupported round {}. Only rounds 1 and 2 are supported.",
                other
            ))),
        }
    }
}

impl From<Round> for u32 {
    fn from(round: Round) -> Self {
        round.number()
    }
}

impl std::fmt::Display for Round {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.number())
    }
}

/// A file attached to a task descriptor, encoded as a data URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub name: String,
    /// `<header>,<base64-payload>`
    pub url: String,
}

/// Inbound request for one orchestration run
///
/// Required fields are optional here so that a missing `task` or `brief`
/// surfaces as a validation failure of the run instead of a parse error.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskDescriptor {
    /// Repository name; keys both the workspace and the remote repository
    #[serde(default)]
    pub task: Option<String>,
    #[serde(default)]
    pub brief: Option<String>,
    #[serde(default = "default_round")]
    pub round: u32,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    #[serde(default)]
    pub secret: Option<String>,
    #[serde(default)]
    pub evaluation_url: Option<String>,
    /// Echoed back unmodified
    #[serde(default)]
    pub email: serde_json::Value,
    /// Echoed back unmodified
    #[serde(default)]
    pub nonce: serde_json::Value,
}

fn default_round() -> u32 {
    1
}

impl TaskDescriptor {
    pub fn new(task: impl Into<String>, brief: impl Into<String>, round: u32) -> Self {
        Self {
            task: Some(task.into()),
            brief: Some(brief.into()),
            round,
            ..Default::default()
        }
    }

    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = Some(secret.into());
        self
    }

    pub fn with_evaluation_url(mut self, url: impl Into<String>) -> Self {
        self.evaluation_url = Some(url.into());
        self
    }

    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }

    /// Name as submitted, used for logs and echoed to the evaluator
    pub fn display_name(&self) -> &str {
        self.task.as_deref().unwrap_or("<unnamed>")
    }

    /// Key shared by the run lock and the status record: the trimmed name
    pub fn run_key(&self) -> &str {
        self.display_name().trim()
    }
}

/// Check a repository name against the hosting service's naming rules.
///
/// The name is also used as a directory under the workspace root, so path
/// separators and relative components are rejected.
pub fn validate_repo_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(ShipError::Validation("Repository name is empty".to_string()));
    }
    if name.len() > MAX_REPO_NAME_LEN {
        return Err(ShipError::Validation(format!(
            "Repository name exceeds {} characters",
            MAX_REPO_NAME_LEN
        )));
    }
    if name == "." || name == ".." {
        return Err(ShipError::Validation(format!(
            "Invalid repository name: {}",
            name
        )));
    }
    if let Some(bad) = name
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')))
    {
        return Err(ShipError::Validation(format!(
            "Invalid character {:?} in repository name {}",
            bad, name
        )));
    }
    Ok(())
}

/// Files that make up one published state of a repository
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactSet {
    pub markup: String,
    pub description: String,
    /// Only present when the repository is being created
    pub license: Option<String>,
}

impl ArtifactSet {
    pub fn new(markup: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            markup: markup.into(),
            description: description.into(),
            license: None,
        }
    }

    pub fn with_license(mut self, license: impl Into<String>) -> Self {
        self.license = Some(license.into());
        self
    }

    /// `(file name, content)` pairs in write order
    pub fn files(&self) -> Vec<(&'static str, &str)> {
        let mut files = vec![
            (MARKUP_FILE, self.markup.as_str()),
            (DESCRIPTION_FILE, self.description.as_str()),
        ];
        if let Some(license) = &self.license {
            files.push((LICENSE_FILE, license.as_str()));
        }
        files
    }
}

/// MIT license text written into newly created repositories
pub fn mit_license(year: i32, holder: &str) -> String {
    format!(
        "MIT License\n\n\
         Copyright (c) {year} {holder}\n\n\
         Permission is hereby granted, free of charge, to any person obtaining a copy\n\
         of this software and associated documentation files (the \"Software\"), to deal\n\
         in the Software without restriction, including without limitation the rights\n\
         to use, copy, modify, merge, publish, distribute, sublicense, and/or sell\n\
         copies of the Software, and to permit persons to whom the Software is\n\
         furnished to do so, subject to the following conditions:\n\n\
         The above copyright notice and this permission notice shall be included in all\n\
         copies or substantial portions of the Software.\n\n\
         THE SOFTWARE IS PROVIDED \"AS IS\", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR\n\
         IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,\n\
         FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE\n\
         AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER\n\
         LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,\n\
         OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE\n\
         SOFTWARE.\n"
    )
}

/// Account on the hosting service that owns published repositories
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostingAccount {
    pub owner: String,
}

impl HostingAccount {
    pub fn new(owner: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
        }
    }

    pub fn repo_url(&self, repo: &str) -> String {
        format!("https://github.com/{}/{}", self.owner, repo)
    }

    /// Published-site URL; the evaluator depends on this exact shape
    pub fn pages_url(&self, repo: &str) -> String {
        format!("https://{}.github.io/{}/", self.owner, repo)
    }

    pub fn deploy_result(&self, repo: &str, commit_sha: impl Into<String>) -> DeployResult {
        DeployResult {
            repo_url: self.repo_url(repo),
            pages_url: self.pages_url(repo),
            commit_sha: commit_sha.into(),
        }
    }
}

/// Output of a successful publish
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployResult {
    pub repo_url: String,
    pub pages_url: String,
    pub commit_sha: String,
}

/// Body posted to the evaluator's callback URL
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationPayload {
    pub email: serde_json::Value,
    pub task: String,
    pub round: u32,
    pub nonce: serde_json::Value,
    pub repo_url: String,
    pub commit_sha: String,
    pub pages_url: String,
}

impl NotificationPayload {
    pub fn new(task: &TaskDescriptor, repo: &str, deploy: &DeployResult) -> Self {
        Self {
            email: task.email.clone(),
            task: repo.to_string(),
            round: task.round,
            nonce: task.nonce.clone(),
            repo_url: deploy.repo_url.clone(),
            commit_sha: deploy.commit_sha.clone(),
            pages_url: deploy.pages_url.clone(),
        }
    }
}
