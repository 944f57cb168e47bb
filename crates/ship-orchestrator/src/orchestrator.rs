//! Orchestrator: drives one task descriptor through the round state machine

use chrono::Datelike;
use serde::Serialize;
use ship_agent::{ArtifactGenerator, GeminiClient, LlmArtifactGenerator};
use ship_core::fail_open::fail_open;
use ship_core::{
    mit_license, validate_repo_name, ArtifactSet, Attachment, DeployResult, ErrorCategory,
    HostingAccount, NotificationPayload, Result, Round, ShipConfig, ShipError, TaskDescriptor,
    TransportStrategy, LICENSE_FILE, MARKUP_FILE,
};
use ship_git::GitCommand;
use ship_github::GitHubClient;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::notifier::{HttpNotifier, Notifier};
use crate::provisioner::Provisioner;
use crate::registry::RunRegistry;
use crate::state_machine::{transition, Action, Event, State};
use crate::transport::{
    CommitOutcome, DirectApiTransport, PublishTransport, WorkingCopyTransport, WorkspaceMode,
};
use crate::workspace::WorkspaceManager;

/// Why a run failed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunError {
    pub category: ErrorCategory,
    pub message: String,
}

impl From<&ShipError> for RunError {
    fn from(err: &ShipError) -> Self {
        Self {
            category: err.category(),
            message: err.to_string(),
        }
    }
}

/// Outcome of one run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub task: String,
    pub round: u32,
    pub final_state: State,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deploy: Option<DeployResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RunError>,
    /// Whether the evaluator acknowledged the notification
    pub notified: bool,
}

impl RunReport {
    pub fn succeeded(&self) -> bool {
        self.final_state == State::Done
    }
}

/// A descriptor that passed validation
#[derive(Debug, Clone)]
struct ValidTask {
    repo: String,
    brief: String,
    round: Round,
    attachments: Vec<Attachment>,
}

/// Mutable state of a run, owned by [`Orchestrator::run_with_id`]
#[derive(Debug, Default)]
struct RunContext {
    artifacts: Option<ArtifactSet>,
    /// True when this run created the remote repository
    fresh: bool,
    deploy: Option<DeployResult>,
    notified: bool,
    error: Option<ShipError>,
}

impl RunContext {
    /// Turn a committed outcome into the run's deploy result
    fn record_outcome(&mut self, account: &HostingAccount, repo: &str, outcome: CommitOutcome) {
        if let Some(commit) = outcome.commit_id {
            self.deploy = Some(account.deploy_result(repo, commit));
        }
    }
}

/// Runs task descriptors against the configured collaborators
///
/// All collaborators are chosen once, at construction; a run never
/// switches transport or reads configuration from anywhere else.
pub struct Orchestrator {
    config: Arc<ShipConfig>,
    account: HostingAccount,
    generator: Arc<dyn ArtifactGenerator>,
    transport: Arc<dyn PublishTransport>,
    provisioner: Provisioner,
    notifier: Arc<dyn Notifier>,
    registry: Option<Arc<RunRegistry>>,
}

impl Orchestrator {
    pub fn new(
        config: Arc<ShipConfig>,
        generator: Arc<dyn ArtifactGenerator>,
        transport: Arc<dyn PublishTransport>,
        provisioner: Provisioner,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let account = HostingAccount::new(config.hosting.owner.clone());
        Self {
            config,
            account,
            generator,
            transport,
            provisioner,
            notifier,
            registry: None,
        }
    }

    /// Build the production collaborators from configuration.
    ///
    /// The publish transport is selected here, once per process.
    pub fn from_config(config: Arc<ShipConfig>) -> Result<Self> {
        config.validate()?;

        let model = GeminiClient::from_config(&config.generator)?;
        let generator = Arc::new(LlmArtifactGenerator::new(model));
        let github = Arc::new(GitHubClient::from_config(&config)?);

        let transport: Arc<dyn PublishTransport> = match config.transport {
            TransportStrategy::WorkingCopy => {
                let token = config
                    .hosting
                    .token
                    .as_ref()
                    .map(|t| t.expose().to_string())
                    .unwrap_or_default();
                Arc::new(WorkingCopyTransport::new(
                    GitCommand::new().with_redacted(token),
                    WorkspaceManager::new(config.workspace_root.clone()),
                    config.clone(),
                ))
            }
            TransportStrategy::DirectApi => Arc::new(DirectApiTransport::new(
                github.clone(),
                github.clone(),
                config.clone(),
            )),
        };

        let provisioner = Provisioner::new(github, &config.hosting);
        let notifier = Arc::new(HttpNotifier::new(&config.notifier)?);

        info!(
            "Orchestrator ready (transport: {}, model: {}, owner: {})",
            config.transport, config.generator.model, config.hosting.owner
        );
        Ok(Self::new(config, generator, transport, provisioner, notifier))
    }

    /// Record every run's progress in `registry`
    pub fn with_registry(mut self, registry: Arc<RunRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn registry(&self) -> Option<&Arc<RunRegistry>> {
        self.registry.as_ref()
    }

    pub fn config(&self) -> &ShipConfig {
        &self.config
    }

    /// Run one descriptor to `Done` or `Failed`
    pub async fn run(&self, task: &TaskDescriptor) -> RunReport {
        self.run_with_id(Uuid::new_v4(), task).await
    }

    #[instrument(skip(self, task), fields(task = %task.display_name(), round = task.round))]
    pub async fn run_with_id(&self, run_id: Uuid, task: &TaskDescriptor) -> RunReport {
        let key = task.run_key().to_string();
        info!("Run {} started", run_id);
        if let Some(registry) = &self.registry {
            registry.begin(run_id, &key, task.round).await;
        }

        let mut ctx = RunContext::default();
        let (first_event, valid) = match self.validate(task) {
            Ok(valid) => (Event::Validated { round: valid.round }, Some(valid)),
            Err(e) => {
                let event = Event::Rejected {
                    reason: e.to_string(),
                };
                ctx.error = Some(e);
                (event, None)
            }
        };

        let (mut state, actions) = transition(State::Start, first_event);
        self.record_state(run_id, &key, &state).await;
        let mut queue: VecDeque<Action> = actions.into();

        while let Some(action) = queue.pop_front() {
            let event = match (&action, &valid) {
                (Action::LogActivity { message }, _) => {
                    info!("{}", message);
                    continue;
                }
                (_, Some(valid)) => self.execute(&action, valid, task, &mut ctx).await,
                (_, None) => Event::Error {
                    message: format!("{:?} requested for an invalid task", action),
                },
            };

            let (next, actions) = transition(state, event);
            state = next;
            self.record_state(run_id, &key, &state).await;
            queue.extend(actions);
        }

        if let Some(valid) = &valid {
            fail_open("release_workspace", || self.transport.release(&valid.repo)).await;
        }

        let error = match &state {
            State::Done => None,
            State::Failed { error } => Some(
                ctx.error
                    .as_ref()
                    .map(RunError::from)
                    .unwrap_or_else(|| RunError {
                        category: ErrorCategory::Internal,
                        message: error.clone(),
                    }),
            ),
            other => Some(RunError {
                category: ErrorCategory::Internal,
                message: format!("Run stopped in non-terminal state {}", other.name()),
            }),
        };
        // A deploy result only exists for a completed publish
        let deploy = if state == State::Done { ctx.deploy } else { None };

        match &error {
            None => info!("Run {} finished", run_id),
            Some(e) => error!("Run {} failed ({}): {}", run_id, e.category, e.message),
        }

        if let Some(registry) = &self.registry {
            registry
                .finish(run_id, &key, &state, deploy.clone(), error.clone())
                .await;
        }

        RunReport {
            run_id,
            task: task.display_name().to_string(),
            round: task.round,
            final_state: state,
            deploy,
            error,
            notified: ctx.notified,
        }
    }

    async fn record_state(&self, run_id: Uuid, task: &str, state: &State) {
        debug!("State -> {}", state.name());
        if let Some(registry) = &self.registry {
            registry.update_state(run_id, task, state).await;
        }
    }

    /// Check the descriptor without contacting any external service
    fn validate(&self, task: &TaskDescriptor) -> Result<ValidTask> {
        let repo = task
            .task
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ShipError::Validation("Task descriptor is missing 'task'".into()))?;
        let brief = task
            .brief
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| ShipError::Validation("Task descriptor is missing 'brief'".into()))?;
        validate_repo_name(repo)?;
        let round = Round::try_from(task.round)?;

        if round == Round::Revise {
            let expected = self.config.app_secret.as_ref().ok_or_else(|| {
                ShipError::Validation("Round 2 is disabled: no shared secret configured".into())
            })?;
            match task.secret.as_deref() {
                Some(secret) if secret == expected.expose() => {
                    info!("Secret verified");
                }
                Some(_) => return Err(ShipError::Validation("Invalid secret".into())),
                None => return Err(ShipError::Validation("Missing secret".into())),
            }
        }

        Ok(ValidTask {
            repo: repo.to_string(),
            brief: brief.to_string(),
            round,
            attachments: task.attachments.clone(),
        })
    }

    /// Execute one action and translate its result into an event
    async fn execute(
        &self,
        action: &Action,
        valid: &ValidTask,
        task: &TaskDescriptor,
        ctx: &mut RunContext,
    ) -> Event {
        let result = match action {
            Action::GenerateArtifacts => self
                .generate(valid, ctx)
                .await
                .map(|_| Event::ArtifactsReady),
            Action::ReviseArtifacts => self.revise(valid, ctx).await.map(|_| Event::ArtifactsReady),
            Action::Commit { round } => self
                .commit(valid, *round, ctx)
                .await
                .map(|changed| Event::Committed { changed }),
            Action::Provision => self.provision(valid, ctx).await.map(|_| Event::Provisioned),
            Action::Notify => self.notify(valid, task, ctx).await.map(|_| Event::Notified),
            Action::LogActivity { .. } => {
                return Event::Error {
                    message: "log actions are not executable".to_string(),
                }
            }
        };

        result.unwrap_or_else(|e| {
            let event = Event::Error {
                message: e.to_string(),
            };
            ctx.error = Some(e);
            event
        })
    }

    async fn generate(&self, valid: &ValidTask, ctx: &mut RunContext) -> Result<()> {
        let markup = self
            .generator
            .generate_markup(&valid.brief, &valid.attachments)
            .await?;
        let description = self
            .generator
            .generate_description(&valid.brief, &valid.repo)
            .await?;
        ctx.artifacts = Some(ArtifactSet::new(markup, description));
        Ok(())
    }

    async fn revise(&self, valid: &ValidTask, ctx: &mut RunContext) -> Result<()> {
        self.transport
            .prepare(&valid.repo, WorkspaceMode::Clone)
            .await?;
        let existing = self
            .transport
            .fetch(&valid.repo, MARKUP_FILE)
            .await?
            .ok_or_else(|| {
                ShipError::Publish(format!(
                    "{} has no {} to revise; run round 1 first",
                    valid.repo, MARKUP_FILE
                ))
            })?;
        info!("Fetched existing {} ({} bytes)", MARKUP_FILE, existing.len());

        let markup = self
            .generator
            .revise_markup(&existing, &valid.brief, &valid.attachments)
            .await?;
        let description = self
            .generator
            .generate_description(&valid.brief, &valid.repo)
            .await?;
        ctx.artifacts = Some(ArtifactSet::new(markup, description));
        Ok(())
    }

    /// Commit the artifact set. Returns whether a new commit was made.
    async fn commit(&self, valid: &ValidTask, round: Round, ctx: &mut RunContext) -> Result<bool> {
        let artifacts = ctx
            .artifacts
            .clone()
            .ok_or_else(|| ShipError::Other("commit requested before generation".into()))?;
        let message = round.commit_message();
        let repo = valid.repo.as_str();

        let exists = match round {
            Round::Create => self.provisioner.repository_exists(repo).await?,
            Round::Revise => true,
        };

        let outcome = match round {
            Round::Create if !exists => {
                ctx.fresh = true;
                self.transport.prepare(repo, WorkspaceMode::Fresh).await?;
                let files = artifacts.with_license(self.license());
                self.transport.create(repo, &files, message).await?
            }
            Round::Create => {
                info!("{} already exists; publishing as an update", repo);
                self.transport.prepare(repo, WorkspaceMode::Clone).await?;
                // An earlier attempt may have created the repository and
                // failed before its first files landed
                let files = match self.transport.fetch(repo, LICENSE_FILE).await? {
                    Some(_) => artifacts,
                    None => {
                        warn!("{} has no {}; adding it", repo, LICENSE_FILE);
                        artifacts.with_license(self.license())
                    }
                };
                self.transport.update(repo, &files, message).await?
            }
            // `revise` already prepared the workspace from the remote
            Round::Revise => self.transport.update(repo, &artifacts, message).await?,
        };

        let changed = outcome.changed;
        ctx.record_outcome(&self.account, repo, outcome);
        Ok(changed)
    }

    fn license(&self) -> String {
        mit_license(chrono::Utc::now().year(), &self.config.committer.name)
    }

    async fn provision(&self, valid: &ValidTask, ctx: &mut RunContext) -> Result<()> {
        let repo = valid.repo.as_str();
        if ctx.fresh {
            self.provisioner.create_repository(repo).await?;
            let outcome = self.transport.push(repo).await?;
            ctx.record_outcome(&self.account, repo, outcome);
        }

        fail_open("enable_static_site", || {
            self.provisioner.enable_static_site(repo)
        })
        .await;

        if ctx.deploy.is_none() {
            return Err(ShipError::Publish(format!(
                "No commit was published for {}",
                repo
            )));
        }
        Ok(())
    }

    async fn notify(
        &self,
        valid: &ValidTask,
        task: &TaskDescriptor,
        ctx: &mut RunContext,
    ) -> Result<()> {
        let deploy = ctx
            .deploy
            .as_ref()
            .ok_or_else(|| ShipError::Other("notification requested without a deploy".into()))?;
        info!(
            "Deployed {} at {} ({})",
            valid.repo, deploy.pages_url, deploy.commit_sha
        );

        let Some(url) = task.evaluation_url.as_deref() else {
            warn!("No evaluation_url; skipping notification");
            return Ok(());
        };

        let payload = NotificationPayload::new(task, task.display_name(), deploy);
        ctx.notified = fail_open("notify_evaluator", || self.notifier.notify(url, &payload))
            .await
            .is_some();
        Ok(())
    }
}
