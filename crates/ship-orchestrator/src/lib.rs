//! # ship-orchestrator
//!
//! Generation-and-publish orchestration for shipwright.
//!
//! This crate provides:
//! - Workspace management (one staging tree per repository)
//! - Publish transports: local working copy + git, or the hosting contents API
//! - Hosting provisioning (repository creation, static-site enablement)
//! - Evaluator notification
//! - The pure round state machine and the orchestrator that drives it
//! - Run status records and per-repository single-flight dispatch

mod dispatch;
mod notifier;
mod orchestrator;
mod provisioner;
mod registry;
mod state_machine;
pub mod transport;
mod workspace;

pub use dispatch::Dispatcher;
pub use notifier::{HttpNotifier, Notifier};
pub use orchestrator::{Orchestrator, RunError, RunReport};
pub use provisioner::Provisioner;
pub use registry::{RunRecord, RunRegistry, DEFAULT_MAX_TRACKED_TASKS};
pub use state_machine::{transition, Action, Event, State};
pub use transport::{
    CommitOutcome, DirectApiTransport, PublishTransport, WorkingCopyTransport, WorkspaceMode,
};
pub use workspace::WorkspaceManager;
