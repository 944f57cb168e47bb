//! # ship-core
//!
//! Core types for shipwright, the generate-and-publish orchestrator.
//!
//! A task descriptor names a repository, a brief and a round. Round 1 creates
//! a published repository from generated content, round 2 revises it behind a
//! shared secret. Every crate in the workspace speaks the types defined here:
//!
//! - [`TaskDescriptor`] is the inbound request
//! - [`ArtifactSet`] is the set of files one publish writes
//! - [`DeployResult`] is what a successful publish reports
//! - [`ShipError`] is the error taxonomy shared by every stage

pub mod config;
mod error;
pub mod fail_open;
mod types;

pub use config::{
    CommitterConfig, GeneratorConfig, HostingConfig, NotifierConfig, Secret, ServerConfig,
    ShipConfig, TransportStrategy,
};
pub use error::{ErrorCategory, Result, ShipError};
pub use types::*;
