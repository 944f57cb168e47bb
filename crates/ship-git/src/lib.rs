//! # ship-git
//!
//! git integration layer for shipwright.
//!
//! This crate provides:
//! - git command execution abstraction (real and mock executors)
//! - Repository operations used by the working-copy transport
//! - `git status --porcelain` parsing

mod command;
mod repo;
mod status;

pub use command::{GitCommand, GitExecutor, GitOutput, MockGitExecutor};
pub use repo::GitRepo;
pub use status::{parse_porcelain, StatusEntry};
