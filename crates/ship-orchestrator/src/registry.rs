//! Latest-run status per task

use chrono::{DateTime, Utc};
use serde::Serialize;
use ship_core::{DeployResult, ErrorCategory};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::orchestrator::RunError;
use crate::state_machine::State;

/// Status of one run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunRecord {
    pub run_id: Uuid,
    pub task: String,
    pub round: u32,
    pub state: State,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deploy: Option<DeployResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RunError>,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl RunRecord {
    pub fn new(run_id: Uuid, task: impl Into<String>, round: u32) -> Self {
        Self {
            run_id,
            task: task.into(),
            round,
            state: State::Start,
            deploy: None,
            error: None,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn category(&self) -> Option<ErrorCategory> {
        self.error.as_ref().map(|e| e.category)
    }
}

/// Tasks tracked when no limit is configured
pub const DEFAULT_MAX_TRACKED_TASKS: usize = 1000;

/// In-memory map from task name to its most recent run.
///
/// Holds at most `capacity` tasks. Starting a run for a new task at
/// capacity evicts the task whose run finished longest ago; records of
/// unfinished runs are never evicted.
#[derive(Debug)]
pub struct RunRegistry {
    records: RwLock<HashMap<String, RunRecord>>,
    capacity: usize,
}

impl Default for RunRegistry {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_MAX_TRACKED_TASKS)
    }
}

impl RunRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    /// Start tracking a run, replacing the task's previous record
    pub async fn begin(&self, run_id: Uuid, task: &str, round: u32) {
        let mut records = self.records.write().await;
        if !records.contains_key(task) && records.len() >= self.capacity {
            let oldest = records
                .iter()
                .filter_map(|(key, r)| r.finished_at.map(|at| (at, key.clone())))
                .min();
            if let Some((_, key)) = oldest {
                debug!("Evicting status record for {}", key);
                records.remove(&key);
            }
        }
        records.insert(task.to_string(), RunRecord::new(run_id, task, round));
    }

    /// Record a state change. Ignored if a newer run has replaced this one.
    pub async fn update_state(&self, run_id: Uuid, task: &str, state: &State) {
        let mut records = self.records.write().await;
        if let Some(record) = records.get_mut(task).filter(|r| r.run_id == run_id) {
            record.state = state.clone();
        }
    }

    /// Record the final state and outcome of a run
    pub async fn finish(
        &self,
        run_id: Uuid,
        task: &str,
        state: &State,
        deploy: Option<DeployResult>,
        error: Option<RunError>,
    ) {
        let mut records = self.records.write().await;
        if let Some(record) = records.get_mut(task).filter(|r| r.run_id == run_id) {
            record.state = state.clone();
            record.deploy = deploy;
            record.error = error;
            record.finished_at = Some(Utc::now());
        }
    }

    /// Mark the task's current run as failed if it never reported an
    /// outcome, e.g. because its worker panicked
    pub async fn abandon(&self, task: &str, reason: &str) {
        let mut records = self.records.write().await;
        if let Some(record) = records.get_mut(task).filter(|r| r.finished_at.is_none()) {
            record.state = State::Failed {
                error: reason.to_string(),
            };
            record.deploy = None;
            record.error = Some(RunError {
                category: ErrorCategory::Internal,
                message: reason.to_string(),
            });
            record.finished_at = Some(Utc::now());
        }
    }

    pub async fn get(&self, task: &str) -> Option<RunRecord> {
        self.records.read().await.get(task).cloned()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}
