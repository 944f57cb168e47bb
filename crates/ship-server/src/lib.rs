//! # ship-server
//!
//! HTTP front door for shipwright.
//! Accepts task descriptors, acknowledges them immediately and hands each one
//! to the [`Dispatcher`] as a background run. Run status is readable per task.

mod server;

pub use server::{router, serve, AppState, SharedState};

use ship_orchestrator::{Dispatcher, RunRegistry};
use std::sync::Arc;
use tracing::info;

/// Run the front door on `addr` until the process stops
pub async fn run(
    dispatcher: Arc<Dispatcher>,
    registry: Arc<RunRegistry>,
    addr: &str,
) -> anyhow::Result<()> {
    info!("Starting shipwright server on {}", addr);
    let state = Arc::new(AppState {
        dispatcher,
        registry,
    });
    serve(state, addr).await
}
