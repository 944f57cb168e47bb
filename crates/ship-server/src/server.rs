//! Axum routes for the front door

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use serde_json::{json, Value};
use ship_core::TaskDescriptor;
use ship_orchestrator::{Dispatcher, RunRecord, RunRegistry};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{debug, error, info, warn};

/// Shared application state
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
    pub registry: Arc<RunRegistry>,
}

pub type SharedState = Arc<AppState>;

/// Build the router without binding a socket
pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/api-endpoint", post(submit_task))
        .route("/api/tasks/:task", get(task_status))
        .route("/api/health", get(health))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serve the front door
pub async fn serve(state: SharedState, addr: &str) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Listening on {}", listener.local_addr()?);
    axum::serve(listener, router(state)).await?;
    Ok(())
}

/// POST /api-endpoint - accept a task descriptor and run it in the background
async fn submit_task(
    State(app): State<SharedState>,
    body: Bytes,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let task: TaskDescriptor = serde_json::from_slice(&body).map_err(|e| {
        warn!("Rejected request body: {}", e);
        (
            StatusCode::BAD_REQUEST,
            Json(json!({ "detail": format!("Invalid request body: {}", e) })),
        )
    })?;

    info!(
        "Received request for task: {} (round {})",
        task.display_name(),
        task.round
    );
    supervise(&app, task);

    Ok(Json(json!({ "message": "Task received and is being processed." })))
}

/// Dispatch a run and watch it from a detached task, so that a run that
/// dies without a report still ends up failed in the registry
fn supervise(app: &SharedState, task: TaskDescriptor) {
    let key = task.run_key().to_string();
    let handle = app.dispatcher.dispatch(task);
    let registry = app.registry.clone();

    tokio::spawn(async move {
        match handle.await {
            Ok(report) if report.succeeded() => {
                debug!("Run {} for {} completed", report.run_id, key);
            }
            Ok(report) => {
                debug!("Run {} for {} ended in {}", report.run_id, key, report.final_state.name());
            }
            Err(e) => {
                error!("Run for {} aborted: {}", key, e);
                registry
                    .abandon(&key, &format!("Run aborted: {}", e))
                    .await;
            }
        }
    });
}

/// GET /api/tasks/:task - latest run of a task
async fn task_status(
    State(app): State<SharedState>,
    Path(task): Path<String>,
) -> Result<Json<RunRecord>, StatusCode> {
    app.registry
        .get(&task)
        .await
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

/// GET /
async fn root() -> Json<Value> {
    Json(json!({ "status": "shipwright is running." }))
}

/// GET /api/health
async fn health(State(app): State<SharedState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "shipwright",
        "in_flight": app.dispatcher.in_flight(),
    }))
}
