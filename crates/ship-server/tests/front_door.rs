//! Front door against an in-process orchestrator

use async_trait::async_trait;
use serde_json::{json, Value};
use ship_agent::ArtifactGenerator;
use ship_core::{Attachment, NotificationPayload, Result, ShipConfig};
use ship_github::InMemoryHost;
use ship_orchestrator::{
    DirectApiTransport, Dispatcher, Notifier, Orchestrator, Provisioner, RunRegistry,
};
use ship_server::{router, AppState};
use std::sync::Arc;
use std::time::Duration;

struct EchoGenerator;

#[async_trait]
impl ArtifactGenerator for EchoGenerator {
    async fn generate_markup(&self, brief: &str, _attachments: &[Attachment]) -> Result<String> {
        Ok(format!("<html><body>{}</body></html>", brief))
    }

    async fn generate_description(&self, brief: &str, repo_name: &str) -> Result<String> {
        Ok(format!("# {}\n\n{}", repo_name, brief))
    }

    async fn revise_markup(&self, existing: &str, _b: &str, _a: &[Attachment]) -> Result<String> {
        Ok(existing.to_string())
    }
}

/// Crashes the worker instead of returning an error
struct PanickingGenerator;

#[async_trait]
impl ArtifactGenerator for PanickingGenerator {
    async fn generate_markup(&self, _brief: &str, _attachments: &[Attachment]) -> Result<String> {
        panic!("generator crashed");
    }

    async fn generate_description(&self, _brief: &str, _repo_name: &str) -> Result<String> {
        panic!("generator crashed");
    }

    async fn revise_markup(&self, _e: &str, _b: &str, _a: &[Attachment]) -> Result<String> {
        panic!("generator crashed");
    }
}

struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn notify(&self, _url: &str, _payload: &NotificationPayload) -> Result<()> {
        Ok(())
    }
}

async fn spawn_server() -> (String, Arc<InMemoryHost>) {
    spawn_server_with(Arc::new(EchoGenerator)).await
}

async fn spawn_server_with(generator: Arc<dyn ArtifactGenerator>) -> (String, Arc<InMemoryHost>) {
    let host = Arc::new(InMemoryHost::new("octo"));
    let mut config = ShipConfig::default();
    config.hosting.owner = "octo".to_string();
    let config = Arc::new(config);

    let registry = Arc::new(RunRegistry::new());
    let transport = Arc::new(DirectApiTransport::new(
        host.clone(),
        host.clone(),
        config.clone(),
    ));
    let orchestrator = Orchestrator::new(
        config.clone(),
        generator,
        transport,
        Provisioner::new(host.clone(), &config.hosting),
        Arc::new(NoopNotifier),
    )
    .with_registry(registry.clone());

    let state = Arc::new(AppState {
        dispatcher: Dispatcher::new(Arc::new(orchestrator)),
        registry,
    });

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router(state)).await.unwrap();
    });
    (format!("http://{}", addr), host)
}

/// Poll the status endpoint until the run reaches a terminal state
async fn wait_for_terminal(client: &reqwest::Client, base: &str, task: &str) -> Value {
    for _ in 0..100 {
        let response = client
            .get(format!("{}/api/tasks/{}", base, task))
            .send()
            .await
            .unwrap();
        if response.status().is_success() {
            let record: Value = response.json().await.unwrap();
            if record.get("finished_at").is_some() {
                return record;
            }
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("run for {} did not finish", task);
}

#[tokio::test]
async fn test_task_is_acknowledged_then_published() {
    let (base, host) = spawn_server().await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/api-endpoint", base))
        .json(&json!({"task": "demo-app", "brief": "hello world", "email": "a@b.c"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["message"], "Task received and is being processed.");

    let record = wait_for_terminal(&client, &base, "demo-app").await;
    assert_eq!(record["state"]["state"], "done");
    assert_eq!(record["round"], 1);
    assert_eq!(
        record["deploy"]["pages_url"],
        "https://octo.github.io/demo-app/"
    );
    assert_eq!(
        host.file("demo-app", "index.html").as_deref(),
        Some("<html><body>hello world</body></html>")
    );
}

#[tokio::test]
async fn test_invalid_descriptor_is_acknowledged_and_fails_in_background() {
    let (base, host) = spawn_server().await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/api-endpoint", base))
        .json(&json!({"task": "demo-app", "brief": "x", "round": 7}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let record = wait_for_terminal(&client, &base, "demo-app").await;
    assert_eq!(record["state"]["state"], "failed");
    assert_eq!(record["error"]["category"], "validation");
    assert_eq!(host.call_count(), 0);
}

#[tokio::test]
async fn test_malformed_body_is_bad_request() {
    let (base, _host) = spawn_server().await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/api-endpoint", base))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
    let body: Value = response.json().await.unwrap();
    assert!(body["detail"]
        .as_str()
        .unwrap()
        .starts_with("Invalid request body:"));
}

#[tokio::test]
async fn test_root_and_unknown_task() {
    let (base, _host) = spawn_server().await;
    let client = reqwest::Client::new();

    let body: Value = client
        .get(format!("{}/", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "shipwright is running.");

    let response = client
        .get(format!("{}/api/tasks/nope", base))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn test_crashed_run_is_recorded_as_failed() {
    let (base, _host) = spawn_server_with(Arc::new(PanickingGenerator)).await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/api-endpoint", base))
        .json(&json!({"task": "demo-app", "brief": "hello"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let record = wait_for_terminal(&client, &base, "demo-app").await;
    assert_eq!(record["state"]["state"], "failed");
    assert_eq!(record["error"]["category"], "internal");
    assert!(record["error"]["message"]
        .as_str()
        .unwrap()
        .starts_with("Run aborted"));

    let health: Value = client
        .get(format!("{}/api/health", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["in_flight"], 0);
}

#[tokio::test]
async fn test_status_is_keyed_by_trimmed_task_name() {
    let (base, _host) = spawn_server().await;
    let client = reqwest::Client::new();

    client
        .post(format!("{}/api-endpoint", base))
        .json(&json!({"task": " demo-app ", "brief": "hello"}))
        .send()
        .await
        .unwrap();

    let record = wait_for_terminal(&client, &base, "demo-app").await;
    assert_eq!(record["state"]["state"], "done");
    assert_eq!(record["task"], "demo-app");
}
