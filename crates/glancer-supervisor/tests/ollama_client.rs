//! Integration tests for the Ollama client against in-process HTTP servers.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use glancer_supervisor::{
    ChatMessage, ClientError, ExecutableLocator, ModelName, OllamaClient, PullProgress,
    Supervisor, SupervisorConfig, SupervisorError,
};
use serde_json::{json, Value};

async fn spawn_server(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

fn closed_port_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}

fn tags(names: &[&str]) -> Value {
    json!({ "models": names.iter().map(|n| json!({ "name": n, "size": 1 })).collect::<Vec<_>>() })
}

// --- probe ---

#[tokio::test]
async fn test_probe_true_for_any_http_status() {
    // No route for "/", so every probe gets a 404.
    let url = spawn_server(Router::new()).await;
    let client = OllamaClient::with_url(url);
    assert!(client.is_reachable().await.unwrap());
}

#[tokio::test]
async fn test_probe_false_when_refused() {
    let client = OllamaClient::with_url(closed_port_url());
    assert!(!client.is_reachable().await.unwrap());
}

#[tokio::test]
async fn test_reachability_unresolvable_host_is_an_error() {
    // `.invalid` never resolves, so a misconfigured URL must not look like a
    // stopped server.
    let client = OllamaClient::with_url("http://ollama-host.invalid:11434")
        .with_probe_timeout(Duration::from_secs(5));
    assert!(client.is_reachable().await.is_err());
}

#[tokio::test]
async fn test_supervisor_does_not_launch_for_unresolvable_host() {
    let dir = tempfile::tempdir().unwrap();
    let config = SupervisorConfig {
        model: ModelName::new("llama3"),
        settle_interval: Duration::ZERO,
        locator: ExecutableLocator::new().with_install_dir(dir.path()),
    };
    let mut supervisor = Supervisor::new(
        OllamaClient::with_url("http://ollama-host.invalid:11434")
            .with_probe_timeout(Duration::from_secs(5)),
    );

    let err = supervisor.ensure_server_ready(&config).await.unwrap_err();
    assert!(matches!(err, SupervisorError::Probe(_)), "got {:?}", err);
    assert!(supervisor.handle().is_none());
}

#[tokio::test]
async fn test_probe_timeout_is_an_error() {
    // Accepts connections but never answers.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });

    let client = OllamaClient::with_url(format!("http://{}", addr))
        .with_probe_timeout(Duration::from_millis(200));
    assert!(client.is_reachable().await.is_err());
}

// --- list ---

#[tokio::test]
async fn test_list_models() {
    let app = Router::new().route(
        "/api/tags",
        get(|| async { Json(tags(&["gemma3:270m", "llama3:latest"])) }),
    );
    let client = OllamaClient::with_url(spawn_server(app).await);
    assert_eq!(
        client.list_models().await.unwrap(),
        vec!["gemma3:270m", "llama3:latest"]
    );
}

#[tokio::test]
async fn test_list_models_unreachable() {
    let client = OllamaClient::with_url(closed_port_url());
    assert!(matches!(
        client.list_models().await,
        Err(ClientError::Unreachable(_))
    ));
}

// --- pull ---

#[tokio::test]
async fn test_pull_reports_progress_until_success() {
    let app = Router::new().route(
        "/api/pull",
        post(|Json(body): Json<Value>| async move {
            assert_eq!(body["model"], "llama3");
            [
                r#"{"status":"pulling manifest"}"#,
                r#"{"status":"pulling 6a0746a1ec1a","digest":"sha256:6a07","total":100,"completed":50}"#,
                r#"{"status":"pulling 6a0746a1ec1a","digest":"sha256:6a07","total":100,"completed":100}"#,
                r#"{"status":"verifying sha256 digest"}"#,
                r#"{"status":"success"}"#,
            ]
            .join("\n")
        }),
    );
    let client = OllamaClient::with_url(spawn_server(app).await);

    let mut seen: Vec<PullProgress> = Vec::new();
    client
        .pull_with_progress("llama3", |p| seen.push(p.clone()))
        .await
        .unwrap();

    assert_eq!(seen.len(), 5);
    assert_eq!(seen[1].completed, Some(50));
    assert!(seen.last().unwrap().is_success());
}

#[tokio::test]
async fn test_pull_error_line() {
    let app = Router::new().route(
        "/api/pull",
        post(|| async {
            "{\"status\":\"pulling manifest\"}\n{\"error\":\"pull model manifest: file does not exist\"}\n"
        }),
    );
    let client = OllamaClient::with_url(spawn_server(app).await);
    match client.pull_with_progress("nope", |_| {}).await {
        Err(ClientError::Remote(msg)) => assert!(msg.contains("file does not exist")),
        other => panic!("Expected Remote error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_pull_without_success_is_incomplete() {
    let app = Router::new().route(
        "/api/pull",
        post(|| async { "{\"status\":\"pulling manifest\"}\n" }),
    );
    let client = OllamaClient::with_url(spawn_server(app).await);
    assert!(matches!(
        client.pull_with_progress("llama3", |_| {}).await,
        Err(ClientError::PullIncomplete(_))
    ));
}

// --- chat ---

#[tokio::test]
async fn test_chat_returns_response_verbatim() {
    let app = Router::new().route(
        "/api/chat",
        post(|Json(body): Json<Value>| async move {
            Json(json!({
                "model": body["model"],
                "message": { "role": "assistant", "content": body["messages"][0]["content"] },
                "done": true,
            }))
        }),
    );
    let client = OllamaClient::with_url(spawn_server(app).await);

    let response = client
        .chat("gemma3:270m", &[ChatMessage::user("echo me")])
        .await
        .unwrap();
    assert_eq!(response["model"], "gemma3:270m");
    assert_eq!(response["message"]["content"], "echo me");
    assert_eq!(response["done"], true);
}

#[tokio::test]
async fn test_chat_api_error_message() {
    let app = Router::new().route(
        "/api/chat",
        post(|| async {
            (
                StatusCode::NOT_FOUND,
                Json(json!({ "error": "model \"llama3\" not found, try pulling it first" })),
            )
        }),
    );
    let client = OllamaClient::with_url(spawn_server(app).await);
    match client.chat("llama3", &[ChatMessage::user("hi")]).await {
        Err(ClientError::Api { status, message }) => {
            assert_eq!(status, 404);
            assert!(message.contains("not found"));
        }
        other => panic!("Expected Api error, got {:?}", other),
    }
}

// --- supervisor over HTTP ---

#[derive(Clone, Default)]
struct Counters {
    pulls: Arc<AtomicUsize>,
}

fn fake_ollama(counters: Counters, models: &'static [&'static str]) -> Router {
    Router::new()
        .route("/", get(|| async { "Ollama is running" }))
        .route("/api/tags", get(move || async move { Json(tags(models)) }))
        .route(
            "/api/pull",
            post(|State(c): State<Counters>| async move {
                c.pulls.fetch_add(1, Ordering::SeqCst);
                "{\"status\":\"success\"}\n"
            }),
        )
        .with_state(counters)
}

#[tokio::test]
async fn test_supervisor_uses_external_server() {
    let counters = Counters::default();
    let url = spawn_server(fake_ollama(counters.clone(), &["gemma3:270m"])).await;
    let mut supervisor = Supervisor::new(OllamaClient::with_url(url));
    let config = SupervisorConfig {
        model: ModelName::new("gemma3:270m"),
        settle_interval: Duration::ZERO,
        locator: ExecutableLocator::new(),
    };

    supervisor.ensure_server_ready(&config).await.unwrap();
    supervisor.ensure_server_ready(&config).await.unwrap();

    assert!(supervisor.handle().is_none());
    assert_eq!(counters.pulls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_supervisor_pulls_missing_model() {
    let counters = Counters::default();
    let url = spawn_server(fake_ollama(counters.clone(), &[])).await;
    let supervisor = Supervisor::new(OllamaClient::with_url(url));

    supervisor
        .ensure_model(&ModelName::new("llama3"))
        .await
        .unwrap();
    assert_eq!(counters.pulls.load(Ordering::SeqCst), 1);
}
