//! Integration tests for the training API endpoints

mod helpers;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use helpers::{
    accept_all, generate_test_wav, stub_video_analyzer, write_text_sample, AudioConfig,
    FakeToolkit, GatedEngine, RecordingEngine,
};
use http_body_util::BodyExt;
use persona_common::events::EventBus;
use persona_trainer::services::job_store::JobStore;
use persona_trainer::services::training_orchestrator::TrainingOrchestrator;
use persona_trainer::services::voice_engine::VoiceCloningEngine;
use persona_trainer::AppState;
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tower::util::ServiceExt;

fn create_test_app(root: &Path, engine: Arc<dyn VoiceCloningEngine>) -> axum::Router {
    let event_bus = EventBus::new(100);
    let orchestrator = TrainingOrchestrator::new(root, JobStore::new(), event_bus.clone())
        .with_video_analyzer(stub_video_analyzer(FakeToolkit::new(45.0)))
        .with_voice_engine(engine)
        .with_thresholds(accept_all());
    persona_trainer::build_router(AppState::new(orchestrator, event_bus))
}

async fn send(app: &axum::Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => request
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

/// Poll the progress endpoint until the job reaches a terminal status
async fn wait_for_terminal(app: &axum::Router, persona_id: &str) -> Value {
    let uri = format!("/personas/{}/progress", persona_id);
    for _ in 0..200 {
        let (status, body) = send(app, "GET", &uri, None).await;
        assert_eq!(status, StatusCode::OK);
        if matches!(body["status"].as_str(), Some("COMPLETED" | "FAILED" | "CANCELLED")) {
            return body;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("job {} did not finish", persona_id);
}

#[tokio::test]
async fn test_health_endpoint() {
    let root = TempDir::new().unwrap();
    let app = create_test_app(root.path(), Arc::new(RecordingEngine::default()));

    let (status, body) = send(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "persona-trainer");
    assert_eq!(body["active_jobs"], 0);
}

#[tokio::test]
async fn test_train_text_persona_over_http() {
    let root = TempDir::new().unwrap();
    let inputs = TempDir::new().unwrap();
    let app = create_test_app(root.path(), Arc::new(RecordingEngine::default()));
    let essay = write_text_sample(&inputs.path().join("essay.txt"), "Hello there. Lovely day!").unwrap();

    let (status, body) = send(
        &app,
        "POST",
        "/personas/writer/train",
        Some(json!({ "text": [essay] })),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["persona_id"], "writer");
    assert_eq!(body["status"], "QUEUED");

    let progress = wait_for_terminal(&app, "writer").await;
    assert_eq!(progress["status"], "COMPLETED");
    assert_eq!(progress["progress_percentage"], 100.0);

    let (status, model) = send(&app, "GET", "/personas/writer/model", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(model["persona_id"], "writer");
    assert!(model.get("personality_model").is_some());
    assert!(model.get("voice_model").is_none());

    let (status, jobs) = send(&app, "GET", "/jobs", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(jobs.as_array().unwrap().len(), 1);

    // finished jobs cannot be cancelled
    let (status, body) = send(&app, "POST", "/personas/writer/cancel", None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "CONFLICT");
}

#[tokio::test]
async fn test_train_rejects_bad_requests() {
    let root = TempDir::new().unwrap();
    let app = create_test_app(root.path(), Arc::new(RecordingEngine::default()));

    let (status, body) = send(&app, "POST", "/personas/p1/train", Some(json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");

    let (status, _) = send(
        &app,
        "POST",
        "/personas/bad$id/train",
        Some(json!({ "text": ["/tmp/a.txt"] })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, "GET", "/personas/bad$id/model", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unknown_persona_is_not_found() {
    let root = TempDir::new().unwrap();
    let app = create_test_app(root.path(), Arc::new(RecordingEngine::default()));

    for (method, uri) in [
        ("GET", "/personas/ghost/progress"),
        ("POST", "/personas/ghost/cancel"),
        ("GET", "/personas/ghost/model"),
    ] {
        let (status, body) = send(&app, method, uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{method} {uri}");
        assert_eq!(body["error"]["code"], "NOT_FOUND");
    }
}

#[tokio::test]
async fn test_duplicate_and_cancel_while_running() {
    let root = TempDir::new().unwrap();
    let inputs = TempDir::new().unwrap();
    let (engine, entered, release) = GatedEngine::new();
    let app = create_test_app(root.path(), Arc::new(engine));

    let speech = generate_test_wav(&inputs.path().join("speech.wav"), &AudioConfig::default()).unwrap();
    let essay = write_text_sample(&inputs.path().join("essay.txt"), "Not reached.").unwrap();
    let request = json!({ "audio": [speech], "text": [essay] });

    let (status, _) = send(&app, "POST", "/personas/p1/train", Some(request.clone())).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    tokio::task::spawn_blocking(move || entered.recv())
        .await
        .unwrap()
        .unwrap();

    let (status, body) = send(&app, "POST", "/personas/p1/train", Some(request)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "CONFLICT");

    let (_, health) = send(&app, "GET", "/health", None).await;
    assert_eq!(health["active_jobs"], 1);

    let (status, body) = send(&app, "POST", "/personas/p1/cancel", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["cancelled"], true);
    release.send(()).unwrap();

    let progress = wait_for_terminal(&app, "p1").await;
    assert_eq!(progress["status"], "CANCELLED");
    let (status, _) = send(&app, "GET", "/personas/p1/model", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
