//! HTTP integration tests for the excuse REST API
//!
//! Each test builds its own in-memory SQLite store, a scripted completion
//! backend and a temporary static root, then drives the full router through
//! Axum `oneshot` dispatch.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use excuse_core::{CompletionBackend, CompletionError, ExcuseConfig};
use excuse_server::http::{build_router, HttpState};
use serde_json::{json, Value};
use tower::ServiceExt;

/// Replies with queued responses in order, then keeps repeating the last one.
struct ScriptedBackend {
    responses: Mutex<Vec<Result<String, CompletionError>>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedBackend {
    fn new(responses: Vec<Result<String, CompletionError>>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses),
            prompts: Mutex::new(Vec::new()),
        })
    }

    fn replying(text: &str) -> Arc<Self> {
        Self::new(vec![Ok(text.to_string())])
    }
}

#[async_trait]
impl CompletionBackend for ScriptedBackend {
    async fn complete(&self, prompt: &str) -> Result<String, CompletionError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        let mut responses = self.responses.lock().unwrap();
        if responses.len() > 1 {
            responses.remove(0)
        } else {
            match &responses[0] {
                Ok(text) => Ok(text.clone()),
                Err(_) => Err(CompletionError::Api {
                    code: 503,
                    message: "model overloaded".to_string(),
                }),
            }
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

async fn make_state(backend: Arc<ScriptedBackend>, static_root: &Path) -> Arc<HttpState> {
    let pool = excuse_core::db::connect_in_memory().await.unwrap();
    excuse_core::db::init_schema(&pool).await.unwrap();

    let mut config = ExcuseConfig::default();
    config.proofs.static_root = static_root.to_path_buf();

    Arc::new(HttpState::new(pool, backend, config))
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let req = match body {
        Some(b) => builder
            .header("content-type", "application/json")
            .body(Body::from(b.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

// ===========================================================================
// TEST 1: GET /health and /version
// ===========================================================================
#[tokio::test]
async fn test_health_and_version() {
    let dir = tempfile::tempdir().unwrap();
    let app = build_router(make_state(ScriptedBackend::replying("x"), dir.path()).await);

    let (status, body) = send(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert!(body["sqlite"].is_string());

    let (status, body) = send(&app, "GET", "/version", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["protocol"], "excuse/1");
}

// ===========================================================================
// TEST 2: medical proof produces a PDF that is served under /static
// ===========================================================================
#[tokio::test]
async fn test_generate_with_medical_proof() {
    let dir = tempfile::tempdir().unwrap();
    let backend = ScriptedBackend::replying("I had a migraine and could not look at a screen.\nSorry!");
    let app = build_router(make_state(backend.clone(), dir.path()).await);

    let (status, body) = send(
        &app,
        "POST",
        "/excuses",
        Some(json!({
            "scenario": "Office",
            "criticality": "High",
            "with_proof": true,
            "proof_type": "medical"
        })),
    )
    .await;

    assert_eq!(status, StatusCode::OK, "body: {}", body);
    assert_eq!(body["excuse"]["text"], "I had a migraine and could not look at a screen.");
    assert!(body["excuse"]["id"].is_i64());

    let url = body["proof_url"].as_str().unwrap();
    assert!(url.starts_with("/static/proofs/proof_") && url.ends_with(".pdf"), "{}", url);

    let history = body["history"].as_array().unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0]["text"], body["excuse"]["text"]);
    assert!(history[0]["rating"].is_null());

    assert!(backend.prompts.lock().unwrap()[0].contains("health issue"));

    // Artifact exists on disk and is reachable through the static route
    let file_name = url.rsplit('/').next().unwrap();
    assert!(dir.path().join("proofs").join(file_name).exists());

    let resp = app
        .clone()
        .oneshot(Request::builder().uri(url).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    assert!(bytes.starts_with(b"%PDF"));
}

// ===========================================================================
// TEST 3: casual proof produces a PNG; no proof when the flag is off
// ===========================================================================
#[tokio::test]
async fn test_generate_png_and_no_proof() {
    let dir = tempfile::tempdir().unwrap();
    let backend = ScriptedBackend::new(vec![
        Ok("My neighbour's dog escaped and I spent the morning chasing it.".to_string()),
        Ok("The train was cancelled and the replacement bus never came.".to_string()),
    ]);
    let app = build_router(make_state(backend.clone(), dir.path()).await);

    let (status, body) = send(
        &app,
        "POST",
        "/excuses",
        Some(json!({
            "scenario": "Social Event",
            "criticality": "Low",
            "with_proof": true,
            "proof_type": "casual"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "body: {}", body);
    assert!(body["proof_url"].as_str().unwrap().ends_with(".png"));

    let (status, body) = send(
        &app,
        "POST",
        "/excuses",
        Some(json!({
            "scenario": "Late",
            "criticality": "Medium",
            "with_proof": false,
            "proof_type": "medical"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["proof_url"].is_null());
    assert!(!backend.prompts.lock().unwrap()[1].contains("health issue"));

    // Newest first
    let history = body["history"].as_array().unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(
        history[0]["text"],
        "The train was cancelled and the replacement bus never came."
    );
}

// ===========================================================================
// TEST 4: unknown tags are rejected before any completion call
// ===========================================================================
#[tokio::test]
async fn test_unknown_tags_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let backend = ScriptedBackend::replying("unused");
    let app = build_router(make_state(backend.clone(), dir.path()).await);

    let (status, body) = send(
        &app,
        "POST",
        "/excuses",
        Some(json!({
            "scenario": "Office",
            "criticality": "High",
            "with_proof": true,
            "proof_type": "affidavit"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], "error");
    assert!(body["error"].as_str().unwrap().contains("affidavit"));

    let (status, _) = send(
        &app,
        "POST",
        "/excuses",
        Some(json!({ "scenario": "Vacation", "criticality": "High" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert!(backend.prompts.lock().unwrap().is_empty());
}

// ===========================================================================
// TEST 5: completion failure maps to 502 and stores nothing
// ===========================================================================
#[tokio::test]
async fn test_generation_failure_is_bad_gateway() {
    let dir = tempfile::tempdir().unwrap();
    let backend = ScriptedBackend::new(vec![Err(CompletionError::MissingText)]);
    let app = build_router(make_state(backend, dir.path()).await);

    let (status, body) = send(
        &app,
        "POST",
        "/excuses",
        Some(json!({ "scenario": "School", "criticality": "Low" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["status"], "error");

    let (_, body) = send(&app, "GET", "/excuses", None).await;
    assert_eq!(body["count"], 0);
}

// ===========================================================================
// TEST 6: proof failure still reports the stored excuse
// ===========================================================================
#[tokio::test]
async fn test_proof_failure_keeps_excuse() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("static");
    std::fs::write(&blocker, b"not a directory").unwrap();

    let app = build_router(
        make_state(ScriptedBackend::replying("Burst pipe flooded the kitchen."), &blocker).await,
    );

    let (status, body) = send(
        &app,
        "POST",
        "/excuses",
        Some(json!({
            "scenario": "Family",
            "criticality": "High",
            "with_proof": true,
            "proof_type": "receipt"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["excuse"]["text"], "Burst pipe flooded the kitchen.");

    let (_, body) = send(&app, "GET", "/excuses", None).await;
    assert_eq!(body["count"], 1);
}

// ===========================================================================
// TEST 7: rating flow (200, 400, 404) and dedup reuse of the record
// ===========================================================================
#[tokio::test]
async fn test_rating_endpoint() {
    let dir = tempfile::tempdir().unwrap();
    let app = build_router(
        make_state(ScriptedBackend::replying("Power cut reset my alarm."), dir.path()).await,
    );

    let request = json!({ "scenario": "Late", "criticality": "Low" });
    let (_, first) = send(&app, "POST", "/excuses", Some(request.clone())).await;
    let id = first["excuse"]["id"].as_i64().unwrap();

    let (status, body) = send(
        &app,
        "POST",
        &format!("/excuses/{}/rating", id),
        Some(json!({ "rating": 5 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["rating"], 5);

    let (status, _) = send(
        &app,
        "POST",
        &format!("/excuses/{}/rating", id),
        Some(json!({ "rating": 0 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
        &app,
        "POST",
        &format!("/excuses/{}/rating", id + 1000),
        Some(json!({ "rating": 3 })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["status"], "error");

    // Same text again reuses the row and keeps its rating
    let (_, second) = send(&app, "POST", "/excuses", Some(request)).await;
    assert_eq!(second["excuse"]["id"], id);
    let history = second["history"].as_array().unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0]["rating"], 5);
}

// ===========================================================================
// TEST 8: history limit, clear, and the options listing
// ===========================================================================
#[tokio::test]
async fn test_history_clear_and_options() {
    let dir = tempfile::tempdir().unwrap();
    let backend = ScriptedBackend::new(
        (1..=7)
            .map(|i| Ok(format!("Excuse number {}.", i)))
            .collect(),
    );
    let app = build_router(make_state(backend, dir.path()).await);

    for _ in 0..7 {
        let (status, _) = send(
            &app,
            "POST",
            "/excuses",
            Some(json!({ "scenario": "Friends", "criticality": "Medium" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    // "Other" is not a scenario tag; nothing is stored for it
    let (status, _) = send(
        &app,
        "POST",
        "/excuses",
        Some(json!({ "scenario": "Other", "criticality": "Medium" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, body) = send(&app, "GET", "/excuses", None).await;
    assert_eq!(body["count"], 5, "default history limit");
    assert_eq!(body["history"][0]["text"], "Excuse number 7.");

    let (_, body) = send(&app, "GET", "/excuses?limit=10", None).await;
    assert_eq!(body["count"], 7);

    let (status, body) = send(&app, "DELETE", "/excuses", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["cleared"], 7);

    let (_, body) = send(&app, "GET", "/excuses", None).await;
    assert_eq!(body["count"], 0);

    let (status, body) = send(&app, "GET", "/options", None).await;
    assert_eq!(status, StatusCode::OK);
    let scenarios = body["scenarios"].as_array().unwrap();
    assert!(scenarios.contains(&json!("Social Event")));
    assert!(scenarios.contains(&json!("Friends")));
    assert!(!scenarios.contains(&json!("Other")));
}
