//! Excuse HTTP API
//!
//! Axum-based HTTP server for generating, rating and listing excuses, plus
//! static serving of rendered proof artifacts.
//!
//! Architecture: each endpoint has a thin axum handler that delegates to a pure
//! inner function. The inner functions are directly testable without axum dispatch
//! machinery.
//!
//! Endpoints:
//! - GET    /health              — health check with DB status
//! - GET    /version             — server version info
//! - GET    /options             — accepted scenario / criticality / proof tags
//! - POST   /excuses             — generate an excuse, optionally with proof
//! - GET    /excuses             — recent history
//! - DELETE /excuses             — clear all history
//! - POST   /excuses/:id/rating  — rate an excuse
//! - GET    /static/...          — proof artifacts

use std::sync::Arc;

use anyhow::Result;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use excuse_core::config::HttpConfig;
use excuse_core::{
    CompletionBackend, Criticality, ExcuseConfig, ExcuseGenerator, ExcuseStore, GenerationError,
    ProofKind, ProofRenderer, Rating, Scenario, StoreError,
};
use serde::Deserialize;
use sqlx::SqlitePool;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

/// Shared state for all HTTP handlers
pub struct HttpState {
    pub pool: SqlitePool,
    pub store: ExcuseStore,
    pub generator: ExcuseGenerator,
    pub renderer: ProofRenderer,
    pub config: ExcuseConfig,
}

impl HttpState {
    pub fn new(pool: SqlitePool, backend: Arc<dyn CompletionBackend>, config: ExcuseConfig) -> Self {
        let store = ExcuseStore::new(pool.clone());
        Self {
            generator: ExcuseGenerator::new(backend, store.clone()),
            renderer: ProofRenderer::from_config(&config.proofs),
            pool,
            store,
            config,
        }
    }
}

/// Build the Axum router with all endpoints
pub fn build_router(state: Arc<HttpState>) -> Router {
    let static_files = ServeDir::new(&state.config.proofs.static_root);

    Router::new()
        .route("/health", get(health_handler))
        .route("/version", get(version_handler))
        .route("/options", get(options_handler))
        .route(
            "/excuses",
            post(generate_handler).get(history_handler).delete(clear_handler),
        )
        .route("/excuses/:id/rating", post(rate_handler))
        .nest_service("/static", static_files)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP server on the configured address.
/// Gracefully shuts down when the broadcast shutdown signal fires.
pub async fn start_http_server(
    state: Arc<HttpState>,
    http: HttpConfig,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<()> {
    let addr = format!("{}:{}", http.host, http.port);

    let app = build_router(state);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Excuse HTTP API listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
            tracing::info!("HTTP server shutting down...");
        })
        .await?;

    Ok(())
}

// ============================================================================
// Request DTOs
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    pub scenario: String,
    pub criticality: String,
    #[serde(default)]
    pub with_proof: bool,
    pub proof_type: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct HistoryQuery {
    pub limit: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct RateRequest {
    pub rating: i64,
}

fn error_json(msg: impl std::fmt::Display) -> serde_json::Value {
    serde_json::json!({
        "error": msg.to_string(),
        "status": "error",
    })
}

// ============================================================================
// Inner (directly testable) business logic functions
// ============================================================================

/// Inner health check — queries DB and returns (status_code, json_body).
pub async fn health_inner(pool: &SqlitePool) -> (StatusCode, serde_json::Value) {
    match excuse_core::db::health_check(pool).await {
        Ok(v) => (
            StatusCode::OK,
            serde_json::json!({
                "status": "healthy",
                "version": env!("CARGO_PKG_VERSION"),
                "sqlite": v,
            }),
        ),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            serde_json::json!({
                "status": "unhealthy",
                "error": e.to_string(),
            }),
        ),
    }
}

/// Inner version — returns version info (pure, no IO).
pub fn version_inner() -> serde_json::Value {
    serde_json::json!({
        "version": env!("CARGO_PKG_VERSION"),
        "protocol": "excuse/1",
    })
}

/// Inner options — the closed tag sets accepted by `POST /excuses`.
pub fn options_inner() -> serde_json::Value {
    serde_json::json!({
        "scenarios": Scenario::ALL.map(Scenario::as_str),
        "criticalities": Criticality::ALL.map(Criticality::as_str),
        "proof_types": ProofKind::ALL.map(ProofKind::as_str),
    })
}

/// Parse the request tags. Proof is only requested when `with_proof` is set
/// and a proof type is given.
pub fn parse_generate_request(
    req: &GenerateRequest,
) -> Result<(Scenario, Criticality, Option<ProofKind>), excuse_core::UnknownTag> {
    let scenario = req.scenario.parse()?;
    let criticality = req.criticality.parse()?;
    let proof = match (&req.proof_type, req.with_proof) {
        (Some(tag), true) => Some(tag.parse()?),
        _ => None,
    };
    Ok((scenario, criticality, proof))
}

pub fn generation_status(err: &GenerationError) -> StatusCode {
    match err {
        GenerationError::Completion(_) | GenerationError::EmptyResponse => StatusCode::BAD_GATEWAY,
        GenerationError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Inner generate — creates and stores an excuse, renders the proof if asked,
/// and returns the excuse with the refreshed history.
pub async fn generate_inner(
    state: &HttpState,
    req: GenerateRequest,
) -> (StatusCode, serde_json::Value) {
    let (scenario, criticality, proof) = match parse_generate_request(&req) {
        Ok(parsed) => parsed,
        Err(e) => return (StatusCode::BAD_REQUEST, error_json(e)),
    };

    let excuse = match state.generator.generate(scenario, criticality, proof).await {
        Ok(excuse) => excuse,
        Err(e) => {
            tracing::error!(error = %e, "Excuse generation failed");
            return (generation_status(&e), error_json(e));
        }
    };

    let mut proof_url = None;
    if let Some(kind) = proof {
        let renderer = state.renderer.clone();
        let text = excuse.text.clone();
        let rendered = tokio::task::spawn_blocking(move || renderer.render(&text, kind)).await;

        let failure = match rendered {
            Ok(Ok(artifact)) => {
                proof_url = Some(artifact.url);
                None
            }
            Ok(Err(e)) => Some(e.to_string()),
            Err(e) => Some(format!("proof rendering task failed: {}", e)),
        };

        if let Some(message) = failure {
            tracing::error!(id = excuse.id, error = %message, "Proof rendering failed");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                serde_json::json!({
                    "error": message,
                    "status": "error",
                    "excuse": excuse,
                }),
            );
        }
    }

    let history = match state.store.list_recent(state.config.history.limit).await {
        Ok(h) => h,
        Err(e) => return (StatusCode::INTERNAL_SERVER_ERROR, error_json(e)),
    };

    (
        StatusCode::OK,
        serde_json::json!({
            "excuse": excuse,
            "proof_url": proof_url,
            "history": history,
        }),
    )
}

/// Inner history — recent excuses, newest first.
pub async fn history_inner(
    store: &ExcuseStore,
    limit: Option<u32>,
    default_limit: u32,
) -> (StatusCode, serde_json::Value) {
    let limit = limit.unwrap_or(default_limit);
    match store.list_recent(limit).await {
        Ok(history) => (
            StatusCode::OK,
            serde_json::json!({
                "count": history.len(),
                "history": history,
            }),
        ),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, error_json(e)),
    }
}

/// Inner rate — 400 for out-of-scale ratings, 404 for unknown ids.
pub async fn rate_inner(
    store: &ExcuseStore,
    id: i64,
    req: RateRequest,
) -> (StatusCode, serde_json::Value) {
    let rating = match Rating::new(req.rating) {
        Ok(r) => r,
        Err(e) => return (StatusCode::BAD_REQUEST, error_json(e)),
    };

    match store.set_rating(id, rating).await {
        Ok(()) => (
            StatusCode::OK,
            serde_json::json!({
                "id": id,
                "rating": rating,
            }),
        ),
        Err(e @ StoreError::RecordNotFound(_)) => (StatusCode::NOT_FOUND, error_json(e)),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, error_json(e)),
    }
}

/// Inner clear — deletes every record. Proof artifacts are left in place.
pub async fn clear_inner(store: &ExcuseStore) -> (StatusCode, serde_json::Value) {
    match store.clear_all().await {
        Ok(removed) => (StatusCode::OK, serde_json::json!({ "cleared": removed })),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, error_json(e)),
    }
}

// ============================================================================
// Axum handler wrappers (thin — delegate to inner functions)
// ============================================================================

pub async fn health_handler(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    let (status, body) = health_inner(&state.pool).await;
    (status, Json(body))
}

pub async fn version_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(version_inner()))
}

pub async fn options_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(options_inner()))
}

pub async fn generate_handler(
    State(state): State<Arc<HttpState>>,
    Json(req): Json<GenerateRequest>,
) -> impl IntoResponse {
    let (status, body) = generate_inner(&state, req).await;
    (status, Json(body))
}

pub async fn history_handler(
    State(state): State<Arc<HttpState>>,
    Query(query): Query<HistoryQuery>,
) -> impl IntoResponse {
    let (status, body) =
        history_inner(&state.store, query.limit, state.config.history.limit).await;
    (status, Json(body))
}

pub async fn rate_handler(
    State(state): State<Arc<HttpState>>,
    Path(id): Path<i64>,
    Json(req): Json<RateRequest>,
) -> impl IntoResponse {
    let (status, body) = rate_inner(&state.store, id, req).await;
    (status, Json(body))
}

pub async fn clear_handler(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    let (status, body) = clear_inner(&state.store).await;
    (status, Json(body))
}

// ============================================================================
// Unit Tests — inner functions without axum dispatch
// ============================================================================
