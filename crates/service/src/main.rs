use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{routing::get, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::task;
use tracing::{error, info};

use linex_core::Lineage;
use linex_rag::{explain, Dispatcher, EmbeddingClient, RetrievalConfig, StepIndex};

/// Read-only per-process context: corpus, index, and backends are built once
/// at startup and shared across request handlers. Startup failure aborts the
/// process since nothing can be served without them.
struct AppState {
    lineage: Lineage,
    index: StepIndex,
    dispatcher: Dispatcher,
    config: RetrievalConfig,
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    tracing_subscriber::fmt::init();
    // Corpus load, index build, and the blocking http clients all stay off
    // the async workers.
    let state = task::spawn_blocking(build_state).await??;
    let app = Router::new()
        .route("/health", get(handle_health))
        .route("/explain", post(handle_explain))
        .with_state(state);
    let addr: SocketAddr = std::env::var("BIND_ADDR")
        .unwrap_or_else(|_| "0.0.0.0:8000".to_string())
        .parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("listening" = %addr);
    axum::serve(listener, app).await?;
    Ok(())
}

fn build_state() -> Result<Arc<AppState>, anyhow::Error> {
    let lineage_path =
        std::env::var("LINEX_LINEAGE").unwrap_or_else(|_| "data/lineage.json".to_string());
    let lineage = Lineage::load(&lineage_path)?;
    let embeddings = EmbeddingClient::from_env()?;
    let config = RetrievalConfig::from_env();
    let index = StepIndex::build(&lineage, embeddings)?.with_min_score(config.min_score);
    let dispatcher = Dispatcher::from_env()?;
    Ok(Arc::new(AppState {
        lineage,
        index,
        dispatcher,
        config,
    }))
}

#[derive(Debug, Deserialize)]
struct ExplainRequest {
    query: String,
    k: Option<usize>,
    top_k: Option<usize>,
}

#[derive(Debug, Serialize)]
struct ExplainResponse {
    answer: String,
    referenced_metrics: Vec<String>,
    backend: Option<&'static str>,
}

async fn handle_health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn handle_explain(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ExplainRequest>,
) -> Result<Json<ExplainResponse>, AppError> {
    if body.query.trim().is_empty() {
        return Err(AppError::bad_request("query must not be empty"));
    }
    let state = state.clone();
    let response = task::spawn_blocking(move || run_explain(&state, body))
        .await
        .map_err(AppError::internal)??;
    Ok(Json(response))
}

fn run_explain(state: &AppState, body: ExplainRequest) -> Result<ExplainResponse, AppError> {
    let mut config = state.config.clone();
    if let Some(k) = body.k {
        config.k = k;
    }
    if let Some(top_k) = body.top_k {
        config.top_k = top_k;
    }
    let explanation = explain(
        &state.index,
        &state.lineage,
        &state.dispatcher,
        &config,
        &body.query,
    )
    .map_err(AppError::internal)?;
    Ok(ExplainResponse {
        answer: explanation.answer,
        referenced_metrics: explanation.referenced_metrics,
        backend: explanation.backend,
    })
}

#[derive(Debug, Error)]
enum AppError {
    #[error("{0}")]
    BadRequest(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    fn bad_request<E: ToString>(msg: E) -> Self {
        Self::BadRequest(msg.to_string())
    }

    fn internal<E: Into<anyhow::Error>>(err: E) -> Self {
        Self::Internal(err.into())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg).into_response(),
            AppError::Internal(err) => {
                error!("internal_error" = %err);
                (StatusCode::INTERNAL_SERVER_ERROR, "internal error").into_response()
            }
        }
    }
}
