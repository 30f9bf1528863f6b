//! PIVE HTTP server.
//!
//! Exposes the engine's service entry points as JSON endpoints:
//!
//! - `POST /validate`: run the six quality gates over a new thesis
//! - `POST /adversarial-loop`: refine a stored thesis
//! - `POST /query`: Phi-QL (WHY, COUNTEREX, REPAIR, TRACE)
//! - `GET  /theses`: list theses with statistics
//! - `GET  /health`: server status
//!
//! Errors are returned as `{"error": {"code", "message"}}` with status
//! 404 (`not_found`), 400 (`invalid_argument`) or 500 (`internal`).
//!
//! Build and run: `cargo run --features server --bin pive-server -- --config pive.toml`

use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use clap::Parser;
use miette::{IntoDiagnostic, Result};
use serde::Serialize;
use tower_http::cors::CorsLayer;

use pive::config::PiveConfig;
use pive::engine::Engine;
use pive::error::{ErrorKind, PiveError};
use pive::service::{
    ErrorBody, ErrorEnvelope, ListRequest, ListResponse, LoopRequest, LoopResponse, QueryRequest,
    QueryResponse, ValidateRequest, ValidateResponse,
};

#[derive(Parser)]
#[command(name = "pive-server", version, about = "PIVE HTTP server")]
struct Args {
    /// Path to a TOML config file.
    #[arg(long, env = "PIVE_CONFIG")]
    config: Option<PathBuf>,

    /// Override `server.bind`.
    #[arg(long)]
    bind: Option<String>,
}

// ── Errors ────────────────────────────────────────────────────────────────

struct ApiError {
    status: StatusCode,
    envelope: ErrorEnvelope,
}

impl ApiError {
    fn invalid(message: String) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            envelope: ErrorEnvelope {
                error: ErrorBody {
                    code: ErrorKind::InvalidArgument.code().to_string(),
                    message,
                },
            },
        }
    }

    fn internal(message: String) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            envelope: ErrorEnvelope {
                error: ErrorBody {
                    code: ErrorKind::Internal.code().to_string(),
                    message,
                },
            },
        }
    }
}

impl From<PiveError> for ApiError {
    fn from(err: PiveError) -> Self {
        let status = match err.kind() {
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::InvalidArgument => StatusCode::BAD_REQUEST,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %err, "request failed");
        }
        Self {
            status,
            envelope: ErrorEnvelope::from(&err),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::invalid(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::invalid(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.envelope)).into_response()
    }
}

/// Run a synchronous engine call off the async executor.
async fn blocking<T, F>(engine: Arc<Engine>, call: F) -> Result<Json<T>, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&Engine) -> Result<T, PiveError> + Send + 'static,
{
    tokio::task::spawn_blocking(move || call(&engine))
        .await
        .map_err(|e| ApiError::internal(format!("engine task failed: {e}")))?
        .map(Json)
        .map_err(ApiError::from)
}

// ── Handlers ──────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    persistent: bool,
}

async fn health(State(engine): State<Arc<Engine>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        persistent: engine.config().store.data_dir.is_some(),
    })
}

async fn validate(
    State(engine): State<Arc<Engine>>,
    body: Result<Json<ValidateRequest>, JsonRejection>,
) -> Result<Json<ValidateResponse>, ApiError> {
    let Json(request) = body?;
    blocking(engine, move |e| e.validate(request)).await
}

async fn adversarial_loop(
    State(engine): State<Arc<Engine>>,
    body: Result<Json<LoopRequest>, JsonRejection>,
) -> Result<Json<LoopResponse>, ApiError> {
    let Json(request) = body?;
    blocking(engine, move |e| e.adversarial_loop(request)).await
}

async fn query(
    State(engine): State<Arc<Engine>>,
    body: Result<Json<QueryRequest>, JsonRejection>,
) -> Result<Json<QueryResponse>, ApiError> {
    let Json(request) = body?;
    blocking(engine, move |e| e.query(request)).await
}

async fn list_theses(
    State(engine): State<Arc<Engine>>,
    params: Result<Query<ListRequest>, QueryRejection>,
) -> Result<Json<ListResponse>, ApiError> {
    let Query(request) = params?;
    blocking(engine, move |e| e.list_theses(request)).await
}

// ── Main ──────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => PiveConfig::load(path)?,
        None => PiveConfig::default(),
    };
    let addr = args.bind.unwrap_or_else(|| config.server.bind.clone());

    let engine = Arc::new(Engine::new(config)?);
    tracing::info!("pive server initialized");

    let app = Router::new()
        .route("/health", get(health))
        .route("/validate", post(validate))
        .route("/adversarial-loop", post(adversarial_loop))
        .route("/query", post(query))
        .route("/theses", get(list_theses))
        .layer(CorsLayer::permissive())
        .with_state(engine);

    tracing::info!("pive server listening on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await.into_diagnostic()?;
    axum::serve(listener, app).await.into_diagnostic()?;
    Ok(())
}
