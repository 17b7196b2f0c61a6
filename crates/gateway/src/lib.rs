//! HTTP API gateway for RecallChat.
//!
//! Exposes `POST /chat` (one selective-context turn per request) and
//! `GET /health`. Conversation logs are kept per session, keyed by the
//! optional `X-Session-Id` request header.
//!
//! Built on Axum for high performance async HTTP.

pub mod chat;

use axum::extract::DefaultBodyLimit;
use axum::http::HeaderValue;
use axum::{
    Router,
    response::Json,
    routing::{get, post},
};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use tracing::info;

use recallchat_agent::TurnOrchestrator;
use recallchat_config::AppConfig;
use recallchat_core::error::{ProviderError, RetrievalError};
use recallchat_memory::{InMemoryPassageIndex, SessionStore};
use recallchat_providers::ProviderEmbedder;

/// Shared application state for the gateway.
pub struct GatewayState {
    pub orchestrator: Arc<TurnOrchestrator>,
    pub sessions: SessionStore,
}

pub type SharedState = Arc<GatewayState>;

impl GatewayState {
    pub fn new(orchestrator: Arc<TurnOrchestrator>, sessions: SessionStore) -> SharedState {
        Arc::new(Self {
            orchestrator,
            sessions,
        })
    }
}

/// Failures while bringing the gateway up.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Invalid allowed origin '{0}'")]
    InvalidOrigin(String),

    #[error("Provider setup failed: {0}")]
    Provider(#[from] ProviderError),

    #[error("Passage index setup failed: {0}")]
    Retrieval(#[from] RetrievalError),

    #[error("Server error: {0}")]
    Io(#[from] std::io::Error),
}

/// Build the Axum router with all gateway routes.
///
/// Layers applied:
/// - CORS for the single configured browser origin
/// - Request body size limit (1 MB)
/// - HTTP trace logging
pub fn build_router(state: SharedState, cors: CorsLayer) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/chat", post(chat::chat_handler))
        .with_state(state)
        .layer(DefaultBodyLimit::max(1024 * 1024)) // 1 MB body limit
        .layer(cors)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

/// CORS policy: only `origin`, with credentials. Requests from any other
/// origin get no `Access-Control-Allow-Origin` header. Methods and headers
/// are mirrored from the preflight request, so all are allowed.
pub fn cors_layer(origin: &str) -> Result<CorsLayer, GatewayError> {
    let origin_value = HeaderValue::from_str(origin)
        .map_err(|_| GatewayError::InvalidOrigin(origin.to_string()))?;

    Ok(CorsLayer::new()
        .allow_origin(AllowOrigin::list([origin_value]))
        .allow_credentials(true)
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request()))
}

/// Build the provider, embed the seed passages and wire the orchestrator.
///
/// The provider is built ONCE and shared by generation and embedding.
pub async fn build_orchestrator(config: &AppConfig) -> Result<TurnOrchestrator, GatewayError> {
    let provider = recallchat_providers::build_from_config(config)?;
    let embedder = Arc::new(ProviderEmbedder::new(
        provider.clone(),
        config.embedding.model.clone(),
    ));

    let index =
        InMemoryPassageIndex::from_documents(embedder.clone(), &config.retrieval.documents).await?;

    Ok(TurnOrchestrator::from_config(
        config,
        Arc::new(index),
        provider,
        embedder,
    ))
}

/// Start the gateway HTTP server.
pub async fn start(config: AppConfig) -> Result<(), GatewayError> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);
    let cors = cors_layer(&config.gateway.allowed_origin)?;

    let orchestrator = Arc::new(build_orchestrator(&config).await?);
    let sessions = SessionStore::new(config.memory.max_sessions, config.memory.max_log_turns);
    let app = build_router(GatewayState::new(orchestrator.clone(), sessions), cors);

    info!(
        addr = %addr,
        provider = orchestrator.provider_name(),
        passages = orchestrator.passage_count(),
        origin = %config.gateway.allowed_origin,
        "Gateway starting"
    );
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// --- Handlers ---

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}
