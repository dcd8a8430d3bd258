//! HTTP API gateway for Ragway.
//!
//! Exposes the retrieval agent, plain chat, and structured extraction
//! over JSON/plain-text endpoints, plus a health check.
//!
//! Built on Axum for high performance async HTTP.

pub mod api;
pub mod error;

use axum::extract::DefaultBodyLimit;
use axum::http::{Method, header};
use axum::{
    Router,
    response::Json,
    routing::{get, post},
};
use ragway_agent::{AgentLoop, AgentSettings, ChatResponder, Extractor};
use ragway_config::AppConfig;
use ragway_core::provider::Provider;
use ragway_core::retrieval::Retriever;
use ragway_providers::openai_compat::OpenAiCompatProvider;
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::info;

/// Shared application state for the gateway.
///
/// Immutable after startup; every request gets its own loop run.
pub struct GatewayState {
    pub agent: AgentLoop,
    pub chat: ChatResponder,
    pub extractor: Extractor,
    pub max_body_bytes: usize,
}

pub type SharedState = Arc<GatewayState>;

impl GatewayState {
    /// Wire the provider and retriever into the agent, chat, and extractor.
    pub fn new(
        provider: Arc<dyn Provider>,
        retriever: Arc<dyn Retriever>,
        config: &AppConfig,
    ) -> Self {
        let tools = ragway_tools::default_registry(
            retriever,
            config.retrieval.top_k,
            config.agent.tool_timeout(),
        );

        Self {
            agent: AgentLoop::new(
                provider.clone(),
                Arc::new(tools),
                AgentSettings::from_config(config),
            ),
            chat: ChatResponder::from_config(provider.clone(), config),
            extractor: Extractor::from_config(provider, config),
            max_body_bytes: config.gateway.max_body_bytes,
        }
    }
}

/// Build the router with all gateway routes.
///
/// Layers applied:
/// - CORS for browser clients
/// - Request body size limit
/// - HTTP trace logging
pub fn build_router(state: SharedState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::any())
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE])
        .max_age(std::time::Duration::from_secs(3600));

    let max_body_bytes = state.max_body_bytes;

    Router::new()
        .route("/health", get(health_handler))
        .route("/api/chat", post(api::chat_handler))
        .route("/api/chat/retrieval_agents", post(api::retrieval_agent_handler))
        .route("/api/chat/structured_output", post(api::structured_output_handler))
        .with_state(state)
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(cors)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

/// Start the gateway HTTP server.
pub async fn start(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);

    let provider: Arc<dyn Provider> = Arc::new(OpenAiCompatProvider::from_config(&config)?);
    let retriever = ragway_retrieval::from_config(&config, provider.clone())?;
    info!(
        provider = provider.name(),
        retriever = retriever.name(),
        model = %config.default_model,
        "Gateway components ready"
    );

    let state = Arc::new(GatewayState::new(provider, retriever, &config));
    let app = build_router(state);

    info!(addr = %addr, "Gateway starting");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

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
