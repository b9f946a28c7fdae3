//! The HTTP proxy surface.
//!
//! One route: `POST /v1/chat/completions`, accepting the same
//! chat-completion request shape the LLM endpoint does and proxying it
//! through the orchestrator. Terminal errors map to HTTP statuses with
//! the provider's own status and message preserved where available.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use tower_http::trace::TraceLayer;
use verse_relay_core::Orchestrator;
use verse_relay_core::error::OrchestrateError;
use verse_relay_model::{BackendError, ChatRequest, ChatResponse};
use verse_relay_openai_backend::OpenAIBackend;

/// State shared across handlers.
pub struct AppState {
    /// The orchestrator serving every request.
    pub orchestrator: Orchestrator<OpenAIBackend>,
}

/// Builds the router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/chat/completions", post(chat_completions))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

async fn chat_completions(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, (StatusCode, String)> {
    state
        .orchestrator
        .run(request)
        .await
        .map(Json)
        .map_err(error_response)
}

/// Maps a terminal orchestration failure onto an HTTP reply.
pub fn error_response(err: OrchestrateError) -> (StatusCode, String) {
    match &err {
        OrchestrateError::Backend(backend) => {
            let status = backend
                .status()
                .and_then(|status| StatusCode::from_u16(status).ok())
                .unwrap_or(StatusCode::BAD_GATEWAY);
            (status, backend.to_string())
        }
        OrchestrateError::Upstream(upstream) => {
            (StatusCode::BAD_GATEWAY, upstream.to_string())
        }
    }
}

/// Runs the server until the listener fails.
pub async fn run(state: Arc<AppState>, listen: &str) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(listen).await?;
    info!("listening on http://{listen}");
    axum::serve(listener, router(state)).await
}
