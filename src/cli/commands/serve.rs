//! HTTP API server for the chat frontend.
//!
//! Provides REST endpoints for session creation, URL ingestion and session-scoped
//! questions.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::error::TubechatError;
use crate::pipeline::{IngestedVideo, Pipeline};
use crate::session::{new_session_id, SessionRegistry, VideoEntry};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::error;

/// Shared application state.
pub struct AppState {
    pipeline: Pipeline,
    registry: SessionRegistry,
}

impl AppState {
    pub fn new(pipeline: Pipeline, registry: SessionRegistry) -> Self {
        Self { pipeline, registry }
    }
}

/// Build the API router.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/session", get(create_session))
        .route("/ingest", post(ingest))
        .route("/chat", post(chat))
        .route("/sessions", get(list_sessions))
        .route("/sessions/{session_id}/videos", get(list_videos))
        .layer(cors)
        .with_state(state)
}

/// Run the HTTP API server.
pub async fn run_serve(host: Option<String>, port: Option<u16>, settings: Settings) -> anyhow::Result<()> {
    if let Err(e) = preflight::check(Operation::Serve, &settings) {
        Output::error(&format!("{}", e));
        Output::info("Run 'tubechat doctor' for detailed diagnostics.");
        return Err(e.into());
    }

    let spinner = Output::spinner("Preparing vector index...");
    let pipeline = Pipeline::from_settings(&settings).await;
    spinner.finish_and_clear();

    let state = Arc::new(AppState::new(pipeline?, SessionRegistry::new()));
    let app = router(state);

    let host = host.unwrap_or_else(|| settings.server.host.clone());
    let port = port.unwrap_or(settings.server.port);
    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    Output::header("Tubechat API Server");
    println!();
    Output::success(&format!("Listening on http://{}", addr));
    println!();
    println!("Endpoints:");
    Output::kv("Health", "GET  /health");
    Output::kv("New session", "GET  /session");
    Output::kv("Ingest URL", "POST /ingest");
    Output::kv("Chat (RAG)", "POST /chat");
    Output::kv("Sessions", "GET  /sessions");
    Output::kv("Session videos", "GET  /sessions/:session_id/videos");
    println!();
    Output::info("Press Ctrl+C to stop the server.");

    axum::serve(listener, app).await?;

    Ok(())
}

// === Request/Response Types ===

#[derive(Debug, Serialize, Deserialize)]
struct SessionResponse {
    session_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct IngestRequest {
    url: String,
    #[serde(default)]
    session_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct IngestResponse {
    session_id: String,
    videos: Vec<IngestedVideo>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatRequest {
    session_id: String,
    query: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatResponse {
    answer: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct SessionListResponse {
    sessions: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct VideoListResponse {
    session_id: String,
    videos: Vec<VideoEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ErrorResponse {
    error: String,
}

fn error_response(e: TubechatError) -> Response {
    let status = match &e {
        TubechatError::NoContent(_) => StatusCode::NOT_FOUND,
        TubechatError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };

    if status.is_server_error() {
        error!("Request failed: {}", e);
    }

    (
        status,
        Json(ErrorResponse {
            error: e.to_string(),
        }),
    )
        .into_response()
}

// === Handlers ===

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn create_session() -> impl IntoResponse {
    Json(SessionResponse {
        session_id: new_session_id(),
    })
}

async fn ingest(
    State(state): State<Arc<AppState>>,
    Json(req): Json<IngestRequest>,
) -> Response {
    match state
        .pipeline
        .ingest_url(&req.url, req.session_id.as_deref())
        .await
    {
        Ok(outcome) => {
            for video in &outcome.videos {
                state.registry.add_video(
                    &outcome.session_id,
                    &video.video_id,
                    video.title.clone(),
                    &video.url,
                );
            }

            Json(IngestResponse {
                session_id: outcome.session_id,
                videos: outcome.videos,
            })
            .into_response()
        }
        Err(e) => error_response(e),
    }
}

async fn chat(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ChatRequest>,
) -> Response {
    match state.pipeline.answer(&req.session_id, &req.query).await {
        Ok(answer) => Json(ChatResponse { answer }).into_response(),
        Err(e) => error_response(e),
    }
}

async fn list_sessions(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(SessionListResponse {
        sessions: state.registry.sessions(),
    })
}

async fn list_videos(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> impl IntoResponse {
    Json(VideoListResponse {
        videos: state.registry.videos(&session_id),
        session_id,
    })
}
