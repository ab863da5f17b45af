//! API Server
//!
//! HTTP surface for the Parley conversation engine. Every route delegates to
//! a shared [`ConversationService`]; the server adds request validation,
//! status codes and Server-Sent Events framing.
//!
//! # Endpoints
//!
//! - POST /api/chat - Answer one message, JSON envelope
//! - POST /api/chat/stream - Answer one message as `text/event-stream`
//! - GET /api/health - Aggregate dependency health
//! - GET /api/stats - Service statistics
//! - DELETE /api/memory - Clear memory, optionally for one `user_id`

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{
        sse::{Event, Sse},
        IntoResponse, Response,
    },
    routing::{delete, get, post},
    Json, Router,
};
use futures::stream::{Stream, StreamExt};
use parley_engine::rag::ConversationService;
use sdk::types::{HealthStatus, TurnRequest};
use sdk::EngineError;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Request body for the chat routes
#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub conversation_id: Option<String>,
    #[serde(default)]
    pub user_id: Option<i64>,
    #[serde(default)]
    pub digital_human_id: Option<i64>,
    #[serde(default)]
    pub system_prompt: Option<String>,
}

impl ChatRequest {
    fn into_turn(self) -> TurnRequest {
        TurnRequest {
            user_message: self.message,
            conversation_id: self.conversation_id,
            user_id: self.user_id,
            agent_id: self.digital_human_id,
            system_prompt: self.system_prompt,
        }
    }
}

/// Query for DELETE /api/memory
#[derive(Debug, Deserialize)]
pub struct MemoryQuery {
    pub user_id: Option<i64>,
}

/// Error body for rejected requests
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
}

/// API server state shared across handlers
#[derive(Clone)]
struct ServerState {
    service: ConversationService,
}

/// Build the router with every route wired to `service`.
pub fn router(service: ConversationService) -> Router {
    let state = ServerState { service };

    Router::new()
        .route("/api/chat", post(chat_handler))
        .route("/api/chat/stream", post(chat_stream_handler))
        .route("/api/health", get(health_handler))
        .route("/api/stats", get(stats_handler))
        .route("/api/memory", delete(clear_memory_handler))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
}

/// Bind `addr` and serve until `shutdown` resolves.
pub async fn serve(
    addr: SocketAddr,
    service: ConversationService,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(), EngineError> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| EngineError::Network(format!("Failed to bind to {}: {}", addr, e)))?;
    serve_listener(listener, service, shutdown).await
}

/// Serve on an already bound listener until `shutdown` resolves.
pub async fn serve_listener(
    listener: tokio::net::TcpListener,
    service: ConversationService,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(), EngineError> {
    let addr = listener
        .local_addr()
        .map_err(|e| EngineError::Network(format!("Failed to get local address: {}", e)))?;
    tracing::info!("API server listening on http://{}", addr);

    axum::serve(listener, router(service))
        .with_graceful_shutdown(async move {
            shutdown.await;
            tracing::info!("API server shutting down gracefully");
        })
        .await
        .map_err(|e| EngineError::Network(format!("API server error: {}", e)))
}

fn reject_empty(request: &ChatRequest) -> Result<(), Response> {
    if request.message.trim().is_empty() {
        return Err((
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(ErrorResponse {
                success: false,
                error: "message cannot be empty".to_string(),
            }),
        )
            .into_response());
    }
    Ok(())
}

async fn chat_handler(
    State(state): State<ServerState>,
    Json(body): Json<ChatRequest>,
) -> Response {
    if let Err(rejection) = reject_empty(&body) {
        return rejection;
    }
    Json(state.service.process_message(body.into_turn()).await).into_response()
}

fn sse_events(
    service: &ConversationService,
    request: TurnRequest,
) -> impl Stream<Item = Result<Event, Infallible>> {
    service
        .stream_events(request)
        .map(|event| Ok(Event::default().data(event.to_json())))
}

async fn chat_stream_handler(
    State(state): State<ServerState>,
    Json(body): Json<ChatRequest>,
) -> Response {
    if let Err(rejection) = reject_empty(&body) {
        return rejection;
    }
    Sse::new(sse_events(&state.service, body.into_turn())).into_response()
}

async fn health_handler(State(state): State<ServerState>) -> Response {
    let health = state.service.health_check().await;
    let code = if health.status == HealthStatus::Unhealthy {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };
    (code, Json(health)).into_response()
}

async fn stats_handler(State(state): State<ServerState>) -> Json<serde_json::Value> {
    Json(state.service.stats().await)
}

async fn clear_memory_handler(
    State(state): State<ServerState>,
    Query(query): Query<MemoryQuery>,
) -> Response {
    let result = state.service.clear_memory(query.user_id).await;
    let code = if result.success {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    (code, Json(result)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_request_defaults() {
        let request: ChatRequest = serde_json::from_str(r#"{"message":"Hello"}"#).unwrap();
        let turn = request.into_turn();
        assert_eq!(turn.user_message, "Hello");
        assert!(turn.conversation_id.is_none());
        assert!(turn.user_id.is_none());
        assert!(turn.agent_id.is_none());
    }

    #[test]
    fn test_digital_human_id_maps_to_agent() {
        let request: ChatRequest =
            serde_json::from_str(r#"{"message":"Hi","user_id":3,"digital_human_id":9}"#).unwrap();
        let turn = request.into_turn();
        assert_eq!(turn.user_id, Some(3));
        assert_eq!(turn.agent_id, Some(9));
    }

    #[test]
    fn test_blank_message_rejected() {
        let request = ChatRequest {
            message: "  \n".to_string(),
            conversation_id: None,
            user_id: None,
            digital_human_id: None,
            system_prompt: None,
        };
        let rejection = reject_empty(&request).unwrap_err();
        assert_eq!(rejection.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }
}
