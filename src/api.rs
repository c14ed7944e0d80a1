//! REST API Server for the product Q&A agent
//!
//! Exposes the agent via HTTP endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::agent::Agent;

/// =============================
/// Request Models
/// =============================

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub thread_id: Option<String>,
    pub message: String,
}

/// =============================
/// Response Wrapper
/// =============================

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse {
    pub success: bool,
    pub data: Option<serde_json::Value>,
    pub error: Option<String>,
    pub timestamp: String,
}

impl ApiResponse {
    pub fn success<T: Serialize>(data: T) -> Self {
        Self {
            success: true,
            data: serde_json::to_value(data).ok(),
            error: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// =============================
/// API State
/// =============================

#[derive(Clone)]
pub struct ApiState {
    pub agent: Arc<Agent>,
}

/// =============================
/// Health Endpoint
/// =============================

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

async fn agent_config(State(state): State<ApiState>) -> Json<ApiResponse> {
    Json(ApiResponse::success(state.agent.config()))
}

/// =============================
/// Chat Endpoint
/// =============================

async fn chat_handler(
    State(state): State<ApiState>,
    Json(req): Json<ChatRequest>,
) -> (StatusCode, Json<ApiResponse>) {
    if req.message.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::error("Message must not be empty".into())),
        );
    }

    let thread_id = req
        .thread_id
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    info!(thread_id = %thread_id, "Received chat request");

    match state.agent.invoke(&thread_id, &req.message).await {
        Ok(response) => (StatusCode::OK, Json(ApiResponse::success(response))),
        Err(e) => {
            error!(thread_id = %thread_id, "Agent turn failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error(format!("Agent failed: {}", e))),
            )
        }
    }
}

/// =============================
/// Thread Endpoints
/// =============================

async fn thread_history(
    State(state): State<ApiState>,
    Path(thread_id): Path<String>,
) -> (StatusCode, Json<ApiResponse>) {
    match state.agent.history(&thread_id).await {
        Ok(Some(history)) => {
            let messages: Vec<_> = history.messages().cloned().collect();
            (
                StatusCode::OK,
                Json(ApiResponse::success(serde_json::json!({
                    "thread_id": thread_id,
                    "messages": messages,
                    "total_tokens": history.total_tokens(),
                }))),
            )
        }
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::error(format!("Unknown thread {}", thread_id))),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiResponse::error(e.to_string())),
        ),
    }
}

async fn delete_thread(
    State(state): State<ApiState>,
    Path(thread_id): Path<String>,
) -> (StatusCode, Json<ApiResponse>) {
    match state.agent.checkpointer().delete_thread(&thread_id).await {
        Ok(()) => (
            StatusCode::OK,
            Json(ApiResponse::success(serde_json::json!({ "deleted": thread_id }))),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiResponse::error(e.to_string())),
        ),
    }
}

/// =============================
/// Router
/// =============================

pub fn create_router(agent: Arc<Agent>) -> Router {
    let state = ApiState { agent };

    Router::new()
        .route("/health", get(health))
        .route("/api/agent", get(agent_config))
        .route("/api/chat", post(chat_handler))
        .route(
            "/api/threads/:thread_id",
            get(thread_history).delete(delete_thread),
        )
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// =============================
/// Server Startup
/// =============================

pub async fn start_server(
    agent: Arc<Agent>,
    port: u16,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let router = create_router(agent);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    info!("API Server listening on http://0.0.0.0:{}", port);
    info!("Local: http://127.0.0.1:{}", port);

    axum::serve(listener, router).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::RagAgentBuilder;
    use crate::llm::MockChatModel;
    use crate::models::Document;
    use crate::retrieval::{HashingEmbedder, InMemoryVectorStore, VectorStore};
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    async fn test_router() -> Router {
        let store = InMemoryVectorStore::new(Arc::new(HashingEmbedder::default()));
        store
            .add_documents(vec![
                Document::new("Battery life is excellent."),
                Document::new("The case feels cheap."),
            ])
            .await
            .unwrap();
        let store: Arc<dyn VectorStore> = Arc::new(store);
        let agent = RagAgentBuilder::with_model(
            store,
            Arc::new(MockChatModel::retrieval_echo("mock:echo")),
        )
        .build_agent();
        create_router(Arc::new(agent))
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn post_chat(body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/chat")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let response = test_router()
            .await
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["status"], "healthy");
    }

    #[tokio::test]
    async fn test_agent_config_route() {
        let response = test_router()
            .await
            .oneshot(Request::builder().uri("/api/agent").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body = body_json(response).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["tools"], json!(["vml_retriever_tool"]));
        assert_eq!(body["data"]["middleware"][0]["keep"], json!({ "messages": 4 }));
    }

    #[tokio::test]
    async fn test_chat_then_history() {
        let router = test_router().await;

        let response = router
            .clone()
            .oneshot(post_chat(json!({ "thread_id": "web-1", "message": "battery life" })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["data"]["thread_id"], "web-1");
        assert!(body["data"]["answer"]
            .as_str()
            .unwrap()
            .contains("Battery life is excellent."));

        let history = router
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/api/threads/web-1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(history.status(), StatusCode::OK);
        let body = body_json(history).await;
        assert_eq!(body["data"]["messages"].as_array().unwrap().len(), 4);

        let missing = router
            .oneshot(
                Request::builder()
                    .uri("/api/threads/nobody")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_delete_thread() {
        let router = test_router().await;
        let thread_request = |method: &str| {
            Request::builder()
                .method(method)
                .uri("/api/threads/web-2")
                .body(Body::empty())
                .unwrap()
        };

        let response = router
            .clone()
            .oneshot(post_chat(json!({ "thread_id": "web-2", "message": "case quality" })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let found = router.clone().oneshot(thread_request("GET")).await.unwrap();
        assert_eq!(found.status(), StatusCode::OK);

        let deleted = router.clone().oneshot(thread_request("DELETE")).await.unwrap();
        assert_eq!(deleted.status(), StatusCode::OK);
        assert_eq!(body_json(deleted).await["data"]["deleted"], "web-2");

        let gone = router.oneshot(thread_request("GET")).await.unwrap();
        assert_eq!(gone.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_empty_message_rejected() {
        let response = test_router()
            .await
            .oneshot(post_chat(json!({ "message": "   " })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
