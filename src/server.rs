//! HTTP query server.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/query` | Answer a question: `{question, session_id?}` → `{answer, sources?}` |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! Requests without a `session_id` share the `"default"` session.
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "Question is required." } }
//! ```
//!
//! Error codes: `bad_request` (400), `timeout` (408), `internal` (500).
//! Upstream failure details are logged, not returned to the client.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so browser front-ends
//! can call the API directly.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

use crate::config::Config;
use crate::error::RagError;
use crate::models::AnswerResult;
use crate::pipeline::RagPipeline;
use crate::session::DEFAULT_SESSION;

#[derive(Clone)]
struct AppState {
    pipeline: Arc<RagPipeline>,
    request_timeout: Duration,
}

/// Build the capability clients and serve on `[server].bind` until the
/// process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let pipeline = Arc::new(RagPipeline::from_config(config).await?);
    let app = router(
        pipeline,
        Duration::from_secs(config.server.request_timeout_secs),
    );

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    info!("RAG server listening on http://{}", config.server.bind);
    axum::serve(listener, app).await?;

    Ok(())
}

/// The application router, without binding a socket.
pub fn router(pipeline: Arc<RagPipeline>, request_timeout: Duration) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/query", post(handle_query))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(AppState {
            pipeline,
            request_timeout,
        })
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: &'static str,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request",
        message: message.into(),
    }
}

fn timeout_error(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::REQUEST_TIMEOUT,
        code: "timeout",
        message: message.into(),
    }
}

fn internal(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal",
        message: message.into(),
    }
}

impl From<RagError> for AppError {
    fn from(err: RagError) -> Self {
        if err.is_client_error() {
            return bad_request(err.to_string());
        }
        error!("query failed: {}", err);
        match err {
            RagError::Retrieval(_) => internal("Failed to retrieve context for the question."),
            _ => internal("Failed to generate an answer."),
        }
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

// ============ POST /query ============

#[derive(Deserialize)]
struct QueryRequest {
    #[serde(default)]
    question: Option<String>,
    #[serde(default)]
    session_id: Option<String>,
}

/// Runs the pipeline under the request timeout. On timeout the in-flight
/// call is dropped and the session's memory is left as it was.
async fn handle_query(
    State(state): State<AppState>,
    payload: Result<Json<QueryRequest>, JsonRejection>,
) -> Result<Json<AnswerResult>, AppError> {
    let Json(req) = payload.map_err(|rejection| bad_request(rejection.body_text()))?;
    let question = req.question.unwrap_or_default();
    let session_id = req
        .session_id
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_SESSION.to_string());

    let result = tokio::time::timeout(
        state.request_timeout,
        state.pipeline.answer_question(&session_id, &question),
    )
    .await
    .map_err(|_| {
        timeout_error(format!(
            "query timed out after {}s",
            state.request_timeout.as_secs()
        ))
    })??;

    Ok(Json(result))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MemoryConfig;
    use crate::generator::AnswerGenerator;
    use crate::index::VectorIndex;
    use crate::llm::{ChatMessage, ChatModel};
    use crate::models::{Chunk, ChunkMetadata, RetrievedChunk};
    use crate::retriever::Retriever;
    use crate::session::SessionStore;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    struct OneHitIndex;

    #[async_trait]
    impl VectorIndex for OneHitIndex {
        async fn upsert(&self, _chunks: &[Chunk]) -> anyhow::Result<()> {
            Ok(())
        }
        async fn search(&self, _query: &str, _k: usize) -> anyhow::Result<Vec<RetrievedChunk>> {
            Ok(vec![RetrievedChunk {
                chunk: Chunk {
                    id: "c0".into(),
                    chunk_index: 0,
                    text: "The pump runs at 40 psi.".into(),
                    hash: String::new(),
                    metadata: ChunkMetadata {
                        source: "data/pdfs/pump.pdf".into(),
                        page: Some(7),
                    },
                },
                rank: 0,
            }])
        }
    }

    struct FailingIndex;

    #[async_trait]
    impl VectorIndex for FailingIndex {
        async fn upsert(&self, _chunks: &[Chunk]) -> anyhow::Result<()> {
            Ok(())
        }
        async fn search(&self, _query: &str, _k: usize) -> anyhow::Result<Vec<RetrievedChunk>> {
            anyhow::bail!("milvus at 10.0.0.7 refused connection")
        }
    }

    enum Behaviour {
        Answer,
        Fail,
        Hang,
    }

    struct FakeModel(Behaviour);

    #[async_trait]
    impl ChatModel for FakeModel {
        fn model_name(&self) -> &str {
            "fake"
        }
        async fn complete(&self, _messages: &[ChatMessage]) -> anyhow::Result<String> {
            match self.0 {
                Behaviour::Answer => Ok("40 psi.".into()),
                Behaviour::Fail => anyhow::bail!("upstream 503 with secret details"),
                Behaviour::Hang => {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                    Ok("late".into())
                }
            }
        }
    }

    fn app(behaviour: Behaviour, include_sources: bool, timeout: Duration) -> Router {
        app_with_index(Arc::new(OneHitIndex), behaviour, include_sources, timeout)
    }

    fn app_with_index(
        index: Arc<dyn VectorIndex>,
        behaviour: Behaviour,
        include_sources: bool,
        timeout: Duration,
    ) -> Router {
        let model: Arc<dyn ChatModel> = Arc::new(FakeModel(behaviour));
        let pipeline = RagPipeline::new(
            Retriever::new(index, 4),
            AnswerGenerator::new(model.clone()),
            model,
            Arc::new(SessionStore::new(MemoryConfig::default())),
            include_sources,
        );
        router(Arc::new(pipeline), timeout)
    }

    async fn post_query(app: Router, body: serde_json::Value) -> (StatusCode, serde_json::Value) {
        post_raw(app, body.to_string()).await
    }

    async fn post_raw(app: Router, body: String) -> (StatusCode, serde_json::Value) {
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/query")
                    .header("content-type", "application/json")
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_query_returns_answer_and_sources() {
        let app = app(Behaviour::Answer, true, Duration::from_secs(5));
        let (status, json) =
            post_query(app, serde_json::json!({ "question": "  What pressure?  " })).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["answer"], "40 psi.");
        assert_eq!(json["sources"][0]["source"], "data/pdfs/pump.pdf");
        assert_eq!(json["sources"][0]["page"], 7);
    }

    #[tokio::test]
    async fn test_sources_omitted_when_disabled() {
        let app = app(Behaviour::Answer, false, Duration::from_secs(5));
        let (status, json) = post_query(app, serde_json::json!({ "question": "q" })).await;
        assert_eq!(status, StatusCode::OK);
        assert!(json.get("sources").is_none());
    }

    #[tokio::test]
    async fn test_blank_or_missing_question_is_bad_request() {
        for body in [
            serde_json::json!({ "question": "   " }),
            serde_json::json!({}),
        ] {
            let app = app(Behaviour::Answer, true, Duration::from_secs(5));
            let (status, json) = post_query(app, body).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(json["error"]["code"], "bad_request");
            assert_eq!(json["error"]["message"], "Question is required.");
        }
    }

    #[tokio::test]
    async fn test_upstream_failure_is_generic_500() {
        let app = app(Behaviour::Fail, true, Duration::from_secs(5));
        let (status, json) = post_query(app, serde_json::json!({ "question": "q" })).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["error"]["code"], "internal");
        assert!(!json["error"]["message"]
            .as_str()
            .unwrap()
            .contains("secret"));
    }

    #[tokio::test]
    async fn test_retrieval_failure_is_generic_500() {
        let app = app_with_index(
            Arc::new(FailingIndex),
            Behaviour::Answer,
            true,
            Duration::from_secs(5),
        );
        let (status, json) = post_query(app, serde_json::json!({ "question": "q" })).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["error"]["code"], "internal");
        assert_eq!(
            json["error"]["message"],
            "Failed to retrieve context for the question."
        );
    }

    #[tokio::test]
    async fn test_malformed_json_uses_error_envelope() {
        let app = app(Behaviour::Answer, true, Duration::from_secs(5));
        let (status, json) = post_raw(app, "{\"question\": ".to_string()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"]["code"], "bad_request");
        assert!(!json["error"]["message"].as_str().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_slow_generation_times_out() {
        let app = app(Behaviour::Hang, true, Duration::from_millis(50));
        let (status, json) = post_query(app, serde_json::json!({ "question": "q" })).await;
        assert_eq!(status, StatusCode::REQUEST_TIMEOUT);
        assert_eq!(json["error"]["code"], "timeout");
    }

    #[tokio::test]
    async fn test_health() {
        let app = app(Behaviour::Answer, true, Duration::from_secs(5));
        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["status"], "ok");
    }
}
