//! HTTP routes and handlers for the medgraph daemon API.

use axum::{
    extract::State,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use medgraph_core::GraphRequest;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::error;
use uuid::Uuid;

use super::state::AppState;

/// Message returned for any failure past request parsing.
const BUILD_FAILED: &str = "graph build failed";

/// Create the main router with all routes.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/build", post(build))
        .route("/search-terms", get(search_terms))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(state))
}

// =============================================================================
// Response Types
// =============================================================================

#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    data: Option<T>,
    error: Option<String>,
    duration_ms: u64,
}

impl<T: Serialize> ApiResponse<T> {
    fn ok(data: T, duration_ms: u64) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            error: None,
            duration_ms,
        })
    }

    fn err(error: impl ToString, duration_ms: u64) -> Json<Self> {
        Json(Self {
            success: false,
            data: None,
            error: Some(error.to_string()),
            duration_ms,
        })
    }
}

// =============================================================================
// Health
// =============================================================================

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "medgraph-daemon",
        "store": state.pipeline.materializer().store().backend(),
        "uptime_seconds": state.uptime_seconds(),
    }))
}

// =============================================================================
// Build Operations
// =============================================================================

#[derive(Serialize)]
struct BuildResponse {
    build_id: Uuid,
    search_term: String,
    stages: Vec<String>,
    node_count: u64,
    relation_count: u64,
    batches: usize,
    duration_ms: u64,
}

/// Run a graph request. Request errors are reported back; anything that
/// fails after that is logged and answered with a bare failure.
async fn build(
    State(state): State<Arc<AppState>>,
    Json(body): Json<serde_json::Value>,
) -> impl IntoResponse {
    let start = Instant::now();

    let request = match GraphRequest::from_value(&body) {
        Ok(request) => request,
        Err(e) => {
            return ApiResponse::<BuildResponse>::err(e, start.elapsed().as_millis() as u64)
        }
    };

    let pipeline = state.pipeline.clone();
    let outcome = tokio::task::spawn_blocking(move || {
        pipeline
            .build(&request)
            .map_err(|e| anyhow::Error::new(e).context(format!("building '{}'", request.search_term)))
    })
    .await;

    match outcome {
        Ok(Ok(result)) => {
            let data = BuildResponse {
                build_id: result.build_id,
                search_term: result.search_term,
                stages: result.stages,
                node_count: result.report.node_count(),
                relation_count: result.report.relation_count(),
                batches: result.report.batches,
                duration_ms: result.duration.as_millis() as u64,
            };
            ApiResponse::ok(data, start.elapsed().as_millis() as u64)
        }
        Ok(Err(e)) => {
            error!("Graph build failed: {:#}", e);
            ApiResponse::err(BUILD_FAILED, start.elapsed().as_millis() as u64)
        }
        Err(e) => {
            error!("Graph build task panicked: {}", e);
            ApiResponse::err(BUILD_FAILED, start.elapsed().as_millis() as u64)
        }
    }
}

// =============================================================================
// Search Terms
// =============================================================================

async fn search_terms(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let start = Instant::now();

    let pipeline = state.pipeline.clone();
    let outcome =
        tokio::task::spawn_blocking(move || pipeline.materializer().anchor_values()).await;

    match outcome {
        Ok(Ok(values)) => ApiResponse::ok(values, start.elapsed().as_millis() as u64),
        Ok(Err(e)) => {
            error!("Listing search terms failed: {}", e);
            ApiResponse::err("store unavailable", start.elapsed().as_millis() as u64)
        }
        Err(e) => {
            error!("Search term task panicked: {}", e);
            ApiResponse::err("store unavailable", start.elapsed().as_millis() as u64)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::{BuildPipeline, GraphMaterializer, Sources};
    use crate::storage::{GraphStore, MemoryGraph};
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use medgraph_core::sources::RecordArchive;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn router() -> Router {
        let archive: RecordArchive = serde_json::from_value(json!({
            "papers": [
                {"pmid": "101", "title": "Phenylketonuria outcomes",
                 "abstract_sections": ["Phenylketonuria is caused by PAH variants."]}
            ],
            "entities": [{"text": "phenylketonuria", "category": "DISEASE"}]
        }))
        .unwrap();
        let store: Box<dyn GraphStore> = Box::new(MemoryGraph::new());
        let pipeline =
            BuildPipeline::new(Sources::from_archive(archive), GraphMaterializer::new(store))
                .unwrap();
        create_router(AppState::new(pipeline))
    }

    async fn send(router: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = router.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn post_build(body: Value) -> Request<Body> {
        Request::post("/build")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = send(
            router(),
            Request::get("/health").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["store"], "memory");
    }

    #[tokio::test]
    async fn test_build_then_list_search_terms() {
        let router = router();
        let (status, body) = send(
            router.clone(),
            post_build(json!({
                "disease": "phenylketonuria",
                "pipelines": {"pubmed": {"run": true}, "ner": {"run": true}}
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["stages"], json!(["pubmed", "ner"]));
        // Paper + entity nodes
        assert_eq!(body["data"]["node_count"], 2);

        let (_, body) = send(
            router,
            Request::get("/search-terms").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(body["success"], true);
        assert_eq!(body["data"], json!(["phenylketonuria"]));
    }

    #[tokio::test]
    async fn test_missing_request_keys_are_reported() {
        let (_, body) = send(router(), post_build(json!({"n_articles": 3}))).await;
        assert_eq!(body["success"], false);
        let message = body["error"].as_str().unwrap();
        assert!(message.contains("disease"));
        assert!(message.contains("pipelines"));
    }

    #[tokio::test]
    async fn test_failed_build_reports_only_failure() {
        let (_, body) = send(
            router(),
            post_build(json!({
                "disease": "phenylketonuria",
                "pipelines": {"pubmed": {"run": true}, "medGen": {"run": true}}
            })),
        )
        .await;
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], BUILD_FAILED);
        assert!(body["data"].is_null());
    }
}
