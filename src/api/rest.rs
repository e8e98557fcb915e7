//! Axum REST API handlers

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{DefaultBodyLimit, State},
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, warn};

use crate::config::ServerConfig;
use crate::provider::DetectedFace;
use crate::service::{BatchResult, FaceError, FaceService, Operation};

use super::dto::*;

/// Request body limit, sized for batches of large base64 images
const BODY_LIMIT: usize = 50 * 1024 * 1024;

/// Application state shared across handlers
pub struct AppState {
    pub service: Arc<FaceService>,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(service: Arc<FaceService>) -> Self {
        Self {
            service,
            start_time: Instant::now(),
        }
    }
}

/// Create the REST API router
pub fn create_rest_router(state: Arc<AppState>, server: &ServerConfig) -> Router {
    Router::new()
        // Single-image inference
        .route("/faces/detect", post(detect_handler))
        .route("/faces/embed", post(embed_handler))
        .route("/faces/analyze", post(analyze_handler))
        // Batch inference
        .route("/faces/detect/batch", post(detect_batch_handler))
        .route("/faces/embed/batch", post(embed_batch_handler))
        .route("/faces/analyze/batch", post(analyze_batch_handler))
        // System endpoints
        .route("/health", get(health_handler))
        // Middleware
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
        .layer(cors_layer(&server.cors_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.is_empty() || origins.iter().any(|o| o == "*") {
        return layer.allow_origin(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(allowed))
}

/// Translate service errors into status codes
impl IntoResponse for FaceError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            FaceError::InvalidBase64 => (StatusCode::BAD_REQUEST, "INVALID_BASE64"),
            FaceError::BatchTooLarge { .. } => (StatusCode::BAD_REQUEST, "BATCH_TOO_LARGE"),
            FaceError::ProviderUnavailable => (StatusCode::SERVICE_UNAVAILABLE, "PROVIDER_UNAVAILABLE"),
            FaceError::Inference(_) | FaceError::Gate(_) => {
                error!("Inference failed: {}", self);
                (StatusCode::INTERNAL_SERVER_ERROR, "INFERENCE_FAILED")
            }
        };
        (status, Json(ErrorResponse::new(&self.to_string(), code))).into_response()
    }
}

async fn single<T: From<DetectedFace>>(
    state: &AppState,
    op: Operation,
    body: ImageRequest,
) -> Result<Json<FacesResponse<T>>, FaceError> {
    let faces = state.service.infer(op, &body.image_b64).await?;
    Ok(Json(FacesResponse::from_faces(faces)))
}

async fn batch<T: From<DetectedFace>>(
    state: &AppState,
    op: Operation,
    body: BatchRequest,
) -> Result<Json<BatchResult<T>>, FaceError> {
    let result = state.service.process_batch(op, body.into_images(), T::from).await?;
    Ok(Json(result))
}

/// Detect faces in an image
async fn detect_handler(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ImageRequest>,
) -> Result<Json<DetectResponse>, FaceError> {
    single(&state, Operation::Detect, body).await
}

/// Detect faces and extract embeddings
async fn embed_handler(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ImageRequest>,
) -> Result<Json<EmbedResponse>, FaceError> {
    single(&state, Operation::Embed, body).await
}

/// Detect faces with embeddings and demographic attributes
async fn analyze_handler(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ImageRequest>,
) -> Result<Json<AnalyzeResponse>, FaceError> {
    single(&state, Operation::Analyze, body).await
}

async fn detect_batch_handler(
    State(state): State<Arc<AppState>>,
    Json(body): Json<BatchRequest>,
) -> Result<Json<DetectBatchResponse>, FaceError> {
    batch(&state, Operation::Detect, body).await
}

async fn embed_batch_handler(
    State(state): State<Arc<AppState>>,
    Json(body): Json<BatchRequest>,
) -> Result<Json<EmbedBatchResponse>, FaceError> {
    batch(&state, Operation::Embed, body).await
}

async fn analyze_batch_handler(
    State(state): State<Arc<AppState>>,
    Json(body): Json<BatchRequest>,
) -> Result<Json<AnalyzeBatchResponse>, FaceError> {
    batch(&state, Operation::Analyze, body).await
}

/// Health check handler
async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let health = state.service.health();
    Json(HealthResponse {
        status: if health.healthy { "ok" } else { "degraded" }.to_string(),
        version: health.version,
        provider: health.provider,
        provider_loaded: health.provider_loaded,
        uptime_seconds: state.start_time.elapsed().as_secs(),
    })
}
