//! Axum routes for the kinship service.

use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::batch::BatchRelationships;
use crate::cache::CacheStats;
use crate::store::{FamilyStore, PostgresFamilyStore};
use crate::types::{GraphVersion, KinshipError, PersonId, Relationship};
use crate::KINSHIP_KERNEL_SCHEMA_VERSION;

use super::middleware::record_relationship_metrics;
use super::state::{PolicyRef, ServiceState};

/// Type alias for the service state with PostgresFamilyStore.
pub type AppState = ServiceState<PostgresFamilyStore>;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request to compute one relationship.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationshipRequest {
    /// The person the relationship is read from.
    pub a: String,
    /// The person whose relationship to `a` is returned.
    pub b: String,
    /// Optional budget in milliseconds, overriding the service default.
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

/// Request to annotate many people relative to one anchor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchRelationshipRequest {
    /// The person every relationship is read from.
    pub anchor: String,
    /// People to annotate.
    pub others: Vec<String>,
    /// Optional budget in milliseconds, overriding the service default.
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

/// One computed relationship.
#[derive(Debug, Clone, Serialize)]
pub struct RelationshipResponse {
    /// Requesting person.
    pub a: PersonId,
    /// Related person.
    pub b: PersonId,
    /// What `b` is to `a`.
    pub relationship: Relationship,
    /// Policy used.
    pub policy_ref: PolicyRef,
}

/// Batch relationship response.
#[derive(Debug, Clone, Serialize)]
pub struct BatchRelationshipResponse {
    /// Relationships keyed by person.
    #[serde(flatten)]
    pub batch: BatchRelationships,
    /// Requested ids that failed to parse.
    pub invalid_ids: Vec<String>,
    /// Policy used.
    pub policy_ref: PolicyRef,
}

/// Response to a cache invalidation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvalidateResponse {
    /// Epoch now in effect.
    pub epoch: u64,
}

/// Service health response (detailed).
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub schema_version: String,
    pub policy_ref: PolicyRef,
    /// Latest graph version, if the store answered.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub graph_version: Option<GraphVersion>,
    pub cache: CacheStats,
}

/// Simple liveness response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LivenessResponse {
    pub status: String,
}

/// Readiness response with dependency status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    pub store: bool,
    pub details: Option<String>,
}

/// Structured error response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Human-readable error message.
    pub error: String,
    /// Machine-readable error code.
    pub code: String,
    /// Additional error details (optional).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorResponse {
    /// Create a new error response with code and message.
    pub fn new(code: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            code: code.into(),
            details: None,
        }
    }

    /// Add details to the error.
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

type ApiError = (StatusCode, Json<ErrorResponse>);

impl From<KinshipError> for ErrorResponse {
    fn from(e: KinshipError) -> Self {
        Self::new(e.code(), e.to_string())
    }
}

/// Map an engine error onto an HTTP status.
fn api_error(e: KinshipError) -> ApiError {
    let status = match &e {
        KinshipError::PersonNotFound(_) => StatusCode::NOT_FOUND,
        KinshipError::ComputationAborted(_) => StatusCode::GATEWAY_TIMEOUT,
        KinshipError::InvariantViolation(_) => StatusCode::INTERNAL_SERVER_ERROR,
        KinshipError::StoreError(_) => StatusCode::SERVICE_UNAVAILABLE,
    };
    tracing::warn!(code = e.code(), error = %e, status = status.as_u16(), "Request error");
    (status, Json(e.into()))
}

impl IntoResponse for ErrorResponse {
    fn into_response(self) -> axum::response::Response {
        (StatusCode::BAD_REQUEST, Json(self)).into_response()
    }
}

fn parse_person(raw: &str) -> Result<PersonId, ApiError> {
    PersonId::from_str(raw).map_err(|e| {
        (
            StatusCode::BAD_REQUEST,
            Json(
                ErrorResponse::new("INVALID_PERSON_ID", format!("Invalid person ID: {}", e))
                    .with_details(raw.to_string()),
            ),
        )
    })
}

// ============================================================================
// Route Handlers
// ============================================================================

async fn compute<S: FamilyStore>(
    state: &ServiceState<S>,
    a: PersonId,
    b: PersonId,
    timeout_ms: Option<u64>,
) -> Result<Json<RelationshipResponse>, ApiError> {
    let started = std::time::Instant::now();
    let deadline = state.deadline(timeout_ms);
    let relationship = state
        .engine
        .compute_relationship_within(a, b, &deadline)
        .await
        .map_err(api_error)?;

    record_relationship_metrics(1, started.elapsed().as_millis() as u64);
    Ok(Json(RelationshipResponse {
        a,
        b,
        relationship,
        policy_ref: state.policy_ref.clone(),
    }))
}

/// Compute what `b` is to `a`.
async fn relationship_handler<S: FamilyStore>(
    State(state): State<Arc<ServiceState<S>>>,
    Json(request): Json<RelationshipRequest>,
) -> Result<Json<RelationshipResponse>, ApiError> {
    let a = parse_person(&request.a)?;
    let b = parse_person(&request.b)?;
    compute(&state, a, b, request.timeout_ms).await
}

/// Compute what `b` is to `a`, with both ids in the path.
async fn relationship_path_handler<S: FamilyStore>(
    State(state): State<Arc<ServiceState<S>>>,
    Path((a, b)): Path<(String, String)>,
) -> Result<Json<RelationshipResponse>, ApiError> {
    let a = parse_person(&a)?;
    let b = parse_person(&b)?;
    compute(&state, a, b, None).await
}

/// Annotate many people relative to one anchor.
///
/// Ids that fail to parse are reported back rather than failing the batch.
async fn batch_handler<S: FamilyStore>(
    State(state): State<Arc<ServiceState<S>>>,
    Json(request): Json<BatchRelationshipRequest>,
) -> Result<Json<BatchRelationshipResponse>, ApiError> {
    let started = std::time::Instant::now();
    let anchor = parse_person(&request.anchor)?;

    let mut others = Vec::with_capacity(request.others.len());
    let mut invalid_ids = Vec::new();
    for raw in &request.others {
        match PersonId::from_str(raw) {
            Ok(id) => others.push(id),
            Err(_) => invalid_ids.push(raw.clone()),
        }
    }

    let deadline = state.deadline(request.timeout_ms);
    let batch = state
        .engine
        .batch_compute_within(anchor, &others, &deadline)
        .await
        .map_err(api_error)?;

    record_relationship_metrics(batch.len(), started.elapsed().as_millis() as u64);
    Ok(Json(BatchRelationshipResponse {
        batch,
        invalid_ids,
        policy_ref: state.policy_ref.clone(),
    }))
}

/// Advance the cache epoch.
async fn invalidate_handler<S: FamilyStore>(
    State(state): State<Arc<ServiceState<S>>>,
) -> Json<InvalidateResponse> {
    Json(InvalidateResponse {
        epoch: state.engine.invalidate(),
    })
}

/// Cache statistics.
async fn cache_stats_handler<S: FamilyStore>(
    State(state): State<Arc<ServiceState<S>>>,
) -> Json<CacheStats> {
    Json(state.engine.cache_stats())
}

/// Health check endpoint (detailed).
async fn health_handler<S: FamilyStore>(
    State(state): State<Arc<ServiceState<S>>>,
) -> Json<HealthResponse> {
    let graph_version = state.engine.store().current_version().await.ok();

    Json(HealthResponse {
        status: if graph_version.is_some() { "healthy" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        schema_version: KINSHIP_KERNEL_SCHEMA_VERSION.to_string(),
        policy_ref: state.policy_ref.clone(),
        graph_version,
        cache: state.engine.cache_stats(),
    })
}

/// Liveness probe endpoint.
///
/// Does NOT check dependencies.
async fn liveness_handler() -> Json<LivenessResponse> {
    Json(LivenessResponse {
        status: "alive".to_string(),
    })
}

/// Readiness probe endpoint.
///
/// Returns 200 if the store can report its version, 503 otherwise.
async fn readiness_handler<S: FamilyStore>(
    State(state): State<Arc<ServiceState<S>>>,
) -> Result<Json<ReadinessResponse>, (StatusCode, Json<ReadinessResponse>)> {
    match state.engine.store().current_version().await {
        Ok(_) => Ok(Json(ReadinessResponse {
            ready: true,
            store: true,
            details: None,
        })),
        Err(e) => Err((
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ReadinessResponse {
                ready: false,
                store: false,
                details: Some(format!("Store unavailable: {}", e)),
            }),
        )),
    }
}

// ============================================================================
// Router Construction
// ============================================================================

/// Create the Axum router for the kinship service.
pub fn create_router<S: FamilyStore>(state: ServiceState<S>) -> Router {
    let state = Arc::new(state);

    Router::new()
        // Relationships
        .route("/api/relationship", post(relationship_handler::<S>))
        .route("/api/relationship/:a/:b", get(relationship_path_handler::<S>))
        .route("/api/relationship/batch", post(batch_handler::<S>))
        // Cache
        .route("/api/invalidate", post(invalidate_handler::<S>))
        .route("/api/cache/stats", get(cache_stats_handler::<S>))
        // Health checks
        .route("/health", get(health_handler::<S>))
        .route("/health/live", get(liveness_handler))
        .route("/health/ready", get(readiness_handler::<S>))
        .with_state(state)
}
