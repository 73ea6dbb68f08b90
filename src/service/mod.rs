//! Kinship REST Service
//!
//! Exposes the relationship engine as a REST API.
//!
//! ## Endpoints
//!
//! - `POST /api/relationship` - What `b` is to `a`
//! - `GET /api/relationship/{a}/{b}` - Same, with ids in the path
//! - `POST /api/relationship/batch` - Relationships from one anchor to many people
//! - `POST /api/invalidate` - Advance the cache epoch
//! - `GET /api/cache/stats` - Cache statistics
//! - `GET /health` - Detailed service health check
//! - `GET /health/live` - Liveness probe
//! - `GET /health/ready` - Readiness probe

pub mod middleware;
pub mod routes;
pub mod state;

pub use middleware::{metrics_middleware, record_relationship_metrics};
pub use routes::{create_router, AppState};
pub use state::{PolicyRef, ServiceState};
