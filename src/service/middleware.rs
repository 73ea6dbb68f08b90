//! Service middleware for request metrics.
//!
//! ## Metrics Exposed
//!
//! - `request` - One event per request with path, method, status and latency
//! - `relationship` - One event per computed answer set with its size
//!
//! Metrics are emitted as structured `tracing` events under the
//! `kinship_kernel::metrics` target and aggregated from logs.

use std::sync::OnceLock;
use std::time::Instant;

use axum::{extract::Request, middleware::Next, response::Response};
use regex_lite::Regex;
use tracing::info;

/// Metrics middleware that records request counts and latency.
pub async fn metrics_middleware(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let path = normalize_path(request.uri().path());

    let response = next.run(request).await;

    let latency = start.elapsed();
    let status = response.status().as_u16();

    info!(
        target: "kinship_kernel::metrics",
        metric_type = "request",
        path = %path,
        method = %method,
        status = status,
        latency_ms = latency.as_millis() as u64,
        "request_metric"
    );

    response
}

/// Normalize path for metrics to avoid high cardinality.
///
/// Replaces person UUIDs with a placeholder.
fn normalize_path(path: &str) -> String {
    static UUID: OnceLock<Option<Regex>> = OnceLock::new();
    let uuid = UUID.get_or_init(|| {
        Regex::new(r"[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}").ok()
    });

    match uuid {
        Some(re) => re.replace_all(path, ":id").to_string(),
        None => path.to_string(),
    }
}

/// Record relationship computation metrics.
pub fn record_relationship_metrics(relationships: usize, latency_ms: u64) {
    info!(
        target: "kinship_kernel::metrics",
        metric_type = "relationship",
        relationships = relationships,
        latency_ms = latency_ms,
        "relationship_metric"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path_replaces_uuid() {
        let path = "/api/relationship/550e8400-e29b-41d4-a716-446655440000/00000000-0000-0000-0000-000000000007";
        assert_eq!(normalize_path(path), "/api/relationship/:id/:id");
    }

    #[test]
    fn test_normalize_path_preserves_regular_path() {
        assert_eq!(normalize_path("/health/ready"), "/health/ready");
    }
}
