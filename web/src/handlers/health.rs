//! Health check endpoints.
//!
//! These endpoints are used by load balancers and monitoring systems
//! to verify service health.

use axum::{Json, http::StatusCode};
use serde::Serialize;

/// Liveness probe. Does NOT check dependencies.
///
/// ```text
/// GET /health  →  200 "ok"
/// ```
#[allow(clippy::unused_async)]
pub async fn health_check() -> (StatusCode, &'static str) {
    (StatusCode::OK, "ok")
}

/// Readiness report body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthReport {
    /// Component that was probed (e.g. `database`).
    pub component: String,
    /// `ready` or `unavailable`.
    pub status: &'static str,
}

/// Build a readiness response from a probe outcome.
///
/// - 200 OK when `healthy`
/// - 503 Service Unavailable otherwise
#[must_use]
pub fn readiness(component: &str, healthy: bool) -> (StatusCode, Json<HealthReport>) {
    let (status, label) = if healthy {
        (StatusCode::OK, "ready")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "unavailable")
    };

    (
        status,
        Json(HealthReport {
            component: component.to_string(),
            status: label,
        }),
    )
}
