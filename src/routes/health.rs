// src/routes/health.rs
//! Liveness endpoint for the weather-metrics service.
//!
//! Used by container orchestrators and load balancers to check that the
//! process is up and serving HTTP. Follows the Explicit Module Boundary
//! Pattern (EMBP): the handler stays private and only the subrouter is
//! exported to the gateway (`mod.rs`).

use axum::{routing::get, Json, Router};
use serde::Serialize;

/// JSON response body for the `/health` endpoint.
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

/// Handle `GET /health`.
///
/// Does not touch the reading store, so a slow or unreachable database does
/// not mark the process itself as dead.
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Subrouter containing the `/health` route, generic over the gateway state.
pub fn router<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    Router::new().route("/health", get(health))
}
