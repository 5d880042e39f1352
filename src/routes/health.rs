//! Liveness endpoint.
//!
//! `GET /health` answers without touching DynamoDB, so load balancers and
//! container checks see the API process itself, not the table.

use axum::{routing::get, Json, Router};
use serde::Serialize;

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

/// Subrouter with the `/health` route.
///
/// Generic over the state so it merges into the gateway whatever the
/// handler state is.
pub fn router<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    Router::new().route("/health", get(health))
}
