//! Registry REST surface and gateway health.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use tracing::warn;

use voxfab_core::AgentRegistration;

use crate::error::GatewayError;
use crate::server::GatewayContext;

/// `POST /agents/register`
pub async fn register_agent(
    State(ctx): State<Arc<GatewayContext>>,
    Json(registration): Json<AgentRegistration>,
) -> Response {
    match ctx.registry.register(registration).await {
        Ok(()) => StatusCode::CREATED.into_response(),
        Err(e @ GatewayError::DuplicateAgent(_)) => {
            warn!(error = %e, "Registration rejected");
            (
                StatusCode::CONFLICT,
                Json(serde_json::json!({ "error": e.to_string() })),
            )
                .into_response()
        }
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "error": e.to_string() })),
        )
            .into_response(),
    }
}

/// `DELETE /agents/{id}`
pub async fn deregister_agent(
    State(ctx): State<Arc<GatewayContext>>,
    Path(agent_id): Path<String>,
) -> StatusCode {
    ctx.registry.deregister(&agent_id).await;
    StatusCode::NO_CONTENT
}

/// `GET /agents` — registry snapshot.
pub async fn list_agents(State(ctx): State<Arc<GatewayContext>>) -> Response {
    Json(ctx.registry.list().await).into_response()
}

/// `GET /health`
pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}
