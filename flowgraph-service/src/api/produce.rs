//! Job Delivery API Handler
//!
//! Entry point for jobs delivered by the streaming appliance.

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
};
use flowgraph_core::dto::job::JobPayload;

use crate::api::AppState;
use crate::api::error::{ApiError, ApiResult};

/// POST /{topic}/{event}
/// Produce the graph for a delivered job
pub async fn produce_graph(
    State(state): State<AppState>,
    Path((topic, event)): Path<(String, String)>,
    body: Bytes,
) -> ApiResult<StatusCode> {
    let payload: JobPayload = serde_json::from_slice(&body)
        .map_err(|e| ApiError::BadRequest(format!("invalid job body: {}", e)))?;

    tracing::debug!("Received job {} from {}/{}", payload.id, topic, event);

    state.production.produce_payload(payload).await?;
    Ok(StatusCode::NO_CONTENT)
}
