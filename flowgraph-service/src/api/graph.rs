//! Graph API Handlers
//!
//! HTTP handlers for requesting and fetching graphs.

use axum::{
    body::Body,
    extract::{Query, State, rejection::QueryRejection},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use flowgraph_core::TimeRange;
use serde::Deserialize;

use crate::api::AppState;
use crate::api::error::{ApiError, ApiResult};
use crate::service::{GraphError, Retrieval};

/// `start`/`stop` query parameters. Missing values fail timestamp parsing
/// rather than query extraction, so they report as invalid input.
#[derive(Debug, Deserialize)]
pub struct RangeQuery {
    #[serde(default)]
    pub start: String,
    #[serde(default)]
    pub stop: String,
}

/// Range of a graph request; a query string that does not even decode is
/// invalid input like a bad timestamp
fn requested_range(query: Result<Query<RangeQuery>, QueryRejection>) -> ApiResult<TimeRange> {
    let Query(query) = query.map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;
    TimeRange::parse(&query.start, &query.stop).map_err(|err| GraphError::from(err).into())
}

/// POST /
/// Request production of the graph for a time range
pub async fn submit_graph(
    State(state): State<AppState>,
    query: Result<Query<RangeQuery>, QueryRejection>,
) -> ApiResult<StatusCode> {
    state.graphs.submit(requested_range(query)?).await?;
    Ok(StatusCode::ACCEPTED)
}

/// GET /
/// Fetch the graph for a time range
pub async fn get_graph(
    State(state): State<AppState>,
    query: Result<Query<RangeQuery>, QueryRejection>,
) -> ApiResult<Response> {
    match state.graphs.retrieve(requested_range(query)?).await? {
        Retrieval::InProgress => Ok(StatusCode::NO_CONTENT.into_response()),
        Retrieval::Ready(stream) => Ok((
            [(header::CONTENT_TYPE, "application/octet-stream")],
            Body::from_stream(stream),
        )
            .into_response()),
    }
}
