//! API Error Handling
//!
//! Unified error types and conversion for API responses.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::service::{Dependency, GraphError};

/// API error type
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Conflict(String),
    NotFound(String),
    DependencyFailure {
        dependency: Dependency,
        reason: String,
    },
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => {
                tracing::info!("Invalid input: {}", msg);
                (StatusCode::BAD_REQUEST, msg)
            }
            ApiError::Conflict(msg) => {
                tracing::info!("Conflict: {}", msg);
                (StatusCode::CONFLICT, msg)
            }
            ApiError::NotFound(msg) => {
                tracing::info!("Not found: {}", msg);
                (StatusCode::NOT_FOUND, msg)
            }
            ApiError::DependencyFailure { dependency, reason } => {
                tracing::error!(dependency = %dependency, "Dependency failure: {}", reason);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

impl From<GraphError> for ApiError {
    fn from(err: GraphError) -> Self {
        match err {
            GraphError::InvalidInput(msg) => ApiError::BadRequest(msg),
            GraphError::Conflict(msg) => ApiError::Conflict(msg),
            GraphError::NotFound(id) => ApiError::NotFound(format!("graph {} was not found", id)),
            GraphError::Dependency { dependency, reason } => {
                ApiError::DependencyFailure { dependency, reason }
            }
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn render(err: ApiError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn test_status_mapping() {
        let (status, body) = render(ApiError::BadRequest("start should be before stop".into())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "start should be before stop");

        let (status, _) = render(ApiError::Conflict("exists".into())).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, _) = render(ApiError::NotFound("missing".into())).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_dependency_failure_hides_reason() {
        let err = ApiError::from(GraphError::dependency(
            Dependency::Storage,
            "access denied for bucket graphs",
        ));
        let (status, body) = render(err).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Internal server error");
    }
}
