//! Liveness check

use axum::http::StatusCode;

/// GET /health
/// Answers as long as the server accepts connections; collaborators are not checked
pub async fn health_check() -> (StatusCode, &'static str) {
    (StatusCode::OK, "OK")
}
