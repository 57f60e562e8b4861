//! API Module
//!
//! HTTP API layer for the service.
//! Each submodule handles endpoints for a specific concern.

pub mod error;
pub mod graph;
pub mod health;
pub mod produce;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use crate::service::{GraphService, ProductionPipeline};

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub graphs: Arc<GraphService>,
    pub production: Arc<ProductionPipeline>,
}

/// Create the main API router with all endpoints
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // Graph requests
        .route("/", post(graph::submit_graph).get(graph::get_graph))
        // Job delivery
        .route("/{topic}/{event}", post(produce::produce_graph))
        // Add state and middleware
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
