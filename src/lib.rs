pub mod config;
pub mod engine;
pub mod errors;
pub mod handlers;
pub mod metrics;
pub mod models;
pub mod prompt;
pub mod sentence;
pub mod state;
pub mod tls;
pub mod worker;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};

use state::AppState;

pub const GENERATION_QUEUE_DEPTH: usize = 100;

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health_handler))
        .route("/generate", post(handlers::generate_handler))
        .route("/metrics", get(handlers::metrics_handler))
        .with_state(state)
}

// uvicorn's --root-path equivalent for a proxy that keeps the prefix.
pub fn with_root_path(router: Router, root_path: Option<&str>) -> Router {
    match root_path {
        Some(root) if !root.is_empty() && root != "/" => Router::new().nest(root, router),
        _ => router,
    }
}
