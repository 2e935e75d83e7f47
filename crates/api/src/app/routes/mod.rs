use axum::{
    Router,
    routing::{get, post},
};

pub mod analysis;
pub mod system;

/// Router for everything under `/api`.
pub fn router() -> Router {
    Router::new()
        .route("/health", get(system::health))
        .route("/analyze", post(analysis::analyze))
        .route("/status/:id", get(analysis::status))
        .route("/stats", get(analysis::stats))
        .route("/history", get(analysis::history))
        .route("/fix", post(analysis::fix))
}
