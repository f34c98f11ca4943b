use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub mod handlers;

/// Build the service router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/requests", post(handlers::create_request))
        .route("/requests/:id", get(handlers::get_request))
        .route("/approvals/:id/approve", post(handlers::approve_request))
        .route("/approvals/:id/deny", post(handlers::deny_request))
        .route("/slack/interact", post(handlers::slack_interact))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
