//! HTTP REST API routes

mod storybook_routes;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use crate::infrastructure::state::AppState;

/// Create all API routes
pub fn create_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/storybooks", post(storybook_routes::create_storybook))
        .route(
            "/api/storybooks/files/{filename}",
            get(storybook_routes::get_storybook_file),
        )
}
