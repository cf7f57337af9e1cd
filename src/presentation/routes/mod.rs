// Route modules for different API endpoints
pub mod node_manage;

use axum::{routing::get, Router};
use tower_http::trace::TraceLayer;

use crate::{application::handlers::health_check_handler, AppState};

pub use node_manage::node_manage_router;

/// Full application router with request tracing
pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check_handler))
        .nest("/nodeManage", node_manage_router())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
