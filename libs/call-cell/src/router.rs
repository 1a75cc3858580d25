// libs/call-cell/src/router.rs
use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, patch, post},
    Router,
};

use shared_utils::extractor::auth_middleware;
use shared_utils::AppState;

use crate::handlers;

pub fn call_routes(state: Arc<AppState>) -> Router {
    let protected_routes = Router::new()
        .route("/", post(handlers::initiate_call).get(handlers::list_calls))
        .route("/{call_id}", get(handlers::get_call).delete(handlers::delete_call))
        .route("/{call_id}/status", patch(handlers::update_call_status))
        .route("/{call_id}/signal", post(handlers::relay_signal))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(protected_routes)
        .with_state(state)
}
