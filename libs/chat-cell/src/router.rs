// libs/chat-cell/src/router.rs
use std::sync::Arc;

use axum::{
    middleware,
    routing::{delete, post, put},
    Router,
};

use shared_utils::extractor::auth_middleware;
use shared_utils::AppState;

use crate::handlers;

pub fn chat_routes(state: Arc<AppState>) -> Router {
    let protected_routes = Router::new()
        .route(
            "/sessions",
            post(handlers::start_session).get(handlers::list_sessions),
        )
        .route("/sessions/{session_id}", delete(handlers::delete_session))
        .route("/sessions/{session_id}/end", post(handlers::end_session))
        .route(
            "/sessions/{session_id}/messages",
            post(handlers::send_message).get(handlers::get_history),
        )
        .route(
            "/messages/{message_id}",
            put(handlers::edit_message).delete(handlers::delete_message),
        )
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(protected_routes)
        .with_state(state)
}
