use std::sync::Arc;

use axum::{
    middleware,
    routing::{delete, get, patch, post, put},
    Router,
};

use shared_utils::extractor::auth_middleware;
use shared_utils::AppState;

use crate::handlers;

pub fn doctor_routes(state: Arc<AppState>) -> Router {
    let public_routes = Router::new()
        .route("/", get(handlers::list_doctors))
        .route("/{doctor_id}", get(handlers::get_doctor))
        .route("/{doctor_id}/available-slots", get(handlers::get_available_slots));

    let protected_routes = Router::new()
        .route("/", post(handlers::create_doctor))
        .route("/{doctor_id}/profile", put(handlers::update_profile))
        .route("/{doctor_id}/slot-template", put(handlers::update_slot_template))
        .route("/{doctor_id}/available-dates", post(handlers::manage_available_date))
        .route("/{doctor_id}/available-dates/extend", post(handlers::extend_available_dates))
        .route("/{doctor_id}/available-dates/past", delete(handlers::prune_past_dates))
        .route("/{doctor_id}/online", patch(handlers::set_online))
        .route("/{doctor_id}/deactivate", post(handlers::deactivate_doctor))
        .route("/{doctor_id}/reactivate", post(handlers::reactivate_doctor))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}
