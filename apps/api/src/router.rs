use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, Uri},
    routing::get,
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::{self, TraceLayer};
use tracing::{Level, Span};

use appointment_cell::router::appointment_routes;
use call_cell::router::call_routes;
use chat_cell::router::chat_routes;
use doctor_cell::router::doctor_routes;
use patient_cell::router::patient_routes;
use review_cell::router::review_routes;
use shared_utils::realtime::BroadcastHub;
use shared_utils::AppState;

use crate::realtime::realtime_routes;

pub fn create_router(state: Arc<AppState>, hub: BroadcastHub) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(|| async { "Telehealth clinic API is running!" }))
        .nest("/doctors", doctor_routes(state.clone()))
        .nest("/patients", patient_routes(state.clone()))
        .nest("/appointments", appointment_routes(state.clone()))
        .nest("/chat", chat_routes(state.clone()))
        .nest("/calls", call_routes(state.clone()))
        .nest("/reviews", review_routes(state.clone()))
        .nest("/realtime", realtime_routes(state, hub))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(request_span)
                .on_response(trace::DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors)
}

const SECRET_QUERY_KEYS: [&str; 2] = ["token", "access_token"];

fn request_span(request: &Request<Body>) -> Span {
    tracing::span!(
        Level::INFO,
        "request",
        method = %request.method(),
        uri = %redacted_uri(request.uri()),
        version = ?request.version(),
    )
}

/// Path and query with credential values masked. Realtime clients put their
/// JWT in `?token=`.
fn redacted_uri(uri: &Uri) -> String {
    let Some(query) = uri.query() else {
        return uri.path().to_string();
    };

    let pairs: Vec<String> = query
        .split('&')
        .map(|pair| match pair.split_once('=') {
            Some((key, _)) if SECRET_QUERY_KEYS.contains(&key) => format!("{}=[redacted]", key),
            _ => pair.to_string(),
        })
        .collect();
    format!("{}?{}", uri.path(), pairs.join("&"))
}
