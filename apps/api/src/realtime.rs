use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::Response,
    routing::get,
    Router,
};
use axum_extra::TypedHeader;
use futures::{SinkExt, StreamExt};
use headers::{authorization::Bearer, Authorization};
use serde::Deserialize;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use shared_models::auth::Actor;
use shared_models::error::AppError;
use shared_utils::extractor::authenticate;
use shared_utils::realtime::{BroadcastHub, RealtimeSubscription};
use shared_utils::AppState;

#[derive(Clone)]
pub struct RealtimeState {
    pub app: Arc<AppState>,
    pub hub: BroadcastHub,
}

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    pub token: Option<String>,
}

pub fn realtime_routes(state: Arc<AppState>, hub: BroadcastHub) -> Router {
    Router::new()
        .route("/ws", get(websocket_handler))
        .with_state(RealtimeState { app: state, hub })
}

/// Browsers cannot set headers on a WebSocket handshake, so the token may
/// also arrive as `?token=`.
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<RealtimeState>,
    Query(query): Query<WsQuery>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
) -> Result<Response, AppError> {
    let token = query
        .token
        .or_else(|| bearer.map(|TypedHeader(Authorization(bearer))| bearer.token().to_string()))
        .ok_or_else(|| AppError::Auth("Missing realtime token".to_string()))?;

    let user = authenticate(&state.app, &token)?;
    let user_id = Actor::from_user(&user)?.id();

    // Subscribe before the upgrade so nothing sent in between is lost. A
    // failed upgrade drops the callback and the subscription with it.
    let subscription = state.hub.connect(user_id).await;

    Ok(ws
        .on_failed_upgrade(move |e| warn!("Realtime upgrade for user {} failed: {}", user_id, e))
        .on_upgrade(move |socket| handle_socket(socket, subscription)))
}

async fn handle_socket(socket: WebSocket, mut events: RealtimeSubscription) {
    let user_id = events.user_id();
    info!("Realtime connection established for user {}", user_id);

    let (mut sender, mut receiver) = socket.split();

    let forward = async {
        loop {
            match events.recv().await {
                Ok(payload) => {
                    if let Err(e) = sender.send(Message::Text(payload.into())).await {
                        debug!("Realtime socket of user {} closed: {}", user_id, e);
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Realtime connection of user {} skipped {} events", user_id, skipped);
                }
                Err(RecvError::Closed) => break,
            }
        }
    };

    let listen = async {
        while let Some(message) = receiver.next().await {
            match message {
                Ok(Message::Close(_)) | Err(_) => break,
                // Clients only listen; anything else is ignored
                Ok(_) => {}
            }
        }
    };

    tokio::select! {
        _ = forward => {}
        _ = listen => {}
    }

    drop(events);
    info!("Realtime connection closed for user {}", user_id);
}
