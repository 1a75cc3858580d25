// libs/chat-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};

use shared_models::auth::{Actor, User};
use shared_models::error::AppError;
use shared_utils::AppState;

use crate::models::{ChatError, HistoryQuery, SendMessageRequest, SessionListQuery, StartSessionRequest};
use crate::services::{ChatMessageService, ChatSessionService};

// ==============================================================================
// SESSIONS
// ==============================================================================

#[axum::debug_handler]
pub async fn start_session(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Json(request): Json<StartSessionRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let actor = Actor::from_user(&user)?;
    let started = ChatSessionService::new(&state)
        .start_session(request.doctor_id, request.patient_id, actor)
        .await?;

    let status = if started.is_new {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };

    Ok((
        status,
        Json(json!({
            "success": true,
            "session": started.session,
            "is_new": started.is_new
        })),
    ))
}

#[axum::debug_handler]
pub async fn list_sessions(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SessionListQuery>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let actor = Actor::from_user(&user)?;
    let sessions = ChatSessionService::new(&state)
        .list_user_sessions(actor, query.active)
        .await?;

    Ok(Json(json!({
        "success": true,
        "sessions": sessions,
        "total": sessions.len()
    })))
}

#[axum::debug_handler]
pub async fn end_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let actor = Actor::from_user(&user)?;
    let ended = ChatSessionService::new(&state)
        .end_session(&session_id, actor)
        .await?;

    Ok(Json(json!({
        "success": true,
        "ended": ended
    })))
}

#[axum::debug_handler]
pub async fn delete_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let actor = Actor::from_user(&user)?;
    let archived = ChatSessionService::new(&state)
        .deactivate_session(&session_id, actor)
        .await?;
    if !archived {
        return Err(ChatError::SessionNotFound.into());
    }

    Ok(Json(json!({
        "success": true
    })))
}

// ==============================================================================
// MESSAGES
// ==============================================================================

#[axum::debug_handler]
pub async fn send_message(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    Extension(user): Extension<User>,
    Json(request): Json<SendMessageRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let actor = Actor::from_user(&user)?;
    let message = ChatMessageService::new(&state)
        .send_message(&session_id, &request.body, actor)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": message
        })),
    ))
}

#[axum::debug_handler]
pub async fn get_history(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    Query(query): Query<HistoryQuery>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let actor = Actor::from_user(&user)?;
    let messages = ChatMessageService::new(&state)
        .get_history(&session_id, query, actor)
        .await?;

    Ok(Json(json!({
        "success": true,
        "messages": messages,
        "total": messages.len()
    })))
}

#[axum::debug_handler]
pub async fn edit_message(
    State(state): State<Arc<AppState>>,
    Path(message_id): Path<String>,
    Extension(user): Extension<User>,
    Json(request): Json<SendMessageRequest>,
) -> Result<Json<Value>, AppError> {
    let actor = Actor::from_user(&user)?;
    let message = ChatMessageService::new(&state)
        .edit_message(&message_id, &request.body, actor)
        .await?;

    Ok(Json(json!({
        "success": true,
        "message": message
    })))
}

#[axum::debug_handler]
pub async fn delete_message(
    State(state): State<Arc<AppState>>,
    Path(message_id): Path<String>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let actor = Actor::from_user(&user)?;
    ChatMessageService::new(&state)
        .delete_message(&message_id, actor)
        .await?;

    Ok(Json(json!({
        "success": true
    })))
}
