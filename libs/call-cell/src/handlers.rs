// libs/call-cell/src/handlers.rs
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

use crate::models::{
    parse_call_status, CallError, CallListQuery, InitiateCallRequest, RelaySignalRequest,
    UpdateCallStatusRequest,
};
use crate::services::CallSignalingService;

#[axum::debug_handler]
pub async fn initiate_call(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Json(request): Json<InitiateCallRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let actor = Actor::from_user(&user)?;
    let call = CallSignalingService::new(&state)
        .initiate_call(&request.session_id, request.callee_id, request.call_type, actor)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "call": call
        })),
    ))
}

#[axum::debug_handler]
pub async fn list_calls(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CallListQuery>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let actor = Actor::from_user(&user)?;
    let filter = query.to_filter()?;
    let calls = CallSignalingService::new(&state)
        .list_user_calls(actor, filter)
        .await?;

    Ok(Json(json!({
        "success": true,
        "calls": calls,
        "total": calls.len()
    })))
}

#[axum::debug_handler]
pub async fn get_call(
    State(state): State<Arc<AppState>>,
    Path(call_id): Path<String>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let actor = Actor::from_user(&user)?;
    let call = CallSignalingService::new(&state).get_call(&call_id, actor).await?;

    Ok(Json(json!({
        "success": true,
        "call": call
    })))
}

#[axum::debug_handler]
pub async fn delete_call(
    State(state): State<Arc<AppState>>,
    Path(call_id): Path<String>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let actor = Actor::from_user(&user)?;
    let removed = CallSignalingService::new(&state)
        .deactivate_call(&call_id, actor)
        .await?;

    if !removed {
        return Err(CallError::CallNotFound.into());
    }

    Ok(Json(json!({
        "success": true
    })))
}

#[axum::debug_handler]
pub async fn update_call_status(
    State(state): State<Arc<AppState>>,
    Path(call_id): Path<String>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdateCallStatusRequest>,
) -> Result<Json<Value>, AppError> {
    let actor = Actor::from_user(&user)?;
    let status = parse_call_status(&request.status)?;
    let changed = CallSignalingService::new(&state)
        .update_status(&call_id, status, actor)
        .await?;

    if !changed {
        return Err(CallError::CallNotFound.into());
    }

    Ok(Json(json!({
        "success": true,
        "status": status
    })))
}

#[axum::debug_handler]
pub async fn relay_signal(
    State(state): State<Arc<AppState>>,
    Path(call_id): Path<String>,
    Extension(user): Extension<User>,
    Json(request): Json<RelaySignalRequest>,
) -> Result<Json<Value>, AppError> {
    let actor = Actor::from_user(&user)?;
    let delivered = CallSignalingService::new(&state)
        .relay_signal(&call_id, request.kind, request.payload, actor)
        .await?;

    Ok(Json(json!({
        "success": true,
        "delivered": delivered
    })))
}
