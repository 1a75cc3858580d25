// libs/appointment-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_models::auth::{Actor, User};
use shared_models::error::AppError;
use shared_utils::AppState;

use crate::models::{
    parse_status, AppointmentError, AppointmentListQuery, BookAppointmentRequest,
    RescheduleAppointmentRequest, UpdateStatusRequest,
};
use crate::services::{AppointmentBookingService, AppointmentQueryService};

/// Status-changing operations report a missing appointment as `false`; over HTTP that is a 404.
fn require_found(changed: bool) -> Result<(), AppError> {
    if changed {
        Ok(())
    } else {
        Err(AppointmentError::not_found().into())
    }
}

// ==============================================================================
// BOOKING & LIFECYCLE
// ==============================================================================

#[axum::debug_handler]
pub async fn book_appointment(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Json(request): Json<BookAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let actor = Actor::from_user(&user)?;
    let appointment = AppointmentBookingService::new(&state)
        .book_appointment(request, actor)
        .await?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "message": "Appointment booked successfully"
    })))
}

#[axum::debug_handler]
pub async fn get_appointment(
    State(state): State<Arc<AppState>>,
    Path(appointment_id): Path<Uuid>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let actor = Actor::from_user(&user)?;
    let appointment = AppointmentBookingService::new(&state)
        .get_appointment(appointment_id, actor)
        .await?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment
    })))
}

#[axum::debug_handler]
pub async fn update_appointment_status(
    State(state): State<Arc<AppState>>,
    Path(appointment_id): Path<Uuid>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdateStatusRequest>,
) -> Result<Json<Value>, AppError> {
    let actor = Actor::from_user(&user)?;
    let status = parse_status(&request.status)?;
    let changed = AppointmentBookingService::new(&state)
        .update_status(appointment_id, status, actor)
        .await?;
    require_found(changed)?;

    Ok(Json(json!({
        "success": true,
        "status": status
    })))
}

#[axum::debug_handler]
pub async fn confirm_appointment(
    State(state): State<Arc<AppState>>,
    Path(appointment_id): Path<Uuid>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdateStatusRequest>,
) -> Result<Json<Value>, AppError> {
    let actor = Actor::from_user(&user)?;
    let status = parse_status(&request.status)?;
    let changed = AppointmentBookingService::new(&state)
        .confirm_by_doctor(appointment_id, status, actor)
        .await?;
    require_found(changed)?;

    Ok(Json(json!({
        "success": true,
        "status": status
    })))
}

#[axum::debug_handler]
pub async fn reschedule_appointment(
    State(state): State<Arc<AppState>>,
    Path(appointment_id): Path<Uuid>,
    Extension(user): Extension<User>,
    Json(request): Json<RescheduleAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let actor = Actor::from_user(&user)?;
    let service = AppointmentBookingService::new(&state);
    service
        .reschedule(
            appointment_id,
            request.appointment_date,
            &request.appointment_time,
            actor,
        )
        .await?;
    let appointment = service.get_appointment(appointment_id, actor).await?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "message": "Appointment rescheduled successfully"
    })))
}

#[axum::debug_handler]
pub async fn cancel_appointment(
    State(state): State<Arc<AppState>>,
    Path(appointment_id): Path<Uuid>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let actor = Actor::from_user(&user)?;
    let changed = AppointmentBookingService::new(&state)
        .cancel(appointment_id, actor)
        .await?;
    require_found(changed)?;

    Ok(Json(json!({
        "success": true,
        "message": "Appointment cancelled successfully"
    })))
}

#[axum::debug_handler]
pub async fn delete_appointment(
    State(state): State<Arc<AppState>>,
    Path(appointment_id): Path<Uuid>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let actor = Actor::from_user(&user)?;
    let changed = AppointmentBookingService::new(&state)
        .deactivate(appointment_id, actor)
        .await?;
    require_found(changed)?;

    Ok(Json(json!({
        "success": true
    })))
}

// ==============================================================================
// LISTINGS
// ==============================================================================

#[axum::debug_handler]
pub async fn list_appointments(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AppointmentListQuery>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let actor = Actor::from_user(&user)?;
    let status = query.status.as_deref().map(parse_status).transpose()?;
    let appointments = AppointmentQueryService::new(&state)
        .user_appointments(actor, status, query.include_past)
        .await?;

    Ok(Json(json!({
        "success": true,
        "appointments": appointments,
        "total": appointments.len()
    })))
}

#[axum::debug_handler]
pub async fn get_upcoming_appointments(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let actor = Actor::from_user(&user)?;
    let appointments = AppointmentQueryService::new(&state).upcoming(actor).await?;

    Ok(Json(json!({
        "success": true,
        "appointments": appointments,
        "total": appointments.len()
    })))
}

#[axum::debug_handler]
pub async fn get_completed_appointments(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let actor = Actor::from_user(&user)?;
    let appointments = AppointmentQueryService::new(&state).completed(actor).await?;

    Ok(Json(json!({
        "success": true,
        "appointments": appointments,
        "total": appointments.len()
    })))
}

#[axum::debug_handler]
pub async fn has_upcoming_appointments(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let actor = Actor::from_user(&user)?;
    let exists = AppointmentQueryService::new(&state).has_upcoming(actor).await?;

    Ok(Json(json!({
        "success": true,
        "exists": exists
    })))
}

#[axum::debug_handler]
pub async fn has_completed_appointments(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let actor = Actor::from_user(&user)?;
    let exists = AppointmentQueryService::new(&state).has_completed(actor).await?;

    Ok(Json(json!({
        "success": true,
        "exists": exists
    })))
}
