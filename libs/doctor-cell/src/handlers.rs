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
    parse_date, AvailableSlotsQuery, AvailableSlotsResponse, CreateDoctorRequest, DoctorListQuery,
    ExtendAvailableDatesRequest, ManageAvailableDateRequest, SetOnlineRequest,
    UpdateDoctorProfileRequest, UpdateSlotTemplateRequest,
};
use crate::services::{AvailabilityService, DoctorService};

// ==============================================================================
// PUBLIC HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn list_doctors(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DoctorListQuery>,
) -> Result<Json<Value>, AppError> {
    let doctors = DoctorService::new(&state)
        .list_doctors(query.online, query.limit, query.offset)
        .await?;

    Ok(Json(json!({
        "success": true,
        "doctors": doctors,
        "total": doctors.len()
    })))
}

#[axum::debug_handler]
pub async fn get_doctor(
    State(state): State<Arc<AppState>>,
    Path(doctor_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let doctor = DoctorService::new(&state).get_doctor(doctor_id).await?;

    Ok(Json(json!({
        "success": true,
        "doctor": doctor
    })))
}

#[axum::debug_handler]
pub async fn get_available_slots(
    State(state): State<Arc<AppState>>,
    Path(doctor_id): Path<Uuid>,
    Query(query): Query<AvailableSlotsQuery>,
) -> Result<Json<Value>, AppError> {
    let date = parse_date(&query.date)?;
    let slots = AvailabilityService::new(&state)
        .get_available_slots(doctor_id, date)
        .await?;

    Ok(Json(json!({
        "success": true,
        "availability": AvailableSlotsResponse { doctor_id, date, slots }
    })))
}

// ==============================================================================
// PROTECTED HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn create_doctor(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateDoctorRequest>,
) -> Result<Json<Value>, AppError> {
    let actor = Actor::from_user(&user)?;
    let doctor = DoctorService::new(&state).create_profile(request, actor).await?;

    Ok(Json(json!({
        "success": true,
        "doctor": doctor,
        "message": "Doctor profile created successfully"
    })))
}

#[axum::debug_handler]
pub async fn update_profile(
    State(state): State<Arc<AppState>>,
    Path(doctor_id): Path<Uuid>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdateDoctorProfileRequest>,
) -> Result<Json<Value>, AppError> {
    let actor = Actor::from_user(&user)?;
    let doctor = DoctorService::new(&state)
        .update_profile(doctor_id, request, actor)
        .await?;

    Ok(Json(json!({
        "success": true,
        "doctor": doctor,
        "message": "Doctor profile updated successfully"
    })))
}

#[axum::debug_handler]
pub async fn update_slot_template(
    State(state): State<Arc<AppState>>,
    Path(doctor_id): Path<Uuid>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdateSlotTemplateRequest>,
) -> Result<Json<Value>, AppError> {
    let actor = Actor::from_user(&user)?;
    let doctor = DoctorService::new(&state)
        .update_slot_template(doctor_id, &request.slot_template, actor)
        .await?;

    Ok(Json(json!({
        "success": true,
        "slot_template": doctor.slot_template
    })))
}

#[axum::debug_handler]
pub async fn manage_available_date(
    State(state): State<Arc<AppState>>,
    Path(doctor_id): Path<Uuid>,
    Extension(user): Extension<User>,
    Json(request): Json<ManageAvailableDateRequest>,
) -> Result<Json<Value>, AppError> {
    let actor = Actor::from_user(&user)?;
    let dates = DoctorService::new(&state)
        .manage_available_date(doctor_id, request.date, request.action, actor)
        .await?;

    Ok(Json(json!({
        "success": true,
        "available_dates": dates
    })))
}

#[axum::debug_handler]
pub async fn extend_available_dates(
    State(state): State<Arc<AppState>>,
    Path(doctor_id): Path<Uuid>,
    Extension(user): Extension<User>,
    Json(request): Json<ExtendAvailableDatesRequest>,
) -> Result<Json<Value>, AppError> {
    let actor = Actor::from_user(&user)?;
    let dates = DoctorService::new(&state)
        .extend_available_dates(doctor_id, request.days_ahead, actor)
        .await?;

    Ok(Json(json!({
        "success": true,
        "available_dates": dates
    })))
}

#[axum::debug_handler]
pub async fn prune_past_dates(
    State(state): State<Arc<AppState>>,
    Path(doctor_id): Path<Uuid>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let actor = Actor::from_user(&user)?;
    let removed = DoctorService::new(&state).prune_past_dates(doctor_id, actor).await?;

    Ok(Json(json!({
        "success": true,
        "removed": removed
    })))
}

#[axum::debug_handler]
pub async fn set_online(
    State(state): State<Arc<AppState>>,
    Path(doctor_id): Path<Uuid>,
    Extension(user): Extension<User>,
    Json(request): Json<SetOnlineRequest>,
) -> Result<Json<Value>, AppError> {
    let actor = Actor::from_user(&user)?;
    let doctor = DoctorService::new(&state)
        .set_online(doctor_id, request.online, actor)
        .await?;

    Ok(Json(json!({
        "success": true,
        "online": doctor.online
    })))
}

#[axum::debug_handler]
pub async fn deactivate_doctor(
    State(state): State<Arc<AppState>>,
    Path(doctor_id): Path<Uuid>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let actor = Actor::from_user(&user)?;
    let changed = DoctorService::new(&state).deactivate(doctor_id, actor).await?;

    Ok(Json(json!({
        "success": true,
        "changed": changed
    })))
}

#[axum::debug_handler]
pub async fn reactivate_doctor(
    State(state): State<Arc<AppState>>,
    Path(doctor_id): Path<Uuid>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let actor = Actor::from_user(&user)?;
    let changed = DoctorService::new(&state).reactivate(doctor_id, actor).await?;

    Ok(Json(json!({
        "success": true,
        "changed": changed
    })))
}
