// libs/appointment-cell/src/models.rs
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use shared_database::DatabaseError;
use shared_models::appointment::{AppointmentRecord, AppointmentStatus};
use shared_models::error::AppError;
use shared_models::SlotTime;

pub const SLOT_TAKEN_MESSAGE: &str = "This appointment slot is already booked.";
pub const NOT_OWNED_MESSAGE: &str = "Appointment not found or does not belong to this patient.";

// ==============================================================================
// REQUEST MODELS
// ==============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct BookAppointmentRequest {
    pub doctor_id: Uuid,
    /// Required when an admin books on a patient's behalf; patients book for themselves.
    pub patient_id: Option<Uuid>,
    pub appointment_date: NaiveDate,
    pub appointment_time: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RescheduleAppointmentRequest {
    pub appointment_date: NaiveDate,
    pub appointment_time: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppointmentListQuery {
    pub status: Option<String>,
    #[serde(default)]
    pub include_past: bool,
}

// ==============================================================================
// RESPONSE MODELS
// ==============================================================================

/// Listing row: the appointment plus display fields of both parties. Names
/// are `None` when the user row is gone.
#[derive(Debug, Clone, Serialize)]
pub struct AppointmentView {
    #[serde(flatten)]
    pub appointment: AppointmentRecord,
    pub doctor_name: Option<String>,
    pub patient_name: Option<String>,
    pub doctor_specialization: Option<String>,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Error, Debug)]
pub enum AppointmentError {
    #[error("{0}")]
    NotFound(String),

    #[error("Doctor not found or inactive")]
    DoctorNotFound,

    #[error("Patient not found or inactive")]
    PatientNotFound,

    #[error("This appointment slot is already booked.")]
    SlotTaken,

    #[error("Appointment cannot be modified in current status: {0}")]
    InvalidStatusTransition(AppointmentStatus),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

impl AppointmentError {
    pub fn not_found() -> Self {
        AppointmentError::NotFound("Appointment not found".to_string())
    }
}

impl From<AppointmentError> for AppError {
    fn from(err: AppointmentError) -> Self {
        match err {
            AppointmentError::NotFound(msg) => AppError::NotFound(msg),
            AppointmentError::DoctorNotFound | AppointmentError::PatientNotFound => {
                AppError::NotFound(err.to_string())
            }
            AppointmentError::SlotTaken => AppError::Conflict(SLOT_TAKEN_MESSAGE.to_string()),
            AppointmentError::InvalidStatusTransition(_) | AppointmentError::Validation(_) => {
                AppError::ValidationError(err.to_string())
            }
            AppointmentError::Unauthorized(msg) => AppError::Forbidden(msg),
            AppointmentError::Database(e) => e.into(),
        }
    }
}

/// Store constraint violations on the slot index mean somebody else won the slot.
pub fn slot_conflict(err: DatabaseError) -> AppointmentError {
    match err {
        DatabaseError::UniqueViolation(_) => AppointmentError::SlotTaken,
        other => AppointmentError::Database(other),
    }
}

pub fn parse_status(raw: &str) -> Result<AppointmentStatus, AppointmentError> {
    raw.trim().to_ascii_lowercase().parse().map_err(AppointmentError::Validation)
}

pub fn parse_slot(raw: &str) -> Result<SlotTime, AppointmentError> {
    raw.parse().map_err(AppointmentError::Validation)
}
