use serde::Deserialize;
use thiserror::Error;
use uuid::Uuid;

use shared_database::DatabaseError;
use shared_models::error::AppError;

#[derive(Debug, Clone, Deserialize)]
pub struct CreatePatientRequest {
    pub user_id: Uuid,
    pub blood_type: Option<String>,
    pub medical_history: Option<String>,
    pub emergency_contact: Option<String>,
}

/// Partial edit of the medical details. Absent fields stay as they are; a
/// blank string clears the field.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdatePatientRequest {
    pub blood_type: Option<String>,
    pub medical_history: Option<String>,
    pub emergency_contact: Option<String>,
}

impl UpdatePatientRequest {
    pub fn is_empty(&self) -> bool {
        self.blood_type.is_none() && self.medical_history.is_none() && self.emergency_contact.is_none()
    }
}

#[derive(Error, Debug)]
pub enum PatientError {
    #[error("Patient not found")]
    NotFound,

    #[error("User not found")]
    UserNotFound,

    #[error("User is not registered with the patient role")]
    NotAPatient,

    #[error("Patient profile already exists for this user")]
    ProfileExists,

    #[error("Unauthorized access to patient data")]
    Unauthorized,

    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

impl From<PatientError> for AppError {
    fn from(err: PatientError) -> Self {
        match err {
            PatientError::NotFound | PatientError::UserNotFound => AppError::NotFound(err.to_string()),
            PatientError::NotAPatient | PatientError::Validation(_) => {
                AppError::ValidationError(err.to_string())
            }
            PatientError::ProfileExists => AppError::Conflict(err.to_string()),
            PatientError::Unauthorized => AppError::Forbidden(err.to_string()),
            PatientError::Database(e) => e.into(),
        }
    }
}

/// Trim optional free text, treating blank input as absent.
pub fn clean_optional(value: Option<String>) -> Option<String> {
    value
        .map(|raw| raw.trim().to_string())
        .filter(|cleaned| !cleaned.is_empty())
}
