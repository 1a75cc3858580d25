use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use shared_database::DatabaseError;
use shared_models::error::AppError;
use shared_models::doctor::DoctorProfile;
use shared_models::SlotTime;

pub const DEFAULT_PAGE_SIZE: usize = 10;
pub const MAX_PAGE_SIZE: usize = 100;
pub const MAX_EXTEND_DAYS: u32 = 365;

// ==============================================================================
// REQUESTS
// ==============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct CreateDoctorRequest {
    pub user_id: Uuid,
    pub specialization: String,
    #[serde(default)]
    pub experience_years: i32,
    #[serde(default)]
    pub slot_template: Vec<String>,
    #[serde(default)]
    pub available_dates: Vec<NaiveDate>,
    #[serde(flatten)]
    pub profile: DoctorProfile,
}

/// Partial profile edit. Absent fields stay as they are; a blank string
/// clears an optional field.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateDoctorProfileRequest {
    pub specialization: Option<String>,
    pub experience_years: Option<i32>,
    pub education: Option<String>,
    pub license_number: Option<String>,
    pub clinic_name: Option<String>,
    pub clinic_location: Option<String>,
    pub clinic_phone: Option<String>,
}

impl UpdateDoctorProfileRequest {
    pub fn is_empty(&self) -> bool {
        self.specialization.is_none()
            && self.experience_years.is_none()
            && self.education.is_none()
            && self.license_number.is_none()
            && self.clinic_name.is_none()
            && self.clinic_location.is_none()
            && self.clinic_phone.is_none()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateSlotTemplateRequest {
    pub slot_template: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AvailableDateAction {
    Add,
    Remove,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ManageAvailableDateRequest {
    pub date: NaiveDate,
    pub action: AvailableDateAction,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExtendAvailableDatesRequest {
    pub days_ahead: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SetOnlineRequest {
    pub online: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DoctorListQuery {
    pub online: Option<bool>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AvailableSlotsQuery {
    pub date: String,
}

// ==============================================================================
// RESPONSES
// ==============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct AvailableSlotsResponse {
    pub doctor_id: Uuid,
    pub date: NaiveDate,
    pub slots: Vec<SlotTime>,
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Error, Debug)]
pub enum DoctorError {
    #[error("Doctor not found")]
    NotFound,

    #[error("User not found")]
    UserNotFound,

    #[error("User is not registered with the doctor role")]
    NotADoctor,

    #[error("Doctor profile already exists for this user")]
    ProfileExists,

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

impl From<DoctorError> for AppError {
    fn from(err: DoctorError) -> Self {
        match err {
            DoctorError::NotFound | DoctorError::UserNotFound => AppError::NotFound(err.to_string()),
            DoctorError::NotADoctor | DoctorError::Validation(_) => AppError::ValidationError(err.to_string()),
            DoctorError::ProfileExists => AppError::Conflict(err.to_string()),
            DoctorError::Forbidden(msg) => AppError::Forbidden(msg),
            DoctorError::Database(e) => e.into(),
        }
    }
}

/// Parse a `YYYY-MM-DD` path or query value.
pub fn parse_date(raw: &str) -> Result<NaiveDate, DoctorError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| DoctorError::Validation(format!("Invalid date '{}', expected YYYY-MM-DD", raw)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn parse_date_accepts_iso_dates_only() {
        assert_eq!(parse_date("2025-06-10").unwrap(), NaiveDate::from_ymd_opt(2025, 6, 10).unwrap());
        assert_matches!(parse_date("10/06/2025"), Err(DoctorError::Validation(_)));
        assert_matches!(parse_date("2025-02-30"), Err(DoctorError::Validation(_)));
    }

    #[test]
    fn profile_fields_ride_along_on_create() {
        let request: CreateDoctorRequest = serde_json::from_value(serde_json::json!({
            "user_id": Uuid::nil(),
            "specialization": "Neurology",
            "license_number": "MD-4411",
        }))
        .unwrap();
        assert_eq!(request.profile.license_number.as_deref(), Some("MD-4411"));
        assert_eq!(request.profile.clinic_phone, None);
        assert!(UpdateDoctorProfileRequest::default().is_empty());
    }

    #[test]
    fn errors_map_to_http_taxonomy() {
        assert_matches!(AppError::from(DoctorError::NotFound), AppError::NotFound(_));
        assert_matches!(AppError::from(DoctorError::ProfileExists), AppError::Conflict(_));
        assert_matches!(
            AppError::from(DoctorError::Database(DatabaseError::Timeout(5))),
            AppError::Unavailable(_)
        );
    }
}
