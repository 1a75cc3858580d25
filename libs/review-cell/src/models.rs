use serde::Deserialize;
use thiserror::Error;
use uuid::Uuid;

use shared_database::DatabaseError;
use shared_models::error::AppError;
use shared_models::review::{is_valid_rating, MAX_RATING, MIN_RATING};

#[derive(Debug, Clone, Deserialize)]
pub struct CreateReviewRequest {
    pub doctor_id: Uuid,
    /// Defaults to the caller.
    pub patient_id: Option<Uuid>,
    pub rating: i16,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateReviewRequest {
    pub rating: Option<i16>,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReviewListQuery {
    pub limit: Option<usize>,
    #[serde(default)]
    pub offset: usize,
}

#[derive(Error, Debug)]
pub enum ReviewError {
    #[error("Review not found")]
    NotFound,

    #[error("Doctor not found or inactive")]
    DoctorNotFound,

    #[error("Patient not found or inactive")]
    PatientNotFound,

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

impl From<ReviewError> for AppError {
    fn from(err: ReviewError) -> Self {
        match err {
            ReviewError::NotFound | ReviewError::DoctorNotFound | ReviewError::PatientNotFound => {
                AppError::NotFound(err.to_string())
            }
            ReviewError::Unauthorized(msg) => AppError::Forbidden(msg),
            ReviewError::Validation(msg) => AppError::ValidationError(msg),
            ReviewError::Database(e) => e.into(),
        }
    }
}

pub fn validate_rating(rating: i16) -> Result<i16, ReviewError> {
    if is_valid_rating(rating) {
        Ok(rating)
    } else {
        Err(ReviewError::Validation(format!(
            "Rating must be between {} and {}",
            MIN_RATING, MAX_RATING
        )))
    }
}

/// Blank comments are stored as no comment.
pub fn clean_comment(comment: Option<String>) -> Option<String> {
    comment
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
}
