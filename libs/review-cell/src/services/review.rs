use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use shared_database::{ClinicStore, ClinicTx, Mutation};
use shared_models::auth::Actor;
use shared_models::review::DoctorReviewRecord;
use shared_models::Audit;
use shared_utils::clock::Clock;
use shared_utils::AppState;

use crate::models::{clean_comment, validate_rating, CreateReviewRequest, ReviewError, UpdateReviewRequest};

pub struct ReviewService {
    store: Arc<dyn ClinicStore>,
    clock: Arc<dyn Clock>,
}

impl ReviewService {
    pub fn new(state: &AppState) -> Self {
        Self {
            store: state.store.clone(),
            clock: state.clock.clone(),
        }
    }

    /// Record a review and refresh the doctor's rating summary in the same unit of work.
    #[instrument(skip(self, request))]
    pub async fn create_review(
        &self,
        request: CreateReviewRequest,
        actor: Actor,
    ) -> Result<DoctorReviewRecord, ReviewError> {
        let rating = validate_rating(request.rating)?;
        let patient_id = request.patient_id.unwrap_or_else(|| actor.id());

        if !actor.is_self_or_admin(patient_id) {
            return Err(ReviewError::Unauthorized(
                "You can only review as yourself".to_string(),
            ));
        }

        let mut tx = self.store.begin().await?;
        tx.find_doctor(request.doctor_id)
            .await?
            .filter(|doctor| doctor.active)
            .ok_or(ReviewError::DoctorNotFound)?;
        tx.find_patient(patient_id)
            .await?
            .filter(|patient| patient.active)
            .ok_or(ReviewError::PatientNotFound)?;

        let now = self.clock.now();
        let review = DoctorReviewRecord {
            id: Uuid::new_v4(),
            doctor_id: request.doctor_id,
            patient_id,
            rating,
            comment: clean_comment(request.comment),
            active: true,
            audit: Audit::created(actor.id(), now),
        };

        tx.apply(Mutation::InsertReview(review.clone())).await?;
        recompute_summary(tx.as_mut(), review.doctor_id, actor, now).await?;
        tx.commit().await?;

        info!("Patient {} rated doctor {} with {}", patient_id, review.doctor_id, rating);
        Ok(review)
    }

    #[instrument(skip(self, request))]
    pub async fn update_review(
        &self,
        review_id: Uuid,
        request: UpdateReviewRequest,
        actor: Actor,
    ) -> Result<DoctorReviewRecord, ReviewError> {
        let rating = request.rating.map(validate_rating).transpose()?;

        let mut tx = self.store.begin().await?;
        let mut review = find_active(tx.as_mut(), review_id).await?;

        if review.patient_id != actor.id() {
            return Err(ReviewError::Unauthorized(
                "Only the author can edit this review".to_string(),
            ));
        }

        if let Some(rating) = rating {
            review.rating = rating;
        }
        if request.comment.is_some() {
            review.comment = clean_comment(request.comment);
        }

        let now = self.clock.now();
        review.audit.touch(actor.id(), now);
        tx.apply(Mutation::UpdateReview(review.clone())).await?;
        recompute_summary(tx.as_mut(), review.doctor_id, actor, now).await?;
        tx.commit().await?;

        info!("Updated review {}", review_id);
        Ok(review)
    }

    #[instrument(skip(self))]
    pub async fn deactivate_review(&self, review_id: Uuid, actor: Actor) -> Result<(), ReviewError> {
        let mut tx = self.store.begin().await?;
        let mut review = find_active(tx.as_mut(), review_id).await?;

        if !actor.is_self_or_admin(review.patient_id) {
            return Err(ReviewError::Unauthorized(
                "Only the author can remove this review".to_string(),
            ));
        }

        let now = self.clock.now();
        review.active = false;
        review.audit.touch(actor.id(), now);
        tx.apply(Mutation::UpdateReview(review.clone())).await?;
        recompute_summary(tx.as_mut(), review.doctor_id, actor, now).await?;
        tx.commit().await?;

        info!("Deactivated review {}", review_id);
        Ok(())
    }

    /// Active reviews, newest first. No `limit` means every review past `offset`.
    #[instrument(skip(self))]
    pub async fn list_doctor_reviews(
        &self,
        doctor_id: Uuid,
        limit: Option<usize>,
        offset: usize,
    ) -> Result<Vec<DoctorReviewRecord>, ReviewError> {
        if limit == Some(0) {
            return Err(ReviewError::Validation("limit must be at least 1".to_string()));
        }

        let mut tx = self.store.begin_read().await?;
        tx.find_doctor(doctor_id)
            .await?
            .filter(|doctor| doctor.active)
            .ok_or(ReviewError::DoctorNotFound)?;

        let reviews = tx.list_reviews(doctor_id, limit, offset).await?;
        debug!("Returning {} reviews of doctor {} from offset {}", reviews.len(), doctor_id, offset);
        Ok(reviews)
    }
}

async fn find_active(tx: &mut dyn ClinicTx, review_id: Uuid) -> Result<DoctorReviewRecord, ReviewError> {
    tx.find_review(review_id)
        .await?
        .filter(|review| review.active)
        .ok_or(ReviewError::NotFound)
}

async fn recompute_summary(
    tx: &mut dyn ClinicTx,
    doctor_id: Uuid,
    actor: Actor,
    at: DateTime<Utc>,
) -> Result<(), ReviewError> {
    tx.apply(Mutation::RecomputeReviewSummary {
        doctor_id,
        updated_by: actor.id(),
        updated_at: at,
    })
    .await?;
    Ok(())
}
