// libs/review-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_models::auth::{Actor, User};
use shared_models::error::AppError;
use shared_utils::AppState;

use crate::models::{CreateReviewRequest, ReviewListQuery, UpdateReviewRequest};
use crate::services::ReviewService;

// ==============================================================================
// PUBLIC HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn list_doctor_reviews(
    State(state): State<Arc<AppState>>,
    Path(doctor_id): Path<Uuid>,
    Query(query): Query<ReviewListQuery>,
) -> Result<Json<Value>, AppError> {
    let reviews = ReviewService::new(&state)
        .list_doctor_reviews(doctor_id, query.limit, query.offset)
        .await?;

    Ok(Json(json!({
        "success": true,
        "reviews": reviews,
        "total": reviews.len(),
        "offset": query.offset
    })))
}

// ==============================================================================
// PROTECTED HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn create_review(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateReviewRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let actor = Actor::from_user(&user)?;
    let review = ReviewService::new(&state).create_review(request, actor).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "review": review
        })),
    ))
}

#[axum::debug_handler]
pub async fn update_review(
    State(state): State<Arc<AppState>>,
    Path(review_id): Path<Uuid>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdateReviewRequest>,
) -> Result<Json<Value>, AppError> {
    let actor = Actor::from_user(&user)?;
    let review = ReviewService::new(&state)
        .update_review(review_id, request, actor)
        .await?;

    Ok(Json(json!({
        "success": true,
        "review": review
    })))
}

#[axum::debug_handler]
pub async fn deactivate_review(
    State(state): State<Arc<AppState>>,
    Path(review_id): Path<Uuid>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let actor = Actor::from_user(&user)?;
    ReviewService::new(&state)
        .deactivate_review(review_id, actor)
        .await?;

    Ok(Json(json!({
        "success": true
    })))
}
