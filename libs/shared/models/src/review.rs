use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::audit::Audit;

pub const MIN_RATING: i16 = 1;
pub const MAX_RATING: i16 = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DoctorReviewRecord {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub patient_id: Uuid,
    pub rating: i16,
    pub comment: Option<String>,
    pub active: bool,
    #[serde(flatten)]
    pub audit: Audit,
}

pub fn is_valid_rating(rating: i16) -> bool {
    (MIN_RATING..=MAX_RATING).contains(&rating)
}

/// Count and mean of the given ratings, mean rounded to two decimals (0 when empty).
pub fn summarize_ratings<I: IntoIterator<Item = i16>>(ratings: I) -> (i64, f64) {
    let (count, total) = ratings
        .into_iter()
        .fold((0i64, 0i64), |(count, total), rating| (count + 1, total + rating as i64));

    if count == 0 {
        return (0, 0.0);
    }

    let mean = total as f64 / count as f64;
    (count, (mean * 100.0).round() / 100.0)
}
