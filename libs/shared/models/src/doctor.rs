use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::audit::Audit;
use crate::slot::SlotTime;

/// Doctor profiles share the id of the user they extend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DoctorRecord {
    pub id: Uuid,
    pub specialization: String,
    pub experience_years: i32,
    #[serde(flatten)]
    pub profile: DoctorProfile,
    pub slot_template: Vec<SlotTime>,
    /// Normalized (sorted, unique) by both stores on write and on load. May
    /// still hold past dates until pruned; read through
    /// [`DoctorRecord::upcoming_dates`].
    pub available_dates: Vec<NaiveDate>,
    pub online: bool,
    pub review_count: i64,
    pub average_rating: f64,
    pub active: bool,
    #[serde(flatten)]
    pub audit: Audit,
}

/// Free-text practice details a doctor maintains on their profile.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DoctorProfile {
    pub education: Option<String>,
    pub license_number: Option<String>,
    pub clinic_name: Option<String>,
    pub clinic_location: Option<String>,
    pub clinic_phone: Option<String>,
}

impl DoctorRecord {
    pub fn upcoming_dates(&self, today: NaiveDate) -> Vec<NaiveDate> {
        self.available_dates
            .iter()
            .copied()
            .filter(|date| *date >= today)
            .collect()
    }

    pub fn is_available_on(&self, date: NaiveDate, today: NaiveDate) -> bool {
        date >= today && self.available_dates.contains(&date)
    }

    pub fn offers_slot(&self, slot: SlotTime) -> bool {
        self.slot_template.contains(&slot)
    }

    /// Copy of the record with past dates stripped, for outward-facing reads.
    pub fn public_view(&self, today: NaiveDate) -> DoctorRecord {
        DoctorRecord {
            available_dates: self.upcoming_dates(today),
            ..self.clone()
        }
    }
}

/// Sort and dedupe a date list in place.
pub fn normalize_dates(dates: &mut Vec<NaiveDate>) {
    dates.sort_unstable();
    dates.dedup();
}
