use std::collections::HashSet;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};
use tracing::{debug, instrument};
use uuid::Uuid;

use shared_database::{AppointmentFilter, ClinicStore};
use shared_models::doctor::DoctorRecord;
use shared_models::SlotTime;
use shared_utils::clock::Clock;
use shared_utils::AppState;

use crate::models::DoctorError;

/// Bookable slots of `doctor` on `date`: template minus booked minus elapsed.
///
/// Empty when the date is not one of the doctor's available dates or lies
/// before today. Template order is preserved.
pub fn compute_available_slots(
    doctor: &DoctorRecord,
    date: NaiveDate,
    booked: &HashSet<SlotTime>,
    now: NaiveDateTime,
) -> Vec<SlotTime> {
    let today = now.date();
    if !doctor.is_available_on(date, today) {
        return Vec::new();
    }

    doctor
        .slot_template
        .iter()
        .copied()
        .filter(|slot| !booked.contains(slot))
        .filter(|slot| date > today || slot.is_bookable_at(date, now))
        .collect()
}

pub struct AvailabilityService {
    store: Arc<dyn ClinicStore>,
    clock: Arc<dyn Clock>,
}

impl AvailabilityService {
    pub fn new(state: &AppState) -> Self {
        Self {
            store: state.store.clone(),
            clock: state.clock.clone(),
        }
    }

    #[instrument(skip(self))]
    pub async fn get_available_slots(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<SlotTime>, DoctorError> {
        let mut tx = self.store.begin_read().await?;

        let doctor = tx
            .find_doctor(doctor_id)
            .await?
            .filter(|doctor| doctor.active)
            .ok_or(DoctorError::NotFound)?;

        let now = self.clock.local_now();
        if !doctor.is_available_on(date, now.date()) {
            debug!("Doctor {} does not accept bookings on {}", doctor_id, date);
            return Ok(Vec::new());
        }

        let booked: HashSet<SlotTime> = tx
            .find_appointments(&AppointmentFilter::slot_holders(doctor_id, date))
            .await?
            .into_iter()
            .map(|appointment| appointment.appointment_time)
            .collect();

        let slots = compute_available_slots(&doctor, date, &booked, now);
        debug!(
            "Doctor {} has {} of {} slots open on {}",
            doctor_id,
            slots.len(),
            doctor.slot_template.len(),
            date
        );
        Ok(slots)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use shared_models::doctor::DoctorProfile;
    use shared_models::Audit;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, day).unwrap()
    }

    fn s(raw: &str) -> SlotTime {
        raw.parse().unwrap()
    }

    fn doctor() -> DoctorRecord {
        DoctorRecord {
            id: Uuid::new_v4(),
            specialization: "Pediatrics".to_string(),
            experience_years: 3,
            profile: DoctorProfile::default(),
            // Deliberately not chronological
            slot_template: vec![s("02:00 PM"), s("09:00 AM"), s("10:00 AM")],
            available_dates: vec![d(9), d(10), d(11)],
            online: true,
            review_count: 0,
            average_rating: 0.0,
            active: true,
            audit: Audit::created(Uuid::nil(), Utc::now()),
        }
    }

    fn at(day: u32, hour: u32, minute: u32) -> NaiveDateTime {
        d(day).and_hms_opt(hour, minute, 0).unwrap()
    }

    #[test]
    fn future_date_returns_template_minus_booked_in_template_order() {
        let booked = HashSet::from([s("09:00 AM")]);
        let slots = compute_available_slots(&doctor(), d(11), &booked, at(10, 8, 0));
        assert_eq!(slots, vec![s("02:00 PM"), s("10:00 AM")]);
    }

    #[test]
    fn today_drops_elapsed_and_current_slots() {
        let slots = compute_available_slots(&doctor(), d(10), &HashSet::new(), at(10, 10, 0));
        assert_eq!(slots, vec![s("02:00 PM")]);
    }

    #[test]
    fn past_or_unlisted_dates_are_empty() {
        let none = HashSet::new();
        assert!(compute_available_slots(&doctor(), d(9), &none, at(10, 8, 0)).is_empty());
        assert!(compute_available_slots(&doctor(), d(12), &none, at(10, 8, 0)).is_empty());
    }
}
