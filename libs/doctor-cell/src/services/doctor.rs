use std::sync::Arc;

use chrono::{Duration, NaiveDate};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use shared_database::{ClinicStore, ClinicTx, DatabaseError, Mutation};
use shared_models::auth::{Actor, Role};
use shared_models::doctor::{normalize_dates, DoctorProfile, DoctorRecord};
use shared_models::{Audit, SlotTime};
use shared_utils::clock::Clock;
use shared_utils::AppState;

use crate::models::{
    AvailableDateAction, CreateDoctorRequest, DoctorError, UpdateDoctorProfileRequest,
    DEFAULT_PAGE_SIZE, MAX_EXTEND_DAYS, MAX_PAGE_SIZE,
};

pub struct DoctorService {
    store: Arc<dyn ClinicStore>,
    clock: Arc<dyn Clock>,
    default_horizon_days: u32,
}

impl DoctorService {
    pub fn new(state: &AppState) -> Self {
        Self {
            store: state.store.clone(),
            clock: state.clock.clone(),
            default_horizon_days: state.config.available_dates_horizon_days,
        }
    }

    /// Create the doctor profile for an existing user holding the doctor role.
    #[instrument(skip(self, request), fields(user_id = %request.user_id))]
    pub async fn create_profile(
        &self,
        request: CreateDoctorRequest,
        actor: Actor,
    ) -> Result<DoctorRecord, DoctorError> {
        if !actor.is_admin() {
            return Err(DoctorError::Forbidden(
                "Only administrators can create doctor profiles".to_string(),
            ));
        }

        let specialization = request.specialization.trim().to_string();
        if specialization.is_empty() {
            return Err(DoctorError::Validation("Specialization is required".to_string()));
        }
        if request.experience_years < 0 {
            return Err(DoctorError::Validation(
                "Experience years cannot be negative".to_string(),
            ));
        }
        let slot_template = SlotTime::parse_template(&request.slot_template).map_err(DoctorError::Validation)?;

        let today = self.clock.today();
        let mut available_dates: Vec<NaiveDate> = request
            .available_dates
            .into_iter()
            .filter(|date| *date >= today)
            .collect();
        normalize_dates(&mut available_dates);

        let mut tx = self.store.begin().await?;

        let user = tx
            .find_user(request.user_id)
            .await?
            .filter(|user| user.active)
            .ok_or(DoctorError::UserNotFound)?;
        if user.role != Role::Doctor {
            warn!("Refusing doctor profile for user {} with role {}", user.id, user.role);
            return Err(DoctorError::NotADoctor);
        }
        if tx.find_doctor(user.id).await?.is_some() {
            return Err(DoctorError::ProfileExists);
        }

        let doctor = DoctorRecord {
            id: user.id,
            specialization,
            experience_years: request.experience_years,
            profile: DoctorProfile {
                education: clean(request.profile.education),
                license_number: clean(request.profile.license_number),
                clinic_name: clean(request.profile.clinic_name),
                clinic_location: clean(request.profile.clinic_location),
                clinic_phone: clean(request.profile.clinic_phone),
            },
            slot_template,
            available_dates,
            online: false,
            review_count: 0,
            average_rating: 0.0,
            active: true,
            audit: Audit::created(actor.id(), self.clock.now()),
        };

        tx.apply(Mutation::InsertDoctor(doctor.clone()))
            .await
            .map_err(profile_conflict)?;
        tx.commit().await.map_err(profile_conflict)?;

        info!("Created doctor profile {}", doctor.id);
        Ok(doctor.public_view(today))
    }

    #[instrument(skip(self))]
    pub async fn list_doctors(
        &self,
        online: Option<bool>,
        limit: Option<usize>,
        offset: Option<usize>,
    ) -> Result<Vec<DoctorRecord>, DoctorError> {
        let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
        let offset = offset.unwrap_or(0);

        let mut tx = self.store.begin_read().await?;
        let doctors = tx.list_doctors(online, limit, offset).await?;

        let today = self.clock.today();
        debug!("Listed {} doctors (online filter: {:?})", doctors.len(), online);
        Ok(doctors.iter().map(|doctor| doctor.public_view(today)).collect())
    }

    #[instrument(skip(self))]
    pub async fn get_doctor(&self, doctor_id: Uuid) -> Result<DoctorRecord, DoctorError> {
        let mut tx = self.store.begin_read().await?;
        let doctor = tx
            .find_doctor(doctor_id)
            .await?
            .filter(|doctor| doctor.active)
            .ok_or(DoctorError::NotFound)?;

        Ok(doctor.public_view(self.clock.today()))
    }

    /// Edit the descriptive part of the profile: specialization, experience
    /// and practice details.
    #[instrument(skip(self, request))]
    pub async fn update_profile(
        &self,
        doctor_id: Uuid,
        request: UpdateDoctorProfileRequest,
        actor: Actor,
    ) -> Result<DoctorRecord, DoctorError> {
        if request.is_empty() {
            return Err(DoctorError::Validation("No profile fields to update".to_string()));
        }
        let specialization = match request.specialization {
            Some(raw) if raw.trim().is_empty() => {
                return Err(DoctorError::Validation("Specialization cannot be blank".to_string()))
            }
            Some(raw) => Some(raw.trim().to_string()),
            None => None,
        };
        if request.experience_years.is_some_and(|years| years < 0) {
            return Err(DoctorError::Validation(
                "Experience years cannot be negative".to_string(),
            ));
        }

        let mut tx = self.store.begin().await?;
        let mut doctor = load_managed(tx.as_mut(), doctor_id, actor).await?;

        if let Some(specialization) = specialization {
            doctor.specialization = specialization;
        }
        if let Some(years) = request.experience_years {
            doctor.experience_years = years;
        }
        let profile = &mut doctor.profile;
        for (field, value) in [
            (&mut profile.education, request.education),
            (&mut profile.license_number, request.license_number),
            (&mut profile.clinic_name, request.clinic_name),
            (&mut profile.clinic_location, request.clinic_location),
            (&mut profile.clinic_phone, request.clinic_phone),
        ] {
            if value.is_some() {
                *field = clean(value);
            }
        }

        doctor.audit.touch(actor.id(), self.clock.now());
        tx.apply(Mutation::UpdateDoctor(doctor.clone())).await?;
        tx.commit().await?;

        info!("Updated profile of doctor {}", doctor_id);
        Ok(doctor.public_view(self.clock.today()))
    }

    #[instrument(skip(self, raw_template))]
    pub async fn update_slot_template(
        &self,
        doctor_id: Uuid,
        raw_template: &[String],
        actor: Actor,
    ) -> Result<DoctorRecord, DoctorError> {
        let slot_template = SlotTime::parse_template(raw_template).map_err(DoctorError::Validation)?;

        let mut tx = self.store.begin().await?;
        let mut doctor = load_managed(tx.as_mut(), doctor_id, actor).await?;

        doctor.slot_template = slot_template;
        doctor.audit.touch(actor.id(), self.clock.now());
        tx.apply(Mutation::UpdateDoctor(doctor.clone())).await?;
        tx.commit().await?;

        info!("Doctor {} now offers {} slots", doctor_id, doctor.slot_template.len());
        Ok(doctor.public_view(self.clock.today()))
    }

    /// Add or remove a single available date. Both directions are idempotent.
    ///
    /// Returns the doctor's upcoming dates after the change.
    #[instrument(skip(self))]
    pub async fn manage_available_date(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        action: AvailableDateAction,
        actor: Actor,
    ) -> Result<Vec<NaiveDate>, DoctorError> {
        let today = self.clock.today();
        if action == AvailableDateAction::Add && date < today {
            return Err(DoctorError::Validation(format!(
                "Cannot add {} as it is in the past",
                date
            )));
        }

        let mut tx = self.store.begin().await?;
        let mut doctor = load_managed(tx.as_mut(), doctor_id, actor).await?;

        let changed = match action {
            AvailableDateAction::Add => match doctor.available_dates.binary_search(&date) {
                Ok(_) => false,
                Err(position) => {
                    doctor.available_dates.insert(position, date);
                    true
                }
            },
            AvailableDateAction::Remove => match doctor.available_dates.binary_search(&date) {
                Ok(position) => {
                    doctor.available_dates.remove(position);
                    true
                }
                Err(_) => false,
            },
        };

        if changed {
            doctor.audit.touch(actor.id(), self.clock.now());
            tx.apply(Mutation::UpdateDoctor(doctor.clone())).await?;
            tx.commit().await?;
            info!("Doctor {} available date {} {:?}", doctor_id, date, action);
        } else {
            debug!("Doctor {} available date {} unchanged", doctor_id, date);
        }

        Ok(doctor.upcoming_dates(today))
    }

    /// Make the doctor available on every day from today through `days_ahead - 1` days out,
    /// keeping any further dates already listed. Past dates are dropped.
    #[instrument(skip(self))]
    pub async fn extend_available_dates(
        &self,
        doctor_id: Uuid,
        days_ahead: Option<u32>,
        actor: Actor,
    ) -> Result<Vec<NaiveDate>, DoctorError> {
        let days_ahead = days_ahead.unwrap_or(self.default_horizon_days);
        if days_ahead == 0 || days_ahead > MAX_EXTEND_DAYS {
            return Err(DoctorError::Validation(format!(
                "days_ahead must be between 1 and {}",
                MAX_EXTEND_DAYS
            )));
        }

        let today = self.clock.today();
        let mut tx = self.store.begin().await?;
        let mut doctor = load_managed(tx.as_mut(), doctor_id, actor).await?;

        let mut dates = doctor.upcoming_dates(today);
        dates.extend((0..i64::from(days_ahead)).map(|offset| today + Duration::days(offset)));
        normalize_dates(&mut dates);

        doctor.available_dates = dates;
        doctor.audit.touch(actor.id(), self.clock.now());
        tx.apply(Mutation::UpdateDoctor(doctor.clone())).await?;
        tx.commit().await?;

        info!(
            "Extended availability of doctor {} to {} dates",
            doctor_id,
            doctor.available_dates.len()
        );
        Ok(doctor.available_dates)
    }

    /// Drop stored dates before today. Returns how many were removed.
    #[instrument(skip(self))]
    pub async fn prune_past_dates(&self, doctor_id: Uuid, actor: Actor) -> Result<usize, DoctorError> {
        let today = self.clock.today();
        let mut tx = self.store.begin().await?;
        let mut doctor = load_managed(tx.as_mut(), doctor_id, actor).await?;

        let before = doctor.available_dates.len();
        doctor.available_dates.retain(|date| *date >= today);
        let removed = before - doctor.available_dates.len();

        if removed > 0 {
            doctor.audit.touch(actor.id(), self.clock.now());
            tx.apply(Mutation::UpdateDoctor(doctor)).await?;
            tx.commit().await?;
            info!("Pruned {} past dates from doctor {}", removed, doctor_id);
        }

        Ok(removed)
    }

    #[instrument(skip(self))]
    pub async fn set_online(
        &self,
        doctor_id: Uuid,
        online: bool,
        actor: Actor,
    ) -> Result<DoctorRecord, DoctorError> {
        let mut tx = self.store.begin().await?;
        let mut doctor = load_managed(tx.as_mut(), doctor_id, actor).await?;

        if doctor.online != online {
            doctor.online = online;
            doctor.audit.touch(actor.id(), self.clock.now());
            tx.apply(Mutation::UpdateDoctor(doctor.clone())).await?;
            tx.commit().await?;
            info!("Doctor {} is now {}", doctor_id, if online { "online" } else { "offline" });
        }

        Ok(doctor.public_view(self.clock.today()))
    }

    /// Soft-delete the doctor and the backing user in one transaction.
    ///
    /// Returns `false` when the doctor was already inactive.
    #[instrument(skip(self))]
    pub async fn deactivate(&self, doctor_id: Uuid, actor: Actor) -> Result<bool, DoctorError> {
        self.set_active(doctor_id, false, actor).await
    }

    #[instrument(skip(self))]
    pub async fn reactivate(&self, doctor_id: Uuid, actor: Actor) -> Result<bool, DoctorError> {
        self.set_active(doctor_id, true, actor).await
    }

    async fn set_active(&self, doctor_id: Uuid, active: bool, actor: Actor) -> Result<bool, DoctorError> {
        if !actor.is_admin() {
            return Err(DoctorError::Forbidden(
                "Only administrators can change doctor activation".to_string(),
            ));
        }

        let mut tx = self.store.begin().await?;
        let mut doctor = tx.find_doctor(doctor_id).await?.ok_or(DoctorError::NotFound)?;
        if doctor.active == active {
            debug!("Doctor {} already has active={}", doctor_id, active);
            return Ok(false);
        }

        let now = self.clock.now();
        doctor.active = active;
        if !active {
            doctor.online = false;
        }
        doctor.audit.touch(actor.id(), now);

        tx.apply(Mutation::UpdateDoctor(doctor)).await?;
        tx.apply(Mutation::SetUserActive {
            user_id: doctor_id,
            active,
            updated_by: actor.id(),
            updated_at: now,
        })
        .await?;
        tx.commit().await?;

        info!("Doctor {} and user account set active={}", doctor_id, active);
        Ok(true)
    }
}

/// Trimmed text, with blanks read as "not set".
fn clean(value: Option<String>) -> Option<String> {
    value
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
}

fn profile_conflict(err: DatabaseError) -> DoctorError {
    match err {
        DatabaseError::UniqueViolation(_) => DoctorError::ProfileExists,
        other => DoctorError::Database(other),
    }
}

/// Load an active doctor the actor may manage: the doctor themself or an admin.
async fn load_managed(
    tx: &mut dyn ClinicTx,
    doctor_id: Uuid,
    actor: Actor,
) -> Result<DoctorRecord, DoctorError> {
    if !actor.is_self_or_admin(doctor_id) {
        warn!("User {} tried to manage doctor {}", actor.id(), doctor_id);
        return Err(DoctorError::Forbidden(
            "You can only manage your own doctor profile".to_string(),
        ));
    }

    tx.find_doctor(doctor_id)
        .await?
        .filter(|doctor| doctor.active)
        .ok_or(DoctorError::NotFound)
}
