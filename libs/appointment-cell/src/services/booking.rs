// libs/appointment-cell/src/services/booking.rs
use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use shared_database::{AppointmentFilter, ClinicStore, ClinicTx};
use shared_database::Mutation;
use shared_models::appointment::{AppointmentRecord, AppointmentStatus};
use shared_models::auth::Actor;
use shared_models::doctor::DoctorRecord;
use shared_models::{Audit, SlotTime};
use shared_utils::clock::Clock;
use shared_utils::AppState;

use crate::models::{
    parse_slot, slot_conflict, AppointmentError, BookAppointmentRequest, NOT_OWNED_MESSAGE,
};
use crate::services::lifecycle::AppointmentLifecycleService;

pub struct AppointmentBookingService {
    store: Arc<dyn ClinicStore>,
    clock: Arc<dyn Clock>,
    lifecycle: AppointmentLifecycleService,
}

impl AppointmentBookingService {
    pub fn new(state: &AppState) -> Self {
        Self {
            store: state.store.clone(),
            clock: state.clock.clone(),
            lifecycle: AppointmentLifecycleService::new(),
        }
    }

    /// Book a pending appointment in one of the doctor's open slots.
    #[instrument(skip(self, request), fields(doctor_id = %request.doctor_id))]
    pub async fn book_appointment(
        &self,
        request: BookAppointmentRequest,
        actor: Actor,
    ) -> Result<AppointmentRecord, AppointmentError> {
        let patient_id = match (actor, request.patient_id) {
            (Actor::Patient(id), None) => id,
            (Actor::Patient(id), Some(requested)) if requested == id => id,
            (Actor::Admin(_), Some(requested)) => requested,
            (Actor::Admin(_), None) => {
                return Err(AppointmentError::Validation(
                    "patient_id is required when booking on behalf of a patient".to_string(),
                ))
            }
            _ => {
                warn!("User {} tried to book for another patient", actor.id());
                return Err(AppointmentError::Unauthorized(
                    "You can only book appointments for yourself".to_string(),
                ));
            }
        };
        let time = parse_slot(&request.appointment_time)?;
        let date = request.appointment_date;

        let mut tx = self.store.begin().await?;

        let doctor = load_active_doctor(tx.as_mut(), request.doctor_id).await?;
        tx.find_patient(patient_id)
            .await?
            .filter(|patient| patient.active)
            .ok_or(AppointmentError::PatientNotFound)?;

        self.check_slot_offered(&doctor, date, time)?;
        self.check_not_elapsed(date, time)?;
        check_slot_free(tx.as_mut(), doctor.id, date, time, None).await?;

        let appointment = AppointmentRecord {
            id: Uuid::new_v4(),
            doctor_id: doctor.id,
            patient_id,
            appointment_date: date,
            appointment_time: time,
            status: AppointmentStatus::Pending,
            active: true,
            audit: Audit::created(actor.id(), self.clock.now()),
        };

        tx.apply(Mutation::InsertAppointment(appointment.clone()))
            .await
            .map_err(slot_conflict)?;
        tx.commit().await.map_err(slot_conflict)?;

        info!(
            "Booked appointment {} with doctor {} on {} at {}",
            appointment.id, appointment.doctor_id, date, time
        );
        Ok(appointment)
    }

    #[instrument(skip(self))]
    pub async fn get_appointment(
        &self,
        appointment_id: Uuid,
        actor: Actor,
    ) -> Result<AppointmentRecord, AppointmentError> {
        let mut tx = self.store.begin_read().await?;
        let appointment = tx
            .find_appointment(appointment_id)
            .await?
            .filter(|appointment| appointment.active)
            .ok_or_else(AppointmentError::not_found)?;

        if !actor.is_admin() && !appointment.involves(actor.id()) {
            return Err(AppointmentError::Unauthorized(
                "Not authorized to view this appointment".to_string(),
            ));
        }

        Ok(appointment)
    }

    /// Admin override of the status. `false` when the appointment is missing or inactive.
    #[instrument(skip(self))]
    pub async fn update_status(
        &self,
        appointment_id: Uuid,
        status: AppointmentStatus,
        actor: Actor,
    ) -> Result<bool, AppointmentError> {
        if !actor.is_admin() {
            return Err(AppointmentError::Unauthorized(
                "Only administrators can set appointment status".to_string(),
            ));
        }

        let mut tx = self.store.begin().await?;
        let Some(mut appointment) = find_live(tx.as_mut(), appointment_id).await? else {
            return Ok(false);
        };
        self.lifecycle.validate_status_transition(&appointment, status)?;

        appointment.status = status;
        appointment.audit.touch(actor.id(), self.clock.now());
        tx.apply(Mutation::UpdateAppointment(appointment)).await?;
        tx.commit().await?;

        info!("Appointment {} set to {} by admin", appointment_id, status);
        Ok(true)
    }

    /// The owning doctor confirms, cancels or completes an appointment.
    #[instrument(skip(self))]
    pub async fn confirm_by_doctor(
        &self,
        appointment_id: Uuid,
        status: AppointmentStatus,
        actor: Actor,
    ) -> Result<bool, AppointmentError> {
        self.lifecycle.validate_doctor_decision(status)?;
        let Actor::Doctor(doctor_id) = actor else {
            return Err(AppointmentError::Unauthorized(
                "Only the assigned doctor can confirm an appointment".to_string(),
            ));
        };

        let mut tx = self.store.begin().await?;
        let Some(mut appointment) = find_live(tx.as_mut(), appointment_id).await? else {
            return Ok(false);
        };
        if appointment.doctor_id != doctor_id {
            warn!("Doctor {} tried to update appointment {} of another doctor", doctor_id, appointment_id);
            return Err(AppointmentError::Unauthorized(
                "This appointment is assigned to another doctor".to_string(),
            ));
        }
        self.lifecycle.validate_status_transition(&appointment, status)?;

        appointment.status = status;
        appointment.audit.touch(doctor_id, self.clock.now());
        tx.apply(Mutation::UpdateAppointment(appointment)).await?;
        tx.commit().await?;

        info!("Doctor {} set appointment {} to {}", doctor_id, appointment_id, status);
        Ok(true)
    }

    /// Move a patient's appointment to another open slot of the same doctor.
    ///
    /// All checks run inside one transaction; any failure leaves the row untouched.
    #[instrument(skip(self, raw_time))]
    pub async fn reschedule(
        &self,
        appointment_id: Uuid,
        new_date: NaiveDate,
        raw_time: &str,
        actor: Actor,
    ) -> Result<bool, AppointmentError> {
        let Actor::Patient(patient_id) = actor else {
            return Err(AppointmentError::Unauthorized(
                "Only the patient can reschedule an appointment".to_string(),
            ));
        };
        let new_time = parse_slot(raw_time)?;

        let mut tx = self.store.begin().await?;

        let mut appointment = find_live(tx.as_mut(), appointment_id)
            .await?
            .filter(|appointment| appointment.patient_id == patient_id)
            .ok_or_else(|| AppointmentError::NotFound(NOT_OWNED_MESSAGE.to_string()))?;
        self.lifecycle.ensure_reschedulable(&appointment)?;

        let doctor = load_active_doctor(tx.as_mut(), appointment.doctor_id).await?;
        self.check_slot_offered(&doctor, new_date, new_time)?;
        check_slot_free(tx.as_mut(), doctor.id, new_date, new_time, Some(appointment.id)).await?;
        self.check_not_elapsed(new_date, new_time)?;

        let previous = appointment.starts_at();
        appointment.appointment_date = new_date;
        appointment.appointment_time = new_time;
        appointment.status = AppointmentStatus::Scheduled;
        appointment.audit.touch(patient_id, self.clock.now());

        tx.apply(Mutation::UpdateAppointment(appointment))
            .await
            .map_err(slot_conflict)?;
        tx.commit().await.map_err(slot_conflict)?;

        info!(
            "Rescheduled appointment {} from {} to {} {}",
            appointment_id, previous, new_date, new_time
        );
        Ok(true)
    }

    /// Cancel by the owning patient, the owning doctor, or an admin.
    #[instrument(skip(self))]
    pub async fn cancel(&self, appointment_id: Uuid, actor: Actor) -> Result<bool, AppointmentError> {
        let mut tx = self.store.begin().await?;
        let Some(mut appointment) = find_live(tx.as_mut(), appointment_id).await? else {
            return Ok(false);
        };

        let allowed = match actor {
            Actor::Admin(_) => true,
            Actor::Doctor(id) => appointment.doctor_id == id,
            Actor::Patient(id) => appointment.patient_id == id,
        };
        if !allowed {
            return Err(AppointmentError::Unauthorized(
                "Not authorized to cancel this appointment".to_string(),
            ));
        }
        self.lifecycle
            .validate_status_transition(&appointment, AppointmentStatus::Cancelled)?;

        appointment.status = AppointmentStatus::Cancelled;
        appointment.audit.touch(actor.id(), self.clock.now());
        tx.apply(Mutation::UpdateAppointment(appointment)).await?;
        tx.commit().await?;

        info!("Appointment {} cancelled by {}", appointment_id, actor.role());
        Ok(true)
    }

    /// Admin soft delete. `false` when already gone.
    #[instrument(skip(self))]
    pub async fn deactivate(&self, appointment_id: Uuid, actor: Actor) -> Result<bool, AppointmentError> {
        if !actor.is_admin() {
            return Err(AppointmentError::Unauthorized(
                "Only administrators can delete appointments".to_string(),
            ));
        }

        let mut tx = self.store.begin().await?;
        let Some(mut appointment) = find_live(tx.as_mut(), appointment_id).await? else {
            return Ok(false);
        };

        appointment.active = false;
        appointment.audit.touch(actor.id(), self.clock.now());
        tx.apply(Mutation::UpdateAppointment(appointment)).await?;
        tx.commit().await?;

        info!("Appointment {} deactivated", appointment_id);
        Ok(true)
    }

    fn check_slot_offered(
        &self,
        doctor: &DoctorRecord,
        date: NaiveDate,
        time: SlotTime,
    ) -> Result<(), AppointmentError> {
        if !doctor.is_available_on(date, self.clock.today()) {
            return Err(AppointmentError::Validation(format!(
                "Doctor is not available on {}",
                date
            )));
        }
        if !doctor.offers_slot(time) {
            return Err(AppointmentError::Validation(format!(
                "{} is not one of the doctor's appointment times",
                time
            )));
        }
        Ok(())
    }

    fn check_not_elapsed(&self, date: NaiveDate, time: SlotTime) -> Result<(), AppointmentError> {
        if !time.is_bookable_at(date, self.clock.local_now()) {
            return Err(AppointmentError::Validation(format!(
                "The {} slot on {} has already passed",
                time, date
            )));
        }
        Ok(())
    }
}

async fn find_live(
    tx: &mut dyn ClinicTx,
    appointment_id: Uuid,
) -> Result<Option<AppointmentRecord>, AppointmentError> {
    let appointment = tx
        .find_appointment(appointment_id)
        .await?
        .filter(|appointment| appointment.active);
    if appointment.is_none() {
        debug!("Appointment {} not found or inactive", appointment_id);
    }
    Ok(appointment)
}

async fn load_active_doctor(tx: &mut dyn ClinicTx, doctor_id: Uuid) -> Result<DoctorRecord, AppointmentError> {
    tx.find_doctor(doctor_id)
        .await?
        .filter(|doctor| doctor.active)
        .ok_or(AppointmentError::DoctorNotFound)
}

async fn check_slot_free(
    tx: &mut dyn ClinicTx,
    doctor_id: Uuid,
    date: NaiveDate,
    time: SlotTime,
    exclude: Option<Uuid>,
) -> Result<(), AppointmentError> {
    let holders = tx
        .find_appointments(&AppointmentFilter::slot_holders(doctor_id, date))
        .await?;

    if holders
        .iter()
        .any(|holder| holder.appointment_time == time && Some(holder.id) != exclude)
    {
        warn!("Slot {} {} of doctor {} is already booked", date, time, doctor_id);
        return Err(AppointmentError::SlotTaken);
    }
    Ok(())
}
