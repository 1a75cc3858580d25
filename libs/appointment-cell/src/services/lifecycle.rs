// libs/appointment-cell/src/services/lifecycle.rs
use tracing::{debug, warn};

use shared_models::appointment::{AppointmentRecord, AppointmentStatus};

use crate::models::AppointmentError;

/// Statuses a doctor may set on their own appointment.
pub const DOCTOR_DECISIONS: [AppointmentStatus; 3] = [
    AppointmentStatus::Confirmed,
    AppointmentStatus::Cancelled,
    AppointmentStatus::Completed,
];

pub struct AppointmentLifecycleService;

impl AppointmentLifecycleService {
    pub fn new() -> Self {
        Self
    }

    /// Completed and cancelled appointments are frozen.
    pub fn ensure_mutable(&self, appointment: &AppointmentRecord) -> Result<(), AppointmentError> {
        if appointment.status.is_terminal() {
            warn!(
                "Rejected change to {} appointment {}",
                appointment.status, appointment.id
            );
            return Err(AppointmentError::InvalidStatusTransition(appointment.status));
        }
        Ok(())
    }

    pub fn validate_status_transition(
        &self,
        appointment: &AppointmentRecord,
        new_status: AppointmentStatus,
    ) -> Result<(), AppointmentError> {
        debug!(
            "Validating status transition from {} to {}",
            appointment.status, new_status
        );
        self.ensure_mutable(appointment)
    }

    pub fn validate_doctor_decision(&self, status: AppointmentStatus) -> Result<(), AppointmentError> {
        if DOCTOR_DECISIONS.contains(&status) {
            Ok(())
        } else {
            Err(AppointmentError::Validation(format!(
                "Doctors can only set confirmed, cancelled or completed, not {}",
                status
            )))
        }
    }

    pub fn ensure_reschedulable(&self, appointment: &AppointmentRecord) -> Result<(), AppointmentError> {
        if appointment.status.is_terminal() {
            return Err(AppointmentError::Validation(format!(
                "cannot reschedule a {} appointment",
                appointment.status
            )));
        }
        Ok(())
    }
}

impl Default for AppointmentLifecycleService {
    fn default() -> Self {
        Self::new()
    }
}
