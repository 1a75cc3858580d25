// libs/appointment-cell/src/services/queries.rs
use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, instrument};
use uuid::Uuid;

use shared_database::{AppointmentFilter, ClinicStore};
use shared_models::appointment::{AppointmentRecord, AppointmentStatus};
use shared_models::auth::Actor;
use shared_utils::clock::Clock;
use shared_utils::AppState;

use crate::models::{AppointmentError, AppointmentView};

/// Read side of the appointment book, scoped to the caller's role.
pub struct AppointmentQueryService {
    store: Arc<dyn ClinicStore>,
    clock: Arc<dyn Clock>,
}

impl AppointmentQueryService {
    pub fn new(state: &AppState) -> Self {
        Self {
            store: state.store.clone(),
            clock: state.clock.clone(),
        }
    }

    /// The caller's active appointments, ordered by date then time.
    /// Unless `include_past` is set, appointments that already started are left out.
    #[instrument(skip(self))]
    pub async fn user_appointments(
        &self,
        actor: Actor,
        status: Option<AppointmentStatus>,
        include_past: bool,
    ) -> Result<Vec<AppointmentView>, AppointmentError> {
        let filter = AppointmentFilter {
            statuses: status.map(|status| vec![status]),
            ..scoped_filter(actor)
        };
        let now = self.clock.local_now();

        let appointments = self
            .listing(&filter, |appointment| include_past || appointment.starts_at() >= now)
            .await?;

        debug!("Found {} appointments for {}", appointments.len(), actor.id());
        Ok(appointments)
    }

    /// Non-terminal appointments (pending included) starting at or after now.
    #[instrument(skip(self))]
    pub async fn upcoming(&self, actor: Actor) -> Result<Vec<AppointmentView>, AppointmentError> {
        let now = self.clock.local_now();
        self.listing(&upcoming_filter(actor), |appointment| appointment.is_upcoming(now))
            .await
    }

    /// Appointments marked completed, or already started and not cancelled.
    #[instrument(skip(self))]
    pub async fn completed(&self, actor: Actor) -> Result<Vec<AppointmentView>, AppointmentError> {
        let now = self.clock.local_now();
        self.listing(&scoped_filter(actor), |appointment| appointment.is_completed(now))
            .await
    }

    pub async fn has_upcoming(&self, actor: Actor) -> Result<bool, AppointmentError> {
        let now = self.clock.local_now();
        let mut tx = self.store.begin_read().await?;
        let appointments = tx.find_appointments(&upcoming_filter(actor)).await?;
        Ok(appointments.iter().any(|appointment| appointment.is_upcoming(now)))
    }

    pub async fn has_completed(&self, actor: Actor) -> Result<bool, AppointmentError> {
        let now = self.clock.local_now();
        let mut tx = self.store.begin_read().await?;
        let appointments = tx.find_appointments(&scoped_filter(actor)).await?;
        Ok(appointments.iter().any(|appointment| appointment.is_completed(now)))
    }

    /// Matching appointments in start order, each joined with the names of
    /// both parties and the doctor's specialization.
    async fn listing(
        &self,
        filter: &AppointmentFilter,
        keep: impl Fn(&AppointmentRecord) -> bool,
    ) -> Result<Vec<AppointmentView>, AppointmentError> {
        let mut tx = self.store.begin_read().await?;
        let mut appointments: Vec<AppointmentRecord> = tx
            .find_appointments(filter)
            .await?
            .into_iter()
            .filter(|appointment| keep(appointment))
            .collect();
        appointments.sort_by_key(|appointment| appointment.starts_at());

        let mut names: HashMap<Uuid, Option<String>> = HashMap::new();
        let mut specializations: HashMap<Uuid, Option<String>> = HashMap::new();
        let mut views = Vec::with_capacity(appointments.len());

        for appointment in appointments {
            for id in [appointment.doctor_id, appointment.patient_id] {
                if !names.contains_key(&id) {
                    let name = tx.find_user(id).await?.map(|user| user.full_name);
                    names.insert(id, name);
                }
            }
            if !specializations.contains_key(&appointment.doctor_id) {
                let specialization = tx
                    .find_doctor(appointment.doctor_id)
                    .await?
                    .map(|doctor| doctor.specialization);
                specializations.insert(appointment.doctor_id, specialization);
            }

            views.push(AppointmentView {
                doctor_name: names.get(&appointment.doctor_id).cloned().flatten(),
                patient_name: names.get(&appointment.patient_id).cloned().flatten(),
                doctor_specialization: specializations.get(&appointment.doctor_id).cloned().flatten(),
                appointment,
            });
        }

        Ok(views)
    }
}

fn upcoming_filter(actor: Actor) -> AppointmentFilter {
    AppointmentFilter {
        statuses: Some(AppointmentStatus::NON_TERMINAL.to_vec()),
        ..scoped_filter(actor)
    }
}

fn scoped_filter(actor: Actor) -> AppointmentFilter {
    let base = AppointmentFilter {
        active_only: true,
        ..AppointmentFilter::default()
    };
    match actor {
        Actor::Admin(_) => base,
        Actor::Doctor(id) => AppointmentFilter {
            doctor_id: Some(id),
            ..base
        },
        Actor::Patient(id) => AppointmentFilter {
            patient_id: Some(id),
            ..base
        },
    }
}
