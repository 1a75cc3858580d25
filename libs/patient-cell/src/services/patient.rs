use std::sync::Arc;

use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use shared_database::{ClinicStore, DatabaseError, Mutation};
use shared_models::auth::{Actor, Role};
use shared_models::patient::PatientRecord;
use shared_models::Audit;
use shared_utils::clock::Clock;
use shared_utils::AppState;

use crate::models::{clean_optional, CreatePatientRequest, PatientError, UpdatePatientRequest};

pub struct PatientService {
    store: Arc<dyn ClinicStore>,
    clock: Arc<dyn Clock>,
}

impl PatientService {
    pub fn new(state: &AppState) -> Self {
        Self {
            store: state.store.clone(),
            clock: state.clock.clone(),
        }
    }

    /// Create the patient profile for a user holding the patient role.
    /// Patients may register themselves; admins may register anyone.
    #[instrument(skip(self, request), fields(user_id = %request.user_id))]
    pub async fn create_patient(
        &self,
        request: CreatePatientRequest,
        actor: Actor,
    ) -> Result<PatientRecord, PatientError> {
        if !actor.is_self_or_admin(request.user_id) {
            warn!("User {} tried to create a profile for {}", actor.id(), request.user_id);
            return Err(PatientError::Unauthorized);
        }

        let mut tx = self.store.begin().await?;

        let user = tx
            .find_user(request.user_id)
            .await?
            .filter(|user| user.active)
            .ok_or(PatientError::UserNotFound)?;
        if user.role != Role::Patient {
            return Err(PatientError::NotAPatient);
        }
        if tx.find_patient(user.id).await?.is_some() {
            return Err(PatientError::ProfileExists);
        }

        let patient = PatientRecord {
            id: user.id,
            blood_type: clean_optional(request.blood_type),
            medical_history: clean_optional(request.medical_history),
            emergency_contact: clean_optional(request.emergency_contact),
            active: true,
            audit: Audit::created(actor.id(), self.clock.now()),
        };

        tx.apply(Mutation::InsertPatient(patient.clone()))
            .await
            .map_err(profile_conflict)?;
        tx.commit().await.map_err(profile_conflict)?;

        info!("Created patient profile {}", patient.id);
        Ok(patient)
    }

    #[instrument(skip(self))]
    pub async fn get_patient(&self, patient_id: Uuid, actor: Actor) -> Result<PatientRecord, PatientError> {
        if !actor.is_self_or_admin(patient_id) {
            return Err(PatientError::Unauthorized);
        }

        let mut tx = self.store.begin_read().await?;
        let patient = tx
            .find_patient(patient_id)
            .await?
            .filter(|patient| patient.active || actor.is_admin())
            .ok_or(PatientError::NotFound)?;

        debug!("Fetched patient profile {}", patient_id);
        Ok(patient)
    }

    #[instrument(skip(self, request))]
    pub async fn update_patient(
        &self,
        patient_id: Uuid,
        request: UpdatePatientRequest,
        actor: Actor,
    ) -> Result<PatientRecord, PatientError> {
        if !actor.is_self_or_admin(patient_id) {
            warn!("User {} tried to edit patient {}", actor.id(), patient_id);
            return Err(PatientError::Unauthorized);
        }
        if request.is_empty() {
            return Err(PatientError::Validation("No profile fields to update".to_string()));
        }

        let mut tx = self.store.begin().await?;
        let mut patient = tx
            .find_patient(patient_id)
            .await?
            .filter(|patient| patient.active)
            .ok_or(PatientError::NotFound)?;

        for (field, value) in [
            (&mut patient.blood_type, request.blood_type),
            (&mut patient.medical_history, request.medical_history),
            (&mut patient.emergency_contact, request.emergency_contact),
        ] {
            if value.is_some() {
                *field = clean_optional(value);
            }
        }

        patient.audit.touch(actor.id(), self.clock.now());
        tx.apply(Mutation::UpdatePatient(patient.clone())).await?;
        tx.commit().await?;

        info!("Updated patient profile {}", patient_id);
        Ok(patient)
    }

    /// Soft-delete the patient and the backing user. Returns `false` when
    /// the patient was already inactive.
    #[instrument(skip(self))]
    pub async fn deactivate_patient(&self, patient_id: Uuid, actor: Actor) -> Result<bool, PatientError> {
        if !actor.is_admin() {
            return Err(PatientError::Unauthorized);
        }

        let mut tx = self.store.begin().await?;
        let mut patient = tx.find_patient(patient_id).await?.ok_or(PatientError::NotFound)?;
        if !patient.active {
            return Ok(false);
        }

        let now = self.clock.now();
        patient.active = false;
        patient.audit.touch(actor.id(), now);

        tx.apply(Mutation::UpdatePatient(patient)).await?;
        tx.apply(Mutation::SetUserActive {
            user_id: patient_id,
            active: false,
            updated_by: actor.id(),
            updated_at: now,
        })
        .await?;
        tx.commit().await?;

        info!("Deactivated patient {} and user account", patient_id);
        Ok(true)
    }
}

fn profile_conflict(err: DatabaseError) -> PatientError {
    match err {
        DatabaseError::UniqueViolation(_) => PatientError::ProfileExists,
        other => PatientError::Database(other),
    }
}
