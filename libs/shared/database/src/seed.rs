use std::path::Path;

use serde::Deserialize;
use tracing::info;

use shared_models::doctor::{normalize_dates, DoctorRecord};
use shared_models::patient::PatientRecord;
use shared_models::user::UserRecord;

use crate::error::DatabaseError;

/// Initial identities and profiles for the memory store.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SeedData {
    #[serde(default)]
    pub users: Vec<UserRecord>,
    #[serde(default)]
    pub doctors: Vec<DoctorRecord>,
    #[serde(default)]
    pub patients: Vec<PatientRecord>,
}

impl SeedData {
    /// Every profile must extend a seeded user.
    pub fn validate(&self) -> Result<(), DatabaseError> {
        let known = |id| self.users.iter().any(|user| user.id == id);

        if let Some(doctor) = self.doctors.iter().find(|d| !known(d.id)) {
            return Err(DatabaseError::Query(format!("seed doctor {} has no user", doctor.id)));
        }
        if let Some(patient) = self.patients.iter().find(|p| !known(p.id)) {
            return Err(DatabaseError::Query(format!("seed patient {} has no user", patient.id)));
        }
        Ok(())
    }
}

pub fn load_seed(path: impl AsRef<Path>) -> Result<SeedData, DatabaseError> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path)
        .map_err(|e| DatabaseError::Unavailable(format!("cannot read seed {}: {}", path.display(), e)))?;

    let mut seed: SeedData = serde_json::from_str(&raw)?;
    for doctor in &mut seed.doctors {
        normalize_dates(&mut doctor.available_dates);
    }
    seed.validate()?;

    info!(
        "Loaded seed from {} ({} users, {} doctors, {} patients)",
        path.display(),
        seed.users.len(),
        seed.doctors.len(),
        seed.patients.len()
    );
    Ok(seed)
}
