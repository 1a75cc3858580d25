use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::audit::Audit;

/// Patient profiles share the id of the user they extend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientRecord {
    pub id: Uuid,
    pub blood_type: Option<String>,
    pub medical_history: Option<String>,
    pub emergency_contact: Option<String>,
    pub active: bool,
    #[serde(flatten)]
    pub audit: Audit,
}
