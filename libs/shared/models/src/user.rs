use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::audit::Audit;
use crate::auth::Role;

/// Mirror of an identity owned by the external auth service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: Uuid,
    pub email: String,
    pub full_name: String,
    pub role: Role,
    pub active: bool,
    #[serde(flatten)]
    pub audit: Audit,
}
