use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Created/updated-by bookkeeping carried by every persisted row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Audit {
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_by: Option<Uuid>,
    pub updated_at: Option<DateTime<Utc>>,
    /// Row version. Stores only accept an update whose version is exactly one
    /// past the stored one.
    #[serde(default)]
    pub version: i64,
}

impl Audit {
    pub fn created(by: Uuid, at: DateTime<Utc>) -> Self {
        Self {
            created_by: by,
            created_at: at,
            updated_by: None,
            updated_at: None,
            version: 0,
        }
    }

    /// Record a change. Call once per row per unit of work.
    pub fn touch(&mut self, by: Uuid, at: DateTime<Utc>) {
        self.updated_by = Some(by);
        self.updated_at = Some(at);
        self.version += 1;
    }
}
