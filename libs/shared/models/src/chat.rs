use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::audit::Audit;

pub fn new_session_id() -> String {
    format!("CHAT_{}", Uuid::new_v4())
}

pub fn new_message_id() -> String {
    format!("MSG-{}", Uuid::new_v4())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatSessionRecord {
    pub session_id: String,
    pub doctor_id: Uuid,
    pub patient_id: Uuid,
    /// Open for messages. At most one open session per doctor/patient pair.
    pub active: bool,
    /// Soft-deleted by an admin: closed and hidden from every listing.
    #[serde(default)]
    pub archived: bool,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub audit: Audit,
}

impl ChatSessionRecord {
    pub fn is_participant(&self, user_id: Uuid) -> bool {
        self.doctor_id == user_id || self.patient_id == user_id
    }

    pub fn other_party(&self, user_id: Uuid) -> Option<Uuid> {
        if user_id == self.doctor_id {
            Some(self.patient_id)
        } else if user_id == self.patient_id {
            Some(self.doctor_id)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessageRecord {
    pub message_id: String,
    pub session_id: String,
    pub sender_id: Uuid,
    pub body: String,
    pub timestamp: DateTime<Utc>,
    pub edited_at: Option<DateTime<Utc>>,
    pub active: bool,
    #[serde(default)]
    pub version: i64,
}

impl ChatMessageRecord {
    /// Replace the body, stamping the edit.
    pub fn revise(&mut self, body: String, at: DateTime<Utc>) {
        self.body = body;
        self.edited_at = Some(at);
        self.version += 1;
    }

    pub fn retract(&mut self) {
        self.active = false;
        self.version += 1;
    }
}
