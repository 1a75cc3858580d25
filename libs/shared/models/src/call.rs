use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::audit::Audit;

pub fn new_call_id() -> String {
    format!("CALL_{}", Uuid::new_v4())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallType {
    Video,
    Audio,
}

impl CallType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallType::Video => "video",
            CallType::Audio => "audio",
        }
    }
}

impl fmt::Display for CallType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CallType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "video" => Ok(CallType::Video),
            "audio" => Ok(CallType::Audio),
            other => Err(format!("invalid call type '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallStatus {
    Calling,
    Ringing,
    Active,
    Ended,
    Failed,
    Cancelled,
}

impl CallStatus {
    pub fn is_final(&self) -> bool {
        matches!(self, CallStatus::Ended | CallStatus::Failed | CallStatus::Cancelled)
    }

    /// Forward-only call state machine.
    ///
    /// ```text
    /// calling -> ringing | active | failed | cancelled
    /// ringing -> active | failed | cancelled
    /// active  -> ended | failed | cancelled
    /// ```
    pub fn can_transition_to(&self, next: CallStatus) -> bool {
        use CallStatus::*;
        match (self, next) {
            (Calling, Ringing | Active | Failed | Cancelled) => true,
            (Ringing, Active | Failed | Cancelled) => true,
            (Active, Ended | Failed | Cancelled) => true,
            _ => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CallStatus::Calling => "calling",
            CallStatus::Ringing => "ringing",
            CallStatus::Active => "active",
            CallStatus::Ended => "ended",
            CallStatus::Failed => "failed",
            CallStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for CallStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CallStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "calling" => Ok(CallStatus::Calling),
            "ringing" => Ok(CallStatus::Ringing),
            "active" => Ok(CallStatus::Active),
            "ended" => Ok(CallStatus::Ended),
            "failed" => Ok(CallStatus::Failed),
            "cancelled" => Ok(CallStatus::Cancelled),
            other => Err(format!("invalid call status '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallRecord {
    pub call_id: String,
    pub session_id: String,
    pub caller_id: Uuid,
    pub callee_id: Uuid,
    pub call_type: CallType,
    pub status: CallStatus,
    pub rtc_token: String,
    pub active: bool,
    #[serde(flatten)]
    pub audit: Audit,
}

impl CallRecord {
    pub fn is_participant(&self, user_id: Uuid) -> bool {
        self.caller_id == user_id || self.callee_id == user_id
    }

    pub fn other_party(&self, user_id: Uuid) -> Option<Uuid> {
        if user_id == self.caller_id {
            Some(self.callee_id)
        } else if user_id == self.callee_id {
            Some(self.caller_id)
        } else {
            None
        }
    }
}
