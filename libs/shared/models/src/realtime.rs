use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::call::{CallStatus, CallType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    Offer,
    Answer,
    IceCandidate,
}

/// Events pushed to a single user over the realtime channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RealtimeEvent {
    IncomingCall {
        call_id: String,
        session_id: String,
        caller_id: Uuid,
        call_type: CallType,
        rtc_token: String,
    },
    CallStatusChanged {
        call_id: String,
        status: CallStatus,
        changed_by: Uuid,
    },
    NewMessage {
        session_id: String,
        message_id: String,
        sender_id: Uuid,
    },
    CallSignal {
        call_id: String,
        from: Uuid,
        kind: SignalKind,
        payload: Value,
    },
}
