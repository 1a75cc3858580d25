use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use shared_database::{CallFilter, DatabaseError};
use shared_models::call::{CallStatus, CallType};
use shared_models::error::AppError;
use shared_models::realtime::SignalKind;
use shared_utils::rtc_token::TokenError;

#[derive(Debug, Clone, Deserialize)]
pub struct InitiateCallRequest {
    pub session_id: String,
    pub callee_id: Uuid,
    #[serde(default = "default_call_type")]
    pub call_type: CallType,
}

fn default_call_type() -> CallType {
    CallType::Video
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateCallStatusRequest {
    pub status: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RelaySignalRequest {
    pub kind: SignalKind,
    #[serde(default)]
    pub payload: Value,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallListQuery {
    #[serde(rename = "type", alias = "call_type")]
    pub call_type: Option<String>,
    pub status: Option<String>,
}

#[derive(Error, Debug)]
pub enum CallError {
    #[error("Call not found")]
    CallNotFound,

    #[error("Caller or callee not found or inactive")]
    UserNotFound,

    #[error("Chat session not found or no longer active")]
    SessionNotFound,

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Validation(String),

    #[error("Call token unavailable: {0}")]
    Token(#[from] TokenError),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

impl From<CallError> for AppError {
    fn from(err: CallError) -> Self {
        match err {
            CallError::CallNotFound | CallError::UserNotFound | CallError::SessionNotFound => {
                AppError::NotFound(err.to_string())
            }
            CallError::Unauthorized(msg) => AppError::Forbidden(msg),
            CallError::Validation(msg) => AppError::ValidationError(msg),
            CallError::Token(e) => AppError::ExternalService(e.to_string()),
            CallError::Database(e) => e.into(),
        }
    }
}

pub fn parse_call_type(raw: &str) -> Result<CallType, CallError> {
    raw.trim()
        .to_ascii_lowercase()
        .parse::<CallType>()
        .map_err(CallError::Validation)
}

impl CallListQuery {
    pub fn to_filter(&self) -> Result<CallFilter, CallError> {
        Ok(CallFilter {
            call_type: self.call_type.as_deref().map(parse_call_type).transpose()?,
            status: self.status.as_deref().map(parse_call_status).transpose()?,
        })
    }
}

pub fn parse_call_status(raw: &str) -> Result<CallStatus, CallError> {
    raw.trim()
        .to_ascii_lowercase()
        .parse::<CallStatus>()
        .map_err(CallError::Validation)
}
