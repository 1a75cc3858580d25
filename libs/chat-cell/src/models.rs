use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use shared_database::DatabaseError;
use shared_models::chat::ChatSessionRecord;
use shared_models::error::AppError;

pub const MAX_MESSAGE_CHARS: usize = 4000;

#[derive(Debug, Clone, Deserialize)]
pub struct StartSessionRequest {
    pub doctor_id: Uuid,
    pub patient_id: Uuid,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SendMessageRequest {
    #[serde(alias = "message")]
    pub body: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HistoryQuery {
    pub before: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SessionListQuery {
    /// `true` for open sessions only, `false` for closed ones.
    pub active: Option<bool>,
}

/// A session lookup-or-create result.
#[derive(Debug, Clone, Serialize)]
pub struct StartedSession {
    pub session: ChatSessionRecord,
    pub is_new: bool,
}

#[derive(Error, Debug)]
pub enum ChatError {
    #[error("Chat session not found or no longer active")]
    SessionNotFound,

    #[error("Message not found")]
    MessageNotFound,

    #[error("Doctor or patient not found or inactive")]
    ParticipantNotFound,

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

impl From<ChatError> for AppError {
    fn from(err: ChatError) -> Self {
        match err {
            ChatError::SessionNotFound | ChatError::MessageNotFound | ChatError::ParticipantNotFound => {
                AppError::NotFound(err.to_string())
            }
            ChatError::Unauthorized(msg) => AppError::Forbidden(msg),
            ChatError::Validation(msg) => AppError::ValidationError(msg),
            ChatError::Database(e) => e.into(),
        }
    }
}

/// Trim the message body and enforce the length bounds.
pub fn normalize_body(raw: &str) -> Result<String, ChatError> {
    let body = raw.trim();
    if body.is_empty() {
        return Err(ChatError::Validation("Message cannot be empty".to_string()));
    }
    if body.chars().count() > MAX_MESSAGE_CHARS {
        return Err(ChatError::Validation(format!(
            "Message cannot exceed {} characters",
            MAX_MESSAGE_CHARS
        )));
    }
    Ok(body.to_string())
}
