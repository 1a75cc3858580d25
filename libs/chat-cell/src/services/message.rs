use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, instrument, warn};

use shared_database::{ClinicStore, ClinicTx, Mutation};
use shared_models::auth::Actor;
use shared_models::chat::{new_message_id, ChatMessageRecord, ChatSessionRecord};
use shared_models::realtime::RealtimeEvent;
use shared_utils::clock::Clock;
use shared_utils::realtime::RealtimeDelivery;
use shared_utils::AppState;

use crate::models::{normalize_body, ChatError, HistoryQuery};

pub struct ChatMessageService {
    store: Arc<dyn ClinicStore>,
    clock: Arc<dyn Clock>,
    realtime: Arc<dyn RealtimeDelivery>,
    default_limit: usize,
    max_limit: usize,
}

/// Next timestamp for a session: never earlier than `now`, always after the latest message.
fn next_timestamp(now: DateTime<Utc>, latest: Option<&ChatMessageRecord>) -> DateTime<Utc> {
    match latest {
        Some(last) if last.timestamp >= now => last.timestamp + Duration::microseconds(1),
        _ => now,
    }
}

impl ChatMessageService {
    pub fn new(state: &AppState) -> Self {
        Self {
            store: state.store.clone(),
            clock: state.clock.clone(),
            realtime: state.realtime.clone(),
            default_limit: state.config.chat_history_default_limit,
            max_limit: state.config.chat_history_max_limit,
        }
    }

    #[instrument(skip(self, body))]
    pub async fn send_message(
        &self,
        session_id: &str,
        body: &str,
        actor: Actor,
    ) -> Result<ChatMessageRecord, ChatError> {
        let body = normalize_body(body)?;

        let mut tx = self.store.begin().await?;
        let session = tx
            .find_chat_session(session_id)
            .await?
            .filter(|session| session.active)
            .ok_or(ChatError::SessionNotFound)?;

        if !session.is_participant(actor.id()) {
            return Err(ChatError::Unauthorized(
                "Only participants can send messages in this chat".to_string(),
            ));
        }

        let latest = tx.latest_chat_message(session_id).await?;
        let message = ChatMessageRecord {
            message_id: new_message_id(),
            session_id: session.session_id.clone(),
            sender_id: actor.id(),
            body,
            timestamp: next_timestamp(self.clock.now(), latest.as_ref()),
            edited_at: None,
            active: true,
            version: 0,
        };

        tx.apply(Mutation::InsertChatMessage(message.clone())).await?;
        tx.commit().await?;

        debug!("Stored message {} in session {}", message.message_id, session_id);
        self.notify_recipient(&session, &message).await;

        Ok(message)
    }

    async fn notify_recipient(&self, session: &ChatSessionRecord, message: &ChatMessageRecord) {
        let Some(recipient) = session.other_party(message.sender_id) else {
            return;
        };

        let event = RealtimeEvent::NewMessage {
            session_id: session.session_id.clone(),
            message_id: message.message_id.clone(),
            sender_id: message.sender_id,
        };

        if let Err(e) = self.realtime.send_to_user(recipient, &event).await {
            warn!("Failed to deliver new message event to {}: {}", recipient, e);
        }
    }

    /// Most recent messages before the cursor, oldest first.
    #[instrument(skip(self))]
    pub async fn get_history(
        &self,
        session_id: &str,
        query: HistoryQuery,
        actor: Actor,
    ) -> Result<Vec<ChatMessageRecord>, ChatError> {
        let limit = query
            .limit
            .unwrap_or(self.default_limit)
            .clamp(1, self.max_limit.max(1));

        let mut tx = self.store.begin_read().await?;
        let session = tx
            .find_chat_session(session_id)
            .await?
            .filter(|session| !session.archived)
            .ok_or(ChatError::SessionNotFound)?;

        if !actor.is_admin() && !session.is_participant(actor.id()) {
            return Err(ChatError::Unauthorized(
                "Only participants can read this chat".to_string(),
            ));
        }

        let messages = tx.list_chat_messages(session_id, query.before, limit).await?;
        debug!("Returning {} messages for session {}", messages.len(), session_id);
        Ok(messages)
    }

    #[instrument(skip(self, body))]
    pub async fn edit_message(
        &self,
        message_id: &str,
        body: &str,
        actor: Actor,
    ) -> Result<ChatMessageRecord, ChatError> {
        let body = normalize_body(body)?;

        let mut tx = self.store.begin().await?;
        let mut message = load_mutable(tx.as_mut(), message_id).await?;

        if message.sender_id != actor.id() {
            return Err(ChatError::Unauthorized(
                "Only the sender can edit this message".to_string(),
            ));
        }

        message.revise(body, self.clock.now());
        tx.apply(Mutation::UpdateChatMessage(message.clone())).await?;
        tx.commit().await?;

        info!("Edited message {}", message_id);
        Ok(message)
    }

    #[instrument(skip(self))]
    pub async fn delete_message(&self, message_id: &str, actor: Actor) -> Result<(), ChatError> {
        let mut tx = self.store.begin().await?;
        let mut message = load_mutable(tx.as_mut(), message_id).await?;

        if !actor.is_self_or_admin(message.sender_id) {
            return Err(ChatError::Unauthorized(
                "Only the sender can delete this message".to_string(),
            ));
        }

        message.retract();
        tx.apply(Mutation::UpdateChatMessage(message)).await?;
        tx.commit().await?;

        info!("Deleted message {}", message_id);
        Ok(())
    }
}

/// An active message whose session is still open.
async fn load_mutable(tx: &mut dyn ClinicTx, message_id: &str) -> Result<ChatMessageRecord, ChatError> {
    let message = tx
        .find_chat_message(message_id)
        .await?
        .filter(|message| message.active)
        .ok_or(ChatError::MessageNotFound)?;

    let session_open = tx
        .find_chat_session(&message.session_id)
        .await?
        .is_some_and(|session| session.active);
    if !session_open {
        return Err(ChatError::Validation(
            "Messages cannot be changed after the chat has ended".to_string(),
        ));
    }

    Ok(message)
}
