use std::sync::Arc;

use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use shared_database::{ClinicStore, DatabaseError, Mutation};
use shared_models::auth::Actor;
use shared_models::chat::{new_session_id, ChatSessionRecord};
use shared_models::Audit;
use shared_utils::clock::Clock;
use shared_utils::AppState;

use crate::models::{ChatError, StartedSession};

pub struct ChatSessionService {
    store: Arc<dyn ClinicStore>,
    clock: Arc<dyn Clock>,
}

impl ChatSessionService {
    pub fn new(state: &AppState) -> Self {
        Self {
            store: state.store.clone(),
            clock: state.clock.clone(),
        }
    }

    /// Return the active session for the pair, opening one if there is none.
    #[instrument(skip(self))]
    pub async fn start_session(
        &self,
        doctor_id: Uuid,
        patient_id: Uuid,
        actor: Actor,
    ) -> Result<StartedSession, ChatError> {
        if !actor.is_admin() && actor.id() != doctor_id && actor.id() != patient_id {
            return Err(ChatError::Unauthorized(
                "You can only open chats you take part in".to_string(),
            ));
        }

        let mut tx = self.store.begin().await?;

        tx.find_doctor(doctor_id)
            .await?
            .filter(|doctor| doctor.active)
            .ok_or(ChatError::ParticipantNotFound)?;
        tx.find_patient(patient_id)
            .await?
            .filter(|patient| patient.active)
            .ok_or(ChatError::ParticipantNotFound)?;

        if let Some(session) = tx.find_active_chat_session(doctor_id, patient_id).await? {
            debug!("Reusing chat session {}", session.session_id);
            return Ok(StartedSession { session, is_new: false });
        }

        let now = self.clock.now();
        let session = ChatSessionRecord {
            session_id: new_session_id(),
            doctor_id,
            patient_id,
            active: true,
            archived: false,
            started_at: now,
            ended_at: None,
            audit: Audit::created(actor.id(), now),
        };

        let inserted = match tx.apply(Mutation::InsertChatSession(session.clone())).await {
            Ok(()) => tx.commit().await,
            Err(e) => {
                // Release the store before re-reading below.
                drop(tx);
                Err(e)
            }
        };

        match inserted {
            Ok(()) => {
                info!("Started chat session {} for doctor {} and patient {}", session.session_id, doctor_id, patient_id);
                Ok(StartedSession { session, is_new: true })
            }
            Err(DatabaseError::UniqueViolation(_)) => {
                warn!("Lost chat session race for doctor {} and patient {}", doctor_id, patient_id);
                let mut tx = self.store.begin_read().await?;
                let session = tx
                    .find_active_chat_session(doctor_id, patient_id)
                    .await?
                    .ok_or(ChatError::SessionNotFound)?;
                Ok(StartedSession { session, is_new: false })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Close the session. `false` when it was already closed.
    #[instrument(skip(self))]
    pub async fn end_session(&self, session_id: &str, actor: Actor) -> Result<bool, ChatError> {
        let mut tx = self.store.begin().await?;
        let mut session = tx
            .find_chat_session(session_id)
            .await?
            .ok_or(ChatError::SessionNotFound)?;

        if !actor.is_admin() && !session.is_participant(actor.id()) {
            return Err(ChatError::Unauthorized(
                "Only participants can end this chat".to_string(),
            ));
        }
        if !session.active {
            debug!("Chat session {} already ended", session_id);
            return Ok(false);
        }

        let now = self.clock.now();
        session.active = false;
        session.ended_at = Some(now);
        session.audit.touch(actor.id(), now);
        tx.apply(Mutation::UpdateChatSession(session)).await?;
        tx.commit().await?;

        info!("Ended chat session {}", session_id);
        Ok(true)
    }

    /// Sessions the caller takes part in, newest first. `active` narrows to
    /// open or closed sessions. Archived sessions are never listed.
    #[instrument(skip(self))]
    pub async fn list_user_sessions(
        &self,
        actor: Actor,
        active: Option<bool>,
    ) -> Result<Vec<ChatSessionRecord>, ChatError> {
        let mut tx = self.store.begin_read().await?;
        let sessions = tx.list_chat_sessions_for(actor.id(), active).await?;
        debug!("User {} has {} chat sessions", actor.id(), sessions.len());
        Ok(sessions)
    }

    /// Admin soft-delete: closes the session if it is open and hides it.
    /// `false` when it is missing or already archived.
    #[instrument(skip(self))]
    pub async fn deactivate_session(&self, session_id: &str, actor: Actor) -> Result<bool, ChatError> {
        if !actor.is_admin() {
            return Err(ChatError::Unauthorized(
                "Only admins can delete chat sessions".to_string(),
            ));
        }

        let mut tx = self.store.begin().await?;
        let Some(mut session) = tx
            .find_chat_session(session_id)
            .await?
            .filter(|session| !session.archived)
        else {
            return Ok(false);
        };

        let now = self.clock.now();
        if session.active {
            session.active = false;
            session.ended_at = Some(now);
        }
        session.archived = true;
        session.audit.touch(actor.id(), now);
        tx.apply(Mutation::UpdateChatSession(session)).await?;
        tx.commit().await?;

        info!("Archived chat session {}", session_id);
        Ok(true)
    }
}
