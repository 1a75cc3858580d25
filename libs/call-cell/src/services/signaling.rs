use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use shared_database::{CallFilter, ClinicStore, ClinicTx, Mutation};
use shared_models::auth::Actor;
use shared_models::call::{new_call_id, CallRecord, CallStatus, CallType};
use shared_models::realtime::{RealtimeEvent, SignalKind};
use shared_models::Audit;
use shared_utils::clock::Clock;
use shared_utils::realtime::RealtimeDelivery;
use shared_utils::rtc_token::CallTokenIssuer;
use shared_utils::AppState;

use crate::models::CallError;

pub struct CallSignalingService {
    store: Arc<dyn ClinicStore>,
    clock: Arc<dyn Clock>,
    realtime: Arc<dyn RealtimeDelivery>,
    tokens: Arc<dyn CallTokenIssuer>,
}

impl CallSignalingService {
    pub fn new(state: &AppState) -> Self {
        Self {
            store: state.store.clone(),
            clock: state.clock.clone(),
            realtime: state.realtime.clone(),
            tokens: state.tokens.clone(),
        }
    }

    /// Ring the callee inside an active chat session.
    #[instrument(skip(self))]
    pub async fn initiate_call(
        &self,
        session_id: &str,
        callee_id: Uuid,
        call_type: CallType,
        actor: Actor,
    ) -> Result<CallRecord, CallError> {
        let caller_id = actor.id();
        if caller_id == callee_id {
            return Err(CallError::Validation("You cannot call yourself".to_string()));
        }

        let mut tx = self.store.begin().await?;
        ensure_active_user(tx.as_mut(), caller_id).await?;
        ensure_active_user(tx.as_mut(), callee_id).await?;

        let session = tx
            .find_chat_session(session_id)
            .await?
            .filter(|session| session.active)
            .ok_or(CallError::SessionNotFound)?;

        if !session.is_participant(caller_id) {
            return Err(CallError::Unauthorized(
                "Only chat participants can start a call".to_string(),
            ));
        }
        if session.other_party(caller_id) != Some(callee_id) {
            return Err(CallError::Validation(
                "The callee does not take part in this chat".to_string(),
            ));
        }

        let now = self.clock.now();
        let call_id = new_call_id();
        let rtc_token = self.tokens.issue(&call_id, callee_id, now).await?;

        let call = CallRecord {
            call_id,
            session_id: session.session_id.clone(),
            caller_id,
            callee_id,
            call_type,
            status: CallStatus::Calling,
            rtc_token,
            active: true,
            audit: Audit::created(caller_id, now),
        };

        tx.apply(Mutation::InsertCall(call.clone())).await?;
        tx.commit().await?;

        info!("Call {} initiated by {} to {}", call.call_id, caller_id, callee_id);

        let event = RealtimeEvent::IncomingCall {
            call_id: call.call_id.clone(),
            session_id: call.session_id.clone(),
            caller_id,
            call_type,
            rtc_token: call.rtc_token.clone(),
        };
        self.deliver(callee_id, &event).await;

        Ok(call)
    }

    /// Move the call forward. `false` when the call is missing or inactive.
    #[instrument(skip(self))]
    pub async fn update_status(
        &self,
        call_id: &str,
        status: CallStatus,
        actor: Actor,
    ) -> Result<bool, CallError> {
        let mut tx = self.store.begin().await?;
        let Some(mut call) = tx.find_call(call_id).await?.filter(|call| call.active) else {
            debug!("Call {} not found or inactive", call_id);
            return Ok(false);
        };

        if !call.is_participant(actor.id()) {
            return Err(CallError::Unauthorized(
                "Only call participants can change its status".to_string(),
            ));
        }
        if !call.status.can_transition_to(status) {
            return Err(CallError::Validation(format!(
                "cannot move a {} call to {}",
                call.status, status
            )));
        }

        let previous = call.status;
        call.status = status;
        call.audit.touch(actor.id(), self.clock.now());
        tx.apply(Mutation::UpdateCall(call.clone())).await?;
        tx.commit().await?;

        info!("Call {} moved from {} to {}", call_id, previous, status);

        let event = RealtimeEvent::CallStatusChanged {
            call_id: call.call_id.clone(),
            status,
            changed_by: actor.id(),
        };
        for party in [call.caller_id, call.callee_id] {
            self.deliver(party, &event).await;
        }

        Ok(true)
    }

    #[instrument(skip(self))]
    pub async fn get_call(&self, call_id: &str, actor: Actor) -> Result<CallRecord, CallError> {
        let mut tx = self.store.begin_read().await?;
        let call = tx
            .find_call(call_id)
            .await?
            .filter(|call| call.active)
            .ok_or(CallError::CallNotFound)?;

        if !call.is_participant(actor.id()) {
            return Err(CallError::Unauthorized(
                "Only call participants can view this call".to_string(),
            ));
        }
        Ok(call)
    }

    /// The caller's calls, newest first, optionally narrowed by type and status.
    #[instrument(skip(self))]
    pub async fn list_user_calls(&self, actor: Actor, filter: CallFilter) -> Result<Vec<CallRecord>, CallError> {
        let mut tx = self.store.begin_read().await?;
        let calls = tx.list_calls_for(actor.id(), filter).await?;
        debug!("User {} has {} calls", actor.id(), calls.len());
        Ok(calls)
    }

    /// Soft-delete a call record. Participants and admins only; `false` when
    /// the call is missing or already removed.
    #[instrument(skip(self))]
    pub async fn deactivate_call(&self, call_id: &str, actor: Actor) -> Result<bool, CallError> {
        let mut tx = self.store.begin().await?;
        let Some(mut call) = tx.find_call(call_id).await?.filter(|call| call.active) else {
            debug!("Call {} not found or already removed", call_id);
            return Ok(false);
        };

        if !actor.is_admin() && !call.is_participant(actor.id()) {
            return Err(CallError::Unauthorized(
                "Only call participants can remove this call".to_string(),
            ));
        }

        call.active = false;
        call.audit.touch(actor.id(), self.clock.now());
        tx.apply(Mutation::UpdateCall(call)).await?;
        tx.commit().await?;

        info!("Call {} removed by {}", call_id, actor.id());
        Ok(true)
    }

    /// Forward an offer, answer or ICE candidate to the other participant.
    /// Returns how many of their connections received it.
    #[instrument(skip(self, payload))]
    pub async fn relay_signal(
        &self,
        call_id: &str,
        kind: SignalKind,
        payload: Value,
        actor: Actor,
    ) -> Result<usize, CallError> {
        let call = self.get_call(call_id, actor).await?;
        if call.status.is_final() {
            return Err(CallError::Validation(format!(
                "cannot signal on a {} call",
                call.status
            )));
        }

        let Some(recipient) = call.other_party(actor.id()) else {
            return Err(CallError::Unauthorized(
                "Only call participants can signal".to_string(),
            ));
        };

        let event = RealtimeEvent::CallSignal {
            call_id: call.call_id,
            from: actor.id(),
            kind,
            payload,
        };
        Ok(self.deliver(recipient, &event).await)
    }

    async fn deliver(&self, user_id: Uuid, event: &RealtimeEvent) -> usize {
        match self.realtime.send_to_user(user_id, event).await {
            Ok(delivered) => delivered,
            Err(e) => {
                warn!("Failed to deliver call event to {}: {}", user_id, e);
                0
            }
        }
    }
}

async fn ensure_active_user(tx: &mut dyn ClinicTx, user_id: Uuid) -> Result<(), CallError> {
    tx.find_user(user_id)
        .await?
        .filter(|user| user.active)
        .map(|_| ())
        .ok_or(CallError::UserNotFound)
}
