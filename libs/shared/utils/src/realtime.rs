use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, warn};
use uuid::Uuid;

use shared_models::realtime::RealtimeEvent;

pub type RealtimeSender = broadcast::Sender<String>;
pub type RealtimeReceiver = broadcast::Receiver<String>;

const USER_CHANNEL_CAPACITY: usize = 100;

#[derive(Error, Debug)]
pub enum RealtimeError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Delivery failed: {0}")]
    Delivery(String),
}

/// Push-style delivery of events to one user.
#[async_trait]
pub trait RealtimeDelivery: Send + Sync {
    /// Returns how many live connections received the event; zero when the user is offline.
    async fn send_to_user(&self, user_id: Uuid, event: &RealtimeEvent) -> Result<usize, RealtimeError>;
}

/// Fan-out of realtime events over per-user broadcast channels.
///
/// Each connected socket holds a receiver; a user with several tabs open gets
/// every event on each of them.
pub struct BroadcastHub {
    channels: Arc<RwLock<HashMap<Uuid, RealtimeSender>>>,
}

impl BroadcastHub {
    pub fn new() -> Self {
        Self {
            channels: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn subscribe(&self, user_id: Uuid) -> RealtimeReceiver {
        let mut channels = self.channels.write().await;
        let sender = channels
            .entry(user_id)
            .or_insert_with(|| broadcast::channel(USER_CHANNEL_CAPACITY).0);

        debug!("New realtime subscriber for user {}", user_id);
        sender.subscribe()
    }

    /// Subscribe for a socket connection. The channel is released when the
    /// returned subscription is dropped, whether or not the socket ever opened.
    pub async fn connect(&self, user_id: Uuid) -> RealtimeSubscription {
        RealtimeSubscription {
            hub: self.clone(),
            user_id,
            receiver: Some(self.subscribe(user_id).await),
        }
    }

    /// Drop the user's channel once the last receiver is gone.
    pub async fn release(&self, user_id: Uuid) {
        let mut channels = self.channels.write().await;
        if channels
            .get(&user_id)
            .is_some_and(|sender| sender.receiver_count() == 0)
        {
            channels.remove(&user_id);
            debug!("Removed realtime channel for user {}", user_id);
        }
    }

    pub async fn connected_users(&self) -> Vec<Uuid> {
        let channels = self.channels.read().await;
        channels
            .iter()
            .filter(|(_, sender)| sender.receiver_count() > 0)
            .map(|(user_id, _)| *user_id)
            .collect()
    }
}

/// One connection's receiver, tied to the hub channel it came from.
pub struct RealtimeSubscription {
    hub: BroadcastHub,
    user_id: Uuid,
    receiver: Option<RealtimeReceiver>,
}

impl RealtimeSubscription {
    pub fn user_id(&self) -> Uuid {
        self.user_id
    }

    pub async fn recv(&mut self) -> Result<String, RecvError> {
        match self.receiver.as_mut() {
            Some(receiver) => receiver.recv().await,
            None => Err(RecvError::Closed),
        }
    }
}

impl Drop for RealtimeSubscription {
    fn drop(&mut self) {
        // The receiver has to go first or release sees it as still connected.
        drop(self.receiver.take());

        let hub = self.hub.clone();
        let user_id = self.user_id;
        match Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move { hub.release(user_id).await });
            }
            Err(_) => warn!("No runtime to release realtime channel of user {}", user_id),
        }
    }
}

#[async_trait]
impl RealtimeDelivery for BroadcastHub {
    async fn send_to_user(&self, user_id: Uuid, event: &RealtimeEvent) -> Result<usize, RealtimeError> {
        let payload = serde_json::to_string(event)?;

        let channels = self.channels.read().await;
        let Some(sender) = channels.get(&user_id) else {
            debug!("User {} has no realtime connection, event dropped", user_id);
            return Ok(0);
        };

        match sender.send(payload) {
            Ok(receivers) => {
                debug!("Delivered realtime event to {} connection(s) of user {}", receivers, user_id);
                Ok(receivers)
            }
            Err(_) => {
                warn!("All realtime connections of user {} are gone", user_id);
                Ok(0)
            }
        }
    }
}

impl Clone for BroadcastHub {
    fn clone(&self) -> Self {
        Self {
            channels: self.channels.clone(),
        }
    }
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new()
    }
}
