use std::sync::Arc;

use shared_config::AppConfig;
use shared_database::ClinicStore;

use crate::clock::Clock;
use crate::realtime::RealtimeDelivery;
use crate::rtc_token::CallTokenIssuer;

/// Process-wide collaborators, built once at startup and shared by every router.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn ClinicStore>,
    pub realtime: Arc<dyn RealtimeDelivery>,
    pub tokens: Arc<dyn CallTokenIssuer>,
    pub clock: Arc<dyn Clock>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        store: Arc<dyn ClinicStore>,
        realtime: Arc<dyn RealtimeDelivery>,
        tokens: Arc<dyn CallTokenIssuer>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            store,
            realtime,
            tokens,
            clock,
        }
    }
}
