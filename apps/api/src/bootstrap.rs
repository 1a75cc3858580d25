use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};

use shared_config::{AppConfig, PersistenceBackend};
use shared_database::{load_seed, ClinicStore, MemoryStore, SupabaseStore};
use shared_utils::clock::SystemClock;
use shared_utils::realtime::BroadcastHub;
use shared_utils::rtc_token::HmacCallTokenIssuer;
use shared_utils::AppState;

/// Pick the persistence adapter named by the configuration.
pub fn build_store(config: &AppConfig) -> anyhow::Result<Arc<dyn ClinicStore>> {
    match config.persistence_backend {
        PersistenceBackend::Memory => {
            let store = match &config.seed_path {
                Some(path) => {
                    let seed = load_seed(path)
                        .with_context(|| format!("failed to load seed data from {}", path))?;
                    info!(
                        "Memory store seeded with {} users, {} doctors, {} patients",
                        seed.users.len(),
                        seed.doctors.len(),
                        seed.patients.len()
                    );
                    MemoryStore::from_seed(seed, config.persistence_timeout())
                }
                None => {
                    warn!("CLINIC_SEED_PATH not set, starting with an empty memory store");
                    MemoryStore::new(config.persistence_timeout())
                }
            };
            Ok(Arc::new(store))
        }
        PersistenceBackend::Supabase => {
            let store = SupabaseStore::new(config).context("failed to build Supabase store")?;
            info!("Using Supabase store at {}", config.supabase_url);
            Ok(Arc::new(store))
        }
    }
}

/// Wire every collaborator. The hub is returned separately because the
/// WebSocket endpoint subscribes to it directly.
pub fn build_state(config: AppConfig) -> anyhow::Result<(Arc<AppState>, BroadcastHub)> {
    let store = build_store(&config)?;
    let hub = BroadcastHub::new();
    let tokens = HmacCallTokenIssuer::from_config(&config);
    let clock = SystemClock::new(config.clinic_utc_offset_minutes);

    let state = AppState::new(
        config,
        store,
        Arc::new(hub.clone()),
        Arc::new(tokens),
        Arc::new(clock),
    );

    Ok((Arc::new(state), hub))
}
