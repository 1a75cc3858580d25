use std::env;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistenceBackend {
    Memory,
    Supabase,
}

impl FromStr for PersistenceBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(PersistenceBackend::Memory),
            "supabase" | "postgrest" => Ok(PersistenceBackend::Supabase),
            other => Err(format!("unknown persistence backend '{}'", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_service_role_key: String,
    pub supabase_jwt_secret: String,
    pub persistence_backend: PersistenceBackend,
    pub persistence_timeout_ms: u64,
    pub seed_path: Option<String>,
    pub clinic_utc_offset_minutes: i32,
    pub rtc_token_secret: String,
    pub rtc_token_ttl_seconds: i64,
    pub chat_history_default_limit: usize,
    pub chat_history_max_limit: usize,
    pub available_dates_horizon_days: u32,
    pub server_port: u16,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            supabase_url: String::new(),
            supabase_anon_key: String::new(),
            supabase_service_role_key: String::new(),
            supabase_jwt_secret: String::new(),
            persistence_backend: PersistenceBackend::Memory,
            persistence_timeout_ms: 5000,
            seed_path: None,
            clinic_utc_offset_minutes: 0,
            rtc_token_secret: String::new(),
            rtc_token_ttl_seconds: 3600,
            chat_history_default_limit: 20,
            chat_history_max_limit: 100,
            available_dates_horizon_days: 60,
            server_port: 3000,
        }
    }
}

fn string_var(name: &str) -> String {
    env::var(name).unwrap_or_else(|_| {
        warn!("{} not set, using empty value", name);
        String::new()
    })
}

fn parsed_var<T: FromStr>(name: &str, default: T) -> T {
    match env::var(name) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            warn!("{} has an invalid value '{}', using default", name, raw);
            default
        }),
        Err(_) => {
            warn!("{} not set, using default", name);
            default
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let config = Self {
            supabase_url: string_var("SUPABASE_URL"),
            supabase_anon_key: string_var("SUPABASE_ANON_PUBLIC_KEY"),
            supabase_service_role_key: string_var("SUPABASE_SERVICE_ROLE_KEY"),
            supabase_jwt_secret: string_var("SUPABASE_JWT_SECRET"),
            persistence_backend: parsed_var("PERSISTENCE_BACKEND", defaults.persistence_backend),
            persistence_timeout_ms: parsed_var("PERSISTENCE_TIMEOUT_MS", defaults.persistence_timeout_ms),
            seed_path: env::var("CLINIC_SEED_PATH").ok().filter(|p| !p.is_empty()),
            clinic_utc_offset_minutes: parsed_var(
                "CLINIC_UTC_OFFSET_MINUTES",
                defaults.clinic_utc_offset_minutes,
            ),
            rtc_token_secret: string_var("RTC_TOKEN_SECRET"),
            rtc_token_ttl_seconds: parsed_var("RTC_TOKEN_TTL_SECONDS", defaults.rtc_token_ttl_seconds),
            chat_history_default_limit: parsed_var(
                "CHAT_HISTORY_DEFAULT_LIMIT",
                defaults.chat_history_default_limit,
            ),
            chat_history_max_limit: parsed_var("CHAT_HISTORY_MAX_LIMIT", defaults.chat_history_max_limit),
            available_dates_horizon_days: parsed_var(
                "AVAILABLE_DATES_HORIZON_DAYS",
                defaults.available_dates_horizon_days,
            ),
            server_port: parsed_var("PORT", defaults.server_port),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        if !config.is_realtime_token_configured() {
            warn!("RTC_TOKEN_SECRET missing - call initiation will fail");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        let backend_ready = match self.persistence_backend {
            PersistenceBackend::Memory => true,
            PersistenceBackend::Supabase => {
                !self.supabase_url.is_empty() && !self.supabase_anon_key.is_empty()
            }
        };

        backend_ready && !self.supabase_jwt_secret.is_empty()
    }

    pub fn is_realtime_token_configured(&self) -> bool {
        !self.rtc_token_secret.is_empty() && self.rtc_token_ttl_seconds > 0
    }

    pub fn persistence_timeout(&self) -> Duration {
        Duration::from_millis(self.persistence_timeout_ms)
    }

    /// Key used for PostgREST calls; the service role key bypasses RLS when present.
    pub fn supabase_api_key(&self) -> &str {
        if self.supabase_service_role_key.is_empty() {
            &self.supabase_anon_key
        } else {
            &self.supabase_service_role_key
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_parses_case_insensitively() {
        assert_eq!("Memory".parse::<PersistenceBackend>(), Ok(PersistenceBackend::Memory));
        assert_eq!("SUPABASE".parse::<PersistenceBackend>(), Ok(PersistenceBackend::Supabase));
        assert!("mysql".parse::<PersistenceBackend>().is_err());
    }

    #[test]
    fn memory_backend_only_needs_jwt_secret() {
        let mut config = AppConfig::default();
        assert!(!config.is_configured());

        config.supabase_jwt_secret = "secret".to_string();
        assert!(config.is_configured());

        config.persistence_backend = PersistenceBackend::Supabase;
        assert!(!config.is_configured());
    }

    #[test]
    fn service_role_key_preferred_over_anon_key() {
        let mut config = AppConfig {
            supabase_anon_key: "anon".to_string(),
            ..AppConfig::default()
        };
        assert_eq!(config.supabase_api_key(), "anon");

        config.supabase_service_role_key = "service".to_string();
        assert_eq!(config.supabase_api_key(), "service");
    }
}
