use std::sync::Arc;
use std::time::Duration as StdDuration;

use base64::{engine::general_purpose, Engine as _};
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use hmac::{Hmac, Mac};
use serde_json::json;
use sha2::Sha256;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::{ClinicStore, MemoryStore, Mutation, SeedData, SupabaseStore};
use shared_models::appointment::{AppointmentRecord, AppointmentStatus};
use shared_models::auth::{Actor, Role, User};
use shared_models::doctor::{DoctorProfile, DoctorRecord};
use shared_models::patient::PatientRecord;
use shared_models::user::UserRecord;
use shared_models::{Audit, SlotTime};

use crate::clock::FixedClock;
use crate::realtime::BroadcastHub;
use crate::rtc_token::HmacCallTokenIssuer;
use crate::state::AppState;

pub struct TestConfig {
    pub jwt_secret: String,
    pub rtc_token_secret: String,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "test-secret-key-for-jwt-validation-must-be-long-enough".to_string(),
            rtc_token_secret: "test-rtc-secret".to_string(),
        }
    }
}

impl TestConfig {
    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            supabase_jwt_secret: self.jwt_secret.clone(),
            rtc_token_secret: self.rtc_token_secret.clone(),
            persistence_timeout_ms: 1000,
            ..AppConfig::default()
        }
    }
}

#[derive(Debug, Clone)]
pub struct TestUser {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
}

impl TestUser {
    pub fn new(email: &str, role: Role) -> Self {
        Self {
            id: Uuid::new_v4(),
            email: email.to_string(),
            role,
        }
    }

    pub fn doctor(email: &str) -> Self {
        Self::new(email, Role::Doctor)
    }

    pub fn patient(email: &str) -> Self {
        Self::new(email, Role::Patient)
    }

    pub fn admin(email: &str) -> Self {
        Self::new(email, Role::Admin)
    }

    pub fn to_user(&self) -> User {
        User {
            id: self.id.to_string(),
            email: Some(self.email.clone()),
            role: Some(self.role.to_string()),
            metadata: None,
            created_at: Some(Utc::now()),
        }
    }

    pub fn actor(&self) -> Actor {
        match self.role {
            Role::Admin => Actor::Admin(self.id),
            Role::Doctor => Actor::Doctor(self.id),
            Role::Patient => Actor::Patient(self.id),
        }
    }

    pub fn record(&self) -> UserRecord {
        UserRecord {
            id: self.id,
            email: self.email.clone(),
            full_name: self.email.split('@').next().unwrap_or_default().to_string(),
            role: self.role,
            active: true,
            audit: seed_audit(),
        }
    }
}

pub struct JwtTestUtils;

impl JwtTestUtils {
    pub fn create_test_token(user: &TestUser, secret: &str, exp_hours: Option<i64>) -> String {
        let now = Utc::now();
        let exp = now + Duration::hours(exp_hours.unwrap_or(24));

        let header = json!({
            "alg": "HS256",
            "typ": "JWT"
        });

        let payload = json!({
            "sub": user.id,
            "email": user.email,
            "role": user.role,
            "iat": now.timestamp(),
            "exp": exp.timestamp()
        });

        let header_encoded = general_purpose::URL_SAFE_NO_PAD.encode(header.to_string());
        let payload_encoded = general_purpose::URL_SAFE_NO_PAD.encode(payload.to_string());

        let signing_input = format!("{}.{}", header_encoded, payload_encoded);

        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(signing_input.as_bytes());
        let signature = mac.finalize().into_bytes();
        let signature_encoded = general_purpose::URL_SAFE_NO_PAD.encode(signature);

        format!("{}.{}", signing_input, signature_encoded)
    }

    pub fn create_expired_token(user: &TestUser, secret: &str) -> String {
        Self::create_test_token(user, secret, Some(-1))
    }

    pub fn create_invalid_signature_token(user: &TestUser) -> String {
        Self::create_test_token(user, "wrong-secret", Some(24))
    }

    pub fn create_malformed_token() -> String {
        "invalid.token.format".to_string()
    }
}

fn seed_audit() -> Audit {
    Audit::created(Uuid::nil(), Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap())
}

pub fn ymd(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid test date")
}

pub fn slot(raw: &str) -> SlotTime {
    raw.parse().expect("valid test slot")
}

pub fn doctor_record(user: &TestUser, template: &[&str], dates: &[NaiveDate]) -> DoctorRecord {
    DoctorRecord {
        id: user.id,
        specialization: "General Practice".to_string(),
        experience_years: 5,
        profile: DoctorProfile::default(),
        slot_template: template.iter().map(|raw| slot(raw)).collect(),
        available_dates: dates.to_vec(),
        online: true,
        review_count: 0,
        average_rating: 0.0,
        active: true,
        audit: seed_audit(),
    }
}

pub fn patient_record(user: &TestUser) -> PatientRecord {
    PatientRecord {
        id: user.id,
        blood_type: Some("A+".to_string()),
        medical_history: None,
        emergency_contact: None,
        active: true,
        audit: seed_audit(),
    }
}

pub fn appointment_record(
    doctor: &TestUser,
    patient: &TestUser,
    date: NaiveDate,
    time: &str,
    status: AppointmentStatus,
) -> AppointmentRecord {
    AppointmentRecord {
        id: Uuid::new_v4(),
        doctor_id: doctor.id,
        patient_id: patient.id,
        appointment_date: date,
        appointment_time: slot(time),
        status,
        active: true,
        audit: Audit::created(patient.id, TestClinic::start_instant()),
    }
}

/// A seeded clinic on a frozen clock.
///
/// "Today" is 2025-06-10 and the clock reads 08:00 clinic time. The doctor
/// works 09:00, 10:00 and 11:00 AM on 2025-06-09 (already past), 2025-06-10
/// and 2025-06-11. The second doctor only works 2025-06-11.
pub struct TestClinic {
    pub state: Arc<AppState>,
    pub store: MemoryStore,
    pub clock: FixedClock,
    pub hub: BroadcastHub,
    pub issuer: HmacCallTokenIssuer,
    pub config: TestConfig,
    pub admin: TestUser,
    pub doctor: TestUser,
    pub other_doctor: TestUser,
    pub patient: TestUser,
    pub other_patient: TestUser,
    /// Holds the doctor role but has no profile yet.
    pub unprofiled_doctor: TestUser,
    /// Holds the patient role but has no profile yet.
    pub unprofiled_patient: TestUser,
}

impl TestClinic {
    pub const TEMPLATE: [&'static str; 3] = ["09:00 AM", "10:00 AM", "11:00 AM"];

    pub fn today() -> NaiveDate {
        ymd(2025, 6, 10)
    }

    pub fn tomorrow() -> NaiveDate {
        ymd(2025, 6, 11)
    }

    pub fn yesterday() -> NaiveDate {
        ymd(2025, 6, 9)
    }

    pub fn start_instant() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 10, 8, 0, 0).unwrap()
    }

    pub fn new() -> Self {
        let config = TestConfig::default();
        let admin = TestUser::admin("admin@clinic.test");
        let doctor = TestUser::doctor("doctor@clinic.test");
        let other_doctor = TestUser::doctor("other.doctor@clinic.test");
        let patient = TestUser::patient("patient@clinic.test");
        let other_patient = TestUser::patient("other.patient@clinic.test");
        let unprofiled_doctor = TestUser::doctor("new.doctor@clinic.test");
        let unprofiled_patient = TestUser::patient("new.patient@clinic.test");

        let seed = SeedData {
            users: [
                &admin,
                &doctor,
                &other_doctor,
                &patient,
                &other_patient,
                &unprofiled_doctor,
                &unprofiled_patient,
            ]
            .iter()
            .map(|user| user.record())
            .collect(),
            doctors: vec![
                doctor_record(
                    &doctor,
                    &Self::TEMPLATE,
                    &[Self::yesterday(), Self::today(), Self::tomorrow()],
                ),
                doctor_record(&other_doctor, &["09:00 AM"], &[Self::tomorrow()]),
            ],
            patients: vec![patient_record(&patient), patient_record(&other_patient)],
        };

        let store = MemoryStore::from_seed(seed, StdDuration::from_secs(1));
        let clock = FixedClock::new(Self::start_instant());
        let hub = BroadcastHub::new();
        let issuer = HmacCallTokenIssuer::new(config.rtc_token_secret.as_bytes(), 3600);

        let state = Arc::new(AppState::new(
            config.to_app_config(),
            Arc::new(store.clone()),
            Arc::new(hub.clone()),
            Arc::new(issuer.clone()),
            Arc::new(clock.clone()),
        ));

        Self {
            state,
            store,
            clock,
            hub,
            issuer,
            config,
            admin,
            doctor,
            other_doctor,
            patient,
            other_patient,
            unprofiled_doctor,
            unprofiled_patient,
        }
    }

    /// Move the clinic clock to `hour:minute` on today's date.
    pub fn set_time(&self, hour: u32, minute: u32) {
        self.clock
            .set(Utc.with_ymd_and_hms(2025, 6, 10, hour, minute, 0).unwrap());
    }

    /// Write rows straight to the store, bypassing every service rule except the
    /// store's own constraints.
    pub async fn apply(&self, mutations: Vec<Mutation>) {
        let mut tx = self.store.begin().await.expect("begin test transaction");
        for mutation in mutations {
            tx.apply(mutation).await.expect("apply test mutation");
        }
        tx.commit().await.expect("commit test transaction");
    }

    /// Same clinic collaborators over a different store, e.g. a wrapper around
    /// [`TestClinic::store`].
    pub fn state_with_store(&self, store: Arc<dyn ClinicStore>) -> Arc<AppState> {
        Arc::new(AppState::new(
            self.config.to_app_config(),
            store,
            Arc::new(self.hub.clone()),
            Arc::new(self.issuer.clone()),
            Arc::new(self.clock.clone()),
        ))
    }

    pub fn token_for(&self, user: &TestUser) -> String {
        JwtTestUtils::create_test_token(user, &self.config.jwt_secret, None)
    }
}

/// App state whose store talks PostgREST at `supabase_url`, on the test clinic's clock.
pub fn supabase_state(supabase_url: &str) -> Arc<AppState> {
    let test_config = TestConfig::default();
    let config = AppConfig {
        supabase_url: supabase_url.to_string(),
        supabase_anon_key: "test-anon-key".to_string(),
        persistence_timeout_ms: 500,
        ..test_config.to_app_config()
    };
    let store = SupabaseStore::new(&config).expect("build supabase store");
    let issuer = HmacCallTokenIssuer::new(test_config.rtc_token_secret.as_bytes(), 3600);

    Arc::new(AppState::new(
        config,
        Arc::new(store),
        Arc::new(BroadcastHub::new()),
        Arc::new(issuer),
        Arc::new(FixedClock::new(TestClinic::start_instant())),
    ))
}

impl Default for TestClinic {
    fn default() -> Self {
        Self::new()
    }
}
