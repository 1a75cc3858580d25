use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use shared_database::postgrest::APPLY_MUTATIONS_RPC;
use shared_database::{
    AppointmentFilter, CallFilter, ClinicStore, ClinicTx, DatabaseError, MemoryStore, Mutation,
};
use shared_models::appointment::AppointmentRecord;
use shared_models::auth::Actor;
use shared_models::call::CallRecord;
use shared_models::chat::{ChatMessageRecord, ChatSessionRecord};
use shared_models::doctor::DoctorRecord;
use shared_models::patient::PatientRecord;
use shared_models::review::DoctorReviewRecord;
use shared_models::user::UserRecord;
use shared_utils::test_utils::{supabase_state, TestClinic};

use chat_cell::services::ChatSessionService;

/// Memory store whose first active-session lookup misses, the way a request
/// that loses the race to a concurrent start sees the table.
#[derive(Clone)]
struct LateReader {
    inner: MemoryStore,
    missed: Arc<AtomicBool>,
}

#[async_trait]
impl ClinicStore for LateReader {
    async fn begin(&self) -> Result<Box<dyn ClinicTx>, DatabaseError> {
        Ok(Box::new(LateReaderTx {
            inner: self.inner.begin().await?,
            missed: self.missed.clone(),
        }))
    }

    async fn begin_read(&self) -> Result<Box<dyn ClinicTx>, DatabaseError> {
        Ok(Box::new(LateReaderTx {
            inner: self.inner.begin_read().await?,
            missed: self.missed.clone(),
        }))
    }
}

struct LateReaderTx {
    inner: Box<dyn ClinicTx>,
    missed: Arc<AtomicBool>,
}

#[async_trait]
impl ClinicTx for LateReaderTx {
    async fn find_user(&mut self, id: Uuid) -> Result<Option<UserRecord>, DatabaseError> {
        self.inner.find_user(id).await
    }

    async fn find_doctor(&mut self, id: Uuid) -> Result<Option<DoctorRecord>, DatabaseError> {
        self.inner.find_doctor(id).await
    }

    async fn list_doctors(
        &mut self,
        online: Option<bool>,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<DoctorRecord>, DatabaseError> {
        self.inner.list_doctors(online, limit, offset).await
    }

    async fn find_patient(&mut self, id: Uuid) -> Result<Option<PatientRecord>, DatabaseError> {
        self.inner.find_patient(id).await
    }

    async fn find_appointment(&mut self, id: Uuid) -> Result<Option<AppointmentRecord>, DatabaseError> {
        self.inner.find_appointment(id).await
    }

    async fn find_appointments(
        &mut self,
        filter: &AppointmentFilter,
    ) -> Result<Vec<AppointmentRecord>, DatabaseError> {
        self.inner.find_appointments(filter).await
    }

    async fn find_chat_session(
        &mut self,
        session_id: &str,
    ) -> Result<Option<ChatSessionRecord>, DatabaseError> {
        self.inner.find_chat_session(session_id).await
    }

    async fn find_active_chat_session(
        &mut self,
        doctor_id: Uuid,
        patient_id: Uuid,
    ) -> Result<Option<ChatSessionRecord>, DatabaseError> {
        if !self.missed.swap(true, Ordering::SeqCst) {
            return Ok(None);
        }
        self.inner.find_active_chat_session(doctor_id, patient_id).await
    }

    async fn list_chat_sessions_for(
        &mut self,
        user_id: Uuid,
        active: Option<bool>,
    ) -> Result<Vec<ChatSessionRecord>, DatabaseError> {
        self.inner.list_chat_sessions_for(user_id, active).await
    }

    async fn find_chat_message(
        &mut self,
        message_id: &str,
    ) -> Result<Option<ChatMessageRecord>, DatabaseError> {
        self.inner.find_chat_message(message_id).await
    }

    async fn latest_chat_message(
        &mut self,
        session_id: &str,
    ) -> Result<Option<ChatMessageRecord>, DatabaseError> {
        self.inner.latest_chat_message(session_id).await
    }

    async fn list_chat_messages(
        &mut self,
        session_id: &str,
        before: Option<DateTime<Utc>>,
        limit: usize,
    ) -> Result<Vec<ChatMessageRecord>, DatabaseError> {
        self.inner.list_chat_messages(session_id, before, limit).await
    }

    async fn find_call(&mut self, call_id: &str) -> Result<Option<CallRecord>, DatabaseError> {
        self.inner.find_call(call_id).await
    }

    async fn list_calls_for(
        &mut self,
        user_id: Uuid,
        filter: CallFilter,
    ) -> Result<Vec<CallRecord>, DatabaseError> {
        self.inner.list_calls_for(user_id, filter).await
    }

    async fn find_review(&mut self, id: Uuid) -> Result<Option<DoctorReviewRecord>, DatabaseError> {
        self.inner.find_review(id).await
    }

    async fn list_reviews(
        &mut self,
        doctor_id: Uuid,
        limit: Option<usize>,
        offset: usize,
    ) -> Result<Vec<DoctorReviewRecord>, DatabaseError> {
        self.inner.list_reviews(doctor_id, limit, offset).await
    }

    async fn apply(&mut self, mutation: Mutation) -> Result<(), DatabaseError> {
        self.inner.apply(mutation).await
    }

    async fn commit(self: Box<Self>) -> Result<(), DatabaseError> {
        self.inner.commit().await
    }
}

#[tokio::test]
async fn losing_start_rereads_the_winner_without_waiting_on_its_own_transaction() {
    let clinic = TestClinic::new();
    let winner = ChatSessionService::new(&clinic.state)
        .start_session(clinic.doctor.id, clinic.patient.id, clinic.patient.actor())
        .await
        .unwrap();

    let late = LateReader {
        inner: clinic.store.clone(),
        missed: Arc::new(AtomicBool::new(false)),
    };
    let state = clinic.state_with_store(Arc::new(late));

    // The insert hits the open-pair constraint; the re-read must not queue
    // behind the write lock the failed attempt still held.
    let started = tokio::time::timeout(
        std::time::Duration::from_millis(500),
        ChatSessionService::new(&state).start_session(
            clinic.doctor.id,
            clinic.patient.id,
            clinic.doctor.actor(),
        ),
    )
    .await
    .expect("start_session finished before the lock timeout")
    .unwrap();

    assert!(!started.is_new);
    assert_eq!(started.session.session_id, winner.session.session_id);
}

fn audit_columns() -> serde_json::Value {
    json!({
        "created_by": Uuid::nil(),
        "created_at": "2025-06-01T08:00:00Z",
        "updated_by": null,
        "updated_at": null,
        "version": 0
    })
}

fn with_audit(mut row: serde_json::Value) -> serde_json::Value {
    let audit = audit_columns();
    if let (Some(fields), Some(audit)) = (row.as_object_mut(), audit.as_object()) {
        fields.extend(audit.clone());
    }
    row
}

#[tokio::test]
async fn postgrest_unique_violation_on_start_returns_the_concurrent_session() {
    let server = MockServer::start().await;
    let doctor_id = Uuid::new_v4();
    let patient_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctors"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([with_audit(json!({
            "id": doctor_id,
            "specialization": "Cardiology",
            "experience_years": 8,
            "slot_template": ["09:00:00"],
            "available_dates": ["2025-06-11"],
            "online": true,
            "review_count": 0,
            "average_rating": 0.0,
            "active": true
        }))])))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/patients"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([with_audit(json!({
            "id": patient_id,
            "blood_type": "O-",
            "medical_history": null,
            "emergency_contact": null,
            "active": true
        }))])))
        .mount(&server)
        .await;

    // Nobody holds the pair on the first look; the winner's row is there on the second.
    Mock::given(method("GET"))
        .and(path("/rest/v1/chat_sessions"))
        .and(query_param("active", "eq.true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/chat_sessions"))
        .and(query_param("active", "eq.true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([with_audit(json!({
            "session_id": "CHAT_winner",
            "doctor_id": doctor_id,
            "patient_id": patient_id,
            "active": true,
            "archived": false,
            "started_at": "2025-06-10T07:59:59Z",
            "ended_at": null
        }))])))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path(format!("/rest/v1/rpc/{}", APPLY_MUTATIONS_RPC)))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({
            "code": "23505",
            "message": "duplicate key value violates unique constraint \"chat_sessions_active_pair_key\""
        })))
        .expect(1)
        .mount(&server)
        .await;

    let state = supabase_state(&server.uri());
    let started = ChatSessionService::new(&state)
        .start_session(doctor_id, patient_id, Actor::Patient(patient_id))
        .await
        .unwrap();

    assert!(!started.is_new);
    assert_eq!(started.session.session_id, "CHAT_winner");
}
