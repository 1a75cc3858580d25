use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::{debug, info};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::appointment::AppointmentRecord;
use shared_models::call::CallRecord;
use shared_models::chat::{ChatMessageRecord, ChatSessionRecord};
use shared_models::doctor::{normalize_dates, DoctorRecord};
use shared_models::patient::PatientRecord;
use shared_models::review::DoctorReviewRecord;
use shared_models::user::UserRecord;

use crate::error::DatabaseError;
use crate::store::{AppointmentFilter, CallFilter, ClinicStore, ClinicTx, Mutation};
use crate::supabase::SupabaseClient;

pub const APPLY_MUTATIONS_RPC: &str = "apply_clinic_mutations";

/// Store backed by Supabase PostgREST.
///
/// Reads go straight to `/rest/v1`. Mutations are buffered and shipped on
/// commit to a single plpgsql function, so a unit of work lands in one
/// Postgres transaction. The partial unique indexes decide insert races and
/// every update is checked against the row version it was read at, so a
/// write based on a stale read fails with [`DatabaseError::StaleWrite`].
#[derive(Clone)]
pub struct SupabaseStore {
    client: Arc<SupabaseClient>,
}

impl SupabaseStore {
    pub fn new(config: &AppConfig) -> Result<Self, DatabaseError> {
        Ok(Self::with_client(SupabaseClient::new(config)?))
    }

    pub fn with_client(client: SupabaseClient) -> Self {
        Self {
            client: Arc::new(client),
        }
    }
}

#[async_trait]
impl ClinicStore for SupabaseStore {
    async fn begin(&self) -> Result<Box<dyn ClinicTx>, DatabaseError> {
        Ok(Box::new(PostgrestTx {
            client: self.client.clone(),
            pending: Vec::new(),
            read_only: false,
        }))
    }

    async fn begin_read(&self) -> Result<Box<dyn ClinicTx>, DatabaseError> {
        Ok(Box::new(PostgrestTx {
            client: self.client.clone(),
            pending: Vec::new(),
            read_only: true,
        }))
    }
}

struct PostgrestTx {
    client: Arc<SupabaseClient>,
    pending: Vec<Mutation>,
    read_only: bool,
}

fn eq(value: impl std::fmt::Display) -> String {
    urlencoding::encode(&format!("eq.{}", value)).into_owned()
}

fn timestamp_param(at: DateTime<Utc>) -> String {
    urlencoding::encode(&at.to_rfc3339_opts(SecondsFormat::Micros, true)).into_owned()
}

impl PostgrestTx {
    async fn select<T: DeserializeOwned>(&self, path: &str) -> Result<Vec<T>, DatabaseError> {
        self.client.request(Method::GET, path, None, None).await
    }

    async fn select_one<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>, DatabaseError> {
        let rows: Vec<T> = self.select(path).await?;
        Ok(rows.into_iter().next())
    }

    /// Date arrays come back in whatever order they were written.
    async fn select_doctors(&self, path: &str) -> Result<Vec<DoctorRecord>, DatabaseError> {
        let mut doctors: Vec<DoctorRecord> = self.select(path).await?;
        for doctor in &mut doctors {
            normalize_dates(&mut doctor.available_dates);
        }
        Ok(doctors)
    }
}

#[async_trait]
impl ClinicTx for PostgrestTx {
    async fn find_user(&mut self, id: Uuid) -> Result<Option<UserRecord>, DatabaseError> {
        self.select_one(&format!("/rest/v1/users?id={}&limit=1", eq(id))).await
    }

    async fn find_doctor(&mut self, id: Uuid) -> Result<Option<DoctorRecord>, DatabaseError> {
        let doctors = self
            .select_doctors(&format!("/rest/v1/doctors?id={}&limit=1", eq(id)))
            .await?;
        Ok(doctors.into_iter().next())
    }

    async fn list_doctors(
        &mut self,
        online: Option<bool>,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<DoctorRecord>, DatabaseError> {
        let mut path = "/rest/v1/doctors?active=eq.true".to_string();
        if let Some(flag) = online {
            path.push_str(&format!("&online={}", eq(flag)));
        }
        path.push_str(&format!(
            "&order=created_at.asc,id.asc&limit={}&offset={}",
            limit, offset
        ));
        self.select_doctors(&path).await
    }

    async fn find_patient(&mut self, id: Uuid) -> Result<Option<PatientRecord>, DatabaseError> {
        self.select_one(&format!("/rest/v1/patients?id={}&limit=1", eq(id))).await
    }

    async fn find_appointment(&mut self, id: Uuid) -> Result<Option<AppointmentRecord>, DatabaseError> {
        self.select_one(&format!("/rest/v1/appointments?id={}&limit=1", eq(id))).await
    }

    async fn find_appointments(
        &mut self,
        filter: &AppointmentFilter,
    ) -> Result<Vec<AppointmentRecord>, DatabaseError> {
        let mut query_parts = Vec::new();

        if let Some(doctor_id) = filter.doctor_id {
            query_parts.push(format!("doctor_id={}", eq(doctor_id)));
        }
        if let Some(patient_id) = filter.patient_id {
            query_parts.push(format!("patient_id={}", eq(patient_id)));
        }
        if let Some(date) = filter.date {
            query_parts.push(format!("appointment_date={}", eq(date)));
        }
        if let Some(statuses) = &filter.statuses {
            let list: Vec<&str> = statuses.iter().map(|s| s.as_str()).collect();
            query_parts.push(format!("status=in.({})", list.join(",")));
        }
        if filter.active_only {
            query_parts.push("active=eq.true".to_string());
        }
        query_parts.push("order=appointment_date.asc,appointment_time.asc,created_at.asc".to_string());

        let path = format!("/rest/v1/appointments?{}", query_parts.join("&"));
        self.select(&path).await
    }

    async fn find_chat_session(
        &mut self,
        session_id: &str,
    ) -> Result<Option<ChatSessionRecord>, DatabaseError> {
        self.select_one(&format!("/rest/v1/chat_sessions?session_id={}&limit=1", eq(session_id)))
            .await
    }

    async fn find_active_chat_session(
        &mut self,
        doctor_id: Uuid,
        patient_id: Uuid,
    ) -> Result<Option<ChatSessionRecord>, DatabaseError> {
        self.select_one(&format!(
            "/rest/v1/chat_sessions?doctor_id={}&patient_id={}&active=eq.true&limit=1",
            eq(doctor_id),
            eq(patient_id)
        ))
        .await
    }

    async fn list_chat_sessions_for(
        &mut self,
        user_id: Uuid,
        active: Option<bool>,
    ) -> Result<Vec<ChatSessionRecord>, DatabaseError> {
        let mut path = format!(
            "/rest/v1/chat_sessions?archived=eq.false&or=(doctor_id.eq.{0},patient_id.eq.{0})",
            user_id
        );
        if let Some(flag) = active {
            path.push_str(&format!("&active={}", eq(flag)));
        }
        path.push_str("&order=started_at.desc");
        self.select(&path).await
    }

    async fn find_chat_message(
        &mut self,
        message_id: &str,
    ) -> Result<Option<ChatMessageRecord>, DatabaseError> {
        self.select_one(&format!("/rest/v1/chat_messages?message_id={}&limit=1", eq(message_id)))
            .await
    }

    async fn latest_chat_message(
        &mut self,
        session_id: &str,
    ) -> Result<Option<ChatMessageRecord>, DatabaseError> {
        self.select_one(&format!(
            "/rest/v1/chat_messages?session_id={}&order=timestamp.desc&limit=1",
            eq(session_id)
        ))
        .await
    }

    async fn list_chat_messages(
        &mut self,
        session_id: &str,
        before: Option<DateTime<Utc>>,
        limit: usize,
    ) -> Result<Vec<ChatMessageRecord>, DatabaseError> {
        let mut path = format!(
            "/rest/v1/chat_messages?session_id={}&active=eq.true",
            eq(session_id)
        );
        if let Some(cursor) = before {
            path.push_str(&format!("&timestamp=lt.{}", timestamp_param(cursor)));
        }
        path.push_str(&format!("&order=timestamp.desc&limit={}", limit));

        let mut messages: Vec<ChatMessageRecord> = self.select(&path).await?;
        messages.reverse();
        Ok(messages)
    }

    async fn find_call(&mut self, call_id: &str) -> Result<Option<CallRecord>, DatabaseError> {
        self.select_one(&format!("/rest/v1/calls?call_id={}&limit=1", eq(call_id))).await
    }

    async fn list_calls_for(
        &mut self,
        user_id: Uuid,
        filter: CallFilter,
    ) -> Result<Vec<CallRecord>, DatabaseError> {
        let mut path = format!(
            "/rest/v1/calls?active=eq.true&or=(caller_id.eq.{0},callee_id.eq.{0})",
            user_id
        );
        if let Some(call_type) = filter.call_type {
            path.push_str(&format!("&call_type={}", eq(call_type)));
        }
        if let Some(status) = filter.status {
            path.push_str(&format!("&status={}", eq(status)));
        }
        path.push_str("&order=created_at.desc");
        self.select(&path).await
    }

    async fn find_review(&mut self, id: Uuid) -> Result<Option<DoctorReviewRecord>, DatabaseError> {
        self.select_one(&format!("/rest/v1/doctor_reviews?id={}&limit=1", eq(id))).await
    }

    async fn list_reviews(
        &mut self,
        doctor_id: Uuid,
        limit: Option<usize>,
        offset: usize,
    ) -> Result<Vec<DoctorReviewRecord>, DatabaseError> {
        let mut path = format!(
            "/rest/v1/doctor_reviews?doctor_id={}&active=eq.true&order=created_at.desc,id.asc",
            eq(doctor_id)
        );
        if let Some(limit) = limit {
            path.push_str(&format!("&limit={}", limit));
        }
        if offset > 0 {
            path.push_str(&format!("&offset={}", offset));
        }
        self.select(&path).await
    }

    async fn apply(&mut self, mutation: Mutation) -> Result<(), DatabaseError> {
        if self.read_only {
            return Err(DatabaseError::Query(format!(
                "cannot apply {} in a read-only transaction",
                mutation.name()
            )));
        }
        debug!("Buffering {}", mutation.name());
        self.pending.push(mutation);
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), DatabaseError> {
        if self.pending.is_empty() {
            return Ok(());
        }

        let count = self.pending.len();
        let payload = json!({ "mutations": serde_json::to_value(&self.pending)? });
        let _: Value = self.client.rpc(APPLY_MUTATIONS_RPC, payload).await?;

        info!("Committed {} mutation(s) through {}", count, APPLY_MUTATIONS_RPC);
        Ok(())
    }
}
