use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use uuid::Uuid;

use shared_models::appointment::{AppointmentRecord, AppointmentStatus};
use shared_models::call::{CallRecord, CallStatus, CallType};
use shared_models::chat::{ChatMessageRecord, ChatSessionRecord};
use shared_models::doctor::DoctorRecord;
use shared_models::patient::PatientRecord;
use shared_models::review::DoctorReviewRecord;
use shared_models::user::UserRecord;

use crate::error::DatabaseError;

/// Selection over appointments. Results are always ordered by date, then time.
#[derive(Debug, Clone, Default)]
pub struct AppointmentFilter {
    pub doctor_id: Option<Uuid>,
    pub patient_id: Option<Uuid>,
    pub date: Option<NaiveDate>,
    /// `None` matches every status.
    pub statuses: Option<Vec<AppointmentStatus>>,
    pub active_only: bool,
}

impl AppointmentFilter {
    /// Rows currently holding a slot for `doctor_id` on `date`.
    pub fn slot_holders(doctor_id: Uuid, date: NaiveDate) -> Self {
        Self {
            doctor_id: Some(doctor_id),
            date: Some(date),
            statuses: Some(AppointmentStatus::NON_TERMINAL.to_vec()),
            active_only: true,
            ..Self::default()
        }
    }

    pub fn matches(&self, row: &AppointmentRecord) -> bool {
        if self.active_only && !row.active {
            return false;
        }
        if self.doctor_id.is_some_and(|id| id != row.doctor_id) {
            return false;
        }
        if self.patient_id.is_some_and(|id| id != row.patient_id) {
            return false;
        }
        if self.date.is_some_and(|date| date != row.appointment_date) {
            return false;
        }
        match &self.statuses {
            Some(statuses) => statuses.contains(&row.status),
            None => true,
        }
    }
}

/// Selection over a user's calls.
#[derive(Debug, Clone, Copy, Default)]
pub struct CallFilter {
    pub call_type: Option<CallType>,
    pub status: Option<CallStatus>,
}

impl CallFilter {
    pub fn matches(&self, call: &CallRecord) -> bool {
        self.call_type.map_or(true, |kind| kind == call.call_type)
            && self.status.map_or(true, |status| status == call.status)
    }
}

/// A single write. Buffered by transactional stores and applied atomically on commit.
///
/// `Update*` rows must carry a version one past the stored row (see
/// [`shared_models::Audit::touch`]); anything else fails with
/// [`DatabaseError::StaleWrite`].
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "op", content = "row", rename_all = "snake_case")]
pub enum Mutation {
    InsertDoctor(DoctorRecord),
    UpdateDoctor(DoctorRecord),
    InsertPatient(PatientRecord),
    UpdatePatient(PatientRecord),
    SetUserActive {
        user_id: Uuid,
        active: bool,
        updated_by: Uuid,
        updated_at: DateTime<Utc>,
    },
    InsertAppointment(AppointmentRecord),
    UpdateAppointment(AppointmentRecord),
    InsertChatSession(ChatSessionRecord),
    UpdateChatSession(ChatSessionRecord),
    InsertChatMessage(ChatMessageRecord),
    UpdateChatMessage(ChatMessageRecord),
    InsertCall(CallRecord),
    UpdateCall(CallRecord),
    InsertReview(DoctorReviewRecord),
    UpdateReview(DoctorReviewRecord),
    /// Recount the doctor's active reviews and store count and mean on the doctor row.
    RecomputeReviewSummary {
        doctor_id: Uuid,
        updated_by: Uuid,
        updated_at: DateTime<Utc>,
    },
}

impl Mutation {
    pub fn name(&self) -> &'static str {
        match self {
            Mutation::InsertDoctor(_) => "insert_doctor",
            Mutation::UpdateDoctor(_) => "update_doctor",
            Mutation::InsertPatient(_) => "insert_patient",
            Mutation::UpdatePatient(_) => "update_patient",
            Mutation::SetUserActive { .. } => "set_user_active",
            Mutation::InsertAppointment(_) => "insert_appointment",
            Mutation::UpdateAppointment(_) => "update_appointment",
            Mutation::InsertChatSession(_) => "insert_chat_session",
            Mutation::UpdateChatSession(_) => "update_chat_session",
            Mutation::InsertChatMessage(_) => "insert_chat_message",
            Mutation::UpdateChatMessage(_) => "update_chat_message",
            Mutation::InsertCall(_) => "insert_call",
            Mutation::UpdateCall(_) => "update_call",
            Mutation::InsertReview(_) => "insert_review",
            Mutation::UpdateReview(_) => "update_review",
            Mutation::RecomputeReviewSummary { .. } => "recompute_review_summary",
        }
    }
}

#[async_trait]
pub trait ClinicStore: Send + Sync {
    /// Open a unit of work. Dropping the returned transaction without
    /// committing discards every mutation applied through it.
    async fn begin(&self) -> Result<Box<dyn ClinicTx>, DatabaseError>;

    /// Open a unit of work that never writes. Stores may run these side by side;
    /// `apply` on the returned transaction fails.
    async fn begin_read(&self) -> Result<Box<dyn ClinicTx>, DatabaseError> {
        self.begin().await
    }
}

impl std::fmt::Debug for dyn ClinicTx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ClinicTx")
    }
}

#[async_trait]
pub trait ClinicTx: Send {
    async fn find_user(&mut self, id: Uuid) -> Result<Option<UserRecord>, DatabaseError>;

    async fn find_doctor(&mut self, id: Uuid) -> Result<Option<DoctorRecord>, DatabaseError>;

    /// Active doctors, oldest profile first.
    async fn list_doctors(
        &mut self,
        online: Option<bool>,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<DoctorRecord>, DatabaseError>;

    async fn find_patient(&mut self, id: Uuid) -> Result<Option<PatientRecord>, DatabaseError>;

    async fn find_appointment(&mut self, id: Uuid) -> Result<Option<AppointmentRecord>, DatabaseError>;

    async fn find_appointments(
        &mut self,
        filter: &AppointmentFilter,
    ) -> Result<Vec<AppointmentRecord>, DatabaseError>;

    async fn find_chat_session(
        &mut self,
        session_id: &str,
    ) -> Result<Option<ChatSessionRecord>, DatabaseError>;

    async fn find_active_chat_session(
        &mut self,
        doctor_id: Uuid,
        patient_id: Uuid,
    ) -> Result<Option<ChatSessionRecord>, DatabaseError>;

    /// Sessions the user takes part in, newest first. `active` narrows to open
    /// or closed sessions.
    async fn list_chat_sessions_for(
        &mut self,
        user_id: Uuid,
        active: Option<bool>,
    ) -> Result<Vec<ChatSessionRecord>, DatabaseError>;

    async fn find_chat_message(
        &mut self,
        message_id: &str,
    ) -> Result<Option<ChatMessageRecord>, DatabaseError>;

    /// Most recent message in the session, deleted or not.
    async fn latest_chat_message(
        &mut self,
        session_id: &str,
    ) -> Result<Option<ChatMessageRecord>, DatabaseError>;

    /// The `limit` most recent active messages strictly before `before`, oldest first.
    async fn list_chat_messages(
        &mut self,
        session_id: &str,
        before: Option<DateTime<Utc>>,
        limit: usize,
    ) -> Result<Vec<ChatMessageRecord>, DatabaseError>;

    async fn find_call(&mut self, call_id: &str) -> Result<Option<CallRecord>, DatabaseError>;

    /// Active calls where the user is caller or callee, newest first.
    async fn list_calls_for(
        &mut self,
        user_id: Uuid,
        filter: CallFilter,
    ) -> Result<Vec<CallRecord>, DatabaseError>;

    async fn find_review(&mut self, id: Uuid) -> Result<Option<DoctorReviewRecord>, DatabaseError>;

    /// Active reviews for the doctor, newest first. `limit: None` means no limit.
    async fn list_reviews(
        &mut self,
        doctor_id: Uuid,
        limit: Option<usize>,
        offset: usize,
    ) -> Result<Vec<DoctorReviewRecord>, DatabaseError>;

    async fn apply(&mut self, mutation: Mutation) -> Result<(), DatabaseError>;

    async fn commit(self: Box<Self>) -> Result<(), DatabaseError>;
}
