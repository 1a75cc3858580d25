use std::collections::HashMap;
use std::fmt::Display;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock};
use tracing::{debug, warn};
use uuid::Uuid;

use shared_models::appointment::AppointmentRecord;
use shared_models::call::CallRecord;
use shared_models::chat::{ChatMessageRecord, ChatSessionRecord};
use shared_models::doctor::{normalize_dates, DoctorRecord};
use shared_models::patient::PatientRecord;
use shared_models::review::{summarize_ratings, DoctorReviewRecord};
use shared_models::user::UserRecord;

use crate::error::DatabaseError;
use crate::seed::SeedData;
use crate::store::{AppointmentFilter, CallFilter, ClinicStore, ClinicTx, Mutation};

#[derive(Debug, Default)]
struct ClinicState {
    users: HashMap<Uuid, UserRecord>,
    doctors: HashMap<Uuid, DoctorRecord>,
    patients: HashMap<Uuid, PatientRecord>,
    appointments: HashMap<Uuid, AppointmentRecord>,
    chat_sessions: HashMap<String, ChatSessionRecord>,
    chat_messages: HashMap<String, ChatMessageRecord>,
    calls: HashMap<String, CallRecord>,
    reviews: HashMap<Uuid, DoctorReviewRecord>,
}

/// In-process store with serializable transactions.
///
/// Writers hold the state lock exclusively and change rows in place, keeping
/// the previous version of every touched row so a dropped transaction can be
/// undone. Read-only transactions share the lock. The same unique constraints
/// and version checks as the Postgres schema are enforced on every mutation.
#[derive(Clone)]
pub struct MemoryStore {
    state: Arc<RwLock<ClinicState>>,
    lock_timeout: Duration,
}

impl MemoryStore {
    pub fn new(lock_timeout: Duration) -> Self {
        Self {
            state: Arc::new(RwLock::new(ClinicState::default())),
            lock_timeout,
        }
    }

    pub fn from_seed(seed: SeedData, lock_timeout: Duration) -> Self {
        let mut state = ClinicState::default();
        for user in seed.users {
            state.users.insert(user.id, user);
        }
        for mut doctor in seed.doctors {
            normalize_dates(&mut doctor.available_dates);
            state.doctors.insert(doctor.id, doctor);
        }
        for patient in seed.patients {
            state.patients.insert(patient.id, patient);
        }

        debug!(
            "Seeded memory store with {} users, {} doctors, {} patients",
            state.users.len(),
            state.doctors.len(),
            state.patients.len()
        );

        Self {
            state: Arc::new(RwLock::new(state)),
            lock_timeout,
        }
    }

    fn lock_timed_out(&self) -> DatabaseError {
        warn!("Timed out waiting for memory store lock");
        DatabaseError::Timeout(self.lock_timeout.as_millis() as u64)
    }
}

#[async_trait]
impl ClinicStore for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn ClinicTx>, DatabaseError> {
        let guard = tokio::time::timeout(self.lock_timeout, self.state.clone().write_owned())
            .await
            .map_err(|_| self.lock_timed_out())?;

        Ok(Box::new(MemoryTx {
            access: Access::Write {
                guard,
                undo: Vec::new(),
            },
        }))
    }

    async fn begin_read(&self) -> Result<Box<dyn ClinicTx>, DatabaseError> {
        let guard = tokio::time::timeout(self.lock_timeout, self.state.clone().read_owned())
            .await
            .map_err(|_| self.lock_timed_out())?;

        Ok(Box::new(MemoryTx {
            access: Access::Read(guard),
        }))
    }
}

/// Previous state of one row, restored when a transaction is dropped uncommitted.
enum Undo {
    User(Uuid, Option<UserRecord>),
    Doctor(Uuid, Option<DoctorRecord>),
    Patient(Uuid, Option<PatientRecord>),
    Appointment(Uuid, Option<AppointmentRecord>),
    ChatSession(String, Option<ChatSessionRecord>),
    ChatMessage(String, Option<ChatMessageRecord>),
    Call(String, Option<CallRecord>),
    Review(Uuid, Option<DoctorReviewRecord>),
}

enum Access {
    Read(OwnedRwLockReadGuard<ClinicState>),
    Write {
        guard: OwnedRwLockWriteGuard<ClinicState>,
        undo: Vec<Undo>,
    },
}

struct MemoryTx {
    access: Access,
}

impl MemoryTx {
    fn state(&self) -> &ClinicState {
        match &self.access {
            Access::Read(guard) => &**guard,
            Access::Write { guard, .. } => &**guard,
        }
    }
}

impl Drop for MemoryTx {
    fn drop(&mut self) {
        if let Access::Write { guard, undo } = &mut self.access {
            if !undo.is_empty() {
                debug!("Rolling back {} uncommitted mutation(s)", undo.len());
            }
            while let Some(entry) = undo.pop() {
                guard.restore(entry);
            }
        }
    }
}

trait Versioned {
    fn version(&self) -> i64;
}

macro_rules! audited {
    ($($record:ty),* $(,)?) => {
        $(impl Versioned for $record {
            fn version(&self) -> i64 {
                self.audit.version
            }
        })*
    };
}

audited!(DoctorRecord, PatientRecord, AppointmentRecord, ChatSessionRecord, CallRecord, DoctorReviewRecord);

impl Versioned for ChatMessageRecord {
    fn version(&self) -> i64 {
        self.version
    }
}

fn insert_new<K, V>(map: &mut HashMap<K, V>, key: K, value: V, constraint: &str) -> Result<K, DatabaseError>
where
    K: Eq + Hash + Clone,
{
    if map.contains_key(&key) {
        return Err(DatabaseError::UniqueViolation(constraint.to_string()));
    }
    map.insert(key.clone(), value);
    Ok(key)
}

/// Swap in `value` if it is exactly one version past the stored row. Returns the row it replaced.
fn replace_versioned<K, V>(map: &mut HashMap<K, V>, key: K, value: V, table: &str) -> Result<(K, V), DatabaseError>
where
    K: Eq + Hash + Clone + Display,
    V: Versioned,
{
    let Some(slot) = map.get_mut(&key) else {
        return Err(DatabaseError::NotFound(format!("{} {}", table, key)));
    };
    if slot.version() + 1 != value.version() {
        return Err(DatabaseError::StaleWrite(format!(
            "{} {} is at version {}, update carries {}",
            table,
            key,
            slot.version(),
            value.version()
        )));
    }
    let previous = std::mem::replace(slot, value);
    Ok((key, previous))
}

fn restore_row<K: Eq + Hash, V>(map: &mut HashMap<K, V>, key: K, previous: Option<V>) {
    match previous {
        Some(row) => {
            map.insert(key, row);
        }
        None => {
            map.remove(&key);
        }
    }
}

impl ClinicState {
    fn restore(&mut self, entry: Undo) {
        match entry {
            Undo::User(key, row) => restore_row(&mut self.users, key, row),
            Undo::Doctor(key, row) => restore_row(&mut self.doctors, key, row),
            Undo::Patient(key, row) => restore_row(&mut self.patients, key, row),
            Undo::Appointment(key, row) => restore_row(&mut self.appointments, key, row),
            Undo::ChatSession(key, row) => restore_row(&mut self.chat_sessions, key, row),
            Undo::ChatMessage(key, row) => restore_row(&mut self.chat_messages, key, row),
            Undo::Call(key, row) => restore_row(&mut self.calls, key, row),
            Undo::Review(key, row) => restore_row(&mut self.reviews, key, row),
        }
    }

    fn check_slot_free(&self, row: &AppointmentRecord) -> Result<(), DatabaseError> {
        if !row.holds_slot() {
            return Ok(());
        }
        let clash = self.appointments.values().any(|other| {
            other.id != row.id && other.occupies(row.doctor_id, row.appointment_date, row.appointment_time)
        });
        if clash {
            return Err(DatabaseError::UniqueViolation(
                "appointments_active_slot_key".to_string(),
            ));
        }
        Ok(())
    }

    fn check_chat_pair_free(&self, row: &ChatSessionRecord) -> Result<(), DatabaseError> {
        if !row.active {
            return Ok(());
        }
        let clash = self.chat_sessions.values().any(|other| {
            other.session_id != row.session_id
                && other.active
                && other.doctor_id == row.doctor_id
                && other.patient_id == row.patient_id
        });
        if clash {
            return Err(DatabaseError::UniqueViolation(
                "chat_sessions_active_pair_key".to_string(),
            ));
        }
        Ok(())
    }

    fn recompute_review_summary(
        &mut self,
        doctor_id: Uuid,
        updated_by: Uuid,
        updated_at: DateTime<Utc>,
    ) -> Result<Undo, DatabaseError> {
        let (count, average) = summarize_ratings(
            self.reviews
                .values()
                .filter(|review| review.doctor_id == doctor_id && review.active)
                .map(|review| review.rating),
        );

        let doctor = self
            .doctors
            .get_mut(&doctor_id)
            .ok_or_else(|| DatabaseError::NotFound(format!("doctors {}", doctor_id)))?;
        let previous = doctor.clone();
        doctor.review_count = count;
        doctor.average_rating = average;
        doctor.audit.touch(updated_by, updated_at);
        Ok(Undo::Doctor(doctor_id, Some(previous)))
    }

    /// Apply one mutation in place. Nothing changes when it fails.
    fn apply(&mut self, mutation: Mutation) -> Result<Undo, DatabaseError> {
        match mutation {
            Mutation::InsertDoctor(mut row) => {
                if !self.users.contains_key(&row.id) {
                    return Err(DatabaseError::Query(format!("doctor {} has no user row", row.id)));
                }
                normalize_dates(&mut row.available_dates);
                let key = insert_new(&mut self.doctors, row.id, row, "doctors_pkey")?;
                Ok(Undo::Doctor(key, None))
            }
            Mutation::UpdateDoctor(row) => {
                let (key, previous) = replace_versioned(&mut self.doctors, row.id, row, "doctors")?;
                Ok(Undo::Doctor(key, Some(previous)))
            }
            Mutation::InsertPatient(row) => {
                if !self.users.contains_key(&row.id) {
                    return Err(DatabaseError::Query(format!("patient {} has no user row", row.id)));
                }
                let key = insert_new(&mut self.patients, row.id, row, "patients_pkey")?;
                Ok(Undo::Patient(key, None))
            }
            Mutation::UpdatePatient(row) => {
                let (key, previous) = replace_versioned(&mut self.patients, row.id, row, "patients")?;
                Ok(Undo::Patient(key, Some(previous)))
            }
            Mutation::SetUserActive {
                user_id,
                active,
                updated_by,
                updated_at,
            } => {
                let user = self
                    .users
                    .get_mut(&user_id)
                    .ok_or_else(|| DatabaseError::NotFound(format!("users {}", user_id)))?;
                let previous = user.clone();
                user.active = active;
                user.audit.touch(updated_by, updated_at);
                Ok(Undo::User(user_id, Some(previous)))
            }
            Mutation::InsertAppointment(row) => {
                self.check_slot_free(&row)?;
                let key = insert_new(&mut self.appointments, row.id, row, "appointments_pkey")?;
                Ok(Undo::Appointment(key, None))
            }
            Mutation::UpdateAppointment(row) => {
                self.check_slot_free(&row)?;
                let (key, previous) = replace_versioned(&mut self.appointments, row.id, row, "appointments")?;
                Ok(Undo::Appointment(key, Some(previous)))
            }
            Mutation::InsertChatSession(row) => {
                self.check_chat_pair_free(&row)?;
                let key = insert_new(
                    &mut self.chat_sessions,
                    row.session_id.clone(),
                    row,
                    "chat_sessions_session_id_key",
                )?;
                Ok(Undo::ChatSession(key, None))
            }
            Mutation::UpdateChatSession(row) => {
                self.check_chat_pair_free(&row)?;
                let (key, previous) =
                    replace_versioned(&mut self.chat_sessions, row.session_id.clone(), row, "chat_sessions")?;
                Ok(Undo::ChatSession(key, Some(previous)))
            }
            Mutation::InsertChatMessage(row) => {
                if !self
                    .chat_sessions
                    .get(&row.session_id)
                    .is_some_and(|session| session.active)
                {
                    return Err(DatabaseError::Query(format!(
                        "chat session {} is not active",
                        row.session_id
                    )));
                }
                let key = insert_new(
                    &mut self.chat_messages,
                    row.message_id.clone(),
                    row,
                    "chat_messages_message_id_key",
                )?;
                Ok(Undo::ChatMessage(key, None))
            }
            Mutation::UpdateChatMessage(row) => {
                let (key, previous) =
                    replace_versioned(&mut self.chat_messages, row.message_id.clone(), row, "chat_messages")?;
                Ok(Undo::ChatMessage(key, Some(previous)))
            }
            Mutation::InsertCall(row) => {
                let key = insert_new(&mut self.calls, row.call_id.clone(), row, "calls_call_id_key")?;
                Ok(Undo::Call(key, None))
            }
            Mutation::UpdateCall(row) => {
                let (key, previous) = replace_versioned(&mut self.calls, row.call_id.clone(), row, "calls")?;
                Ok(Undo::Call(key, Some(previous)))
            }
            Mutation::InsertReview(row) => {
                let key = insert_new(&mut self.reviews, row.id, row, "doctor_reviews_pkey")?;
                Ok(Undo::Review(key, None))
            }
            Mutation::UpdateReview(row) => {
                let (key, previous) = replace_versioned(&mut self.reviews, row.id, row, "doctor_reviews")?;
                Ok(Undo::Review(key, Some(previous)))
            }
            Mutation::RecomputeReviewSummary {
                doctor_id,
                updated_by,
                updated_at,
            } => self.recompute_review_summary(doctor_id, updated_by, updated_at),
        }
    }
}

#[async_trait]
impl ClinicTx for MemoryTx {
    async fn find_user(&mut self, id: Uuid) -> Result<Option<UserRecord>, DatabaseError> {
        Ok(self.state().users.get(&id).cloned())
    }

    async fn find_doctor(&mut self, id: Uuid) -> Result<Option<DoctorRecord>, DatabaseError> {
        Ok(self.state().doctors.get(&id).cloned())
    }

    async fn list_doctors(
        &mut self,
        online: Option<bool>,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<DoctorRecord>, DatabaseError> {
        let mut doctors: Vec<&DoctorRecord> = self
            .state()
            .doctors
            .values()
            .filter(|doctor| doctor.active && online.map_or(true, |flag| doctor.online == flag))
            .collect();
        doctors.sort_by(|a, b| {
            a.audit
                .created_at
                .cmp(&b.audit.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(doctors.into_iter().skip(offset).take(limit).cloned().collect())
    }

    async fn find_patient(&mut self, id: Uuid) -> Result<Option<PatientRecord>, DatabaseError> {
        Ok(self.state().patients.get(&id).cloned())
    }

    async fn find_appointment(&mut self, id: Uuid) -> Result<Option<AppointmentRecord>, DatabaseError> {
        Ok(self.state().appointments.get(&id).cloned())
    }

    async fn find_appointments(
        &mut self,
        filter: &AppointmentFilter,
    ) -> Result<Vec<AppointmentRecord>, DatabaseError> {
        let mut rows: Vec<AppointmentRecord> = self
            .state()
            .appointments
            .values()
            .filter(|row| filter.matches(row))
            .cloned()
            .collect();
        rows.sort_by_key(|row| (row.appointment_date, row.appointment_time, row.audit.created_at));
        Ok(rows)
    }

    async fn find_chat_session(
        &mut self,
        session_id: &str,
    ) -> Result<Option<ChatSessionRecord>, DatabaseError> {
        Ok(self.state().chat_sessions.get(session_id).cloned())
    }

    async fn find_active_chat_session(
        &mut self,
        doctor_id: Uuid,
        patient_id: Uuid,
    ) -> Result<Option<ChatSessionRecord>, DatabaseError> {
        Ok(self
            .state()
            .chat_sessions
            .values()
            .find(|s| s.active && s.doctor_id == doctor_id && s.patient_id == patient_id)
            .cloned())
    }

    async fn list_chat_sessions_for(
        &mut self,
        user_id: Uuid,
        active: Option<bool>,
    ) -> Result<Vec<ChatSessionRecord>, DatabaseError> {
        let mut sessions: Vec<ChatSessionRecord> = self
            .state()
            .chat_sessions
            .values()
            .filter(|s| !s.archived && s.is_participant(user_id))
            .filter(|s| active.map_or(true, |flag| s.active == flag))
            .cloned()
            .collect();
        sessions.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        Ok(sessions)
    }

    async fn find_chat_message(
        &mut self,
        message_id: &str,
    ) -> Result<Option<ChatMessageRecord>, DatabaseError> {
        Ok(self.state().chat_messages.get(message_id).cloned())
    }

    async fn latest_chat_message(
        &mut self,
        session_id: &str,
    ) -> Result<Option<ChatMessageRecord>, DatabaseError> {
        Ok(self
            .state()
            .chat_messages
            .values()
            .filter(|m| m.session_id == session_id)
            .max_by_key(|m| m.timestamp)
            .cloned())
    }

    async fn list_chat_messages(
        &mut self,
        session_id: &str,
        before: Option<DateTime<Utc>>,
        limit: usize,
    ) -> Result<Vec<ChatMessageRecord>, DatabaseError> {
        let mut messages: Vec<&ChatMessageRecord> = self
            .state()
            .chat_messages
            .values()
            .filter(|m| m.session_id == session_id && m.active)
            .filter(|m| before.map_or(true, |cursor| m.timestamp < cursor))
            .collect();
        messages.sort_by_key(|m| m.timestamp);
        let skip = messages.len().saturating_sub(limit);
        Ok(messages.into_iter().skip(skip).cloned().collect())
    }

    async fn find_call(&mut self, call_id: &str) -> Result<Option<CallRecord>, DatabaseError> {
        Ok(self.state().calls.get(call_id).cloned())
    }

    async fn list_calls_for(
        &mut self,
        user_id: Uuid,
        filter: CallFilter,
    ) -> Result<Vec<CallRecord>, DatabaseError> {
        let mut calls: Vec<CallRecord> = self
            .state()
            .calls
            .values()
            .filter(|c| c.active && c.is_participant(user_id) && filter.matches(c))
            .cloned()
            .collect();
        calls.sort_by(|a, b| b.audit.created_at.cmp(&a.audit.created_at));
        Ok(calls)
    }

    async fn find_review(&mut self, id: Uuid) -> Result<Option<DoctorReviewRecord>, DatabaseError> {
        Ok(self.state().reviews.get(&id).cloned())
    }

    async fn list_reviews(
        &mut self,
        doctor_id: Uuid,
        limit: Option<usize>,
        offset: usize,
    ) -> Result<Vec<DoctorReviewRecord>, DatabaseError> {
        let mut reviews: Vec<&DoctorReviewRecord> = self
            .state()
            .reviews
            .values()
            .filter(|r| r.doctor_id == doctor_id && r.active)
            .collect();
        reviews.sort_by(|a, b| {
            b.audit
                .created_at
                .cmp(&a.audit.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(reviews
            .into_iter()
            .skip(offset)
            .take(limit.unwrap_or(usize::MAX))
            .cloned()
            .collect())
    }

    async fn apply(&mut self, mutation: Mutation) -> Result<(), DatabaseError> {
        let name = mutation.name();
        let Access::Write { guard, undo } = &mut self.access else {
            return Err(DatabaseError::Query(format!(
                "cannot apply {} in a read-only transaction",
                name
            )));
        };

        match guard.apply(mutation) {
            Ok(entry) => {
                undo.push(entry);
                Ok(())
            }
            Err(e) => {
                debug!("Memory store rejected {}: {}", name, e);
                Err(e)
            }
        }
    }

    async fn commit(mut self: Box<Self>) -> Result<(), DatabaseError> {
        if let Access::Write { undo, .. } = &mut self.access {
            undo.clear();
        }
        Ok(())
    }
}
