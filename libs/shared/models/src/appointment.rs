use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::audit::Audit;
use crate::slot::SlotTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Pending,
    Confirmed,
    Scheduled,
    Cancelled,
    Completed,
}

impl AppointmentStatus {
    pub const NON_TERMINAL: [AppointmentStatus; 3] = [
        AppointmentStatus::Pending,
        AppointmentStatus::Confirmed,
        AppointmentStatus::Scheduled,
    ];

    /// Terminal statuses no longer contend for their slot.
    pub fn is_terminal(&self) -> bool {
        matches!(self, AppointmentStatus::Cancelled | AppointmentStatus::Completed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Pending => "pending",
            AppointmentStatus::Confirmed => "confirmed",
            AppointmentStatus::Scheduled => "scheduled",
            AppointmentStatus::Cancelled => "cancelled",
            AppointmentStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AppointmentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(AppointmentStatus::Pending),
            "confirmed" => Ok(AppointmentStatus::Confirmed),
            "scheduled" => Ok(AppointmentStatus::Scheduled),
            "cancelled" => Ok(AppointmentStatus::Cancelled),
            "completed" => Ok(AppointmentStatus::Completed),
            other => Err(format!("invalid appointment status '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppointmentRecord {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub patient_id: Uuid,
    pub appointment_date: NaiveDate,
    pub appointment_time: SlotTime,
    pub status: AppointmentStatus,
    pub active: bool,
    #[serde(flatten)]
    pub audit: Audit,
}

impl AppointmentRecord {
    pub fn starts_at(&self) -> NaiveDateTime {
        self.appointment_time.on(self.appointment_date)
    }

    /// Whether this row holds its `(doctor, date, time)` slot.
    pub fn holds_slot(&self) -> bool {
        self.active && !self.status.is_terminal()
    }

    pub fn occupies(&self, doctor_id: Uuid, date: NaiveDate, time: SlotTime) -> bool {
        self.holds_slot()
            && self.doctor_id == doctor_id
            && self.appointment_date == date
            && self.appointment_time == time
    }

    pub fn involves(&self, user_id: Uuid) -> bool {
        self.doctor_id == user_id || self.patient_id == user_id
    }

    /// Upcoming: still contending for its slot and starting at or after `now`.
    pub fn is_upcoming(&self, now: NaiveDateTime) -> bool {
        self.holds_slot() && self.starts_at() >= now
    }

    /// Completed: marked completed, or already started and never cancelled.
    pub fn is_completed(&self, now: NaiveDateTime) -> bool {
        self.active
            && (self.status == AppointmentStatus::Completed
                || (self.starts_at() < now && self.status != AppointmentStatus::Cancelled))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn appointment(status: AppointmentStatus, date: NaiveDate, time: SlotTime) -> AppointmentRecord {
        AppointmentRecord {
            id: Uuid::new_v4(),
            doctor_id: Uuid::new_v4(),
            patient_id: Uuid::new_v4(),
            appointment_date: date,
            appointment_time: time,
            status,
            active: true,
            audit: Audit::created(Uuid::new_v4(), Utc::now()),
        }
    }

    #[test]
    fn status_round_trips_through_str() {
        for status in [
            AppointmentStatus::Pending,
            AppointmentStatus::Confirmed,
            AppointmentStatus::Scheduled,
            AppointmentStatus::Cancelled,
            AppointmentStatus::Completed,
        ] {
            assert_eq!(status.as_str().parse::<AppointmentStatus>(), Ok(status));
        }
        assert!("deleted".parse::<AppointmentStatus>().is_err());
    }

    #[test]
    fn same_day_comparison_uses_time_of_day() {
        let date = NaiveDate::from_ymd_opt(2025, 6, 10).unwrap();
        let nine = SlotTime::from_hm(9, 0).unwrap();
        let now = date.and_hms_opt(10, 0, 0).unwrap();

        let pending = appointment(AppointmentStatus::Pending, date, nine);
        assert!(!pending.is_upcoming(now));
        assert!(pending.is_completed(now));

        let cancelled = appointment(AppointmentStatus::Cancelled, date, nine);
        assert!(!cancelled.is_completed(now));

        let later = appointment(AppointmentStatus::Pending, date, SlotTime::from_hm(13, 0).unwrap());
        assert!(later.is_upcoming(now));
        assert!(!later.is_completed(now));
    }
}
