use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveDateTime, Offset, Utc};

/// Source of "now" for every today/elapsed comparison.
///
/// Appointment dates and slot times are clinic wall-clock values, so
/// comparisons go through [`Clock::local_now`] rather than raw UTC.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    fn offset(&self) -> FixedOffset;

    fn local_now(&self) -> NaiveDateTime {
        self.now().with_timezone(&self.offset()).naive_local()
    }

    fn today(&self) -> NaiveDate {
        self.local_now().date()
    }
}

fn offset_from_minutes(minutes: i32) -> FixedOffset {
    FixedOffset::east_opt(minutes.saturating_mul(60)).unwrap_or_else(|| {
        tracing::warn!("Clinic UTC offset of {} minutes out of range, using UTC", minutes);
        Utc.fix()
    })
}

#[derive(Debug, Clone)]
pub struct SystemClock {
    offset: FixedOffset,
}

impl SystemClock {
    pub fn new(utc_offset_minutes: i32) -> Self {
        Self {
            offset: offset_from_minutes(utc_offset_minutes),
        }
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn offset(&self) -> FixedOffset {
        self.offset
    }
}

/// Manually driven clock for tests.
#[derive(Debug, Clone)]
pub struct FixedClock {
    instant: Arc<Mutex<DateTime<Utc>>>,
    offset: FixedOffset,
}

impl FixedClock {
    pub fn new(instant: DateTime<Utc>) -> Self {
        Self::with_offset(instant, 0)
    }

    pub fn with_offset(instant: DateTime<Utc>, utc_offset_minutes: i32) -> Self {
        Self {
            instant: Arc::new(Mutex::new(instant)),
            offset: offset_from_minutes(utc_offset_minutes),
        }
    }

    pub fn set(&self, instant: DateTime<Utc>) {
        if let Ok(mut guard) = self.instant.lock() {
            *guard = instant;
        }
    }

    pub fn advance(&self, by: Duration) {
        if let Ok(mut guard) = self.instant.lock() {
            *guard += by;
        }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        match self.instant.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    fn offset(&self) -> FixedOffset {
        self.offset
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn local_day_follows_clinic_offset() {
        let instant = Utc.with_ymd_and_hms(2025, 6, 9, 22, 30, 0).unwrap();
        assert_eq!(FixedClock::new(instant).today(), NaiveDate::from_ymd_opt(2025, 6, 9).unwrap());

        // UTC+3 is already the next day
        let clinic = FixedClock::with_offset(instant, 180);
        assert_eq!(clinic.today(), NaiveDate::from_ymd_opt(2025, 6, 10).unwrap());
        assert_eq!(clinic.local_now().time().to_string(), "01:30:00");
    }

    #[test]
    fn fixed_clock_can_be_driven() {
        let clock = FixedClock::new(Utc.with_ymd_and_hms(2025, 6, 10, 9, 0, 0).unwrap());
        clock.advance(Duration::minutes(90));
        assert_eq!(clock.local_now().time().to_string(), "10:30:00");
    }
}
