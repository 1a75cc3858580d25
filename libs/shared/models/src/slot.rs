use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

const SLOT_FORMAT: &str = "%I:%M %p";
// Postgres `time` columns come back as "09:00:00"
const STORAGE_FORMAT: &str = "%H:%M:%S";

/// A bookable time of day, written as 12-hour `"09:00 AM"`.
///
/// Ordering is chronological, so `"12:30 PM"` sorts after `"09:00 AM"` even though
/// a lexical comparison of the strings would not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SlotTime(NaiveTime);

impl SlotTime {
    pub fn new(time: NaiveTime) -> Self {
        Self(time)
    }

    pub fn from_hm(hour: u32, minute: u32) -> Option<Self> {
        NaiveTime::from_hms_opt(hour, minute, 0).map(Self)
    }

    pub fn time(&self) -> NaiveTime {
        self.0
    }

    /// The wall-clock instant this slot starts on `date`.
    pub fn on(&self, date: NaiveDate) -> NaiveDateTime {
        date.and_time(self.0)
    }

    /// A slot is still bookable only if it starts strictly after `now`.
    pub fn is_bookable_at(&self, date: NaiveDate, now: NaiveDateTime) -> bool {
        self.on(date) > now
    }

    /// Parse a whole template, rejecting malformed entries and duplicates.
    pub fn parse_template<S: AsRef<str>>(raw: &[S]) -> Result<Vec<SlotTime>, String> {
        let mut slots: Vec<SlotTime> = Vec::with_capacity(raw.len());
        for entry in raw {
            let slot: SlotTime = entry.as_ref().parse()?;
            if slots.contains(&slot) {
                return Err(format!("duplicate slot '{}' in template", slot));
            }
            slots.push(slot);
        }
        Ok(slots)
    }
}

impl fmt::Display for SlotTime {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0.format(SLOT_FORMAT))
    }
}

impl FromStr for SlotTime {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase();
        NaiveTime::parse_from_str(&normalized, SLOT_FORMAT)
            .or_else(|_| NaiveTime::parse_from_str(&normalized, STORAGE_FORMAT))
            .map(SlotTime)
            .map_err(|_| format!("invalid slot time '{}', expected format like '09:00 AM'", s))
    }
}

impl Serialize for SlotTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for SlotTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
