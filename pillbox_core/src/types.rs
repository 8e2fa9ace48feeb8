//! Core domain types for the Pillbox system.
//!
//! This module defines the fundamental types used throughout the system:
//! - Time-of-day anchors
//! - Regimens and their raw form drafts
//! - Dose instances derived for a given day

use crate::{Error, Result};
use chrono::{DateTime, Local, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// ============================================================================
// Time of Day
// ============================================================================

/// Wall-clock time of day with minute precision, written as `HH:MM`
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TimeOfDay {
    hour: u32,
    minute: u32,
}

impl TimeOfDay {
    pub fn new(hour: u32, minute: u32) -> Result<Self> {
        if hour >= 24 || minute >= 60 {
            return Err(Error::Validation(format!(
                "time of day out of range: {}:{}",
                hour, minute
            )));
        }
        Ok(Self { hour, minute })
    }

    pub fn hour(&self) -> u32 {
        self.hour
    }

    pub fn minute(&self) -> u32 {
        self.minute
    }

    /// Time of day of a wall-clock instant, seconds dropped
    pub fn of(instant: &NaiveDateTime) -> Self {
        Self {
            hour: instant.hour(),
            minute: instant.minute(),
        }
    }
}

impl FromStr for TimeOfDay {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (h, m) = s
            .trim()
            .split_once(':')
            .ok_or_else(|| Error::Validation(format!("start time must be HH:MM, got {:?}", s)))?;
        let hour = h
            .parse::<u32>()
            .map_err(|_| Error::Validation(format!("invalid hour in {:?}", s)))?;
        let minute = m
            .parse::<u32>()
            .map_err(|_| Error::Validation(format!("invalid minute in {:?}", s)))?;
        Self::new(hour, minute)
    }
}

impl TryFrom<String> for TimeOfDay {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<TimeOfDay> for String {
    fn from(t: TimeOfDay) -> Self {
        t.to_string()
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

// ============================================================================
// Regimen
// ============================================================================

/// A prescribed medication course
///
/// Field names on disk follow the stored record format (`freqHours`,
/// `startTime`, ...), so existing stores keep loading.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Regimen {
    pub id: String,
    pub name: String,
    pub dose: String,
    pub freq_hours: u32,
    pub start_time: TimeOfDay,
    pub duration_days: u32,
    pub start_date: DateTime<Local>,
    #[serde(default)]
    pub taken_log: Vec<String>,
}

/// Raw registration form values, not yet validated
#[derive(Clone, Debug, Default)]
pub struct RegimenDraft {
    pub name: String,
    pub dose: String,
    pub freq_hours: String,
    pub start_time: String,
    pub duration_days: String,
}

impl Regimen {
    /// Build a regimen from raw form input, rejecting degenerate values
    ///
    /// `now` becomes the regimen's `startDate`.
    pub fn from_draft(draft: &RegimenDraft, now: DateTime<Local>) -> Result<Self> {
        let name = draft.name.trim();
        if name.is_empty() {
            return Err(Error::Validation("medication name is required".into()));
        }

        let dose = draft.dose.trim();
        if dose.is_empty() {
            return Err(Error::Validation("dose is required".into()));
        }

        let freq_hours = draft.freq_hours.trim().parse::<i64>().map_err(|_| {
            Error::Validation(format!(
                "frequency must be a whole number of hours, got {:?}",
                draft.freq_hours
            ))
        })?;
        if freq_hours < 1 || freq_hours > u32::MAX as i64 {
            return Err(Error::Validation(format!(
                "frequency must be at least 1 hour, got {}",
                freq_hours
            )));
        }

        let duration_days = draft.duration_days.trim().parse::<i64>().map_err(|_| {
            Error::Validation(format!(
                "duration must be a whole number of days, got {:?}",
                draft.duration_days
            ))
        })?;
        if duration_days < 0 || duration_days > u32::MAX as i64 {
            return Err(Error::Validation(format!(
                "duration cannot be negative, got {}",
                duration_days
            )));
        }

        let start_time: TimeOfDay = draft.start_time.parse()?;

        Ok(Regimen {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            dose: dose.to_string(),
            freq_hours: freq_hours as u32,
            start_time,
            duration_days: duration_days as u32,
            start_date: now,
            taken_log: Vec::new(),
        })
    }

    /// Whether a dose instance has been acknowledged
    pub fn has_taken(&self, instance_id: &str) -> bool {
        self.taken_log.iter().any(|id| id == instance_id)
    }
}

// ============================================================================
// Dose Instance
// ============================================================================

/// One expected dose occurrence today, derived from a regimen
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct DoseInstance {
    pub instance_id: String,
    pub regimen_id: String,
    pub name: String,
    pub dose: String,
    pub time: NaiveDateTime,
    pub time_string: String,
    pub is_taken: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn draft() -> RegimenDraft {
        RegimenDraft {
            name: "Amoxicillin".into(),
            dose: "500mg".into(),
            freq_hours: "8".into(),
            start_time: "08:00".into(),
            duration_days: "3".into(),
        }
    }

    fn now() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_time_of_day_parse_and_display() {
        let t: TimeOfDay = "7:05".parse().unwrap();
        assert_eq!(t.hour(), 7);
        assert_eq!(t.minute(), 5);
        assert_eq!(t.to_string(), "07:05");

        assert!("24:00".parse::<TimeOfDay>().is_err());
        assert!("12:60".parse::<TimeOfDay>().is_err());
        assert!("noon".parse::<TimeOfDay>().is_err());
    }

    #[test]
    fn test_valid_draft_builds_regimen() {
        let regimen = Regimen::from_draft(&draft(), now()).unwrap();
        assert_eq!(regimen.name, "Amoxicillin");
        assert_eq!(regimen.freq_hours, 8);
        assert_eq!(regimen.duration_days, 3);
        assert_eq!(regimen.start_time.to_string(), "08:00");
        assert_eq!(regimen.start_date, now());
        assert!(regimen.taken_log.is_empty());
        assert!(!regimen.id.is_empty());
    }

    #[test]
    fn test_zero_and_negative_frequency_rejected() {
        for freq in ["0", "-8", "eight", ""] {
            let mut d = draft();
            d.freq_hours = freq.into();
            let result = Regimen::from_draft(&d, now());
            assert!(
                matches!(result, Err(Error::Validation(_))),
                "frequency {:?} should be rejected",
                freq
            );
        }
    }

    #[test]
    fn test_bad_duration_rejected() {
        let mut d = draft();
        d.duration_days = "-1".into();
        assert!(matches!(Regimen::from_draft(&d, now()), Err(Error::Validation(_))));

        d.duration_days = "a week".into();
        assert!(matches!(Regimen::from_draft(&d, now()), Err(Error::Validation(_))));

        d.duration_days = "0".into();
        assert_eq!(Regimen::from_draft(&d, now()).unwrap().duration_days, 0);
    }

    #[test]
    fn test_blank_name_or_dose_rejected() {
        let mut d = draft();
        d.name = "   ".into();
        assert!(Regimen::from_draft(&d, now()).is_err());

        let mut d = draft();
        d.dose = String::new();
        assert!(Regimen::from_draft(&d, now()).is_err());
    }

    #[test]
    fn test_stored_field_names() {
        let mut regimen = Regimen::from_draft(&draft(), now()).unwrap();
        regimen.taken_log.push("x-Sat Jun 15 2024-08:00".into());

        let json = serde_json::to_value(&regimen).unwrap();
        for key in [
            "id",
            "name",
            "dose",
            "freqHours",
            "startTime",
            "durationDays",
            "startDate",
            "takenLog",
        ] {
            assert!(json.get(key).is_some(), "missing field {}", key);
        }
        assert_eq!(json["startTime"], "08:00");

        let parsed: Regimen = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, regimen);
        assert!(parsed.has_taken("x-Sat Jun 15 2024-08:00"));
    }
}
