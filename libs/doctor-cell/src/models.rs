use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shared_database::supabase::DatabaseError;
use shared_models::error::AppError;

// ==============================================================================
// DOCTOR
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Doctor {
    pub id: Uuid,
    pub clinic_id: Uuid,
    pub name: String,
    #[serde(default)]
    pub specialty: Option<String>,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default)]
    pub working_hours: WorkingHours,
}

fn default_active() -> bool {
    true
}

// ==============================================================================
// WORKING HOURS
// ==============================================================================

/// An open interval on a weekday, in clinic-local wall-clock time.
///
/// An `end` of `00:00` closes the period at the following midnight and is
/// written as `24:00` on the wire.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimePeriod {
    #[serde(with = "hhmm")]
    pub start: NaiveTime,
    #[serde(with = "hhmm::end_of_day")]
    pub end: NaiveTime,
}

impl TimePeriod {
    /// Builds a period from `HH:MM` strings. `end` may be `24:00`.
    pub fn parse(start: &str, end: &str) -> Result<Self, DoctorError> {
        Ok(Self {
            start: hhmm::parse(start).map_err(DoctorError::ValidationError)?,
            end: hhmm::parse_end(end).map_err(DoctorError::ValidationError)?,
        })
    }

    /// Start and end as offsets from local midnight.
    pub fn offsets(&self) -> (Duration, Duration) {
        let midnight = NaiveTime::default();
        let end = if self.end == midnight {
            Duration::days(1)
        } else {
            self.end - midnight
        };
        (self.start - midnight, end)
    }

    /// The period as local date-times on `date`.
    pub fn span_on(&self, date: NaiveDate) -> (NaiveDateTime, NaiveDateTime) {
        let midnight = date.and_time(NaiveTime::default());
        let (start, end) = self.offsets();
        (midnight + start, midnight + end)
    }
}

/// Per-weekday open periods. A day with no periods is closed.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct WorkingHours {
    pub monday: Vec<TimePeriod>,
    pub tuesday: Vec<TimePeriod>,
    pub wednesday: Vec<TimePeriod>,
    pub thursday: Vec<TimePeriod>,
    pub friday: Vec<TimePeriod>,
    pub saturday: Vec<TimePeriod>,
    pub sunday: Vec<TimePeriod>,
}

impl WorkingHours {
    pub fn periods_for(&self, weekday: Weekday) -> &[TimePeriod] {
        match weekday {
            Weekday::Mon => &self.monday,
            Weekday::Tue => &self.tuesday,
            Weekday::Wed => &self.wednesday,
            Weekday::Thu => &self.thursday,
            Weekday::Fri => &self.friday,
            Weekday::Sat => &self.saturday,
            Weekday::Sun => &self.sunday,
        }
    }

    pub fn is_closed_on(&self, weekday: Weekday) -> bool {
        self.periods_for(weekday).is_empty()
    }
}

/// `HH:MM` wire format for `NaiveTime`. `HH:MM:SS` is accepted on input
/// because Postgres `time` columns round-trip with seconds.
pub mod hhmm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%H:%M";

    pub fn parse(raw: &str) -> Result<NaiveTime, String> {
        let raw = raw.trim();
        NaiveTime::parse_from_str(raw, FORMAT)
            .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
            .map_err(|_| format!("Invalid time '{}', expected HH:MM", raw))
    }

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&time.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).map_err(serde::de::Error::custom)
    }

    const END_OF_DAY: &str = "24:00";

    /// Like `parse`, and also accepts `24:00`, stored as `00:00`.
    pub fn parse_end(raw: &str) -> Result<NaiveTime, String> {
        match raw.trim() {
            END_OF_DAY | "24:00:00" => Ok(NaiveTime::default()),
            other => parse(other),
        }
    }

    pub fn format_end(time: &NaiveTime) -> String {
        if *time == NaiveTime::default() {
            END_OF_DAY.to_string()
        } else {
            time.format(FORMAT).to_string()
        }
    }

    pub mod end_of_day {
        use chrono::NaiveTime;
        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
            serializer.serialize_str(&super::format_end(time))
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
            let raw = String::deserialize(deserializer)?;
            super::parse_end(&raw).map_err(serde::de::Error::custom)
        }
    }
}

// ==============================================================================
// REQUESTS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoctorListQuery {
    pub clinic_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateWorkingHoursRequest {
    pub working_hours: WorkingHours,
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, thiserror::Error)]
pub enum DoctorError {
    #[error("Doctor not found")]
    NotFound,

    #[error("Unauthorized access to doctor data")]
    Unauthorized,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<DatabaseError> for DoctorError {
    fn from(e: DatabaseError) -> Self {
        match e {
            DatabaseError::NotFound(_) => DoctorError::NotFound,
            DatabaseError::Auth(_) => DoctorError::Unauthorized,
            other => DoctorError::DatabaseError(other.to_string()),
        }
    }
}

impl From<DoctorError> for AppError {
    fn from(e: DoctorError) -> Self {
        match e {
            DoctorError::NotFound => AppError::NotFound("Doctor not found".to_string()),
            DoctorError::Unauthorized => AppError::Forbidden("Unauthorized access to doctor data".to_string()),
            DoctorError::ValidationError(msg) => AppError::ValidationError(msg),
            DoctorError::DatabaseError(msg) => AppError::Database(msg),
        }
    }
}
