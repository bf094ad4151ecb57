// libs/appointment-cell/src/models.rs
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use doctor_cell::models::DoctorError;
use scheduling_cell::models::{ScheduleBlockError, TimeRange};
use shared_config::AppConfig;
use shared_database::supabase::DatabaseError;
use shared_models::error::AppError;

/// Every appointment occupies one hour from its start. The length is not
/// stored.
pub const APPOINTMENT_DURATION_MINUTES: i64 = 60;

pub fn appointment_duration() -> Duration {
    Duration::minutes(APPOINTMENT_DURATION_MINUTES)
}

// ==============================================================================
// CORE APPOINTMENT MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Appointment {
    pub id: Uuid,
    pub clinic_id: Uuid,
    pub doctor_id: Option<Uuid>,
    pub patient_name: String,
    pub patient_phone: Option<String>,
    pub patient_email: Option<String>,
    pub date: DateTime<Utc>,
    #[serde(rename = "type")]
    pub appointment_type: AppointmentType,
    pub status: AppointmentStatus,
    pub notes: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Appointment {
    pub fn end_time(&self) -> DateTime<Utc> {
        self.date + appointment_duration()
    }

    pub fn time_range(&self) -> TimeRange {
        TimeRange::starting_at(self.date, appointment_duration())
    }

    pub fn is_blocking(&self) -> bool {
        self.status.is_blocking()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum AppointmentStatus {
    Scheduled,
    Confirmed,
    Completed,
    Cancelled,
    NoShow,
}

impl AppointmentStatus {
    /// Cancelled and no-show appointments free their slot.
    pub fn is_blocking(&self) -> bool {
        !matches!(self, AppointmentStatus::Cancelled | AppointmentStatus::NoShow)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AppointmentStatus::Completed | AppointmentStatus::Cancelled | AppointmentStatus::NoShow
        )
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Scheduled => write!(f, "scheduled"),
            AppointmentStatus::Confirmed => write!(f, "confirmed"),
            AppointmentStatus::Completed => write!(f, "completed"),
            AppointmentStatus::Cancelled => write!(f, "cancelled"),
            AppointmentStatus::NoShow => write!(f, "no-show"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum AppointmentType {
    #[default]
    InPerson,
    Online,
}

impl fmt::Display for AppointmentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentType::InPerson => write!(f, "in-person"),
            AppointmentType::Online => write!(f, "online"),
        }
    }
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

/// Booking form input. `date` and `time` are clinic-local; `time` is
/// `HH:MM`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAppointmentRequest {
    pub clinic_id: Uuid,
    pub doctor_id: Option<Uuid>,
    pub patient_name: String,
    pub patient_phone: Option<String>,
    pub patient_email: Option<String>,
    pub date: Option<NaiveDate>,
    pub time: Option<String>,
    #[serde(default, rename = "type")]
    pub appointment_type: AppointmentType,
    pub notes: Option<String>,
}

/// The row handed to the store once the checks pass.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewAppointment {
    pub clinic_id: Uuid,
    pub doctor_id: Option<Uuid>,
    pub patient_name: String,
    pub patient_phone: Option<String>,
    pub patient_email: Option<String>,
    pub date: DateTime<Utc>,
    #[serde(rename = "type")]
    pub appointment_type: AppointmentType,
    pub status: AppointmentStatus,
    pub notes: Option<String>,
}

impl NewAppointment {
    pub fn from_request(request: CreateAppointmentRequest, date: DateTime<Utc>) -> Self {
        Self {
            clinic_id: request.clinic_id,
            doctor_id: request.doctor_id,
            patient_name: request.patient_name.trim().to_string(),
            patient_phone: request.patient_phone,
            patient_email: request.patient_email,
            date,
            appointment_type: request.appointment_type,
            status: AppointmentStatus::Scheduled,
            notes: request.notes,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppointmentQuery {
    pub clinic_id: Uuid,
    pub doctor_id: Option<Uuid>,
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: AppointmentStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarQuery {
    pub clinic_id: Uuid,
    pub doctor_id: Option<Uuid>,
    pub year: i32,
    pub month: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailabilityQuery {
    pub clinic_id: Uuid,
    pub doctor_id: Uuid,
    pub date: NaiveDate,
}

// ==============================================================================
// BOOKING POLICY
// ==============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BookingPolicy {
    /// Reject slots outside the doctor's declared working hours.
    pub enforce_working_hours: bool,
}

impl BookingPolicy {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            enforce_working_hours: config.enforce_working_hours,
        }
    }
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, thiserror::Error)]
pub enum AppointmentError {
    #[error("Appointment not found")]
    NotFound,

    #[error("Doctor not found")]
    DoctorNotFound,

    #[error("Unauthorized access to appointment")]
    Unauthorized,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("This time is blocked for the selected professional")]
    SlotBlocked,

    #[error("Appointment conflicts with existing booking")]
    ConflictDetected,

    #[error("Requested time is outside the professional's working hours")]
    OutsideWorkingHours,

    #[error("Cannot move appointment from {from} to {to}")]
    InvalidStatusTransition {
        from: AppointmentStatus,
        to: AppointmentStatus,
    },

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<DatabaseError> for AppointmentError {
    fn from(e: DatabaseError) -> Self {
        match e {
            // The store's exclusion constraint is the authoritative check.
            DatabaseError::Conflict(_) => AppointmentError::ConflictDetected,
            DatabaseError::NotFound(_) => AppointmentError::NotFound,
            DatabaseError::Auth(_) => AppointmentError::Unauthorized,
            other => AppointmentError::DatabaseError(other.to_string()),
        }
    }
}

impl From<ScheduleBlockError> for AppointmentError {
    fn from(e: ScheduleBlockError) -> Self {
        match e {
            ScheduleBlockError::Unauthorized => AppointmentError::Unauthorized,
            ScheduleBlockError::ValidationError(msg) => AppointmentError::ValidationError(msg),
            other => AppointmentError::DatabaseError(other.to_string()),
        }
    }
}

impl From<DoctorError> for AppointmentError {
    fn from(e: DoctorError) -> Self {
        match e {
            DoctorError::NotFound => AppointmentError::DoctorNotFound,
            DoctorError::Unauthorized => AppointmentError::Unauthorized,
            DoctorError::ValidationError(msg) => AppointmentError::ValidationError(msg),
            DoctorError::DatabaseError(msg) => AppointmentError::DatabaseError(msg),
        }
    }
}

impl From<AppointmentError> for AppError {
    fn from(e: AppointmentError) -> Self {
        match e {
            AppointmentError::NotFound => AppError::NotFound("Appointment not found".to_string()),
            AppointmentError::DoctorNotFound => AppError::NotFound("Doctor not found".to_string()),
            AppointmentError::Unauthorized => {
                AppError::Forbidden("Unauthorized access to appointment".to_string())
            }
            AppointmentError::ValidationError(msg) => AppError::ValidationError(msg),
            AppointmentError::DatabaseError(msg) => AppError::Database(msg),
            conflict => AppError::Conflict(conflict.to_string()),
        }
    }
}
